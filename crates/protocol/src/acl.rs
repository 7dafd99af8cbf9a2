//! Access control records attached to created nodes.

use serde::{Deserialize, Serialize};

/// Permission bit set for an ACL entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Perms(pub i32);

impl Perms {
	pub const READ: Perms = Perms(1);
	pub const WRITE: Perms = Perms(1 << 1);
	pub const CREATE: Perms = Perms(1 << 2);
	pub const DELETE: Perms = Perms(1 << 3);
	pub const ADMIN: Perms = Perms(1 << 4);
	pub const ALL: Perms = Perms(0b11111);

	pub fn contains(self, other: Perms) -> bool {
		self.0 & other.0 == other.0
	}
}

impl std::ops::BitOr for Perms {
	type Output = Perms;

	fn bitor(self, rhs: Perms) -> Perms {
		Perms(self.0 | rhs.0)
	}
}

/// Identity an ACL entry applies to, e.g. `world:anyone`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Id {
	pub scheme: String,
	pub id: String,
}

impl Id {
	pub fn new(scheme: impl Into<String>, id: impl Into<String>) -> Self {
		Self {
			scheme: scheme.into(),
			id: id.into(),
		}
	}

	pub fn anyone() -> Self {
		Self::new("world", "anyone")
	}
}

/// Single ACL entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Acl {
	pub perms: Perms,
	pub id: Id,
}

impl Acl {
	/// Fully open ACL: every permission for `world:anyone`.
	pub fn open_unsafe() -> Vec<Acl> {
		vec![Acl {
			perms: Perms::ALL,
			id: Id::anyone(),
		}]
	}

	/// Read-only ACL for `world:anyone`.
	pub fn read_unsafe() -> Vec<Acl> {
		vec![Acl {
			perms: Perms::READ,
			id: Id::anyone(),
		}]
	}
}
