//! Node metadata snapshot.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Metadata for a single node as reported by the server.
///
/// A stat is a snapshot: it may be stale as soon as it is read. Timestamps
/// are milliseconds since the Unix epoch, as stored by the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStat {
	/// Transaction id that created the node.
	pub czxid: i64,
	/// Transaction id that last modified the node's data.
	pub mzxid: i64,
	/// Creation time (ms since epoch).
	pub ctime: i64,
	/// Last data modification time (ms since epoch).
	pub mtime: i64,
	/// Data version.
	pub version: i32,
	/// Child list version.
	pub cversion: i32,
	/// ACL version.
	pub aversion: i32,
	/// Owning session id for ephemeral nodes, `0` otherwise.
	pub ephemeral_owner: i64,
	/// Length of the data payload in bytes.
	pub data_length: i32,
	/// Number of direct children.
	pub num_children: i32,
	/// Transaction id that last modified the child list.
	pub pzxid: i64,
}

impl NodeStat {
	/// Returns `true` when the node is bound to a session's lifetime.
	pub fn is_ephemeral(&self) -> bool {
		self.ephemeral_owner != 0
	}

	pub fn created_at(&self) -> SystemTime {
		epoch_millis(self.ctime)
	}

	pub fn modified_at(&self) -> SystemTime {
		epoch_millis(self.mtime)
	}
}

fn epoch_millis(ms: i64) -> SystemTime {
	UNIX_EPOCH + Duration::from_millis(ms.max(0) as u64)
}
