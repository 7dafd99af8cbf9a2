//! Node creation modes.

use serde::{Deserialize, Serialize};

/// How a node is created: persistent or session-bound, optionally with a
/// server-assigned sequence suffix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateMode {
	#[default]
	Persistent,
	Ephemeral,
	PersistentSequential,
	EphemeralSequential,
}

impl CreateMode {
	pub fn from_flags(ephemeral: bool, sequential: bool) -> Self {
		match (ephemeral, sequential) {
			(false, false) => CreateMode::Persistent,
			(true, false) => CreateMode::Ephemeral,
			(false, true) => CreateMode::PersistentSequential,
			(true, true) => CreateMode::EphemeralSequential,
		}
	}

	/// Wire flag value sent in a create request.
	pub fn flag(self) -> i32 {
		match self {
			CreateMode::Persistent => 0,
			CreateMode::Ephemeral => 1,
			CreateMode::PersistentSequential => 2,
			CreateMode::EphemeralSequential => 3,
		}
	}

	pub fn is_ephemeral(self) -> bool {
		matches!(self, CreateMode::Ephemeral | CreateMode::EphemeralSequential)
	}

	pub fn is_sequential(self) -> bool {
		matches!(self, CreateMode::PersistentSequential | CreateMode::EphemeralSequential)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn flags_match_wire_values() {
		assert_eq!(CreateMode::from_flags(false, false).flag(), 0);
		assert_eq!(CreateMode::from_flags(true, false).flag(), 1);
		assert_eq!(CreateMode::from_flags(false, true).flag(), 2);
		assert_eq!(CreateMode::from_flags(true, true).flag(), 3);
	}
}
