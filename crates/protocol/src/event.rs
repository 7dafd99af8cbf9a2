//! Session-level notifications delivered by the watcher channel.

use serde::{Deserialize, Serialize};

/// Session state reported asynchronously by the underlying session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeeperState {
	/// Session established (or re-established after a transient loss).
	SyncConnected,
	/// Connection to the server lost; the session may still recover.
	Disconnected,
	/// Session closed locally.
	Closed,
	/// Server invalidated the session; a brand-new session is required.
	Expired,
	/// Server rejected the session's credentials.
	AuthFailed,
	/// Connected to a server that only serves reads.
	ConnectedReadOnly,
}

impl std::fmt::Display for KeeperState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			KeeperState::SyncConnected => "sync_connected",
			KeeperState::Disconnected => "disconnected",
			KeeperState::Closed => "closed",
			KeeperState::Expired => "expired",
			KeeperState::AuthFailed => "auth_failed",
			KeeperState::ConnectedReadOnly => "connected_read_only",
		};
		f.write_str(name)
	}
}
