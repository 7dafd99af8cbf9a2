//! Session state machine.
//!
//! The state is owned by [`NamespaceClient`](crate::NamespaceClient) and only
//! ever changes through [`SessionState::on_event`]. Events that have no entry
//! in the table are ignored, so every sequence of events keeps the machine in
//! one of the defined states.

use std::fmt;

use serde::Serialize;
use zkb_protocol::KeeperState;

/// Why a session is currently disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
	/// No connection has been attempted yet.
	Idle,
	/// Closed locally or by the underlying session.
	Closed,
	/// The connect ceiling elapsed before the session was established.
	TimedOut,
	/// Connection lost; the underlying session is retrying on its own.
	Lost,
	/// Recovery after a session expiry failed.
	ReconnectFailed,
}

/// Lifecycle state of the single logical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
	Disconnected(DisconnectReason),
	Connecting,
	Connected,
	ReadOnly,
	AuthFailed,
	Expired,
}

/// Inputs to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
	/// `connect()` was called.
	Connect,
	/// Watcher notification from the underlying session.
	Watch(KeeperState),
	/// The connect ceiling elapsed.
	ConnectTimedOut,
	/// The automatic reconnect after expiry gave up.
	ReconnectFailed,
	/// `close()` was called.
	Close,
}

impl Default for SessionState {
	fn default() -> Self {
		SessionState::Disconnected(DisconnectReason::Idle)
	}
}

impl SessionState {
	/// `true` only in `Connected` and `ReadOnly`.
	pub fn is_connected(self) -> bool {
		matches!(self, SessionState::Connected | SessionState::ReadOnly)
	}

	/// `true` when writes are permitted.
	pub fn is_writable(self) -> bool {
		self == SessionState::Connected
	}

	/// `true` when a fresh `connect()` may start from this state.
	pub fn can_connect(self) -> bool {
		matches!(self, SessionState::Disconnected(reason) if reason != DisconnectReason::Lost)
	}

	/// `true` for disconnected states that will not recover without a new `connect()`.
	pub fn is_terminal(self) -> bool {
		matches!(self, SessionState::Disconnected(reason) if reason != DisconnectReason::Lost)
	}

	/// Applies `event`, returning the next state or `None` when the event has
	/// no effect in the current state.
	pub fn on_event(self, event: SessionEvent) -> Option<SessionState> {
		use DisconnectReason::*;
		use KeeperState as K;
		use SessionEvent::*;
		use SessionState::*;

		let next = match (self, event) {
			(_, Close) | (_, Watch(K::Closed)) => Disconnected(Closed),

			(state, Connect) if state.can_connect() => Connecting,

			(Connecting, Watch(K::SyncConnected)) => Connected,
			(Connecting, Watch(K::ConnectedReadOnly)) => ReadOnly,
			(Connecting, Watch(K::AuthFailed)) => AuthFailed,
			(Connecting, ConnectTimedOut) => Disconnected(TimedOut),

			(Connected, Watch(K::Disconnected)) => Disconnected(Lost),
			(Connected, Watch(K::Expired)) => Expired,
			(Connected, Watch(K::ConnectedReadOnly)) => ReadOnly,
			(Connected, Watch(K::AuthFailed)) => AuthFailed,

			(ReadOnly, Watch(K::SyncConnected)) => Connected,
			(ReadOnly, Watch(K::Disconnected)) => Disconnected(Lost),
			(ReadOnly, Watch(K::Expired)) => Expired,
			(ReadOnly, Watch(K::AuthFailed)) => AuthFailed,

			(Disconnected(Lost), Watch(K::SyncConnected)) => Connected,
			(Disconnected(Lost), Watch(K::ConnectedReadOnly)) => ReadOnly,
			(Disconnected(Lost), Watch(K::Expired)) => Expired,
			(Disconnected(Lost), Watch(K::AuthFailed)) => AuthFailed,

			(Expired, Watch(K::SyncConnected)) => Connected,
			(Expired, Watch(K::ConnectedReadOnly)) => ReadOnly,
			(Expired, Watch(K::AuthFailed)) => AuthFailed,
			(Expired, SessionEvent::ReconnectFailed) => Disconnected(DisconnectReason::ReconnectFailed),

			_ => return None,
		};
		Some(next)
	}

	pub fn as_str(self) -> &'static str {
		match self {
			SessionState::Disconnected(DisconnectReason::Idle) => "disconnected",
			SessionState::Disconnected(DisconnectReason::Closed) => "disconnected (closed)",
			SessionState::Disconnected(DisconnectReason::TimedOut) => "disconnected (timed out)",
			SessionState::Disconnected(DisconnectReason::Lost) => "disconnected (retrying)",
			SessionState::Disconnected(DisconnectReason::ReconnectFailed) => "disconnected (reconnect failed)",
			SessionState::Connecting => "connecting",
			SessionState::Connected => "connected",
			SessionState::ReadOnly => "read-only",
			SessionState::AuthFailed => "auth failed",
			SessionState::Expired => "expired",
		}
	}
}

impl fmt::Display for SessionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const ALL_STATES: [SessionState; 10] = [
		SessionState::Disconnected(DisconnectReason::Idle),
		SessionState::Disconnected(DisconnectReason::Closed),
		SessionState::Disconnected(DisconnectReason::TimedOut),
		SessionState::Disconnected(DisconnectReason::Lost),
		SessionState::Disconnected(DisconnectReason::ReconnectFailed),
		SessionState::Connecting,
		SessionState::Connected,
		SessionState::ReadOnly,
		SessionState::AuthFailed,
		SessionState::Expired,
	];

	fn all_events() -> Vec<SessionEvent> {
		let mut events = vec![
			SessionEvent::Connect,
			SessionEvent::ConnectTimedOut,
			SessionEvent::ReconnectFailed,
			SessionEvent::Close,
		];
		for keeper in [
			KeeperState::SyncConnected,
			KeeperState::Disconnected,
			KeeperState::Closed,
			KeeperState::Expired,
			KeeperState::AuthFailed,
			KeeperState::ConnectedReadOnly,
		] {
			events.push(SessionEvent::Watch(keeper));
		}
		events
	}

	fn run(events: &[SessionEvent]) -> SessionState {
		events
			.iter()
			.fold(SessionState::default(), |state, event| state.on_event(*event).unwrap_or(state))
	}

	#[test]
	fn initial_state_is_idle_disconnected() {
		assert_eq!(SessionState::default(), SessionState::Disconnected(DisconnectReason::Idle));
		assert!(!SessionState::default().is_connected());
	}

	#[test]
	fn connect_then_established() {
		let state = run(&[SessionEvent::Connect, SessionEvent::Watch(KeeperState::SyncConnected)]);
		assert_eq!(state, SessionState::Connected);
	}

	#[test]
	fn connect_auth_failure() {
		let state = run(&[SessionEvent::Connect, SessionEvent::Watch(KeeperState::AuthFailed)]);
		assert_eq!(state, SessionState::AuthFailed);
	}

	#[test]
	fn connect_timeout_returns_to_disconnected() {
		let state = run(&[SessionEvent::Connect, SessionEvent::ConnectTimedOut]);
		assert_eq!(state, SessionState::Disconnected(DisconnectReason::TimedOut));
		assert!(state.can_connect());
	}

	#[test]
	fn transient_loss_recovers_on_sync() {
		let lost = run(&[
			SessionEvent::Connect,
			SessionEvent::Watch(KeeperState::SyncConnected),
			SessionEvent::Watch(KeeperState::Disconnected),
		]);
		assert_eq!(lost, SessionState::Disconnected(DisconnectReason::Lost));
		assert!(!lost.can_connect());
		assert!(!lost.is_terminal());
		assert_eq!(lost.on_event(SessionEvent::Watch(KeeperState::SyncConnected)), Some(SessionState::Connected));
	}

	#[test]
	fn expiry_recovers_when_new_session_syncs() {
		let expired = run(&[
			SessionEvent::Connect,
			SessionEvent::Watch(KeeperState::SyncConnected),
			SessionEvent::Watch(KeeperState::Expired),
		]);
		assert_eq!(expired, SessionState::Expired);
		assert_eq!(expired.on_event(SessionEvent::Watch(KeeperState::SyncConnected)), Some(SessionState::Connected));
		assert_eq!(
			expired.on_event(SessionEvent::ReconnectFailed),
			Some(SessionState::Disconnected(DisconnectReason::ReconnectFailed))
		);
	}

	#[test]
	fn read_only_serves_reads_only() {
		let state = run(&[
			SessionEvent::Connect,
			SessionEvent::Watch(KeeperState::SyncConnected),
			SessionEvent::Watch(KeeperState::ConnectedReadOnly),
		]);
		assert_eq!(state, SessionState::ReadOnly);
		assert!(state.is_connected());
		assert!(!state.is_writable());
	}

	#[test]
	fn close_is_terminal_from_every_state() {
		for state in ALL_STATES {
			let next = state.on_event(SessionEvent::Close).unwrap();
			assert_eq!(next, SessionState::Disconnected(DisconnectReason::Closed));
			assert!(next.is_terminal());
		}
	}

	#[test]
	fn connect_is_ignored_unless_terminally_disconnected() {
		for state in [
			SessionState::Connecting,
			SessionState::Connected,
			SessionState::ReadOnly,
			SessionState::AuthFailed,
			SessionState::Expired,
			SessionState::Disconnected(DisconnectReason::Lost),
		] {
			assert_eq!(state.on_event(SessionEvent::Connect), None, "{state}");
		}
	}

	#[test]
	fn is_connected_iff_connected_or_read_only() {
		for state in ALL_STATES {
			let expected = matches!(state, SessionState::Connected | SessionState::ReadOnly);
			assert_eq!(state.is_connected(), expected, "{state}");
		}
	}

	#[test]
	fn every_event_sequence_stays_defined() {
		// Exhaustive over pairs of events from every state: each step either
		// lands in a known state or is ignored.
		let events = all_events();
		for start in ALL_STATES {
			for first in &events {
				let mid = start.on_event(*first).unwrap_or(start);
				assert!(ALL_STATES.contains(&mid));
				for second in &events {
					let end = mid.on_event(*second).unwrap_or(mid);
					assert!(ALL_STATES.contains(&end));
					assert_eq!(end.is_connected(), matches!(end, SessionState::Connected | SessionState::ReadOnly));
				}
			}
		}
	}
}
