//! Client tuning knobs.

use std::time::Duration;

use crate::{DEFAULT_RECONNECT_TIMEOUT, DEFAULT_SESSION_TIMEOUT};

/// Session-level settings shared by every connection a client opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
	/// Session timeout requested from the server.
	pub session_timeout: Duration,
	/// Outer bound on the automatic reconnect after a session expiry.
	pub reconnect_timeout: Duration,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			session_timeout: DEFAULT_SESSION_TIMEOUT,
			reconnect_timeout: DEFAULT_RECONNECT_TIMEOUT,
		}
	}
}

impl ClientConfig {
	pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
		self.session_timeout = timeout;
		self
	}

	pub fn with_reconnect_timeout(mut self, timeout: Duration) -> Self {
		self.reconnect_timeout = timeout;
		self
	}
}
