//! Error taxonomy for namespace client operations.

use std::time::Duration;

use thiserror::Error;
use zkb_protocol::{ErrorCode, PathError};

use crate::state::SessionState;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the namespace client and its coordinators.
#[derive(Debug, Error)]
pub enum Error {
	/// Operation attempted while the session is not in a usable state.
	#[error("connection unavailable")]
	ConnectionUnavailable,

	/// Connect attempt exceeded its ceiling; the session handle was released.
	#[error("timed out connecting to {address} after {after:?}")]
	ConnectTimeout { address: String, after: Duration },

	/// The underlying session could not be opened.
	#[error("failed to open session to {address}: {reason}")]
	ConnectFailed { address: String, reason: String },

	#[error("authentication failed")]
	AuthFailed,

	#[error("session expired")]
	SessionExpired,

	/// Automatic recovery after an expiry did not produce a live session.
	#[error("reconnect after session expiry failed: {0}")]
	ReconnectFailed(String),

	#[error("cannot {operation} while session is {state}")]
	InvalidState { state: SessionState, operation: &'static str },

	#[error("node does not exist: {path}")]
	NoNode { path: String },

	#[error("node already exists: {path}")]
	NodeExists { path: String },

	#[error("version mismatch for {path}")]
	BadVersion { path: String },

	#[error("node has children: {path}")]
	NotEmpty { path: String },

	/// Connection dropped or timed out mid-call; not retried by the client.
	#[error("transient failure: {0}")]
	Transient(String),

	/// Any other server-side rejection.
	#[error("server rejected request for {path}: {code}")]
	Remote { code: ErrorCode, path: String },

	#[error("invalid path: {0}")]
	InvalidPath(#[from] PathError),

	#[error("invalid address: {0}")]
	InvalidAddress(String),

	#[error("protocol error: {0}")]
	Protocol(String),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

impl Error {
	/// Maps a server error code for `path` onto the client taxonomy.
	pub fn from_code(code: ErrorCode, path: &str) -> Self {
		let path = path.to_string();
		match code {
			ErrorCode::NoNode => Error::NoNode { path },
			ErrorCode::NodeExists => Error::NodeExists { path },
			ErrorCode::BadVersion => Error::BadVersion { path },
			ErrorCode::NotEmpty => Error::NotEmpty { path },
			ErrorCode::ConnectionLoss => Error::Transient(format!("connection lost during request for {path}")),
			ErrorCode::OperationTimeout => Error::Transient(format!("operation timed out for {path}")),
			ErrorCode::SessionExpired => Error::SessionExpired,
			ErrorCode::AuthFailed => Error::AuthFailed,
			code => Error::Remote { code, path },
		}
	}

	/// Well-defined rejections of a specific request by the server.
	pub fn is_remote_rejection(&self) -> bool {
		matches!(
			self,
			Error::NoNode { .. } | Error::NodeExists { .. } | Error::BadVersion { .. } | Error::NotEmpty { .. } | Error::Remote { .. }
		)
	}

	/// Failures caused by the session or connection rather than the request.
	pub fn is_connection_error(&self) -> bool {
		matches!(
			self,
			Error::ConnectionUnavailable
				| Error::ConnectTimeout { .. }
				| Error::ConnectFailed { .. }
				| Error::Transient(_)
				| Error::SessionExpired
				| Error::ReconnectFailed(_)
				| Error::Io(_)
		)
	}

	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::ConnectTimeout { .. })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn remote_codes_map_to_distinct_kinds() {
		assert!(matches!(Error::from_code(ErrorCode::NoNode, "/x"), Error::NoNode { path } if path == "/x"));
		assert!(matches!(Error::from_code(ErrorCode::NodeExists, "/x"), Error::NodeExists { .. }));
		assert!(matches!(Error::from_code(ErrorCode::BadVersion, "/x"), Error::BadVersion { .. }));
		assert!(matches!(Error::from_code(ErrorCode::NotEmpty, "/x"), Error::NotEmpty { .. }));
		assert!(matches!(Error::from_code(ErrorCode::ConnectionLoss, "/x"), Error::Transient(_)));
		assert!(matches!(Error::from_code(ErrorCode::SessionExpired, "/x"), Error::SessionExpired));
		assert!(matches!(
			Error::from_code(ErrorCode::NoAuth, "/x"),
			Error::Remote {
				code: ErrorCode::NoAuth,
				..
			}
		));
	}

	#[test]
	fn classification_separates_rejections_from_connection_failures() {
		let rejection = Error::from_code(ErrorCode::NotEmpty, "/a");
		assert!(rejection.is_remote_rejection());
		assert!(!rejection.is_connection_error());

		let transient = Error::from_code(ErrorCode::ConnectionLoss, "/a");
		assert!(transient.is_connection_error());
		assert!(!transient.is_remote_rejection());
		assert!(Error::ConnectionUnavailable.is_connection_error());
	}
}
