use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The result envelope returned by all commands.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult<T: Serialize> {
	pub ok: bool,
	pub command: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub duration_ms: Option<u64>,
}

impl<T: Serialize> CommandResult<T> {
	pub fn success(command: impl Into<String>, data: T) -> Self {
		Self {
			ok: true,
			command: command.into(),
			data: Some(data),
			error: None,
			duration_ms: None,
		}
	}

	pub fn failure(command: impl Into<String>, error: CommandError) -> Self {
		Self {
			ok: false,
			command: command.into(),
			data: None,
			error: Some(error),
			duration_ms: None,
		}
	}

	pub fn with_duration(mut self, elapsed: Duration) -> Self {
		self.duration_ms = Some(elapsed.as_millis() as u64);
		self
	}
}

/// Error information for failed commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
	pub code: ErrorCode,
	pub message: String,
}

/// Standardized error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	InvalidInput,
	ConnectFailed,
	Timeout,
	AuthFailed,
	SessionExpired,
	ConnectionUnavailable,
	ConnectionLoss,
	NoNode,
	NodeExists,
	BadVersion,
	NotEmpty,
	RemoteError,
	ProtocolError,
	Interrupted,
	ProfileError,
	IoError,
	InternalError,
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ErrorCode::InvalidInput => write!(f, "INVALID_INPUT"),
			ErrorCode::ConnectFailed => write!(f, "CONNECT_FAILED"),
			ErrorCode::Timeout => write!(f, "TIMEOUT"),
			ErrorCode::AuthFailed => write!(f, "AUTH_FAILED"),
			ErrorCode::SessionExpired => write!(f, "SESSION_EXPIRED"),
			ErrorCode::ConnectionUnavailable => write!(f, "CONNECTION_UNAVAILABLE"),
			ErrorCode::ConnectionLoss => write!(f, "CONNECTION_LOSS"),
			ErrorCode::NoNode => write!(f, "NO_NODE"),
			ErrorCode::NodeExists => write!(f, "NODE_EXISTS"),
			ErrorCode::BadVersion => write!(f, "BAD_VERSION"),
			ErrorCode::NotEmpty => write!(f, "NOT_EMPTY"),
			ErrorCode::RemoteError => write!(f, "REMOTE_ERROR"),
			ErrorCode::ProtocolError => write!(f, "PROTOCOL_ERROR"),
			ErrorCode::Interrupted => write!(f, "INTERRUPTED"),
			ErrorCode::ProfileError => write!(f, "PROFILE_ERROR"),
			ErrorCode::IoError => write!(f, "IO_ERROR"),
			ErrorCode::InternalError => write!(f, "INTERNAL_ERROR"),
		}
	}
}
