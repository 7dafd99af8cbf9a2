use std::path::PathBuf;

use thiserror::Error;
use zkb::protocol::PathError;
use zkb::runtime;

use crate::output::ErrorCode;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error(transparent)]
	Session(#[from] zkb::Error),

	#[error(transparent)]
	Client(#[from] runtime::Error),

	#[error("invalid path: {0}")]
	InvalidPath(#[from] PathError),

	#[error("no server given; pass --server, set ZKB_SERVER, or save a default profile")]
	NoServer,

	#[error("unknown profile: {0}")]
	UnknownProfile(String),

	#[error("profile already exists: {0}")]
	ProfileExists(String),

	#[error("profile {existing} already points at {server}")]
	DuplicateServer { existing: String, server: String },

	#[error("cannot read profile store {path}: {source}")]
	ProfileStore {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	#[error("{0}")]
	InvalidInput(String),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),
}

impl CliError {
	/// Stable code reported in the result envelope.
	pub fn code(&self) -> ErrorCode {
		match self {
			CliError::Session(err) => session_code(err),
			CliError::Client(err) => client_code(err),
			CliError::InvalidPath(_) | CliError::InvalidInput(_) | CliError::NoServer => ErrorCode::InvalidInput,
			CliError::UnknownProfile(_) | CliError::ProfileExists(_) | CliError::DuplicateServer { .. } | CliError::ProfileStore { .. } => {
				ErrorCode::ProfileError
			}
			CliError::Io(_) => ErrorCode::IoError,
			CliError::Json(_) => ErrorCode::InternalError,
		}
	}
}

fn session_code(err: &zkb::Error) -> ErrorCode {
	match err {
		zkb::Error::Client(err) => client_code(err),
		zkb::Error::InvalidPath(_) => ErrorCode::InvalidInput,
		zkb::Error::ExpandPending(_) | zkb::Error::TreeReplaced(_) => ErrorCode::Interrupted,
		zkb::Error::UnknownNode(_) | zkb::Error::WorkerFailed(_) => ErrorCode::InternalError,
	}
}

fn client_code(err: &runtime::Error) -> ErrorCode {
	use runtime::Error;

	match err {
		Error::ConnectionUnavailable | Error::InvalidState { .. } => ErrorCode::ConnectionUnavailable,
		Error::ConnectTimeout { .. } => ErrorCode::Timeout,
		Error::ConnectFailed { .. } | Error::ReconnectFailed(_) => ErrorCode::ConnectFailed,
		Error::AuthFailed => ErrorCode::AuthFailed,
		Error::SessionExpired => ErrorCode::SessionExpired,
		Error::Transient(_) => ErrorCode::ConnectionLoss,
		Error::NoNode { .. } => ErrorCode::NoNode,
		Error::NodeExists { .. } => ErrorCode::NodeExists,
		Error::BadVersion { .. } => ErrorCode::BadVersion,
		Error::NotEmpty { .. } => ErrorCode::NotEmpty,
		Error::Remote { .. } => ErrorCode::RemoteError,
		Error::InvalidPath(_) | Error::InvalidAddress(_) => ErrorCode::InvalidInput,
		Error::Protocol(_) => ErrorCode::ProtocolError,
		Error::Io(_) => ErrorCode::IoError,
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::*;

	#[test]
	fn client_failures_keep_their_kind_through_the_session_layer() {
		let err = CliError::from(zkb::Error::from(runtime::Error::NoNode { path: "/a".into() }));
		assert_eq!(err.code(), ErrorCode::NoNode);

		let err = CliError::from(zkb::Error::from(runtime::Error::ConnectTimeout {
			address: "h:1".into(),
			after: Duration::from_secs(1),
		}));
		assert_eq!(err.code(), ErrorCode::Timeout);
	}

	#[test]
	fn profile_and_input_errors_are_classified() {
		assert_eq!(CliError::NoServer.code(), ErrorCode::InvalidInput);
		assert_eq!(CliError::UnknownProfile("x".into()).code(), ErrorCode::ProfileError);
		assert_eq!(CliError::from(runtime::Error::InvalidAddress("x".into())).code(), ErrorCode::InvalidInput);
		assert_eq!(CliError::from(zkb::Error::ExpandPending("/".into())).code(), ErrorCode::Interrupted);
	}
}
