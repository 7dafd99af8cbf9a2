//! Server error codes carried in reply headers.

use serde::{Deserialize, Serialize};

/// Error code reported by the server for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	Ok,
	SystemError,
	RuntimeInconsistency,
	DataInconsistency,
	ConnectionLoss,
	MarshallingError,
	Unimplemented,
	OperationTimeout,
	BadArguments,
	ApiError,
	NoNode,
	NoAuth,
	BadVersion,
	NoChildrenForEphemerals,
	NodeExists,
	NotEmpty,
	SessionExpired,
	InvalidCallback,
	InvalidAcl,
	AuthFailed,
	SessionMoved,
	NotReadOnly,
	/// Code not known to this client.
	Unknown(i32),
}

impl ErrorCode {
	pub fn from_code(code: i32) -> Self {
		match code {
			0 => ErrorCode::Ok,
			-1 => ErrorCode::SystemError,
			-2 => ErrorCode::RuntimeInconsistency,
			-3 => ErrorCode::DataInconsistency,
			-4 => ErrorCode::ConnectionLoss,
			-5 => ErrorCode::MarshallingError,
			-6 => ErrorCode::Unimplemented,
			-7 => ErrorCode::OperationTimeout,
			-8 => ErrorCode::BadArguments,
			-100 => ErrorCode::ApiError,
			-101 => ErrorCode::NoNode,
			-102 => ErrorCode::NoAuth,
			-103 => ErrorCode::BadVersion,
			-108 => ErrorCode::NoChildrenForEphemerals,
			-110 => ErrorCode::NodeExists,
			-111 => ErrorCode::NotEmpty,
			-112 => ErrorCode::SessionExpired,
			-113 => ErrorCode::InvalidCallback,
			-114 => ErrorCode::InvalidAcl,
			-115 => ErrorCode::AuthFailed,
			-118 => ErrorCode::SessionMoved,
			-119 => ErrorCode::NotReadOnly,
			other => ErrorCode::Unknown(other),
		}
	}

	pub fn code(self) -> i32 {
		match self {
			ErrorCode::Ok => 0,
			ErrorCode::SystemError => -1,
			ErrorCode::RuntimeInconsistency => -2,
			ErrorCode::DataInconsistency => -3,
			ErrorCode::ConnectionLoss => -4,
			ErrorCode::MarshallingError => -5,
			ErrorCode::Unimplemented => -6,
			ErrorCode::OperationTimeout => -7,
			ErrorCode::BadArguments => -8,
			ErrorCode::ApiError => -100,
			ErrorCode::NoNode => -101,
			ErrorCode::NoAuth => -102,
			ErrorCode::BadVersion => -103,
			ErrorCode::NoChildrenForEphemerals => -108,
			ErrorCode::NodeExists => -110,
			ErrorCode::NotEmpty => -111,
			ErrorCode::SessionExpired => -112,
			ErrorCode::InvalidCallback => -113,
			ErrorCode::InvalidAcl => -114,
			ErrorCode::AuthFailed => -115,
			ErrorCode::SessionMoved => -118,
			ErrorCode::NotReadOnly => -119,
			ErrorCode::Unknown(code) => code,
		}
	}
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ErrorCode::Unknown(code) => write!(f, "unknown error code {code}"),
			other => write!(f, "{other:?} ({})", other.code()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn known_codes_round_trip() {
		for code in [0, -4, -101, -103, -110, -111, -112, -115, -119] {
			assert_eq!(ErrorCode::from_code(code).code(), code);
		}
	}

	#[test]
	fn unknown_codes_are_preserved() {
		assert_eq!(ErrorCode::from_code(-999), ErrorCode::Unknown(-999));
		assert_eq!(ErrorCode::Unknown(-999).code(), -999);
	}
}
