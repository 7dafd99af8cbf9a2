use thiserror::Error;
use zkb_protocol::PathError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	#[error(transparent)]
	Client(#[from] zkb_runtime::Error),

	#[error("invalid path: {0}")]
	InvalidPath(#[from] PathError),

	/// The node is not part of the local tree.
	#[error("node is not in the local tree: {0}")]
	UnknownNode(String),

	/// Another expansion of the same node is in flight.
	#[error("expansion already in progress: {0}")]
	ExpandPending(String),

	/// The tree was reset or the node refreshed while its children were loading.
	#[error("tree was replaced while loading {0}")]
	TreeReplaced(String),

	#[error("worker failed: {0}")]
	WorkerFailed(String),
}

impl Error {
	/// The underlying client error, if any.
	pub fn client(&self) -> Option<&zkb_runtime::Error> {
		match self {
			Error::Client(err) => Some(err),
			_ => None,
		}
	}
}
