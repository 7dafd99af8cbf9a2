//! Black-box seam to the coordination service.
//!
//! A [`Coordinator`] opens sessions; a [`RemoteSession`] performs single
//! synchronous round trips. Implementations never retry individual requests
//! and report session-level changes only through the [`Watcher`] they were
//! opened with.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use zkb_protocol::{Acl, CreateMode, NodeStat};

use crate::address::ConnectionDescriptor;
use crate::error::Result;
use crate::watcher::Watcher;

/// Factory for underlying sessions.
pub trait Coordinator: Send + Sync {
	/// Opens a session against `descriptor`.
	///
	/// Returning a handle does not mean the session is established: the
	/// coordinator reports `SyncConnected`, `ConnectedReadOnly` or
	/// `AuthFailed` through `watcher` once the handshake settles.
	fn open<'a>(&'a self, descriptor: &'a ConnectionDescriptor, session_timeout: Duration, watcher: Watcher) -> BoxFuture<'a, Result<Arc<dyn RemoteSession>>>;
}

/// One underlying session handle.
pub trait RemoteSession: Send + Sync {
	/// Names of the immediate children, in server order.
	fn list_children<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Vec<String>>>;

	/// Data (absent when the server stored none) and metadata.
	fn get_data<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<(Option<Vec<u8>>, NodeStat)>>;

	/// Metadata, or `None` when the node does not exist.
	fn exists<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Option<NodeStat>>>;

	/// Creates a node and returns its actual path (sequential modes append a suffix).
	fn create<'a>(&'a self, path: &'a str, data: &'a [u8], acl: &'a [Acl], mode: CreateMode) -> BoxFuture<'a, Result<String>>;

	/// Replaces node data; `version` of `-1` skips the version check.
	fn set_data<'a>(&'a self, path: &'a str, data: &'a [u8], version: i32) -> BoxFuture<'a, Result<NodeStat>>;

	/// Deletes a node; `version` of `-1` skips the version check.
	fn delete<'a>(&'a self, path: &'a str, version: i32) -> BoxFuture<'a, Result<()>>;

	/// Releases the session. Calls in flight fail; the handle is unusable afterwards.
	fn close(&self) -> BoxFuture<'_, ()>;
}
