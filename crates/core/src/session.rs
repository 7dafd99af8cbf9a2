//! Browse session: the composition root binding one client to one tree.
//!
//! All network work is dispatched onto a bounded pool of tokio tasks, so a
//! caller on a UI task only ever awaits results or watches [`TreeEvent`]s.
//! A monitor task follows the client's state: when an expired session is
//! replaced by a new one the tree is reloaded from the root, and on a
//! terminal disconnect it is discarded.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Semaphore, broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use zkb_protocol::{Acl, CreateMode, NodePayload, NodeStat};
use zkb_runtime::{ConnectionDescriptor, Coordinator, NamespaceClient, SessionState};

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::events::TreeEvent;
use crate::node::{LoadStatus, NodeRef};
use crate::tree::{Expansion, TreeSynchronizer};

/// Answer to a two-phase expand request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpandRequest {
	/// Children were already loaded.
	Ready(Vec<NodeRef>),
	/// A load started; completion arrives as a [`TreeEvent`].
	Pending,
	/// A load for this node was already running.
	InFlight,
}

/// One logical user connection. Clones share the same session.
#[derive(Clone)]
pub struct BrowseSession {
	inner: Arc<Inner>,
}

struct Inner {
	client: Arc<NamespaceClient>,
	tree: TreeSynchronizer,
	workers: Arc<Semaphore>,
	monitor: Mutex<Option<JoinHandle<()>>>,
}

impl BrowseSession {
	pub fn new(coordinator: Arc<dyn Coordinator>, config: SessionConfig) -> Self {
		let client = Arc::new(NamespaceClient::new(coordinator, config.client));
		let tree = TreeSynchronizer::new(Arc::clone(&client));
		Self {
			inner: Arc::new(Inner {
				client,
				tree,
				workers: Arc::new(Semaphore::new(config.workers.max(1))),
				monitor: Mutex::new(None),
			}),
		}
	}

	/// Connects to `descriptor` and loads the root's children.
	///
	/// Any previous connection is closed first. A failed root load after a
	/// successful connect is logged; the root is left unloaded.
	pub async fn connect(&self, descriptor: ConnectionDescriptor) -> Result<()> {
		self.stop_monitor();
		let client = Arc::clone(&self.inner.client);
		if !client.state().can_connect() {
			debug!(target = "zkb.session", state = %client.state(), "closing previous session before connect");
			client.close().await;
		}

		let address = descriptor.to_string();
		let connected = self
			.dispatch({
				let client = Arc::clone(&client);
				async move { client.connect(descriptor).await.map_err(Error::from) }
			})
			.await;
		if let Err(err) = connected {
			warn!(target = "zkb.session", %address, error = %err, "connect failed");
			self.inner.tree.clear();
			return Err(err);
		}

		self.start_monitor();
		match self.refresh_root().await {
			Ok(children) => info!(target = "zkb.session", %address, children = children.len(), "session ready"),
			Err(err) => warn!(target = "zkb.session", %address, error = %err, "root load failed after connect"),
		}
		Ok(())
	}

	/// Closes the connection and discards the tree.
	pub async fn disconnect(&self) {
		self.stop_monitor();
		self.inner.client.close().await;
		self.inner.tree.clear();
		info!(target = "zkb.session", "disconnected");
	}

	pub fn is_connected(&self) -> bool {
		self.inner.client.is_connected()
	}

	pub fn state(&self) -> SessionState {
		self.inner.client.state()
	}

	pub fn client(&self) -> &Arc<NamespaceClient> {
		&self.inner.client
	}

	pub fn tree(&self) -> &TreeSynchronizer {
		&self.inner.tree
	}

	pub fn subscribe(&self) -> broadcast::Receiver<TreeEvent> {
		self.inner.tree.subscribe()
	}

	pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
		self.inner.client.subscribe()
	}

	pub async fn refresh_root(&self) -> Result<Vec<NodeRef>> {
		let tree = self.inner.tree.clone();
		self.dispatch(async move { tree.refresh_root().await }).await
	}

	/// Loads the children of `node` and waits for them.
	pub async fn expand(&self, node: &NodeRef) -> Result<Vec<NodeRef>> {
		match self.inner.tree.begin_expand(node)? {
			Expansion::Cached(children) => Ok(children),
			Expansion::Started(load) => self.dispatch(load.run()).await,
		}
	}

	/// Starts loading the children of `node` without waiting.
	///
	/// Returns [`ExpandRequest::Pending`] when a load was started; its
	/// outcome is announced as [`TreeEvent::Expanded`] or
	/// [`TreeEvent::ExpandFailed`].
	pub fn request_expand(&self, node: &NodeRef) -> Result<ExpandRequest> {
		let load = match self.inner.tree.begin_expand(node) {
			Ok(Expansion::Cached(children)) => return Ok(ExpandRequest::Ready(children)),
			Ok(Expansion::Started(load)) => load,
			Err(Error::ExpandPending(_)) => return Ok(ExpandRequest::InFlight),
			Err(err) => return Err(err),
		};

		debug!(target = "zkb.session", node = %load.node(), "expand requested");
		let workers = Arc::clone(&self.inner.workers);
		tokio::spawn(async move {
			let Ok(_permit) = workers.acquire_owned().await else {
				return;
			};
			// Failures are reported through the tree's events.
			let _ = load.run().await;
		});
		Ok(ExpandRequest::Pending)
	}

	pub async fn probe_has_children(&self, node: &NodeRef) -> Result<bool> {
		let tree = self.inner.tree.clone();
		let node = node.clone();
		self.dispatch(async move { tree.probe_has_children(&node).await }).await
	}

	pub fn force_refresh(&self, node: &NodeRef) -> Result<()> {
		self.inner.tree.force_refresh(node)
	}

	/// Data and metadata of `node`.
	pub async fn read_node(&self, node: &NodeRef) -> Result<NodePayload> {
		let client = Arc::clone(&self.inner.client);
		let path = node.path().to_string();
		self.dispatch(async move { Ok(client.read_data(&path).await?) }).await
	}

	pub async fn read_metadata(&self, node: &NodeRef) -> Result<Option<NodeStat>> {
		let client = Arc::clone(&self.inner.client);
		let path = node.path().to_string();
		self.dispatch(async move { Ok(client.read_metadata(&path).await?) }).await
	}

	/// Creates a node with an open ACL and returns its actual reference.
	/// The parent is refreshed so its next expand lists the new child.
	pub async fn create_node(&self, node: &NodeRef, data: Vec<u8>, mode: CreateMode) -> Result<NodeRef> {
		let client = Arc::clone(&self.inner.client);
		let path = node.path().to_string();
		let created = self
			.dispatch(async move { Ok(client.create_node(&path, &data, &Acl::open_unsafe(), mode).await?) })
			.await?;
		let created = NodeRef::new(created)?;
		self.refresh_parent(&created);
		Ok(created)
	}

	/// Replaces the data of `node`. `None` skips the version check.
	pub async fn write_data(&self, node: &NodeRef, data: Vec<u8>, expected_version: Option<i32>) -> Result<NodeStat> {
		let client = Arc::clone(&self.inner.client);
		let path = node.path().to_string();
		self.dispatch(async move { Ok(client.write_data(&path, &data, expected_version).await?) })
			.await
	}

	/// Deletes `node` and refreshes its parent.
	pub async fn delete_node(&self, node: &NodeRef, expected_version: Option<i32>) -> Result<()> {
		let client = Arc::clone(&self.inner.client);
		let path = node.path().to_string();
		self.dispatch(async move { Ok(client.delete_node(&path, expected_version).await?) })
			.await?;
		self.refresh_parent(node);
		Ok(())
	}

	fn refresh_parent(&self, node: &NodeRef) {
		let Some(parent) = node.parent() else {
			return;
		};
		if self.inner.tree.status(&parent) == Some(LoadStatus::Loaded) {
			// The parent is in the tree, so this cannot fail.
			let _ = self.inner.tree.force_refresh(&parent);
		}
	}

	/// Runs `task` on the worker pool.
	async fn dispatch<T, F>(&self, task: F) -> Result<T>
	where
		F: Future<Output = Result<T>> + Send + 'static,
		T: Send + 'static,
	{
		let permit = Arc::clone(&self.inner.workers)
			.acquire_owned()
			.await
			.map_err(|_| Error::WorkerFailed("worker pool closed".to_string()))?;
		tokio::spawn(async move {
			let _permit = permit;
			task.await
		})
		.await
		.map_err(|err| Error::WorkerFailed(err.to_string()))?
	}

	fn start_monitor(&self) {
		let client = Arc::clone(&self.inner.client);
		let mut states = client.subscribe();
		let tree = self.inner.tree.clone();
		let workers = Arc::clone(&self.inner.workers);
		let mut seen = client.established_sessions();
		let task = tokio::spawn(async move {
			while states.changed().await.is_ok() {
				let current = *states.borrow_and_update();
				if current.is_terminal() || current == SessionState::AuthFailed {
					debug!(target = "zkb.session", state = %current, "session ended; discarding tree");
					tree.clear();
					return;
				}

				let established = client.established_sessions();
				if current.is_connected() && established != seen {
					seen = established;
					info!(target = "zkb.session", "new session after expiry; reloading tree");
					let Ok(_permit) = workers.acquire().await else {
						return;
					};
					if let Err(err) = tree.refresh_root().await {
						warn!(target = "zkb.session", error = %err, "root reload after recovery failed");
					}
				}
			}
		});
		if let Some(old) = self.inner.monitor.lock().replace(task) {
			old.abort();
		}
	}

	fn stop_monitor(&self) {
		if let Some(task) = self.inner.monitor.lock().take() {
			task.abort();
		}
	}
}

impl Drop for Inner {
	fn drop(&mut self) {
		if let Some(task) = self.monitor.get_mut().take() {
			task.abort();
		}
	}
}
