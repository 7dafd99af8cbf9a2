//! Lazy tree synchronizer.
//!
//! Mirrors the remote namespace one level at a time. Every local node carries
//! a [`LoadStatus`]; a node only exists locally once its parent has been
//! loaded, and a failed or abandoned load leaves the node exactly as it was.
//!
//! Loads are tagged with the tree epoch and a per-load ticket. A reset of the
//! tree (or a forced refresh of the node) while a listing is in flight makes
//! the ticket stale, and the late result is discarded instead of being grafted
//! onto a tree that no longer expects it. The listing itself is still tracked
//! until it returns, so a path never has two listings in flight.

use std::collections::{HashMap, HashSet};
use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};
use zkb_runtime::NamespaceClient;

use crate::error::{Error, Result};
use crate::events::TreeEvent;
use crate::node::{LoadStatus, NodeRef, NodeView};

const EVENT_CAPACITY: usize = 256;

/// Local mirror of the remote namespace. Clones share the same tree.
#[derive(Clone)]
pub struct TreeSynchronizer {
	shared: Arc<Shared>,
}

struct Shared {
	client: Arc<NamespaceClient>,
	tree: Mutex<Tree>,
	events: broadcast::Sender<TreeEvent>,
}

struct Tree {
	epoch: u64,
	next_ticket: u64,
	nodes: HashMap<NodeRef, TreeNode>,
	/// Paths with a listing in flight. Survives resets.
	listing: HashSet<NodeRef>,
}

#[derive(Debug, Clone, Default)]
struct TreeNode {
	status: LoadStatus,
	children: Vec<NodeRef>,
	/// Result of the last probe while `Unknown`.
	probed: Option<bool>,
	ticket: u64,
}

/// Outcome of starting an expansion.
pub(crate) enum Expansion {
	/// Already loaded; no round trip needed.
	Cached(Vec<NodeRef>),
	Started(PendingLoad),
}

/// An expansion that marked its node `Loading`. Dropping it before
/// [`run`](PendingLoad::run) completes reverts the node to `Unknown`.
pub(crate) struct PendingLoad {
	shared: Arc<Shared>,
	node: NodeRef,
	epoch: u64,
	ticket: u64,
	armed: bool,
}

impl TreeSynchronizer {
	/// Creates a tree holding only an unloaded root.
	pub fn new(client: Arc<NamespaceClient>) -> Self {
		let (events, _) = broadcast::channel(EVENT_CAPACITY);
		Self {
			shared: Arc::new(Shared {
				client,
				tree: Mutex::new(Tree::new(0)),
				events,
			}),
		}
	}

	pub fn client(&self) -> &Arc<NamespaceClient> {
		&self.shared.client
	}

	pub fn root(&self) -> NodeRef {
		NodeRef::root()
	}

	/// Discards the whole tree and, when connected, loads the root's children.
	///
	/// Disconnected, the root stays `Unknown` with no children and this
	/// returns an empty list.
	pub async fn refresh_root(&self) -> Result<Vec<NodeRef>> {
		let root = NodeRef::root();
		self.shared.tree.lock().reset();
		debug!(target = "zkb.tree", "tree reset");
		self.shared.emit(TreeEvent::Reset { node: root.clone() });

		if !self.shared.client.is_connected() {
			debug!(target = "zkb.tree", state = %self.shared.client.state(), "not connected; root left unloaded");
			return Ok(Vec::new());
		}
		self.expand(&root).await
	}

	/// Loads the immediate children of `node`.
	///
	/// A `Loaded` node returns its cached children. A node already `Loading`,
	/// or whose listing from before a refresh has not returned yet, is rejected
	/// with [`Error::ExpandPending`], so callers never cause a second listing.
	/// On failure the node reverts to `Unknown`.
	pub async fn expand(&self, node: &NodeRef) -> Result<Vec<NodeRef>> {
		match self.begin_expand(node)? {
			Expansion::Cached(children) => Ok(children),
			Expansion::Started(load) => load.run().await,
		}
	}

	/// Marks `node` as `Loading` without performing the listing.
	pub(crate) fn begin_expand(&self, node: &NodeRef) -> Result<Expansion> {
		if !self.shared.client.is_connected() {
			return Err(zkb_runtime::Error::ConnectionUnavailable.into());
		}

		let (epoch, ticket) = {
			let mut tree = self.shared.tree.lock();
			let epoch = tree.epoch;
			let ticket = tree.next_ticket + 1;
			let entry = tree.nodes.get(node).ok_or_else(|| Error::UnknownNode(node.path().to_string()))?;
			match entry.status {
				LoadStatus::Loaded => return Ok(Expansion::Cached(entry.children.clone())),
				LoadStatus::Loading => return Err(Error::ExpandPending(node.path().to_string())),
				LoadStatus::Unknown => {}
			}
			if !tree.listing.insert(node.clone()) {
				trace!(target = "zkb.tree", node = %node, "earlier listing still in flight");
				return Err(Error::ExpandPending(node.path().to_string()));
			}
			if let Some(entry) = tree.nodes.get_mut(node) {
				entry.status = LoadStatus::Loading;
				entry.ticket = ticket;
			}
			tree.next_ticket = ticket;
			(epoch, ticket)
		};

		trace!(target = "zkb.tree", node = %node, ticket, "expanding");
		self.shared.emit(TreeEvent::Loading { node: node.clone() });
		Ok(Expansion::Started(PendingLoad {
			shared: Arc::clone(&self.shared),
			node: node.clone(),
			epoch,
			ticket,
			armed: true,
		}))
	}

	/// Checks whether `node` has children without loading them.
	///
	/// Performs a full listing and keeps only its emptiness; the node stays
	/// `Unknown`, so a later [`expand`](Self::expand) lists it again. Loaded
	/// nodes answer from their cached children.
	pub async fn probe_has_children(&self, node: &NodeRef) -> Result<bool> {
		let epoch = {
			let tree = self.shared.tree.lock();
			let entry = tree.nodes.get(node).ok_or_else(|| Error::UnknownNode(node.path().to_string()))?;
			if entry.status == LoadStatus::Loaded {
				return Ok(!entry.children.is_empty());
			}
			tree.epoch
		};

		let has_children = !self.shared.client.list_children(node.path()).await?.is_empty();

		let mut tree = self.shared.tree.lock();
		if tree.epoch == epoch {
			if let Some(entry) = tree.nodes.get_mut(node) {
				if entry.status == LoadStatus::Unknown {
					entry.probed = Some(has_children);
				}
			}
		}
		trace!(target = "zkb.tree", node = %node, has_children, "probed");
		Ok(has_children)
	}

	/// Resets `node` to `Unknown` and drops its cached subtree. A listing in
	/// flight for `node` is discarded when it returns.
	pub fn force_refresh(&self, node: &NodeRef) -> Result<()> {
		let removed = {
			let mut tree = self.shared.tree.lock();
			let entry = tree.nodes.get_mut(node).ok_or_else(|| Error::UnknownNode(node.path().to_string()))?;
			let children = mem::take(&mut entry.children);
			*entry = TreeNode::default();
			tree.remove_subtrees(children)
		};
		debug!(target = "zkb.tree", node = %node, removed, "node refreshed");
		self.shared.emit(TreeEvent::Reset { node: node.clone() });
		Ok(())
	}

	/// Discards the tree, leaving only an unloaded root.
	pub fn clear(&self) {
		self.shared.tree.lock().reset();
		debug!(target = "zkb.tree", "tree cleared");
		self.shared.emit(TreeEvent::Cleared { node: NodeRef::root() });
	}

	pub fn get(&self, node: &NodeRef) -> Option<NodeView> {
		let tree = self.shared.tree.lock();
		tree.nodes.get(node).map(|entry| NodeView {
			node: node.clone(),
			status: entry.status,
			children: entry.children.clone(),
			expandable: match entry.status {
				LoadStatus::Loaded => !entry.children.is_empty(),
				LoadStatus::Loading => true,
				LoadStatus::Unknown => entry.probed.unwrap_or(true),
			},
		})
	}

	pub fn status(&self, node: &NodeRef) -> Option<LoadStatus> {
		self.shared.tree.lock().nodes.get(node).map(|entry| entry.status)
	}

	/// Materialized children of `node`; empty unless it is `Loaded`.
	pub fn children(&self, node: &NodeRef) -> Option<Vec<NodeRef>> {
		self.shared.tree.lock().nodes.get(node).map(|entry| entry.children.clone())
	}

	pub fn contains(&self, node: &NodeRef) -> bool {
		self.shared.tree.lock().nodes.contains_key(node)
	}

	/// Number of local nodes, root included.
	pub fn node_count(&self) -> usize {
		self.shared.tree.lock().nodes.len()
	}

	pub fn subscribe(&self) -> broadcast::Receiver<TreeEvent> {
		self.shared.events.subscribe()
	}
}

impl PendingLoad {
	pub(crate) fn node(&self) -> &NodeRef {
		&self.node
	}

	/// Performs the listing and commits it, unless the tree moved on meanwhile.
	pub(crate) async fn run(mut self) -> Result<Vec<NodeRef>> {
		let listed = self.shared.client.list_children(self.node.path()).await;
		self.armed = false;
		self.shared.tree.lock().listing.remove(&self.node);
		match listed {
			Ok(names) => self.commit(names),
			Err(err) => {
				let reverted = self.revert();
				warn!(target = "zkb.tree", node = %self.node, error = %err, "expand failed");
				if reverted {
					self.shared.emit(TreeEvent::ExpandFailed {
						node: self.node.clone(),
						error: err.to_string(),
					});
				}
				Err(err.into())
			}
		}
	}

	fn commit(&self, names: Vec<String>) -> Result<Vec<NodeRef>> {
		let children: Vec<NodeRef> = names.iter().map(|name| self.node.child(name)).collect();
		{
			let mut tree = self.shared.tree.lock();
			if !tree.holds(&self.node, self.epoch, self.ticket) {
				debug!(target = "zkb.tree", node = %self.node, "discarding children for a replaced tree");
				return Err(Error::TreeReplaced(self.node.path().to_string()));
			}
			for child in &children {
				tree.nodes.insert(child.clone(), TreeNode::default());
			}
			if let Some(entry) = tree.nodes.get_mut(&self.node) {
				entry.status = LoadStatus::Loaded;
				entry.children = children.clone();
				entry.probed = None;
			}
		}
		debug!(target = "zkb.tree", node = %self.node, children = children.len(), "expanded");
		self.shared.emit(TreeEvent::Expanded {
			node: self.node.clone(),
			children: children.len(),
		});
		Ok(children)
	}

	/// Returns the node to `Unknown` if this load still owns it.
	fn revert(&self) -> bool {
		let mut tree = self.shared.tree.lock();
		if !tree.holds(&self.node, self.epoch, self.ticket) {
			return false;
		}
		if let Some(entry) = tree.nodes.get_mut(&self.node) {
			entry.status = LoadStatus::Unknown;
		}
		true
	}
}

impl Drop for PendingLoad {
	fn drop(&mut self) {
		if !self.armed {
			return;
		}
		self.shared.tree.lock().listing.remove(&self.node);
		if self.revert() {
			trace!(target = "zkb.tree", node = %self.node, "abandoned expand reverted");
			self.shared.emit(TreeEvent::Reset { node: self.node.clone() });
		}
	}
}

impl Shared {
	fn emit(&self, event: TreeEvent) {
		// No receivers is fine.
		let _ = self.events.send(event);
	}
}

impl Tree {
	fn new(epoch: u64) -> Self {
		let mut nodes = HashMap::new();
		nodes.insert(NodeRef::root(), TreeNode::default());
		Self {
			epoch,
			next_ticket: 0,
			nodes,
			listing: HashSet::new(),
		}
	}

	/// Starts a new epoch holding only an unloaded root.
	fn reset(&mut self) {
		let listing = mem::take(&mut self.listing);
		*self = Tree::new(self.epoch + 1);
		self.listing = listing;
	}

	/// `true` while `node` is still loading under `ticket` in this epoch.
	fn holds(&self, node: &NodeRef, epoch: u64, ticket: u64) -> bool {
		self.epoch == epoch
			&& self
				.nodes
				.get(node)
				.is_some_and(|entry| entry.status == LoadStatus::Loading && entry.ticket == ticket)
	}

	fn remove_subtrees(&mut self, mut pending: Vec<NodeRef>) -> usize {
		let mut removed = 0;
		while let Some(node) = pending.pop() {
			if let Some(entry) = self.nodes.remove(&node) {
				removed += 1;
				pending.extend(entry.children);
			}
		}
		removed
	}
}
