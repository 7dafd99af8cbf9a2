//! In-process coordinator serving a namespace held in memory.
//!
//! Used by tests and demos in place of a live server. Besides the
//! [`Coordinator`] seam it exposes a controller surface for driving session
//! events, injecting faults and observing how often each path was listed.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, trace};
use zkb_protocol::{Acl, CreateMode, ErrorCode, KeeperState, NodePayload, NodeStat, ROOT_PATH, parent_path};

use crate::address::ConnectionDescriptor;
use crate::coordinator::{Coordinator, RemoteSession};
use crate::error::{Error, Result};
use crate::watcher::Watcher;

/// Coordinator over an in-memory namespace. Clones share the namespace.
#[derive(Clone)]
pub struct MemoryCoordinator {
	inner: Arc<Inner>,
}

struct Inner {
	namespace: Mutex<Namespace>,
	sessions: Mutex<Vec<Registered>>,
	behavior: Mutex<Behavior>,
	faults: Mutex<HashMap<String, ErrorCode>>,
	listings_paused: watch::Sender<bool>,
	list_calls: Mutex<HashMap<String, usize>>,
	active_listings: AtomicUsize,
	peak_listings: AtomicUsize,
	next_session: AtomicI64,
	opened: AtomicUsize,
}

#[derive(Debug, Clone, Copy, Default)]
struct Behavior {
	refuse: bool,
	fail_auth: bool,
	read_only: bool,
}

struct Registered {
	watcher: Watcher,
	session: Weak<MemorySession>,
}

struct Namespace {
	nodes: BTreeMap<String, Node>,
	zxid: i64,
}

#[derive(Debug, Clone)]
struct Node {
	data: Option<Vec<u8>>,
	stat: NodeStat,
	children: Vec<String>,
}

impl Default for MemoryCoordinator {
	fn default() -> Self {
		Self::new()
	}
}

impl MemoryCoordinator {
	/// Creates a coordinator whose namespace holds only the root.
	pub fn new() -> Self {
		let (listings_paused, _) = watch::channel(false);
		Self {
			inner: Arc::new(Inner {
				namespace: Mutex::new(Namespace::new()),
				sessions: Mutex::new(Vec::new()),
				behavior: Mutex::new(Behavior::default()),
				faults: Mutex::new(HashMap::new()),
				listings_paused,
				list_calls: Mutex::new(HashMap::new()),
				active_listings: AtomicUsize::new(0),
				peak_listings: AtomicUsize::new(0),
				next_session: AtomicI64::new(0),
				opened: AtomicUsize::new(0),
			}),
		}
	}

	/// Creates `path` (and any missing ancestors) holding `data`, or
	/// overwrites the data if it already exists.
	///
	/// # Panics
	///
	/// Panics if `path` is not absolute.
	pub fn seed(&self, path: &str, data: impl AsRef<[u8]>) -> &Self {
		assert!(path.starts_with('/'), "seed path must be absolute: {path}");
		self.inner.namespace.lock().upsert(path, data.as_ref());
		self
	}

	/// Payload of `path` as currently stored.
	pub fn node(&self, path: &str) -> Option<NodePayload> {
		let namespace = self.inner.namespace.lock();
		namespace.nodes.get(path).map(|node| NodePayload::new(node.data.clone(), node.stat))
	}

	/// Child names of `path` as currently stored.
	pub fn children(&self, path: &str) -> Option<Vec<String>> {
		self.inner.namespace.lock().nodes.get(path).map(|node| node.children.clone())
	}

	/// Delivers `state` to the watcher of every open session.
	pub fn emit(&self, state: KeeperState) {
		let watchers = self.live_watchers();
		debug!(target = "zkb.memory", %state, sessions = watchers.len(), "emitting session event");
		for watcher in watchers {
			watcher.notify(state);
		}
	}

	/// Expires every open session: its handle stops working, its ephemeral
	/// nodes are removed and its watcher receives `Expired`.
	pub fn expire_sessions(&self) {
		let expired: Vec<(Arc<MemorySession>, Watcher)> = {
			let mut sessions = self.inner.sessions.lock();
			let live = sessions
				.iter()
				.filter_map(|entry| entry.session.upgrade().map(|session| (session, entry.watcher.clone())))
				.filter(|(session, _)| !session.closed.load(Ordering::SeqCst))
				.collect();
			sessions.clear();
			live
		};
		for (session, watcher) in expired {
			session.expired.store(true, Ordering::SeqCst);
			self.inner.namespace.lock().drop_ephemerals(session.id);
			debug!(target = "zkb.memory", session = session.id, "session expired");
			watcher.notify(KeeperState::Expired);
		}
	}

	/// While set, newly opened sessions never report a state.
	pub fn refuse_connections(&self, refuse: bool) -> &Self {
		self.inner.behavior.lock().refuse = refuse;
		self
	}

	/// While set, newly opened sessions report `AuthFailed`.
	pub fn fail_auth(&self, fail: bool) -> &Self {
		self.inner.behavior.lock().fail_auth = fail;
		self
	}

	/// While set, newly opened sessions report `ConnectedReadOnly`.
	pub fn serve_read_only(&self, read_only: bool) -> &Self {
		self.inner.behavior.lock().read_only = read_only;
		self
	}

	/// Every request touching `path` fails with `code` until cleared.
	pub fn inject_fault(&self, path: &str, code: ErrorCode) -> &Self {
		self.inner.faults.lock().insert(path.to_string(), code);
		self
	}

	pub fn clear_fault(&self, path: &str) -> &Self {
		self.inner.faults.lock().remove(path);
		self
	}

	/// Holds every listing request until [`resume_listings`](Self::resume_listings).
	pub fn pause_listings(&self) {
		self.inner.listings_paused.send_replace(true);
	}

	pub fn resume_listings(&self) {
		self.inner.listings_paused.send_replace(false);
	}

	/// Number of listing requests received for `path`.
	pub fn list_calls(&self, path: &str) -> usize {
		self.inner.list_calls.lock().get(path).copied().unwrap_or(0)
	}

	/// Listing requests currently being served.
	pub fn active_listings(&self) -> usize {
		self.inner.active_listings.load(Ordering::SeqCst)
	}

	/// Highest number of listing requests served at the same time.
	pub fn peak_concurrent_listings(&self) -> usize {
		self.inner.peak_listings.load(Ordering::SeqCst)
	}

	/// Sessions opened and not yet closed or expired.
	pub fn open_handles(&self) -> usize {
		self.live_sessions().len()
	}

	/// Total sessions ever opened.
	pub fn sessions_opened(&self) -> usize {
		self.inner.opened.load(Ordering::SeqCst)
	}

	fn live_sessions(&self) -> Vec<Arc<MemorySession>> {
		let mut sessions = self.inner.sessions.lock();
		sessions.retain(|entry| entry.session.upgrade().is_some_and(|session| !session.closed.load(Ordering::SeqCst)));
		sessions.iter().filter_map(|entry| entry.session.upgrade()).collect()
	}

	fn live_watchers(&self) -> Vec<Watcher> {
		let mut sessions = self.inner.sessions.lock();
		sessions.retain(|entry| entry.session.upgrade().is_some_and(|session| !session.closed.load(Ordering::SeqCst)));
		sessions.iter().map(|entry| entry.watcher.clone()).collect()
	}
}

impl Coordinator for MemoryCoordinator {
	fn open<'a>(&'a self, descriptor: &'a ConnectionDescriptor, _session_timeout: Duration, watcher: Watcher) -> BoxFuture<'a, Result<Arc<dyn RemoteSession>>> {
		Box::pin(async move {
			let id = self.inner.next_session.fetch_add(1, Ordering::SeqCst) + 1;
			self.inner.opened.fetch_add(1, Ordering::SeqCst);
			let session = Arc::new(MemorySession {
				id,
				inner: Arc::clone(&self.inner),
				closed: AtomicBool::new(false),
				expired: AtomicBool::new(false),
			});
			self.inner.sessions.lock().push(Registered {
				watcher: watcher.clone(),
				session: Arc::downgrade(&session),
			});

			let behavior = *self.inner.behavior.lock();
			debug!(target = "zkb.memory", session = id, address = %descriptor, ?behavior, "opened session");
			if !behavior.refuse {
				let state = if behavior.fail_auth {
					KeeperState::AuthFailed
				} else if behavior.read_only {
					KeeperState::ConnectedReadOnly
				} else {
					KeeperState::SyncConnected
				};
				tokio::spawn(async move { watcher.notify(state) });
			}
			Ok(session as Arc<dyn RemoteSession>)
		})
	}
}

/// One session handle against the in-memory namespace.
struct MemorySession {
	id: i64,
	inner: Arc<Inner>,
	closed: AtomicBool,
	expired: AtomicBool,
}

impl MemorySession {
	fn check(&self, path: &str) -> Result<()> {
		if self.closed.load(Ordering::SeqCst) {
			return Err(Error::ConnectionUnavailable);
		}
		if self.expired.load(Ordering::SeqCst) {
			return Err(Error::SessionExpired);
		}
		if let Some(code) = self.inner.faults.lock().get(path).copied() {
			trace!(target = "zkb.memory", path, %code, "injected fault");
			return Err(Error::from_code(code, path));
		}
		Ok(())
	}
}

/// Decrements the active listing count when a listing finishes or is dropped.
struct ListingGuard<'a>(&'a AtomicUsize);

impl Drop for ListingGuard<'_> {
	fn drop(&mut self) {
		self.0.fetch_sub(1, Ordering::SeqCst);
	}
}

impl RemoteSession for MemorySession {
	fn list_children<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Vec<String>>> {
		Box::pin(async move {
			*self.inner.list_calls.lock().entry(path.to_string()).or_default() += 1;
			let active = self.inner.active_listings.fetch_add(1, Ordering::SeqCst) + 1;
			let _guard = ListingGuard(&self.inner.active_listings);
			self.inner.peak_listings.fetch_max(active, Ordering::SeqCst);

			let mut paused = self.inner.listings_paused.subscribe();
			let _ = paused.wait_for(|paused| !*paused).await;

			self.check(path)?;
			self.inner.namespace.lock().list(path)
		})
	}

	fn get_data<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<(Option<Vec<u8>>, NodeStat)>> {
		Box::pin(async move {
			self.check(path)?;
			self.inner.namespace.lock().get(path)
		})
	}

	fn exists<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Option<NodeStat>>> {
		Box::pin(async move {
			self.check(path)?;
			Ok(self.inner.namespace.lock().nodes.get(path).map(|node| node.stat))
		})
	}

	fn create<'a>(&'a self, path: &'a str, data: &'a [u8], _acl: &'a [Acl], mode: CreateMode) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move {
			self.check(path)?;
			let owner = if mode.is_ephemeral() { self.id } else { 0 };
			self.inner.namespace.lock().create(path, data, mode, owner)
		})
	}

	fn set_data<'a>(&'a self, path: &'a str, data: &'a [u8], version: i32) -> BoxFuture<'a, Result<NodeStat>> {
		Box::pin(async move {
			self.check(path)?;
			self.inner.namespace.lock().set(path, data, version)
		})
	}

	fn delete<'a>(&'a self, path: &'a str, version: i32) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			self.check(path)?;
			self.inner.namespace.lock().delete(path, version)
		})
	}

	fn close(&self) -> BoxFuture<'_, ()> {
		Box::pin(async move {
			if self.closed.swap(true, Ordering::SeqCst) {
				return;
			}
			self.inner.namespace.lock().drop_ephemerals(self.id);
			debug!(target = "zkb.memory", session = self.id, "closed session");
		})
	}
}

impl Namespace {
	fn new() -> Self {
		let mut nodes = BTreeMap::new();
		nodes.insert(
			ROOT_PATH.to_string(),
			Node {
				data: None,
				stat: NodeStat::default(),
				children: Vec::new(),
			},
		);
		Self { nodes, zxid: 0 }
	}

	fn list(&self, path: &str) -> Result<Vec<String>> {
		self.nodes
			.get(path)
			.map(|node| node.children.clone())
			.ok_or_else(|| Error::from_code(ErrorCode::NoNode, path))
	}

	fn get(&self, path: &str) -> Result<(Option<Vec<u8>>, NodeStat)> {
		self.nodes
			.get(path)
			.map(|node| (node.data.clone(), node.stat))
			.ok_or_else(|| Error::from_code(ErrorCode::NoNode, path))
	}

	fn create(&mut self, path: &str, data: &[u8], mode: CreateMode, owner: i64) -> Result<String> {
		let parent = parent_path(path).ok_or_else(|| Error::from_code(ErrorCode::NodeExists, path))?;
		let parent_node = self.nodes.get(parent).ok_or_else(|| Error::from_code(ErrorCode::NoNode, path))?;
		if parent_node.stat.ephemeral_owner != 0 {
			return Err(Error::from_code(ErrorCode::NoChildrenForEphemerals, path));
		}

		let actual = if mode.is_sequential() {
			format!("{path}{:010}", parent_node.stat.cversion)
		} else {
			path.to_string()
		};
		if self.nodes.contains_key(&actual) {
			return Err(Error::from_code(ErrorCode::NodeExists, &actual));
		}

		self.zxid += 1;
		let now = now_millis();
		let stat = NodeStat {
			czxid: self.zxid,
			mzxid: self.zxid,
			ctime: now,
			mtime: now,
			ephemeral_owner: owner,
			data_length: data.len() as i32,
			pzxid: self.zxid,
			..NodeStat::default()
		};
		self.nodes.insert(
			actual.clone(),
			Node {
				data: Some(data.to_vec()),
				stat,
				children: Vec::new(),
			},
		);
		self.link(parent, &actual);
		Ok(actual)
	}

	fn set(&mut self, path: &str, data: &[u8], version: i32) -> Result<NodeStat> {
		self.zxid += 1;
		let zxid = self.zxid;
		let node = self.nodes.get_mut(path).ok_or_else(|| Error::from_code(ErrorCode::NoNode, path))?;
		if version != -1 && version != node.stat.version {
			return Err(Error::from_code(ErrorCode::BadVersion, path));
		}
		node.data = Some(data.to_vec());
		node.stat.version += 1;
		node.stat.mzxid = zxid;
		node.stat.mtime = now_millis();
		node.stat.data_length = data.len() as i32;
		Ok(node.stat)
	}

	fn delete(&mut self, path: &str, version: i32) -> Result<()> {
		let Some(parent) = parent_path(path) else {
			return Err(Error::from_code(ErrorCode::BadArguments, path));
		};
		let node = self.nodes.get(path).ok_or_else(|| Error::from_code(ErrorCode::NoNode, path))?;
		if version != -1 && version != node.stat.version {
			return Err(Error::from_code(ErrorCode::BadVersion, path));
		}
		if !node.children.is_empty() {
			return Err(Error::from_code(ErrorCode::NotEmpty, path));
		}
		self.nodes.remove(path);
		self.unlink(parent, path);
		Ok(())
	}

	/// Creates or overwrites `path`, creating missing ancestors empty.
	fn upsert(&mut self, path: &str, data: &[u8]) {
		if let Some(node) = self.nodes.get_mut(path) {
			node.data = Some(data.to_vec());
			node.stat.data_length = data.len() as i32;
			return;
		}
		if let Some(parent) = parent_path(path) {
			if !self.nodes.contains_key(parent) {
				self.upsert(parent, &[]);
			}
		}
		let _ = self.create(path, data, CreateMode::Persistent, 0);
	}

	fn drop_ephemerals(&mut self, owner: i64) {
		let owned: Vec<String> = self
			.nodes
			.iter()
			.filter(|(_, node)| node.stat.ephemeral_owner == owner)
			.map(|(path, _)| path.clone())
			.collect();
		for path in owned {
			trace!(target = "zkb.memory", path, owner, "removing ephemeral node");
			let _ = self.delete(&path, -1);
		}
	}

	fn link(&mut self, parent: &str, child: &str) {
		let zxid = self.zxid;
		if let Some(node) = self.nodes.get_mut(parent) {
			node.children.push(child.rsplit('/').next().unwrap_or(child).to_string());
			node.stat.cversion += 1;
			node.stat.num_children += 1;
			node.stat.pzxid = zxid;
		}
	}

	fn unlink(&mut self, parent: &str, child: &str) {
		self.zxid += 1;
		let zxid = self.zxid;
		let name = child.rsplit('/').next().unwrap_or(child);
		if let Some(node) = self.nodes.get_mut(parent) {
			node.children.retain(|existing| existing != name);
			node.stat.cversion += 1;
			node.stat.num_children -= 1;
			node.stat.pzxid = zxid;
		}
	}
}

fn now_millis() -> i64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|elapsed| elapsed.as_millis() as i64)
		.unwrap_or_default()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn namespace() -> Namespace {
		let mut namespace = Namespace::new();
		namespace.upsert("/app/config", b"v1");
		namespace
	}

	#[test]
	fn seeding_creates_missing_ancestors() {
		let namespace = namespace();
		assert_eq!(namespace.list("/").unwrap(), vec!["app"]);
		assert_eq!(namespace.list("/app").unwrap(), vec!["config"]);
		assert_eq!(namespace.get("/app/config").unwrap().0.as_deref(), Some(&b"v1"[..]));
	}

	#[test]
	fn children_keep_creation_order() {
		let mut namespace = namespace();
		for name in ["zeta", "alpha", "mid"] {
			namespace.create(&format!("/app/{name}"), b"", CreateMode::Persistent, 0).unwrap();
		}
		assert_eq!(namespace.list("/app").unwrap(), vec!["config", "zeta", "alpha", "mid"]);
		assert_eq!(namespace.get("/app").unwrap().1.num_children, 4);
	}

	#[test]
	fn sequential_names_use_parent_cversion() {
		let mut namespace = namespace();
		let first = namespace.create("/app/job-", b"", CreateMode::PersistentSequential, 0).unwrap();
		let second = namespace.create("/app/job-", b"", CreateMode::PersistentSequential, 0).unwrap();
		assert_eq!(first, "/app/job-0000000001");
		assert_eq!(second, "/app/job-0000000002");
	}

	#[test]
	fn version_checks_and_non_empty_deletes_are_rejected() {
		let mut namespace = namespace();
		let stat = namespace.set("/app/config", b"v2", 0).unwrap();
		assert_eq!(stat.version, 1);
		assert!(matches!(namespace.set("/app/config", b"v3", 0), Err(Error::BadVersion { .. })));
		assert!(matches!(namespace.delete("/app", -1), Err(Error::NotEmpty { .. })));
		namespace.delete("/app/config", 1).unwrap();
		assert!(namespace.list("/app").unwrap().is_empty());
	}

	#[test]
	fn missing_parent_and_duplicates_are_rejected() {
		let mut namespace = namespace();
		assert!(matches!(namespace.create("/nope/child", b"", CreateMode::Persistent, 0), Err(Error::NoNode { .. })));
		assert!(matches!(namespace.create("/app/config", b"", CreateMode::Persistent, 0), Err(Error::NodeExists { .. })));
	}

	#[test]
	fn ephemerals_are_dropped_with_their_owner() {
		let mut namespace = namespace();
		namespace.create("/app/lock", b"", CreateMode::Ephemeral, 7).unwrap();
		assert!(matches!(namespace.create("/app/lock/x", b"", CreateMode::Persistent, 0), Err(Error::Remote { code: ErrorCode::NoChildrenForEphemerals, .. })));
		namespace.drop_ephemerals(7);
		assert_eq!(namespace.list("/app").unwrap(), vec!["config"]);
	}
}
