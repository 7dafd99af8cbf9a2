//! Namespace client: the single authoritative channel to the coordination
//! service.
//!
//! The client owns the session state and is the only place it changes. Every
//! primitive checks the state before touching the network and fails fast with
//! [`Error::ConnectionUnavailable`] instead of queueing, or with
//! [`Error::ReconnectFailed`] once recovery from an expiry has given up.
//! Watcher notifications are tagged with the generation of the session that
//! produced them, so a closed or replaced session can never move the state
//! machine.
//!
//! # Lifecycle
//!
//! 1. `connect()` moves to `Connecting`, opens an underlying session and waits
//!    (bounded by the descriptor's timeout) for the watcher to settle.
//! 2. Watcher events drive transitions through [`SessionState::on_event`].
//! 3. An `Expired` transition spawns a reconnect against the same address,
//!    bounded by [`ClientConfig::reconnect_timeout`].
//! 4. `close()` supersedes the session; calls in flight fail fast.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::{Instant, timeout, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use zkb_protocol::{Acl, CreateMode, KeeperState, NodePayload, NodeStat, validate_path};

use crate::address::ConnectionDescriptor;
use crate::config::ClientConfig;
use crate::coordinator::{Coordinator, RemoteSession};
use crate::error::{Error, Result};
use crate::state::{DisconnectReason, SessionEvent, SessionState};
use crate::watcher::Watcher;

/// Client for one logical connection to the coordination service.
pub struct NamespaceClient {
	shared: Arc<Shared>,
}

struct Shared {
	coordinator: Arc<dyn Coordinator>,
	config: ClientConfig,
	/// Written only through the transition table; read by every primitive.
	state: watch::Sender<SessionState>,
	/// Generation of the session whose watcher events are accepted.
	generation: AtomicU64,
	/// Underlying sessions that reached a connected state.
	established: AtomicU64,
	session: Mutex<Option<ActiveSession>>,
	descriptor: Mutex<Option<ConnectionDescriptor>>,
	/// Why the last recovery after expiry gave up.
	reconnect_failure: Mutex<Option<String>>,
}

#[derive(Clone)]
struct ActiveSession {
	generation: u64,
	handle: Arc<dyn RemoteSession>,
	cancel: CancellationToken,
}

#[derive(Debug, Clone, Copy)]
enum Access {
	Read,
	Write,
}

impl NamespaceClient {
	pub fn new(coordinator: Arc<dyn Coordinator>, config: ClientConfig) -> Self {
		let (state, _) = watch::channel(SessionState::default());
		Self {
			shared: Arc::new(Shared {
				coordinator,
				config,
				state,
				generation: AtomicU64::new(0),
				established: AtomicU64::new(0),
				session: Mutex::new(None),
				descriptor: Mutex::new(None),
				reconnect_failure: Mutex::new(None),
			}),
		}
	}

	/// Connects to `descriptor`, blocking until the session is established,
	/// rejected, or the descriptor's timeout elapses.
	///
	/// On timeout or failure the underlying session handle is released before
	/// this returns. Only valid from a terminal `Disconnected` state.
	pub async fn connect(&self, descriptor: ConnectionDescriptor) -> Result<()> {
		let shared = &self.shared;
		let deadline = Instant::now() + descriptor.timeout;
		let mut rx = shared.state.subscribe();
		let generation = shared.begin_connect()?;
		let baseline = shared.established.load(Ordering::SeqCst);
		*shared.descriptor.lock() = Some(descriptor.clone());
		shared.reconnect_failure.lock().take();

		info!(target = "zkb.client", address = %descriptor, "connecting");

		let opened = timeout_at(
			deadline,
			shared.coordinator.open(&descriptor, shared.config.session_timeout, shared.watcher_for(generation)),
		)
		.await;

		let handle = match opened {
			Ok(Ok(handle)) => handle,
			Ok(Err(err)) => {
				error!(target = "zkb.client", address = %descriptor, error = %err, "failed to open session");
				shared.apply(SessionEvent::Close);
				return Err(Error::ConnectFailed {
					address: descriptor.to_string(),
					reason: err.to_string(),
				});
			}
			Err(_) => {
				error!(target = "zkb.client", address = %descriptor, after = ?descriptor.timeout, "timed out opening session");
				shared.apply(SessionEvent::ConnectTimedOut);
				return Err(connect_timeout(&descriptor));
			}
		};
		shared.install(generation, handle).await;

		let settled = settle(&mut rx, SessionState::Connecting, &shared.established, baseline);
		match timeout_at(deadline, settled).await {
			Ok(Ok((SessionState::AuthFailed, _))) => {
				shared.release(generation).await;
				Err(Error::AuthFailed)
			}
			// Once established, a later loss belongs to the live session.
			Ok(Ok((state, true))) if !state.is_terminal() => {
				info!(target = "zkb.client", address = %descriptor, %state, "connected");
				Ok(())
			}
			Ok(Ok((state, _))) => {
				debug!(target = "zkb.client", address = %descriptor, %state, "connect interrupted");
				shared.release(generation).await;
				shared.apply(SessionEvent::Close);
				Err(Error::ConnectionUnavailable)
			}
			Ok(Err(err)) => {
				shared.release(generation).await;
				Err(err)
			}
			Err(_) => {
				error!(target = "zkb.client", address = %descriptor, after = ?descriptor.timeout, "timed out waiting for session");
				shared.release(generation).await;
				shared.apply(SessionEvent::ConnectTimedOut);
				Err(connect_timeout(&descriptor))
			}
		}
	}

	/// Closes the session. In-flight calls fail with `ConnectionUnavailable`.
	pub async fn close(&self) {
		let (_, changed) = self.shared.supersede(Some(SessionEvent::Close));
		let active = self.shared.session.lock().take();
		match active {
			Some(active) => {
				active.shutdown().await;
				info!(target = "zkb.client", "session closed");
			}
			None if changed.is_some() => debug!(target = "zkb.client", "closed without an active session"),
			None => {}
		}
	}

	/// Non-blocking: `true` only in `Connected` or `ReadOnly`.
	pub fn is_connected(&self) -> bool {
		self.state().is_connected()
	}

	pub fn state(&self) -> SessionState {
		*self.shared.state.borrow()
	}

	/// Receiver that observes every state change.
	pub fn subscribe(&self) -> watch::Receiver<SessionState> {
		self.shared.state.subscribe()
	}

	/// Address of the most recent connect attempt.
	pub fn descriptor(&self) -> Option<ConnectionDescriptor> {
		self.shared.descriptor.lock().clone()
	}

	/// Count of underlying sessions established so far. Advances on every
	/// successful connect and on every recovery from expiry, but not when a
	/// transiently lost connection resumes the same session.
	pub fn established_sessions(&self) -> u64 {
		self.shared.established.load(Ordering::SeqCst)
	}

	/// Immediate child names of `path`, in the order the server returned them.
	pub async fn list_children(&self, path: &str) -> Result<Vec<String>> {
		validate_path(path)?;
		let active = self.usable(Access::Read)?;
		let children = active.run(active.handle.list_children(path)).await?;
		trace!(target = "zkb.client", path, count = children.len(), "listed children");
		Ok(children)
	}

	/// Data and metadata of `path` in one round trip.
	pub async fn read_data(&self, path: &str) -> Result<NodePayload> {
		validate_path(path)?;
		let active = self.usable(Access::Read)?;
		let (data, stat) = active.run(active.handle.get_data(path)).await?;
		Ok(NodePayload::new(data, stat))
	}

	/// Metadata of `path`, or `None` when it does not exist.
	pub async fn read_metadata(&self, path: &str) -> Result<Option<NodeStat>> {
		validate_path(path)?;
		let active = self.usable(Access::Read)?;
		active.run(active.handle.exists(path)).await
	}

	pub async fn create_node(&self, path: &str, data: &[u8], acl: &[Acl], mode: CreateMode) -> Result<String> {
		validate_path(path)?;
		let active = self.usable(Access::Write)?;
		let created = active.run(active.handle.create(path, data, acl, mode)).await?;
		debug!(target = "zkb.client", path = %created, ?mode, "created node");
		Ok(created)
	}

	/// Replaces the data of `path`. `None` skips the version check.
	pub async fn write_data(&self, path: &str, data: &[u8], expected_version: Option<i32>) -> Result<NodeStat> {
		validate_path(path)?;
		let active = self.usable(Access::Write)?;
		let stat = active.run(active.handle.set_data(path, data, expected_version.unwrap_or(-1))).await?;
		debug!(target = "zkb.client", path, version = stat.version, "updated node");
		Ok(stat)
	}

	/// Deletes `path`. `None` skips the version check.
	pub async fn delete_node(&self, path: &str, expected_version: Option<i32>) -> Result<()> {
		validate_path(path)?;
		let active = self.usable(Access::Write)?;
		active.run(active.handle.delete(path, expected_version.unwrap_or(-1))).await?;
		debug!(target = "zkb.client", path, "deleted node");
		Ok(())
	}

	fn usable(&self, access: Access) -> Result<ActiveSession> {
		let state = self.state();
		let permitted = match access {
			Access::Read => state.is_connected(),
			Access::Write => state.is_writable(),
		};
		if !permitted {
			trace!(target = "zkb.client", %state, ?access, "rejecting call");
			if state == SessionState::Disconnected(DisconnectReason::ReconnectFailed) {
				let reason = self.shared.reconnect_failure.lock().clone().unwrap_or_default();
				return Err(Error::ReconnectFailed(reason));
			}
			return Err(Error::ConnectionUnavailable);
		}
		self.shared.session.lock().clone().ok_or(Error::ConnectionUnavailable)
	}
}

impl Drop for NamespaceClient {
	fn drop(&mut self) {
		self.shared.supersede(Some(SessionEvent::Close));
		let Some(active) = self.shared.session.lock().take() else {
			return;
		};
		active.cancel.cancel();
		if let Ok(runtime) = Handle::try_current() {
			runtime.spawn(async move { active.handle.close().await });
		}
	}
}

impl ActiveSession {
	/// Races `call` against session shutdown.
	async fn run<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
		tokio::select! {
			biased;
			_ = self.cancel.cancelled() => Err(Error::ConnectionUnavailable),
			result = call => result,
		}
	}

	async fn shutdown(self) {
		self.cancel.cancel();
		self.handle.close().await;
	}
}

impl Shared {
	fn begin_connect(&self) -> Result<u64> {
		let mut outcome = Err(SessionState::default());
		self.state.send_if_modified(|state| match state.on_event(SessionEvent::Connect) {
			Some(next) => {
				let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
				debug!(target = "zkb.client", from = %state, to = %next, generation, "session state changed");
				*state = next;
				outcome = Ok(generation);
				true
			}
			None => {
				outcome = Err(*state);
				false
			}
		});
		outcome.map_err(|state| Error::InvalidState { state, operation: "connect" })
	}

	fn apply(&self, event: SessionEvent) -> Option<SessionState> {
		let mut changed = None;
		self.state.send_if_modified(|state| step(state, event, &mut changed));
		changed
	}

	/// Applies `event` only if it came from the current session generation.
	fn apply_current(&self, generation: u64, event: SessionEvent) -> Option<SessionState> {
		let mut changed = None;
		self.state.send_if_modified(|state| {
			if self.generation.load(Ordering::SeqCst) != generation {
				trace!(target = "zkb.client", generation, ?event, "dropping event from superseded session");
				return false;
			}
			let before = *state;
			let modified = step(state, event, &mut changed);
			// Counted before receivers are woken.
			if modified && state.is_connected() && matches!(before, SessionState::Connecting | SessionState::Expired) {
				self.established.fetch_add(1, Ordering::SeqCst);
			}
			modified
		});
		changed
	}

	/// Starts a new generation so the current session's events are ignored,
	/// optionally applying `event` under the same lock.
	fn supersede(&self, event: Option<SessionEvent>) -> (u64, Option<SessionState>) {
		let mut generation = 0;
		let mut changed = None;
		self.state.send_if_modified(|state| {
			generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
			match event {
				Some(event) => step(state, event, &mut changed),
				None => false,
			}
		});
		(generation, changed)
	}

	fn watcher_for(self: &Arc<Self>, generation: u64) -> Watcher {
		let shared = Arc::downgrade(self);
		let runtime = Handle::try_current().ok();
		Watcher::new(move |event| {
			if let Some(shared) = shared.upgrade() {
				shared.on_watch(generation, event, runtime.as_ref());
			}
		})
	}

	fn on_watch(self: &Arc<Self>, generation: u64, event: KeeperState, runtime: Option<&Handle>) {
		let Some(next) = self.apply_current(generation, SessionEvent::Watch(event)) else {
			return;
		};
		match next {
			SessionState::Connected => info!(target = "zkb.client", generation, "session established"),
			SessionState::ReadOnly => warn!(target = "zkb.client", generation, "connected in read-only mode"),
			SessionState::Disconnected(DisconnectReason::Lost) => {
				warn!(target = "zkb.client", generation, "connection lost; waiting for the session to recover")
			}
			SessionState::AuthFailed => error!(target = "zkb.client", generation, "authentication failed"),
			SessionState::Expired => {
				error!(target = "zkb.client", generation, "session expired; reconnecting");
				self.spawn_reconnect(runtime);
			}
			_ => {}
		}
	}

	fn spawn_reconnect(self: &Arc<Self>, runtime: Option<&Handle>) {
		let Some(runtime) = runtime else {
			error!(target = "zkb.client", "no async runtime available for reconnect");
			self.fail_reconnect("no async runtime available".to_string());
			return;
		};
		let shared = Arc::clone(self);
		runtime.spawn(async move { shared.reconnect().await });
	}

	/// Opens a new session against the same address after an expiry.
	async fn reconnect(self: Arc<Self>) {
		let Some(descriptor) = self.descriptor.lock().clone() else {
			error!(target = "zkb.client", "no address recorded for reconnect");
			self.fail_reconnect("no address recorded".to_string());
			return;
		};

		let (generation, _) = self.supersede(None);
		let baseline = self.established.load(Ordering::SeqCst);
		let expired = self.session.lock().take();
		if let Some(expired) = expired {
			expired.shutdown().await;
		}

		let mut rx = self.state.subscribe();
		let attempt = async {
			let handle = self
				.coordinator
				.open(&descriptor, self.config.session_timeout, self.watcher_for(generation))
				.await?;
			self.install(generation, handle).await;
			settle(&mut rx, SessionState::Expired, &self.established, baseline).await
		};

		match timeout(self.config.reconnect_timeout, attempt).await {
			Ok(Ok((state, true))) if !state.is_terminal() && state != SessionState::AuthFailed => {
				info!(target = "zkb.client", address = %descriptor, %state, "session re-established after expiry");
			}
			Ok(Ok((state, _))) => {
				warn!(target = "zkb.client", address = %descriptor, %state, "reconnect interrupted");
				self.release(generation).await;
			}
			Ok(Err(err)) => {
				error!(target = "zkb.client", address = %descriptor, error = %err, "reconnect failed");
				self.release(generation).await;
				self.fail_reconnect(err.to_string());
			}
			Err(_) => {
				error!(
					target = "zkb.client",
					address = %descriptor,
					after = ?self.config.reconnect_timeout,
					"reconnect timed out"
				);
				self.release(generation).await;
				self.fail_reconnect(format!("no session within {:?}", self.config.reconnect_timeout));
			}
		}
	}

	fn fail_reconnect(&self, reason: String) {
		*self.reconnect_failure.lock() = Some(reason);
		self.apply(SessionEvent::ReconnectFailed);
	}

	async fn install(&self, generation: u64, handle: Arc<dyn RemoteSession>) {
		let active = ActiveSession {
			generation,
			handle,
			cancel: CancellationToken::new(),
		};
		let previous = self.session.lock().replace(active);
		if let Some(previous) = previous {
			warn!(target = "zkb.client", generation = previous.generation, "replacing a session that was never released");
			previous.shutdown().await;
		}
	}

	/// Releases the handle opened for `generation` and ignores its trailing events.
	async fn release(&self, generation: u64) {
		let _ = self
			.generation
			.compare_exchange(generation, generation + 1, Ordering::SeqCst, Ordering::SeqCst);
		let active = {
			let mut slot = self.session.lock();
			if slot.as_ref().is_some_and(|active| active.generation == generation) {
				slot.take()
			} else {
				None
			}
		};
		if let Some(active) = active {
			debug!(target = "zkb.client", generation, "releasing session handle");
			active.shutdown().await;
		}
	}
}

fn step(state: &mut SessionState, event: SessionEvent, changed: &mut Option<SessionState>) -> bool {
	match state.on_event(event) {
		Some(next) if next != *state => {
			debug!(target = "zkb.client", from = %state, to = %next, ?event, "session state changed");
			*state = next;
			*changed = Some(next);
			true
		}
		Some(_) => false,
		None => {
			trace!(target = "zkb.client", %state, ?event, "event has no transition");
			false
		}
	}
}

/// Waits until the state leaves `pending`. The flag reports whether a session
/// was established past `baseline` in the meantime, even if it has since been
/// lost again.
async fn settle(
	rx: &mut watch::Receiver<SessionState>,
	pending: SessionState,
	established: &AtomicU64,
	baseline: u64,
) -> Result<(SessionState, bool)> {
	let reached = || established.load(Ordering::SeqCst) > baseline;
	rx.wait_for(|state| *state != pending || reached())
		.await
		.map(|state| (*state, reached()))
		.map_err(|_| Error::ConnectionUnavailable)
}

fn connect_timeout(descriptor: &ConnectionDescriptor) -> Error {
	Error::ConnectTimeout {
		address: descriptor.to_string(),
		after: descriptor.timeout,
	}
}
