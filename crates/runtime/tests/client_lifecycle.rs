// Integration tests for NamespaceClient session lifecycle
//
// Tests cover:
// - Connect success, timeout, auth failure and read-only sessions
// - Fail-fast gating of every primitive on the session state
// - Recovery from connection loss and session expiry
// - Events from superseded sessions never moving the state machine

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use zkb_runtime::protocol::{Acl, CreateMode, ErrorCode, KeeperState};
use zkb_runtime::{
	ClientConfig, ConnectionDescriptor, Coordinator, DisconnectReason, Error, MemoryCoordinator, NamespaceClient, RemoteSession, SessionState,
	Watcher,
};

/// Wraps a memory coordinator and keeps every watcher it hands out.
#[derive(Clone, Default)]
struct RecordingCoordinator {
	inner: MemoryCoordinator,
	watchers: Arc<Mutex<Vec<Watcher>>>,
}

impl RecordingCoordinator {
	fn watcher(&self, index: usize) -> Watcher {
		self.watchers.lock()[index].clone()
	}
}

impl Coordinator for RecordingCoordinator {
	fn open<'a>(
		&'a self,
		descriptor: &'a ConnectionDescriptor,
		session_timeout: Duration,
		watcher: Watcher,
	) -> BoxFuture<'a, zkb_runtime::Result<Arc<dyn RemoteSession>>> {
		self.watchers.lock().push(watcher.clone());
		self.inner.open(descriptor, session_timeout, watcher)
	}
}

/// Reports its session established and then lost before `open` returns.
#[derive(Clone, Default)]
struct FlappingCoordinator {
	inner: MemoryCoordinator,
	watchers: Arc<Mutex<Vec<Watcher>>>,
}

impl Coordinator for FlappingCoordinator {
	fn open<'a>(
		&'a self,
		descriptor: &'a ConnectionDescriptor,
		session_timeout: Duration,
		watcher: Watcher,
	) -> BoxFuture<'a, zkb_runtime::Result<Arc<dyn RemoteSession>>> {
		Box::pin(async move {
			let handle = self.inner.open(descriptor, session_timeout, Watcher::new(|_| {})).await?;
			watcher.notify(KeeperState::SyncConnected);
			watcher.notify(KeeperState::Disconnected);
			self.watchers.lock().push(watcher);
			Ok(handle)
		})
	}
}

fn descriptor() -> ConnectionDescriptor {
	ConnectionDescriptor::new("localhost", 2181).with_timeout(Duration::from_millis(500))
}

fn client_for(coordinator: &MemoryCoordinator) -> NamespaceClient {
	NamespaceClient::new(Arc::new(coordinator.clone()), ClientConfig::default())
}

async fn wait_for_state(client: &NamespaceClient, expected: SessionState) {
	let mut rx = client.subscribe();
	tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|state| *state == expected))
		.await
		.unwrap_or_else(|_| panic!("timed out waiting for {expected}, still {}", client.state()))
		.expect("state channel closed");
}

#[tokio::test]
async fn connect_establishes_session_and_lists_children() {
	let coordinator = MemoryCoordinator::new();
	coordinator.seed("/app/config", "v1").seed("/app/locks", "");
	let client = client_for(&coordinator);

	assert_eq!(client.state(), SessionState::Disconnected(DisconnectReason::Idle));
	client.connect(descriptor()).await.expect("Failed to connect");

	assert!(client.is_connected());
	assert_eq!(client.state(), SessionState::Connected);
	assert_eq!(client.descriptor(), Some(descriptor()));
	assert_eq!(client.list_children("/").await.expect("Failed to list root"), vec!["app"]);
	assert_eq!(client.list_children("/app").await.expect("Failed to list /app"), vec!["config", "locks"]);
}

#[tokio::test]
async fn primitives_fail_fast_before_connect() {
	let client = client_for(&MemoryCoordinator::new());

	assert!(matches!(client.list_children("/").await, Err(Error::ConnectionUnavailable)));
	assert!(matches!(client.read_data("/").await, Err(Error::ConnectionUnavailable)));
	assert!(matches!(client.read_metadata("/").await, Err(Error::ConnectionUnavailable)));
	assert!(matches!(
		client.create_node("/a", b"", &Acl::open_unsafe(), CreateMode::Persistent).await,
		Err(Error::ConnectionUnavailable)
	));
	assert!(matches!(client.write_data("/a", b"", None).await, Err(Error::ConnectionUnavailable)));
	assert!(matches!(client.delete_node("/a", None).await, Err(Error::ConnectionUnavailable)));
}

#[tokio::test]
async fn invalid_paths_are_rejected_locally() {
	let coordinator = MemoryCoordinator::new();
	let client = client_for(&coordinator);
	client.connect(descriptor()).await.expect("Failed to connect");

	assert!(matches!(client.list_children("relative").await, Err(Error::InvalidPath(_))));
	assert!(matches!(client.read_data("/trailing/").await, Err(Error::InvalidPath(_))));
	assert_eq!(coordinator.list_calls("relative"), 0);
}

#[tokio::test]
async fn connect_timeout_releases_handle() {
	let coordinator = MemoryCoordinator::new();
	coordinator.refuse_connections(true);
	let client = client_for(&coordinator);

	let short = descriptor().with_timeout(Duration::from_millis(100));
	let started = tokio::time::Instant::now();
	let err = client.connect(short).await.expect_err("connect should time out");

	assert!(err.is_timeout(), "unexpected error: {err}");
	assert!(started.elapsed() < Duration::from_secs(2));
	assert_eq!(client.state(), SessionState::Disconnected(DisconnectReason::TimedOut));
	assert_eq!(coordinator.sessions_opened(), 1);
	assert_eq!(coordinator.open_handles(), 0);

	coordinator.refuse_connections(false);
	client.connect(descriptor()).await.expect("Failed to connect after timeout");
	assert_eq!(client.state(), SessionState::Connected);
}

#[tokio::test]
async fn auth_failure_is_reported_and_handle_released() {
	let coordinator = MemoryCoordinator::new();
	coordinator.fail_auth(true);
	let client = client_for(&coordinator);

	let err = client.connect(descriptor()).await.expect_err("connect should fail");
	assert!(matches!(err, Error::AuthFailed));
	assert_eq!(client.state(), SessionState::AuthFailed);
	assert_eq!(coordinator.open_handles(), 0);

	// AuthFailed is not a state a fresh connect may start from.
	assert!(matches!(client.connect(descriptor()).await, Err(Error::InvalidState { .. })));
	client.close().await;
	coordinator.fail_auth(false);
	client.connect(descriptor()).await.expect("Failed to connect after close");
}

#[tokio::test]
async fn read_only_session_allows_reads_only() {
	let coordinator = MemoryCoordinator::new();
	coordinator.seed("/app", "v1").serve_read_only(true);
	let client = client_for(&coordinator);

	client.connect(descriptor()).await.expect("Failed to connect");
	assert_eq!(client.state(), SessionState::ReadOnly);
	assert!(client.is_connected());

	let payload = client.read_data("/app").await.expect("Failed to read");
	assert_eq!(payload.text(), Some("v1"));
	assert!(matches!(client.write_data("/app", b"v2", None).await, Err(Error::ConnectionUnavailable)));
	assert_eq!(coordinator.node("/app").expect("node missing").text(), Some("v1"));
}

#[tokio::test]
async fn connect_while_connected_is_rejected() {
	let coordinator = MemoryCoordinator::new();
	let client = client_for(&coordinator);
	client.connect(descriptor()).await.expect("Failed to connect");

	let err = client.connect(descriptor()).await.expect_err("second connect should fail");
	assert!(matches!(
		err,
		Error::InvalidState {
			state: SessionState::Connected,
			..
		}
	));
	assert_eq!(coordinator.sessions_opened(), 1);
}

#[tokio::test]
async fn connection_loss_gates_calls_until_recovered() {
	let coordinator = MemoryCoordinator::new();
	coordinator.seed("/app", "");
	let client = client_for(&coordinator);
	client.connect(descriptor()).await.expect("Failed to connect");

	coordinator.emit(KeeperState::Disconnected);
	assert_eq!(client.state(), SessionState::Disconnected(DisconnectReason::Lost));
	assert!(!client.is_connected());
	assert!(matches!(client.list_children("/").await, Err(Error::ConnectionUnavailable)));
	assert_eq!(coordinator.list_calls("/"), 0);

	coordinator.emit(KeeperState::SyncConnected);
	assert_eq!(client.state(), SessionState::Connected);
	assert_eq!(client.list_children("/").await.expect("Failed to list"), vec!["app"]);
	assert_eq!(coordinator.sessions_opened(), 1);
}

#[tokio::test]
async fn expiry_reconnects_to_same_address() {
	let coordinator = MemoryCoordinator::new();
	coordinator.seed("/app", "");
	let client = client_for(&coordinator);
	client.connect(descriptor()).await.expect("Failed to connect");

	coordinator.expire_sessions();
	wait_for_state(&client, SessionState::Connected).await;

	assert_eq!(coordinator.sessions_opened(), 2);
	assert_eq!(coordinator.open_handles(), 1);
	assert_eq!(client.list_children("/").await.expect("Failed to list"), vec!["app"]);
}

#[tokio::test]
async fn failed_reconnect_ends_disconnected() {
	let coordinator = MemoryCoordinator::new();
	let client = NamespaceClient::new(
		Arc::new(coordinator.clone()),
		ClientConfig::default().with_reconnect_timeout(Duration::from_millis(100)),
	);
	client.connect(descriptor()).await.expect("Failed to connect");

	coordinator.refuse_connections(true);
	coordinator.expire_sessions();
	wait_for_state(&client, SessionState::Disconnected(DisconnectReason::ReconnectFailed)).await;

	assert_eq!(coordinator.open_handles(), 0);
	assert!(client.state().can_connect());
	match client.list_children("/").await {
		Err(Error::ReconnectFailed(reason)) => assert!(!reason.is_empty()),
		other => panic!("expected ReconnectFailed, got {other:?}"),
	}

	coordinator.refuse_connections(false);
	client.connect(descriptor()).await.expect("Failed to connect again");
	assert_eq!(client.list_children("/").await.expect("Failed to list"), Vec::<String>::new());
}

#[tokio::test]
async fn connection_lost_right_after_establishing_keeps_the_session() {
	let coordinator = FlappingCoordinator::default();
	coordinator.inner.seed("/app", "");
	let client = NamespaceClient::new(Arc::new(coordinator.clone()), ClientConfig::default());

	client.connect(descriptor()).await.expect("Failed to connect");
	assert_eq!(client.state(), SessionState::Disconnected(DisconnectReason::Lost));
	assert_eq!(client.established_sessions(), 1);
	assert_eq!(coordinator.inner.open_handles(), 1);

	let watcher = coordinator.watchers.lock()[0].clone();
	watcher.notify(KeeperState::SyncConnected);
	assert_eq!(client.state(), SessionState::Connected);
	assert_eq!(client.list_children("/").await.expect("Failed to list"), vec!["app"]);
	assert_eq!(coordinator.inner.sessions_opened(), 1);
}

#[tokio::test]
async fn events_from_closed_session_are_ignored() {
	let coordinator = RecordingCoordinator::default();
	let client = NamespaceClient::new(Arc::new(coordinator.clone()), ClientConfig::default());
	client.connect(descriptor()).await.expect("Failed to connect");

	client.close().await;
	assert_eq!(client.state(), SessionState::Disconnected(DisconnectReason::Closed));

	let stale = coordinator.watcher(0);
	stale.notify(KeeperState::SyncConnected);
	stale.notify(KeeperState::Expired);
	assert_eq!(client.state(), SessionState::Disconnected(DisconnectReason::Closed));
	assert_eq!(coordinator.inner.open_handles(), 0);
}

#[tokio::test]
async fn events_from_expired_session_are_ignored_after_reconnect() {
	let coordinator = RecordingCoordinator::default();
	let client = NamespaceClient::new(Arc::new(coordinator.clone()), ClientConfig::default());
	client.connect(descriptor()).await.expect("Failed to connect");

	coordinator.inner.expire_sessions();
	wait_for_state(&client, SessionState::Connected).await;

	coordinator.watcher(0).notify(KeeperState::Disconnected);
	assert_eq!(client.state(), SessionState::Connected);

	coordinator.watcher(1).notify(KeeperState::Disconnected);
	assert_eq!(client.state(), SessionState::Disconnected(DisconnectReason::Lost));
}

#[tokio::test]
async fn close_fails_in_flight_calls() {
	let coordinator = MemoryCoordinator::new();
	let client = Arc::new(client_for(&coordinator));
	client.connect(descriptor()).await.expect("Failed to connect");

	coordinator.pause_listings();
	let pending = tokio::spawn({
		let client = Arc::clone(&client);
		async move { client.list_children("/").await }
	});
	while coordinator.active_listings() == 0 {
		tokio::task::yield_now().await;
	}

	client.close().await;
	let result = pending.await.expect("listing task panicked");
	assert!(matches!(result, Err(Error::ConnectionUnavailable)));
	coordinator.resume_listings();
}

#[tokio::test]
async fn writes_round_trip_through_the_session() {
	let coordinator = MemoryCoordinator::new();
	coordinator.seed("/app", "");
	let client = client_for(&coordinator);
	client.connect(descriptor()).await.expect("Failed to connect");

	let created = client
		.create_node("/app/config", b"v1", &Acl::open_unsafe(), CreateMode::Persistent)
		.await
		.expect("Failed to create");
	assert_eq!(created, "/app/config");

	let stat = client.write_data("/app/config", b"v2", Some(0)).await.expect("Failed to write");
	assert_eq!(stat.version, 1);
	assert!(matches!(client.write_data("/app/config", b"v3", Some(0)).await, Err(Error::BadVersion { .. })));

	let metadata = client.read_metadata("/app/config").await.expect("Failed to stat").expect("node missing");
	assert_eq!(metadata.data_length, 2);
	assert!(matches!(client.delete_node("/app", None).await, Err(Error::NotEmpty { .. })));

	client.delete_node("/app/config", Some(1)).await.expect("Failed to delete");
	assert_eq!(client.read_metadata("/app/config").await.expect("Failed to stat"), None);
	assert!(matches!(client.read_data("/app/config").await, Err(Error::NoNode { .. })));
}

#[tokio::test]
async fn injected_faults_surface_as_typed_errors() {
	let coordinator = MemoryCoordinator::new();
	coordinator.seed("/app", "").inject_fault("/app", ErrorCode::ConnectionLoss);
	let client = client_for(&coordinator);
	client.connect(descriptor()).await.expect("Failed to connect");

	let err = client.list_children("/app").await.expect_err("listing should fail");
	assert!(matches!(err, Error::Transient(_)));
	assert!(err.is_connection_error());
	assert_eq!(client.state(), SessionState::Connected);

	coordinator.clear_fault("/app");
	assert!(client.list_children("/app").await.expect("Failed to list").is_empty());
}
