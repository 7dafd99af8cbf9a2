//! TCP transport speaking the coordination service's binary protocol.

mod jute;
mod records;
mod session;

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use zkb_protocol::{Acl, CreateMode, ErrorCode, NodeStat};

use self::records::Request;
use self::session::{Driver, Outbound};
use crate::address::ConnectionDescriptor;
use crate::coordinator::{Coordinator, RemoteSession};
use crate::error::{Error, Result};
use crate::watcher::Watcher;

/// How long `close` waits for the driver to send its close request.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Opens sessions over TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpCoordinator;

impl TcpCoordinator {
	pub fn new() -> Self {
		Self
	}
}

impl Coordinator for TcpCoordinator {
	fn open<'a>(&'a self, descriptor: &'a ConnectionDescriptor, session_timeout: Duration, watcher: Watcher) -> BoxFuture<'a, Result<Arc<dyn RemoteSession>>> {
		Box::pin(async move {
			let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
			let cancel = CancellationToken::new();
			let xid = Arc::new(AtomicI32::new(1));
			let driver = Driver::new(
				descriptor.connect_string(),
				descriptor.timeout,
				session_timeout,
				watcher,
				outbound_rx,
				cancel.clone(),
				Arc::clone(&xid),
			);
			debug!(target = "zkb.wire", address = %descriptor, "starting connection driver");
			let task = tokio::spawn(driver.run());
			Ok(Arc::new(TcpSession {
				outbound: outbound_tx,
				xid,
				cancel,
				task: Mutex::new(Some(task)),
			}) as Arc<dyn RemoteSession>)
		})
	}
}

/// Session handle backed by a connection driver task.
struct TcpSession {
	outbound: mpsc::UnboundedSender<Outbound>,
	xid: Arc<AtomicI32>,
	cancel: CancellationToken,
	task: Mutex<Option<JoinHandle<()>>>,
}

impl TcpSession {
	async fn call(&self, request: Request, path: &str) -> Result<Bytes> {
		let xid = self.xid.fetch_add(1, Ordering::SeqCst);
		let (reply, response) = oneshot::channel();
		self.outbound
			.send(Outbound { xid, request, reply })
			.map_err(|_| Error::ConnectionUnavailable)?;
		match response.await {
			Ok(Ok(body)) => Ok(body),
			Ok(Err(code)) => Err(Error::from_code(code, path)),
			Err(_) => Err(Error::from_code(ErrorCode::ConnectionLoss, path)),
		}
	}
}

impl RemoteSession for TcpSession {
	fn list_children<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Vec<String>>> {
		Box::pin(async move {
			let body = self.call(Request::GetChildren { path: path.to_string() }, path).await?;
			records::children_reply(body)
		})
	}

	fn get_data<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<(Option<Vec<u8>>, NodeStat)>> {
		Box::pin(async move {
			let body = self.call(Request::GetData { path: path.to_string() }, path).await?;
			records::data_reply(body)
		})
	}

	fn exists<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Option<NodeStat>>> {
		Box::pin(async move {
			match self.call(Request::Exists { path: path.to_string() }, path).await {
				Ok(body) => records::stat_reply(body).map(Some),
				Err(Error::NoNode { .. }) => Ok(None),
				Err(err) => Err(err),
			}
		})
	}

	fn create<'a>(&'a self, path: &'a str, data: &'a [u8], acl: &'a [Acl], mode: CreateMode) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move {
			let request = Request::Create {
				path: path.to_string(),
				data: data.to_vec(),
				acl: acl.to_vec(),
				flags: mode.flag(),
			};
			let body = self.call(request, path).await?;
			records::create_reply(body)
		})
	}

	fn set_data<'a>(&'a self, path: &'a str, data: &'a [u8], version: i32) -> BoxFuture<'a, Result<NodeStat>> {
		Box::pin(async move {
			let request = Request::SetData {
				path: path.to_string(),
				data: data.to_vec(),
				version,
			};
			let body = self.call(request, path).await?;
			records::stat_reply(body)
		})
	}

	fn delete<'a>(&'a self, path: &'a str, version: i32) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			self.call(
				Request::Delete {
					path: path.to_string(),
					version,
				},
				path,
			)
			.await?;
			Ok(())
		})
	}

	fn close(&self) -> BoxFuture<'_, ()> {
		Box::pin(async move {
			self.cancel.cancel();
			let task = self.task.lock().take();
			if let Some(task) = task {
				if tokio::time::timeout(CLOSE_GRACE, task).await.is_err() {
					debug!(target = "zkb.wire", "connection driver did not stop in time");
				}
			}
		})
	}
}

impl Drop for TcpSession {
	fn drop(&mut self) {
		self.cancel.cancel();
	}
}
