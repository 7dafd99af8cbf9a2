//! Connection driver: owns the socket for one session and multiplexes
//! requests, replies and keepalives over it.
//!
//! The driver reconnects on connection loss (resuming the same session id)
//! and reports state changes through the session watcher. It never retries
//! individual requests: anything in flight when the connection drops fails
//! with `ConnectionLoss`.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, interval_at, sleep, timeout};
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use zkb_protocol::{ErrorCode, KeeperState};

use super::jute::Reader;
use super::records::{ConnectRequest, ConnectResponse, ReplyHeader, Request, xid};
use crate::error::{Error, Result};
use crate::watcher::Watcher;

/// Largest frame accepted from the server.
const MAX_FRAME_LENGTH: usize = 4 * 1024 * 1024;

const BACKOFF_BASE: Duration = Duration::from_millis(100);
const BACKOFF_MAX: Duration = Duration::from_secs(2);

type Transport = Framed<TcpStream, LengthDelimitedCodec>;
pub(crate) type Reply = oneshot::Sender<std::result::Result<Bytes, ErrorCode>>;

/// A request queued for the driver.
pub(crate) struct Outbound {
	pub xid: i32,
	pub request: Request,
	pub reply: Reply,
}

enum Ended {
	Closed,
	Expired,
	AuthFailed,
	Lost(String),
}

enum Established {
	Live(Transport, bool),
	Expired,
}

pub(crate) struct Driver {
	address: String,
	connect_timeout: Duration,
	requested_timeout: Duration,
	negotiated_timeout: Duration,
	watcher: Watcher,
	outbound: mpsc::UnboundedReceiver<Outbound>,
	cancel: CancellationToken,
	xid: Arc<AtomicI32>,
	session_id: i64,
	passwd: Vec<u8>,
	last_zxid: i64,
}

impl Driver {
	pub(crate) fn new(
		address: String,
		connect_timeout: Duration,
		session_timeout: Duration,
		watcher: Watcher,
		outbound: mpsc::UnboundedReceiver<Outbound>,
		cancel: CancellationToken,
		xid: Arc<AtomicI32>,
	) -> Self {
		Self {
			address,
			connect_timeout,
			requested_timeout: session_timeout,
			negotiated_timeout: session_timeout,
			watcher,
			outbound,
			cancel,
			xid,
			session_id: 0,
			passwd: vec![0; 16],
			last_zxid: 0,
		}
	}

	pub(crate) async fn run(mut self) {
		let mut attempt: u32 = 0;
		let mut established = false;
		let cancel = self.cancel.clone();
		loop {
			let outcome = tokio::select! {
				_ = cancel.cancelled() => return,
				outcome = self.establish() => outcome,
			};
			match outcome {
				Ok(Established::Live(transport, read_only)) => {
					attempt = 0;
					established = true;
					info!(
						target = "zkb.wire",
						address = %self.address,
						session = format_args!("{:#x}", self.session_id),
						timeout = ?self.negotiated_timeout,
						read_only,
						"session established"
					);
					self.watcher.notify(if read_only {
						KeeperState::ConnectedReadOnly
					} else {
						KeeperState::SyncConnected
					});
					match self.serve(transport).await {
						Ended::Closed => return,
						Ended::Expired => {
							self.watcher.notify(KeeperState::Expired);
							return;
						}
						Ended::AuthFailed => {
							self.watcher.notify(KeeperState::AuthFailed);
							return;
						}
						Ended::Lost(reason) => {
							warn!(target = "zkb.wire", address = %self.address, %reason, "connection lost");
							self.watcher.notify(KeeperState::Disconnected);
						}
					}
				}
				Ok(Established::Expired) => {
					warn!(target = "zkb.wire", address = %self.address, "server refused to resume session");
					self.watcher.notify(KeeperState::Expired);
					return;
				}
				Err(err) => {
					debug!(target = "zkb.wire", address = %self.address, attempt, established, error = %err, "connect attempt failed");
				}
			}

			let delay = backoff(attempt);
			attempt = attempt.saturating_add(1);
			if !self.idle(delay).await {
				return;
			}
		}
	}

	async fn establish(&mut self) -> Result<Established> {
		let stream = timeout(self.connect_timeout, TcpStream::connect(&self.address))
			.await
			.map_err(|_| Error::Transient(format!("timed out connecting to {}", self.address)))??;
		stream.set_nodelay(true)?;
		let mut transport = Framed::new(stream, codec());

		let request = ConnectRequest {
			last_zxid: self.last_zxid,
			timeout_ms: self.requested_timeout.as_millis().min(i32::MAX as u128) as i32,
			session_id: self.session_id,
			passwd: self.passwd.clone(),
			read_only: true,
		};
		transport.send(request.encode()).await?;

		let frame = timeout(self.connect_timeout, transport.next())
			.await
			.map_err(|_| Error::Transient("timed out waiting for handshake".into()))?
			.ok_or_else(|| Error::Transient("server closed the connection during handshake".into()))??;
		let response = ConnectResponse::decode(frame.freeze())?;
		if response.is_expired() {
			return Ok(Established::Expired);
		}

		self.session_id = response.session_id;
		self.passwd = response.passwd;
		self.negotiated_timeout = Duration::from_millis(response.timeout_ms as u64);
		Ok(Established::Live(transport, response.read_only))
	}

	async fn serve(&mut self, transport: Transport) -> Ended {
		let (mut sink, mut stream) = transport.split();
		let mut pending: HashMap<i32, Reply> = HashMap::new();
		let ping_every = (self.negotiated_timeout / 3).max(Duration::from_millis(10));
		let read_timeout = self.negotiated_timeout * 2 / 3;
		let mut ping = interval_at(Instant::now() + ping_every, ping_every);
		let mut last_heard = Instant::now();

		let ended = loop {
			tokio::select! {
				_ = self.cancel.cancelled() => {
					let close = Request::CloseSession.encode(self.xid.fetch_add(1, Ordering::SeqCst));
					if let Err(err) = sink.send(close).await {
						debug!(target = "zkb.wire", error = %err, "failed to send close request");
					}
					break Ended::Closed;
				}
				outbound = self.outbound.recv() => match outbound {
					Some(Outbound { xid: request_xid, request, reply }) => {
						trace!(target = "zkb.wire", xid = request_xid, op = request.op(), "sending request");
						if let Err(err) = sink.send(request.encode(request_xid)).await {
							let _ = reply.send(Err(ErrorCode::ConnectionLoss));
							break Ended::Lost(err.to_string());
						}
						pending.insert(request_xid, reply);
					}
					None => break Ended::Closed,
				},
				frame = stream.next() => match frame {
					Some(Ok(frame)) => {
						last_heard = Instant::now();
						if let Some(ended) = self.dispatch(frame.freeze(), &mut pending) {
							break ended;
						}
					}
					Some(Err(err)) => break Ended::Lost(err.to_string()),
					None => break Ended::Lost("server closed the connection".into()),
				},
				_ = ping.tick() => {
					if last_heard.elapsed() > read_timeout {
						break Ended::Lost(format!("no response from server within {read_timeout:?}"));
					}
					if let Err(err) = sink.send(Request::Ping.encode(xid::PING)).await {
						break Ended::Lost(err.to_string());
					}
				}
			}
		};

		for (_, reply) in pending.drain() {
			let _ = reply.send(Err(ErrorCode::ConnectionLoss));
		}
		ended
	}

	fn dispatch(&mut self, frame: Bytes, pending: &mut HashMap<i32, Reply>) -> Option<Ended> {
		let mut reader = Reader::new(frame);
		let header = match ReplyHeader::read(&mut reader) {
			Ok(header) => header,
			Err(err) => return Some(Ended::Lost(err.to_string())),
		};
		if header.zxid > 0 {
			self.last_zxid = header.zxid;
		}
		let code = ErrorCode::from_code(header.err);

		match header.xid {
			xid::PING => {
				trace!(target = "zkb.wire", "ping acknowledged");
				None
			}
			xid::NOTIFICATION => {
				trace!(target = "zkb.wire", "ignoring watch notification");
				None
			}
			xid::AUTH if code == ErrorCode::AuthFailed => Some(Ended::AuthFailed),
			xid::AUTH => None,
			request_xid => {
				let reply = pending.remove(&request_xid);
				if reply.is_none() {
					warn!(target = "zkb.wire", xid = request_xid, "reply for unknown request");
				}
				let expired = code == ErrorCode::SessionExpired;
				if let Some(reply) = reply {
					let outcome = if code == ErrorCode::Ok { Ok(reader.into_rest()) } else { Err(code) };
					let _ = reply.send(outcome);
				}
				expired.then_some(Ended::Expired)
			}
		}
	}

	/// Waits out a reconnect backoff, failing requests queued meanwhile.
	/// Returns `false` once the session is closed.
	async fn idle(&mut self, delay: Duration) -> bool {
		let wait = sleep(delay);
		tokio::pin!(wait);
		loop {
			tokio::select! {
				_ = self.cancel.cancelled() => return false,
				_ = &mut wait => return true,
				outbound = self.outbound.recv() => match outbound {
					Some(Outbound { reply, .. }) => {
						let _ = reply.send(Err(ErrorCode::ConnectionLoss));
					}
					None => return false,
				},
			}
		}
	}
}

fn codec() -> LengthDelimitedCodec {
	LengthDelimitedCodec::builder()
		.length_field_length(4)
		.max_frame_length(MAX_FRAME_LENGTH)
		.new_codec()
}

fn backoff(attempt: u32) -> Duration {
	BACKOFF_BASE.saturating_mul(1 << attempt.min(5)).min(BACKOFF_MAX)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn backoff_doubles_up_to_cap() {
		assert_eq!(backoff(0), Duration::from_millis(100));
		assert_eq!(backoff(1), Duration::from_millis(200));
		assert_eq!(backoff(3), Duration::from_millis(800));
		assert_eq!(backoff(5), BACKOFF_MAX);
		assert_eq!(backoff(40), BACKOFF_MAX);
	}
}
