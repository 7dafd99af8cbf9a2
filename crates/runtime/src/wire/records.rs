//! Request and response records exchanged with the server.

use bytes::{BufMut, Bytes, BytesMut};
use zkb_protocol::{Acl, NodeStat};

use super::jute::{Reader, put_acl, put_bool, put_buffer, put_string};
use crate::error::Result;

pub(crate) const PROTOCOL_VERSION: i32 = 0;

/// Reserved transaction ids.
pub(crate) mod xid {
	pub(crate) const NOTIFICATION: i32 = -1;
	pub(crate) const PING: i32 = -2;
	pub(crate) const AUTH: i32 = -4;
}

/// Operation codes carried in the request header.
pub(crate) mod op {
	pub(crate) const CREATE: i32 = 1;
	pub(crate) const DELETE: i32 = 2;
	pub(crate) const EXISTS: i32 = 3;
	pub(crate) const GET_DATA: i32 = 4;
	pub(crate) const SET_DATA: i32 = 5;
	pub(crate) const GET_CHILDREN: i32 = 8;
	pub(crate) const PING: i32 = 11;
	pub(crate) const CLOSE_SESSION: i32 = -11;
}

/// Handshake sent as the first frame of every connection.
#[derive(Debug, Clone)]
pub(crate) struct ConnectRequest {
	pub last_zxid: i64,
	pub timeout_ms: i32,
	pub session_id: i64,
	pub passwd: Vec<u8>,
	pub read_only: bool,
}

impl ConnectRequest {
	pub(crate) fn encode(&self) -> Bytes {
		let mut buf = BytesMut::with_capacity(45);
		buf.put_i32(PROTOCOL_VERSION);
		buf.put_i64(self.last_zxid);
		buf.put_i32(self.timeout_ms);
		buf.put_i64(self.session_id);
		put_buffer(&mut buf, Some(&self.passwd));
		put_bool(&mut buf, self.read_only);
		buf.freeze()
	}
}

#[derive(Debug, Clone)]
pub(crate) struct ConnectResponse {
	pub timeout_ms: i32,
	pub session_id: i64,
	pub passwd: Vec<u8>,
	pub read_only: bool,
}

impl ConnectResponse {
	pub(crate) fn decode(frame: Bytes) -> Result<Self> {
		let mut reader = Reader::new(frame);
		let _protocol_version = reader.i32()?;
		let timeout_ms = reader.i32()?;
		let session_id = reader.i64()?;
		let passwd = reader.buffer()?.unwrap_or_default();
		// Older servers omit the read-only flag.
		let read_only = if reader.remaining() > 0 { reader.bool()? } else { false };
		Ok(Self {
			timeout_ms,
			session_id,
			passwd,
			read_only,
		})
	}

	/// A non-positive timeout means the server refused to resume the session.
	pub(crate) fn is_expired(&self) -> bool {
		self.timeout_ms <= 0
	}
}

/// One client request. Reads never set a watch.
#[derive(Debug, Clone)]
pub(crate) enum Request {
	GetChildren { path: String },
	GetData { path: String },
	Exists { path: String },
	Create { path: String, data: Vec<u8>, acl: Vec<Acl>, flags: i32 },
	SetData { path: String, data: Vec<u8>, version: i32 },
	Delete { path: String, version: i32 },
	Ping,
	CloseSession,
}

impl Request {
	pub(crate) fn op(&self) -> i32 {
		match self {
			Request::GetChildren { .. } => op::GET_CHILDREN,
			Request::GetData { .. } => op::GET_DATA,
			Request::Exists { .. } => op::EXISTS,
			Request::Create { .. } => op::CREATE,
			Request::SetData { .. } => op::SET_DATA,
			Request::Delete { .. } => op::DELETE,
			Request::Ping => op::PING,
			Request::CloseSession => op::CLOSE_SESSION,
		}
	}

	pub(crate) fn encode(&self, xid: i32) -> Bytes {
		let mut buf = BytesMut::with_capacity(64);
		buf.put_i32(xid);
		buf.put_i32(self.op());
		match self {
			Request::GetChildren { path } | Request::GetData { path } | Request::Exists { path } => {
				put_string(&mut buf, path);
				put_bool(&mut buf, false);
			}
			Request::Create { path, data, acl, flags } => {
				put_string(&mut buf, path);
				put_buffer(&mut buf, Some(data));
				put_acl(&mut buf, acl);
				buf.put_i32(*flags);
			}
			Request::SetData { path, data, version } => {
				put_string(&mut buf, path);
				put_buffer(&mut buf, Some(data));
				buf.put_i32(*version);
			}
			Request::Delete { path, version } => {
				put_string(&mut buf, path);
				buf.put_i32(*version);
			}
			Request::Ping | Request::CloseSession => {}
		}
		buf.freeze()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReplyHeader {
	pub xid: i32,
	pub zxid: i64,
	pub err: i32,
}

impl ReplyHeader {
	pub(crate) fn read(reader: &mut Reader) -> Result<Self> {
		Ok(Self {
			xid: reader.i32()?,
			zxid: reader.i64()?,
			err: reader.i32()?,
		})
	}
}

pub(crate) fn children_reply(body: Bytes) -> Result<Vec<String>> {
	Reader::new(body).strings()
}

pub(crate) fn data_reply(body: Bytes) -> Result<(Option<Vec<u8>>, NodeStat)> {
	let mut reader = Reader::new(body);
	let data = reader.buffer()?;
	Ok((data, reader.stat()?))
}

pub(crate) fn stat_reply(body: Bytes) -> Result<NodeStat> {
	Reader::new(body).stat()
}

pub(crate) fn create_reply(body: Bytes) -> Result<String> {
	Reader::new(body).string()
}
