//! Primitive encoding used on the wire: big-endian integers, length-prefixed
//! strings and buffers (`-1` encodes null) and counted vectors.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use zkb_protocol::{Acl, NodeStat};

use crate::error::{Error, Result};

pub(crate) fn put_bool(buf: &mut BytesMut, value: bool) {
	buf.put_u8(u8::from(value));
}

pub(crate) fn put_string(buf: &mut BytesMut, value: &str) {
	put_buffer(buf, Some(value.as_bytes()));
}

pub(crate) fn put_buffer(buf: &mut BytesMut, value: Option<&[u8]>) {
	match value {
		Some(bytes) => {
			buf.put_i32(bytes.len() as i32);
			buf.put_slice(bytes);
		}
		None => buf.put_i32(-1),
	}
}

pub(crate) fn put_acl(buf: &mut BytesMut, acl: &[Acl]) {
	buf.put_i32(acl.len() as i32);
	for entry in acl {
		buf.put_i32(entry.perms.0);
		put_string(buf, &entry.id.scheme);
		put_string(buf, &entry.id.id);
	}
}

/// Cursor over a received frame.
pub(crate) struct Reader {
	buf: Bytes,
}

impl Reader {
	pub(crate) fn new(buf: Bytes) -> Self {
		Self { buf }
	}

	/// Unread remainder of the frame.
	pub(crate) fn into_rest(self) -> Bytes {
		self.buf
	}

	pub(crate) fn remaining(&self) -> usize {
		self.buf.remaining()
	}

	fn need(&self, len: usize, what: &str) -> Result<()> {
		if self.buf.remaining() < len {
			return Err(Error::Protocol(format!(
				"truncated {what}: need {len} bytes, have {}",
				self.buf.remaining()
			)));
		}
		Ok(())
	}

	pub(crate) fn bool(&mut self) -> Result<bool> {
		self.need(1, "bool")?;
		Ok(self.buf.get_u8() != 0)
	}

	pub(crate) fn i32(&mut self) -> Result<i32> {
		self.need(4, "int")?;
		Ok(self.buf.get_i32())
	}

	pub(crate) fn i64(&mut self) -> Result<i64> {
		self.need(8, "long")?;
		Ok(self.buf.get_i64())
	}

	pub(crate) fn buffer(&mut self) -> Result<Option<Vec<u8>>> {
		let len = self.i32()?;
		if len < 0 {
			return Ok(None);
		}
		let len = len as usize;
		self.need(len, "buffer")?;
		Ok(Some(self.buf.split_to(len).to_vec()))
	}

	pub(crate) fn string(&mut self) -> Result<String> {
		let bytes = self.buffer()?.unwrap_or_default();
		String::from_utf8(bytes).map_err(|err| Error::Protocol(format!("invalid UTF-8 in string: {err}")))
	}

	pub(crate) fn strings(&mut self) -> Result<Vec<String>> {
		let count = self.i32()?;
		if count < 0 {
			return Ok(Vec::new());
		}
		(0..count).map(|_| self.string()).collect()
	}

	pub(crate) fn stat(&mut self) -> Result<NodeStat> {
		Ok(NodeStat {
			czxid: self.i64()?,
			mzxid: self.i64()?,
			ctime: self.i64()?,
			mtime: self.i64()?,
			version: self.i32()?,
			cversion: self.i32()?,
			aversion: self.i32()?,
			ephemeral_owner: self.i64()?,
			data_length: self.i32()?,
			num_children: self.i32()?,
			pzxid: self.i64()?,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn null_buffer_is_distinct_from_empty() {
		let mut buf = BytesMut::new();
		put_buffer(&mut buf, None);
		put_buffer(&mut buf, Some(b""));
		assert_eq!(&buf[..], &[0xff, 0xff, 0xff, 0xff, 0, 0, 0, 0]);

		let mut reader = Reader::new(buf.freeze());
		assert_eq!(reader.buffer().unwrap(), None);
		assert_eq!(reader.buffer().unwrap(), Some(Vec::new()));
	}

	#[test]
	fn truncated_input_is_a_protocol_error() {
		let mut reader = Reader::new(Bytes::from_static(&[0, 0, 0, 5, b'a']));
		assert!(matches!(reader.string(), Err(Error::Protocol(_))));
	}

	#[test]
	fn stat_fields_are_read_in_wire_order() {
		let mut buf = BytesMut::new();
		for value in [1_i64, 2, 3, 4] {
			buf.put_i64(value);
		}
		for value in [5_i32, 6, 7] {
			buf.put_i32(value);
		}
		buf.put_i64(8);
		buf.put_i32(9);
		buf.put_i32(10);
		buf.put_i64(11);

		let stat = Reader::new(buf.freeze()).stat().unwrap();
		assert_eq!((stat.czxid, stat.mzxid, stat.ctime, stat.mtime), (1, 2, 3, 4));
		assert_eq!((stat.version, stat.cversion, stat.aversion), (5, 6, 7));
		assert_eq!((stat.ephemeral_owner, stat.data_length, stat.num_children, stat.pzxid), (8, 9, 10, 11));
	}

	#[test]
	fn acl_is_a_counted_vector() {
		let mut buf = BytesMut::new();
		put_acl(&mut buf, &Acl::open_unsafe());
		let mut reader = Reader::new(buf.freeze());
		assert_eq!(reader.i32().unwrap(), 1);
		assert_eq!(reader.i32().unwrap(), 31);
		assert_eq!(reader.string().unwrap(), "world");
		assert_eq!(reader.string().unwrap(), "anyone");
		assert_eq!(reader.remaining(), 0);
	}
}
