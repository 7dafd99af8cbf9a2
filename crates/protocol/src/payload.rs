//! Node data plus metadata.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::stat::NodeStat;

/// Data and metadata read from a node in one round trip.
///
/// The data is opaque. `None` means the server stored no data at all, which is
/// distinct from an empty payload. JSON encodes the bytes as base64.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePayload {
	#[serde(serialize_with = "serialize_data", deserialize_with = "deserialize_data", default)]
	pub data: Option<Vec<u8>>,
	pub stat: NodeStat,
}

impl NodePayload {
	pub fn new(data: Option<Vec<u8>>, stat: NodeStat) -> Self {
		Self { data, stat }
	}

	/// Returns the payload as UTF-8 text when it is present and valid.
	pub fn text(&self) -> Option<&str> {
		self.data.as_deref().and_then(|bytes| std::str::from_utf8(bytes).ok())
	}

	/// Returns the payload encoded as base64, if present.
	pub fn base64(&self) -> Option<String> {
		self.data.as_deref().map(|bytes| STANDARD.encode(bytes))
	}
}

fn serialize_data<S: Serializer>(data: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
	match data {
		Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
		None => serializer.serialize_none(),
	}
}

fn deserialize_data<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
	let encoded: Option<String> = Option::deserialize(deserializer)?;
	encoded
		.map(|text| STANDARD.decode(text).map_err(serde::de::Error::custom))
		.transpose()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn text_requires_valid_utf8() {
		let payload = NodePayload::new(Some(b"hello".to_vec()), NodeStat::default());
		assert_eq!(payload.text(), Some("hello"));

		let binary = NodePayload::new(Some(vec![0xff, 0xfe]), NodeStat::default());
		assert_eq!(binary.text(), None);
		assert_eq!(binary.base64().as_deref(), Some("//4="));
	}

	#[test]
	fn json_encodes_data_as_base64() {
		let payload = NodePayload::new(Some(b"cfg".to_vec()), NodeStat::default());
		let value = serde_json::to_value(&payload).unwrap();
		assert_eq!(value["data"], "Y2Zn");

		let parsed: NodePayload = serde_json::from_value(value).unwrap();
		assert_eq!(parsed, payload);
	}

	#[test]
	fn absent_data_is_null() {
		let payload = NodePayload::new(None, NodeStat::default());
		let value = serde_json::to_value(&payload).unwrap();
		assert!(value["data"].is_null());
	}
}
