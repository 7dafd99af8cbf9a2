//! Command payloads and their text rendering.

use std::fmt;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use colored::Colorize;
use serde::Serialize;
use zkb::protocol::{NodePayload, NodeStat};
use zkb::{LoadStatus, NodeRef, NodeView, SessionState};

use crate::profiles::Profile;

/// Children of one node.
#[derive(Debug, Clone, Serialize)]
pub struct Listing {
	pub path: String,
	pub children: Vec<String>,
}

impl fmt::Display for Listing {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for child in &self.children {
			writeln!(f, "{child}")?;
		}
		Ok(())
	}
}

/// One node of a rendered subtree.
#[derive(Debug, Clone, Serialize)]
pub struct TreeEntry {
	pub name: String,
	pub path: String,
	pub status: LoadStatus,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub children: Vec<TreeEntry>,
}

impl TreeEntry {
	/// Builds the entry for `view`, resolving children through `lookup`.
	pub fn build(view: &NodeView, lookup: &dyn Fn(&NodeRef) -> Option<NodeView>) -> Self {
		let children = view
			.children
			.iter()
			.filter_map(|child| lookup(child))
			.map(|child| TreeEntry::build(&child, lookup))
			.collect();
		Self {
			name: view.node.name().to_string(),
			path: view.node.path().to_string(),
			status: view.status,
			children,
		}
	}

	fn write_children(&self, f: &mut fmt::Formatter<'_>, prefix: &str) -> fmt::Result {
		let count = self.children.len();
		for (index, child) in self.children.iter().enumerate() {
			let last = index + 1 == count;
			let (branch, indent) = if last { ("└── ", "    ") } else { ("├── ", "│   ") };
			writeln!(f, "{prefix}{branch}{}", child.label())?;
			child.write_children(f, &format!("{prefix}{indent}"))?;
		}
		Ok(())
	}

	fn label(&self) -> String {
		match self.status {
			LoadStatus::Loaded if !self.children.is_empty() => self.name.blue().bold().to_string(),
			LoadStatus::Loaded => self.name.clone(),
			LoadStatus::Unknown | LoadStatus::Loading => format!("{} {}", self.name, "+".dimmed()),
		}
	}
}

impl fmt::Display for TreeEntry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "{}", self.path.blue().bold())?;
		self.write_children(f, "")
	}
}

/// How node data is carried in [`NodeDetail`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataEncoding {
	Utf8,
	Base64,
	None,
}

/// Node metadata with readable timestamps.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatView {
	#[serde(flatten)]
	pub stat: NodeStat,
	pub created: String,
	pub modified: String,
	pub ephemeral: bool,
}

impl From<NodeStat> for StatView {
	fn from(stat: NodeStat) -> Self {
		Self {
			created: timestamp(stat.created_at()),
			modified: timestamp(stat.modified_at()),
			ephemeral: stat.is_ephemeral(),
			stat,
		}
	}
}

impl fmt::Display for StatView {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let stat = &self.stat;
		let owner = if stat.is_ephemeral() {
			format!("0x{:x}", stat.ephemeral_owner)
		} else {
			"none".to_string()
		};
		let rows = [
			("version", stat.version.to_string()),
			("created", self.created.clone()),
			("modified", self.modified.clone()),
			("children", stat.num_children.to_string()),
			("dataLength", stat.data_length.to_string()),
			("ephemeralOwner", owner),
			("cversion", stat.cversion.to_string()),
			("aversion", stat.aversion.to_string()),
			("czxid", format!("0x{:x}", stat.czxid)),
			("mzxid", format!("0x{:x}", stat.mzxid)),
			("pzxid", format!("0x{:x}", stat.pzxid)),
		];
		for (label, value) in rows {
			writeln!(f, "{}{value}", format!("{label:<16}").dimmed())?;
		}
		Ok(())
	}
}

fn timestamp(at: SystemTime) -> String {
	DateTime::<Local>::from(at).format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

/// Metadata for `path`.
#[derive(Debug, Clone, Serialize)]
pub struct NodeMetadata {
	pub path: String,
	pub stat: StatView,
}

impl fmt::Display for NodeMetadata {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "{}", self.path.blue().bold())?;
		write!(f, "{}", self.stat)
	}
}

/// Data plus metadata for `path`. Non-UTF-8 data is carried as base64.
#[derive(Debug, Clone, Serialize)]
pub struct NodeDetail {
	pub path: String,
	pub encoding: DataEncoding,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<String>,
	pub stat: StatView,
}

impl NodeDetail {
	pub fn new(path: impl Into<String>, payload: &NodePayload) -> Self {
		let (encoding, data) = match (&payload.data, payload.text()) {
			(None, _) => (DataEncoding::None, None),
			(Some(_), Some(text)) => (DataEncoding::Utf8, Some(text.to_string())),
			(Some(_), None) => (DataEncoding::Base64, payload.base64()),
		};
		Self {
			path: path.into(),
			encoding,
			data,
			stat: StatView::from(payload.stat),
		}
	}
}

impl fmt::Display for NodeDetail {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "{}", self.path.blue().bold())?;
		match (&self.data, self.encoding) {
			(Some(data), DataEncoding::Base64) => writeln!(f, "{} {data}", "base64:".dimmed())?,
			(Some(data), _) => writeln!(f, "{data}")?,
			(None, _) => writeln!(f, "{}", "(no data)".dimmed())?,
		}
		writeln!(f)?;
		write!(f, "{}", self.stat)
	}
}

/// Outcome of a create, set, or delete.
#[derive(Debug, Clone, Serialize)]
pub struct WriteOutcome {
	pub action: WriteAction,
	pub path: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub version: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteAction {
	Created,
	Updated,
	Deleted,
}

impl fmt::Display for WriteOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let action = match self.action {
			WriteAction::Created => "created",
			WriteAction::Updated => "updated",
			WriteAction::Deleted => "deleted",
		};
		write!(f, "{} {}", action.green(), self.path)?;
		if let Some(version) = self.version {
			write!(f, " (version {version})")?;
		}
		writeln!(f)
	}
}

/// Result of a has-children probe.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeOutcome {
	pub path: String,
	pub has_children: bool,
}

impl fmt::Display for ProbeOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let verdict = if self.has_children { "has children" } else { "leaf" };
		writeln!(f, "{}: {verdict}", self.path)
	}
}

/// Current session state.
#[derive(Debug, Clone, Serialize)]
pub struct StateReport {
	pub server: String,
	pub state: String,
	pub connected: bool,
	pub nodes: usize,
}

impl StateReport {
	pub fn new(server: impl Into<String>, state: SessionState, nodes: usize) -> Self {
		Self {
			server: server.into(),
			state: state.to_string(),
			connected: state.is_connected(),
			nodes,
		}
	}
}

impl fmt::Display for StateReport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = if self.connected { self.state.green() } else { self.state.yellow() };
		writeln!(f, "{} {state} ({} nodes loaded)", self.server, self.nodes)
	}
}

/// Saved profiles.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileList {
	pub path: String,
	pub profiles: Vec<Profile>,
}

impl fmt::Display for ProfileList {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for profile in &self.profiles {
			let marker = if profile.is_default { "*".green().bold().to_string() } else { " ".to_string() };
			writeln!(f, "{marker} {:<16}{}", profile.alias, profile.descriptor())?;
		}
		Ok(())
	}
}

/// Outcome of a profile add, remove, or default change.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileChange {
	pub action: &'static str,
	pub profile: Profile,
}

impl fmt::Display for ProfileChange {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "{} {} ({})", self.action.green(), self.profile.alias, self.profile.descriptor())
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn utf8_data_is_carried_as_text() {
		let detail = NodeDetail::new("/cfg", &NodePayload::new(Some(b"hello".to_vec()), NodeStat::default()));
		let value = serde_json::to_value(&detail).unwrap();
		assert_eq!(value["encoding"], "utf8");
		assert_eq!(value["data"], "hello");
	}

	#[test]
	fn binary_data_is_carried_as_base64() {
		let detail = NodeDetail::new("/bin", &NodePayload::new(Some(vec![0xff, 0x00, 0xfe]), NodeStat::default()));
		assert_eq!(detail.encoding, DataEncoding::Base64);
		assert_eq!(detail.data.as_deref(), Some("/wD+"));
	}

	#[test]
	fn absent_data_is_distinct_from_empty() {
		let absent = NodeDetail::new("/a", &NodePayload::new(None, NodeStat::default()));
		let empty = NodeDetail::new("/a", &NodePayload::new(Some(Vec::new()), NodeStat::default()));
		assert_eq!(absent.encoding, DataEncoding::None);
		assert!(absent.data.is_none());
		assert_eq!(empty.encoding, DataEncoding::Utf8);
		assert_eq!(empty.data.as_deref(), Some(""));
	}

	#[test]
	fn stat_view_flattens_raw_fields() {
		let stat = NodeStat {
			version: 4,
			num_children: 2,
			ephemeral_owner: 0x10,
			..Default::default()
		};
		let value = serde_json::to_value(StatView::from(stat)).unwrap();
		assert_eq!(value["version"], 4);
		assert_eq!(value["numChildren"], 2);
		assert_eq!(value["ephemeral"], true);
		assert!(value["created"].is_string());
	}

	#[test]
	fn tree_renders_branches() {
		colored::control::set_override(false);
		let tree = TreeEntry {
			name: String::new(),
			path: "/".into(),
			status: LoadStatus::Loaded,
			children: vec![
				TreeEntry {
					name: "app".into(),
					path: "/app".into(),
					status: LoadStatus::Loaded,
					children: vec![TreeEntry {
						name: "cfg".into(),
						path: "/app/cfg".into(),
						status: LoadStatus::Unknown,
						children: Vec::new(),
					}],
				},
				TreeEntry {
					name: "zookeeper".into(),
					path: "/zookeeper".into(),
					status: LoadStatus::Loaded,
					children: Vec::new(),
				},
			],
		};
		assert_eq!(tree.to_string(), "/\n├── app\n│   └── cfg +\n└── zookeeper\n");
	}

	#[test]
	fn write_outcome_omits_missing_version() {
		let outcome = WriteOutcome {
			action: WriteAction::Deleted,
			path: "/a".into(),
			version: None,
		};
		assert_eq!(serde_json::to_value(&outcome).unwrap(), json!({ "action": "deleted", "path": "/a" }));
	}
}
