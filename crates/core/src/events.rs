//! Change notifications fired after every tree mutation.

use serde::Serialize;

use crate::node::NodeRef;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TreeEvent {
	/// The node was reset to `Unknown` (root refresh or forced refresh).
	Reset { node: NodeRef },
	/// A child listing for the node started.
	Loading { node: NodeRef },
	/// The node's children were materialized.
	Expanded { node: NodeRef, children: usize },
	/// Loading failed; the node is `Unknown` again.
	ExpandFailed { node: NodeRef, error: String },
	/// The tree was discarded; carries the root.
	Cleared { node: NodeRef },
}

impl TreeEvent {
	/// The node the event is about.
	pub fn node(&self) -> &NodeRef {
		match self {
			TreeEvent::Reset { node }
			| TreeEvent::Loading { node }
			| TreeEvent::Expanded { node, .. }
			| TreeEvent::ExpandFailed { node, .. }
			| TreeEvent::Cleared { node } => node,
		}
	}
}
