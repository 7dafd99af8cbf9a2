//! Node references and local tree views.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;
use zkb_protocol::{PathError, ROOT_PATH, child_path, last_segment, parent_path, validate_path};

/// Reference to one remote node. Two references are equal iff their paths are.
#[derive(Debug, Clone, Serialize)]
pub struct NodeRef {
	path: String,
	name: String,
}

impl NodeRef {
	pub fn root() -> Self {
		Self::unchecked(ROOT_PATH.to_string())
	}

	/// Reference for an absolute path.
	pub fn new(path: impl Into<String>) -> Result<Self, PathError> {
		let path = path.into();
		validate_path(&path)?;
		Ok(Self::unchecked(path))
	}

	fn unchecked(path: String) -> Self {
		let name = last_segment(&path).to_string();
		Self { path, name }
	}

	/// Child named `name`; children of the root are `/name`.
	pub fn child(&self, name: &str) -> Self {
		Self {
			path: child_path(&self.path, name),
			name: name.to_string(),
		}
	}

	pub fn parent(&self) -> Option<Self> {
		parent_path(&self.path).map(|parent| Self::unchecked(parent.to_string()))
	}

	pub fn path(&self) -> &str {
		&self.path
	}

	/// Last path segment, or `/` for the root.
	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn is_root(&self) -> bool {
		self.path == ROOT_PATH
	}
}

impl PartialEq for NodeRef {
	fn eq(&self, other: &Self) -> bool {
		self.path == other.path
	}
}

impl Eq for NodeRef {}

impl Hash for NodeRef {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.path.hash(state);
	}
}

impl fmt::Display for NodeRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.path)
	}
}

/// Child-load status of a local node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
	/// Children never queried.
	#[default]
	Unknown,
	/// A child listing is in flight.
	Loading,
	/// Children materialized, possibly none.
	Loaded,
}

/// Snapshot of one local node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeView {
	pub node: NodeRef,
	pub status: LoadStatus,
	/// Materialized children in server order; empty unless `Loaded`.
	pub children: Vec<NodeRef>,
	/// Whether to offer an expand affordance. `Unknown` nodes are expandable
	/// until a probe or load proves otherwise.
	pub expandable: bool,
}

impl NodeView {
	/// A loaded node without children.
	pub fn is_leaf(&self) -> bool {
		self.status == LoadStatus::Loaded && self.children.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn root_children_do_not_double_the_slash() {
		let root = NodeRef::root();
		assert_eq!(root.name(), "/");
		assert!(root.is_root());

		let child = root.child("a");
		assert_eq!(child.path(), "/a");
		assert_eq!(child.name(), "a");
		assert_eq!(child.child("b").path(), "/a/b");
	}

	#[test]
	fn equality_is_by_path() {
		let built = NodeRef::root().child("a").child("b");
		let parsed = NodeRef::new("/a/b").unwrap();
		assert_eq!(built, parsed);
		assert_eq!(parsed.name(), "b");
		assert_eq!(parsed.parent(), Some(NodeRef::new("/a").unwrap()));
		assert_eq!(NodeRef::new("/a").unwrap().parent(), Some(NodeRef::root()));
		assert_eq!(NodeRef::root().parent(), None);
	}

	#[test]
	fn rejects_relative_paths() {
		assert!(NodeRef::new("a/b").is_err());
		assert!(NodeRef::new("/a//b").is_err());
	}
}
