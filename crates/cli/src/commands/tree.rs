//! `tree`: level-by-level subtree rendering.

use tokio::task::JoinSet;
use tracing::{debug, warn};
use zkb::{BrowseSession, NodeRef, runtime};

use super::{reveal, with_session};
use crate::context::CommandContext;
use crate::error::{CliError, Result};
use crate::output::TreeEntry;

pub async fn execute(ctx: &CommandContext, path: &str, depth: usize) -> Result<TreeEntry> {
	let node = NodeRef::new(path)?;
	with_session(ctx, |session| async move { walk(&session, &node, depth).await }).await
}

/// Loads `depth` levels below `node`, one level at a time with the siblings
/// of a level expanded concurrently, then snapshots the subtree.
pub(crate) async fn walk(session: &BrowseSession, node: &NodeRef, depth: usize) -> Result<TreeEntry> {
	reveal(session, node).await?;

	let mut level = vec![node.clone()];
	for current in 0..depth {
		if level.is_empty() {
			break;
		}
		debug!(target = "zkb.cli", level = current, nodes = level.len(), "expanding level");

		let mut expansions = JoinSet::new();
		for parent in level.drain(..) {
			let session = session.clone();
			expansions.spawn(async move {
				let outcome = session.expand(&parent).await;
				(parent, outcome)
			});
		}

		while let Some(joined) = expansions.join_next().await {
			let (parent, outcome) = joined.map_err(|err| zkb::Error::WorkerFailed(err.to_string()))?;
			match outcome {
				Ok(children) => level.extend(children),
				// The starting node must exist; anything below may vanish mid-walk.
				Err(err) if current > 0 && vanished(&err) => {
					warn!(target = "zkb.cli", node = %parent, error = %err, "node disappeared during walk");
				}
				Err(err) => return Err(err.into()),
			}
		}
	}

	let tree = session.tree();
	let view = tree.get(node).ok_or_else(|| CliError::from(zkb::Error::UnknownNode(node.path().to_string())))?;
	Ok(TreeEntry::build(&view, &|child: &NodeRef| tree.get(child)))
}

fn vanished(err: &zkb::Error) -> bool {
	matches!(err.client(), Some(runtime::Error::NoNode { .. }))
}

#[cfg(test)]
mod tests {
	use zkb::LoadStatus;

	use super::*;
	use crate::commands::testing;

	#[tokio::test]
	async fn depth_limits_how_far_the_walk_goes() {
		let (session, _coordinator) = testing::session().await;
		let tree = walk(&session, &NodeRef::root(), 1).await.unwrap();

		let names: Vec<_> = tree.children.iter().map(|child| child.name.as_str()).collect();
		assert_eq!(names, vec!["app", "zookeeper"]);
		let app = &tree.children[0];
		assert_eq!(app.status, LoadStatus::Unknown);
		assert!(app.children.is_empty());
	}

	#[tokio::test]
	async fn deeper_walk_materializes_grandchildren() {
		let (session, _coordinator) = testing::session().await;
		let tree = walk(&session, &NodeRef::new("/app").unwrap(), 2).await.unwrap();

		assert_eq!(tree.path, "/app");
		let locks = tree.children.iter().find(|child| child.name == "locks").unwrap();
		assert_eq!(locks.status, LoadStatus::Loaded);
		assert_eq!(locks.children[0].path, "/app/locks/l-1");
		assert_eq!(locks.children[0].status, LoadStatus::Unknown);

		let config = tree.children.iter().find(|child| child.name == "config").unwrap();
		assert_eq!(config.status, LoadStatus::Loaded);
		assert!(config.children.is_empty());
	}

	#[tokio::test]
	async fn zero_depth_renders_only_the_start_node() {
		let (session, _coordinator) = testing::session().await;
		let tree = walk(&session, &NodeRef::new("/app/locks").unwrap(), 0).await.unwrap();
		assert_eq!(tree.path, "/app/locks");
		assert!(tree.children.is_empty());
	}

	#[tokio::test]
	async fn missing_start_node_fails() {
		let (session, _coordinator) = testing::session().await;
		assert!(walk(&session, &NodeRef::new("/absent").unwrap(), 2).await.is_err());
	}
}
