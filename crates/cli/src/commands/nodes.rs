//! Read-only node commands.

use zkb::{BrowseSession, NodeRef, runtime};

use super::{reveal, with_session};
use crate::context::CommandContext;
use crate::error::Result;
use crate::output::{Listing, NodeDetail, NodeMetadata, StatView};

pub async fn ls(ctx: &CommandContext, path: &str) -> Result<Listing> {
	let node = NodeRef::new(path)?;
	with_session(ctx, |session| async move { list(&session, &node).await }).await
}

pub async fn get(ctx: &CommandContext, path: &str) -> Result<NodeDetail> {
	let node = NodeRef::new(path)?;
	with_session(ctx, |session| async move { detail(&session, &node).await }).await
}

pub async fn stat(ctx: &CommandContext, path: &str) -> Result<NodeMetadata> {
	let node = NodeRef::new(path)?;
	with_session(ctx, |session| async move { metadata(&session, &node).await }).await
}

/// Children of `node`, expanding its ancestors on the way down.
pub(crate) async fn list(session: &BrowseSession, node: &NodeRef) -> Result<Listing> {
	reveal(session, node).await?;
	let children = session.expand(node).await?;
	Ok(Listing {
		path: node.path().to_string(),
		children: children.iter().map(|child| child.name().to_string()).collect(),
	})
}

pub(crate) async fn detail(session: &BrowseSession, node: &NodeRef) -> Result<NodeDetail> {
	let payload = session.read_node(node).await?;
	Ok(NodeDetail::new(node.path(), &payload))
}

pub(crate) async fn metadata(session: &BrowseSession, node: &NodeRef) -> Result<NodeMetadata> {
	let stat = session.read_metadata(node).await?.ok_or_else(|| runtime::Error::NoNode {
		path: node.path().to_string(),
	})?;
	Ok(NodeMetadata {
		path: node.path().to_string(),
		stat: StatView::from(stat),
	})
}
