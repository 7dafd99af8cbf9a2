//! `create`, `set` and `rm`.

use tracing::info;
use zkb::protocol::CreateMode;
use zkb::{BrowseSession, NodeRef};

use super::with_session;
use crate::context::CommandContext;
use crate::error::Result;
use crate::output::{WriteAction, WriteOutcome};

pub async fn create(ctx: &CommandContext, path: &str, data: Vec<u8>, ephemeral: bool, sequential: bool) -> Result<WriteOutcome> {
	let node = NodeRef::new(path)?;
	let mode = CreateMode::from_flags(ephemeral, sequential);
	with_session(ctx, |session| async move { create_node(&session, &node, data, mode).await }).await
}

pub async fn set(ctx: &CommandContext, path: &str, data: Vec<u8>, version: Option<i32>) -> Result<WriteOutcome> {
	let node = NodeRef::new(path)?;
	with_session(ctx, |session| async move { write_node(&session, &node, data, version).await }).await
}

pub async fn rm(ctx: &CommandContext, path: &str, version: Option<i32>) -> Result<WriteOutcome> {
	let node = NodeRef::new(path)?;
	with_session(ctx, |session| async move { delete_node(&session, &node, version).await }).await
}

pub(crate) async fn create_node(session: &BrowseSession, node: &NodeRef, data: Vec<u8>, mode: CreateMode) -> Result<WriteOutcome> {
	let created = session.create_node(node, data, mode).await?;
	info!(target = "zkb.cli", path = %created, ?mode, "created node");
	Ok(WriteOutcome {
		action: WriteAction::Created,
		path: created.path().to_string(),
		version: None,
	})
}

pub(crate) async fn write_node(session: &BrowseSession, node: &NodeRef, data: Vec<u8>, version: Option<i32>) -> Result<WriteOutcome> {
	let stat = session.write_data(node, data, version).await?;
	info!(target = "zkb.cli", path = %node, version = stat.version, "updated node");
	Ok(WriteOutcome {
		action: WriteAction::Updated,
		path: node.path().to_string(),
		version: Some(stat.version),
	})
}

pub(crate) async fn delete_node(session: &BrowseSession, node: &NodeRef, version: Option<i32>) -> Result<WriteOutcome> {
	session.delete_node(node, version).await?;
	info!(target = "zkb.cli", path = %node, "deleted node");
	Ok(WriteOutcome {
		action: WriteAction::Deleted,
		path: node.path().to_string(),
		version: None,
	})
}
