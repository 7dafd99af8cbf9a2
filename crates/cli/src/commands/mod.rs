//! Command dispatch.

pub mod browse;
pub mod nodes;
pub mod profile;
pub mod tree;
pub mod write;

use std::fmt::Display;
use std::time::Instant;

use serde::Serialize;
use tracing::debug;
use zkb::{BrowseSession, NodeRef, runtime};

use crate::cli::{Commands, ProfileAction};
use crate::context::CommandContext;
use crate::error::Result;
use crate::output::{self, CommandResult, OutputFormat};

pub async fn dispatch(command: Commands, ctx: &CommandContext) -> Result<()> {
	let name = command.name();
	let started = Instant::now();
	debug!(target = "zkb.cli", command = name, "dispatching");

	match command {
		Commands::Ls { path } => emit(ctx.format, name, started, nodes::ls(ctx, &path).await),
		Commands::Tree { path, depth } => emit(ctx.format, name, started, tree::execute(ctx, &path, depth).await),
		Commands::Get { path } => emit(ctx.format, name, started, nodes::get(ctx, &path).await),
		Commands::Stat { path } => emit(ctx.format, name, started, nodes::stat(ctx, &path).await),
		Commands::Create {
			path,
			data,
			ephemeral,
			sequential,
		} => emit(
			ctx.format,
			name,
			started,
			write::create(ctx, &path, data.unwrap_or_default().into_bytes(), ephemeral, sequential).await,
		),
		Commands::Set { path, data, version } => emit(ctx.format, name, started, write::set(ctx, &path, data.into_bytes(), version).await),
		Commands::Rm { path, version } => emit(ctx.format, name, started, write::rm(ctx, &path, version).await),
		Commands::Browse => browse::execute(ctx).await,
		Commands::Profile { action } => match action {
			ProfileAction::List => emit(ctx.format, name, started, profile::list(ctx)),
			ProfileAction::Add { alias, server, default } => emit(ctx.format, name, started, profile::add(ctx, alias, &server, default)),
			ProfileAction::Remove { alias } => emit(ctx.format, name, started, profile::remove(ctx, &alias)),
			ProfileAction::SetDefault { alias } => emit(ctx.format, name, started, profile::set_default(ctx, &alias)),
		},
	}
}

/// Prints `outcome` and hands the error back for the exit status.
pub(crate) fn emit<T: Serialize + Display>(format: OutputFormat, command: &str, started: Instant, outcome: Result<T>) -> Result<()> {
	match outcome {
		Ok(data) => {
			output::print_result(format, &CommandResult::success(command, data).with_duration(started.elapsed()));
			Ok(())
		}
		Err(err) => {
			output::print_error(format, command, &err, started.elapsed());
			Err(err)
		}
	}
}

/// Runs `work` against a fresh session and disconnects afterwards.
pub(crate) async fn with_session<T, F, Fut>(ctx: &CommandContext, work: F) -> Result<T>
where
	F: FnOnce(BrowseSession) -> Fut,
	Fut: Future<Output = Result<T>>,
{
	let session = ctx.open_session().await?;
	let outcome = work(session.clone()).await;
	session.disconnect().await;
	outcome
}

/// Expands every ancestor of `node` so that it joins the local tree.
pub(crate) async fn reveal(session: &BrowseSession, node: &NodeRef) -> Result<()> {
	let mut chain = Vec::new();
	let mut cursor = node.parent();
	while let Some(ancestor) = cursor {
		cursor = ancestor.parent();
		chain.push(ancestor);
	}
	chain.reverse();

	for (index, ancestor) in chain.iter().enumerate() {
		let next = chain.get(index + 1).unwrap_or(node);
		let children = session.expand(ancestor).await?;
		if !children.contains(next) {
			return Err(runtime::Error::NoNode {
				path: next.path().to_string(),
			}
			.into());
		}
	}
	Ok(())
}
