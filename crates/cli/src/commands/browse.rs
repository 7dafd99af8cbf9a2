//! Interactive browsing shell.
//!
//! `expand` is two-phase: the shell returns to the prompt at once and the
//! result is printed when the tree announces it.

use std::io::Write;
use std::time::Instant;

use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::debug;
use zkb::protocol::PathError;
use zkb::runtime::ConnectionDescriptor;
use zkb::{BrowseSession, ExpandRequest, NodeRef, TreeEvent};

use super::{nodes, reveal};
use crate::context::CommandContext;
use crate::error::{CliError, Result};
use crate::output::{self, CommandResult, Listing, OutputFormat, ProbeOutcome, StateReport};

const HELP: &str = "\
commands:
  ls [PATH]        list children
  cd PATH          change the current node (.. and relative paths work)
  expand [PATH]    load children in the background
  probe [PATH]     check whether a node has children
  refresh [PATH]   reload a node's children, or the whole tree
  get [PATH]       show data and metadata
  stat [PATH]      show metadata
  state            show the session state
  reconnect        close and reopen the session
  quit             leave the shell
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
	Ls(Option<String>),
	Cd(String),
	Expand(Option<String>),
	Probe(Option<String>),
	Refresh(Option<String>),
	Get(Option<String>),
	Stat(Option<String>),
	State,
	Reconnect,
	Help,
	Quit,
	Empty,
}

impl ShellCommand {
	pub fn parse(line: &str) -> std::result::Result<Self, String> {
		let mut words = line.split_whitespace();
		let Some(verb) = words.next() else {
			return Ok(ShellCommand::Empty);
		};
		let arg = words.next().map(str::to_string);
		if let Some(extra) = words.next() {
			return Err(format!("unexpected argument: {extra}"));
		}

		let command = match verb {
			"ls" => ShellCommand::Ls(arg),
			"cd" => ShellCommand::Cd(arg.unwrap_or_else(|| "/".to_string())),
			"expand" => ShellCommand::Expand(arg),
			"probe" => ShellCommand::Probe(arg),
			"refresh" => ShellCommand::Refresh(arg),
			"get" => ShellCommand::Get(arg),
			"stat" => ShellCommand::Stat(arg),
			"state" if arg.is_none() => ShellCommand::State,
			"reconnect" if arg.is_none() => ShellCommand::Reconnect,
			"help" | "?" => ShellCommand::Help,
			"quit" | "exit" => ShellCommand::Quit,
			other => return Err(format!("unknown command: {other} (try help)")),
		};
		Ok(command)
	}

	fn name(&self) -> &'static str {
		match self {
			ShellCommand::Ls(_) => "browse.ls",
			ShellCommand::Cd(_) => "browse.cd",
			ShellCommand::Expand(_) => "browse.expand",
			ShellCommand::Probe(_) => "browse.probe",
			ShellCommand::Refresh(_) => "browse.refresh",
			ShellCommand::Get(_) => "browse.get",
			ShellCommand::Stat(_) => "browse.stat",
			ShellCommand::State => "browse.state",
			ShellCommand::Reconnect => "browse.reconnect",
			ShellCommand::Help => "browse.help",
			ShellCommand::Quit => "browse.quit",
			ShellCommand::Empty => "browse",
		}
	}
}

/// Resolves `arg` against `cwd`. Handles absolute paths, `.` and `..`.
pub fn resolve_path(cwd: &NodeRef, arg: &str) -> std::result::Result<NodeRef, PathError> {
	let mut current = if arg.starts_with('/') { NodeRef::root() } else { cwd.clone() };
	for segment in arg.split('/').filter(|segment| !segment.is_empty()) {
		current = match segment {
			"." => current,
			".." => current.parent().unwrap_or(current),
			name => NodeRef::new(current.child(name).path())?,
		};
	}
	Ok(current)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
	Continue,
	Quit,
}

struct Shell {
	session: BrowseSession,
	descriptor: ConnectionDescriptor,
	cwd: NodeRef,
	format: OutputFormat,
}

impl Shell {
	fn new(session: BrowseSession, descriptor: ConnectionDescriptor, format: OutputFormat) -> Self {
		Self {
			session,
			descriptor,
			cwd: NodeRef::root(),
			format,
		}
	}

	fn target(&self, arg: Option<&str>) -> Result<NodeRef> {
		match arg {
			Some(arg) => Ok(resolve_path(&self.cwd, arg)?),
			None => Ok(self.cwd.clone()),
		}
	}

	async fn handle(&mut self, command: &ShellCommand) -> Result<Flow> {
		let name = command.name();
		match command {
			ShellCommand::Empty => {}
			ShellCommand::Help => print!("{HELP}"),
			ShellCommand::Quit => return Ok(Flow::Quit),
			ShellCommand::Ls(arg) => {
				let node = self.target(arg.as_deref())?;
				let listing = nodes::list(&self.session, &node).await?;
				self.show(name, listing);
			}
			ShellCommand::Cd(arg) => {
				let node = self.target(Some(arg.as_str()))?;
				reveal(&self.session, &node).await?;
				self.cwd = node;
			}
			ShellCommand::Expand(arg) => {
				let node = self.target(arg.as_deref())?;
				reveal(&self.session, &node).await?;
				match self.session.request_expand(&node)? {
					ExpandRequest::Ready(children) => self.show(name, listing(&node, &children)),
					ExpandRequest::Pending => self.note(&format!("loading {node}")),
					ExpandRequest::InFlight => self.note(&format!("{node} is already loading")),
				}
			}
			ShellCommand::Probe(arg) => {
				let node = self.target(arg.as_deref())?;
				reveal(&self.session, &node).await?;
				let has_children = self.session.probe_has_children(&node).await?;
				self.show(
					name,
					ProbeOutcome {
						path: node.path().to_string(),
						has_children,
					},
				);
			}
			ShellCommand::Refresh(None) => {
				let children = self.session.refresh_root().await?;
				self.cwd = NodeRef::root();
				self.show(name, listing(&self.cwd, &children));
			}
			ShellCommand::Refresh(Some(arg)) => {
				let node = self.target(Some(arg.as_str()))?;
				reveal(&self.session, &node).await?;
				self.session.force_refresh(&node)?;
				let children = self.session.expand(&node).await?;
				self.show(name, listing(&node, &children));
			}
			ShellCommand::Get(arg) => {
				let node = self.target(arg.as_deref())?;
				let detail = nodes::detail(&self.session, &node).await?;
				self.show(name, detail);
			}
			ShellCommand::Stat(arg) => {
				let node = self.target(arg.as_deref())?;
				let metadata = nodes::metadata(&self.session, &node).await?;
				self.show(name, metadata);
			}
			ShellCommand::State => self.show(name, self.report()),
			ShellCommand::Reconnect => {
				self.session.connect(self.descriptor.clone()).await?;
				self.cwd = NodeRef::root();
				self.show(name, self.report());
			}
		}
		Ok(Flow::Continue)
	}

	fn report(&self) -> StateReport {
		StateReport::new(self.descriptor.to_string(), self.session.state(), self.session.tree().node_count())
	}

	fn show<T: serde::Serialize + std::fmt::Display>(&self, name: &str, data: T) {
		output::print_result(self.format, &CommandResult::success(name, data));
	}

	fn note(&self, message: &str) {
		if self.format == OutputFormat::Text {
			println!("{}", message.dimmed());
		}
	}

	fn prompt(&self) {
		if self.format == OutputFormat::Text {
			print!("{}{} ", self.cwd.path().cyan(), ">".bold());
			let _ = std::io::stdout().flush();
		}
	}
}

fn listing(node: &NodeRef, children: &[NodeRef]) -> Listing {
	Listing {
		path: node.path().to_string(),
		children: children.iter().map(|child| child.name().to_string()).collect(),
	}
}

/// Prints tree and session changes as they happen.
fn spawn_notifier(session: &BrowseSession, format: OutputFormat) -> JoinHandle<()> {
	let mut events = session.subscribe();
	let mut states = session.subscribe_state();
	tokio::spawn(async move {
		loop {
			tokio::select! {
				event = events.recv() => match event {
					Ok(event) => print_event(format, &event),
					Err(RecvError::Lagged(skipped)) => debug!(target = "zkb.cli", skipped, "notifier lagged"),
					Err(RecvError::Closed) => return,
				},
				changed = states.changed() => {
					if changed.is_err() {
						return;
					}
					let state = *states.borrow_and_update();
					if format == OutputFormat::Text {
						println!("\n{} {}", "session".dimmed(), state.to_string().yellow());
					}
				}
			}
		}
	})
}

fn print_event(format: OutputFormat, event: &TreeEvent) {
	match format {
		OutputFormat::Json => {
			if let Ok(line) = serde_json::to_string(event) {
				println!("{line}");
			}
		}
		OutputFormat::Text => match event {
			TreeEvent::Expanded { node, children } => println!("\n{} {node}: {children} children", "loaded".green()),
			TreeEvent::ExpandFailed { node, error } => println!("\n{} {node}: {error}", "failed".red()),
			TreeEvent::Reset { .. } | TreeEvent::Loading { .. } | TreeEvent::Cleared { .. } => {}
		},
	}
}

pub async fn execute(ctx: &CommandContext) -> Result<()> {
	let started = Instant::now();
	let (descriptor, _) = ctx.resolve_server()?;
	let session = ctx.new_session();
	if let Err(err) = session.connect(descriptor.clone()).await {
		let err = CliError::from(err);
		output::print_error(ctx.format, "browse", &err, started.elapsed());
		return Err(err);
	}

	let notifier = spawn_notifier(&session, ctx.format);
	let mut shell = Shell::new(session.clone(), descriptor, ctx.format);
	if ctx.format == OutputFormat::Text {
		println!("connected to {} ({}); type help for commands", shell.descriptor, session.state());
	}

	let mut lines = BufReader::new(tokio::io::stdin()).lines();
	loop {
		shell.prompt();
		let Some(line) = lines.next_line().await? else {
			break;
		};
		let command = match ShellCommand::parse(&line) {
			Ok(command) => command,
			Err(message) => {
				output::print_error(ctx.format, "browse", &CliError::InvalidInput(message), started.elapsed());
				continue;
			}
		};

		let began = Instant::now();
		match shell.handle(&command).await {
			Ok(Flow::Quit) => break,
			Ok(Flow::Continue) => {}
			Err(err) => output::print_error(ctx.format, command.name(), &err, began.elapsed()),
		}
	}

	notifier.abort();
	session.disconnect().await;
	Ok(())
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use zkb::LoadStatus;

	use super::*;
	use crate::commands::testing;
	use crate::output::ErrorCode;

	fn shell(session: BrowseSession) -> Shell {
		Shell::new(session, ConnectionDescriptor::new("memory", 2181), OutputFormat::Json)
	}

	#[test]
	fn parses_commands_and_arguments() {
		assert_eq!(ShellCommand::parse("  ").unwrap(), ShellCommand::Empty);
		assert_eq!(ShellCommand::parse("ls").unwrap(), ShellCommand::Ls(None));
		assert_eq!(ShellCommand::parse("ls /app").unwrap(), ShellCommand::Ls(Some("/app".into())));
		assert_eq!(ShellCommand::parse("cd").unwrap(), ShellCommand::Cd("/".into()));
		assert_eq!(ShellCommand::parse("exit").unwrap(), ShellCommand::Quit);
		assert!(ShellCommand::parse("ls a b").is_err());
		assert!(ShellCommand::parse("state now").is_err());
		assert!(ShellCommand::parse("frobnicate").is_err());
	}

	#[test]
	fn resolves_relative_and_parent_paths() {
		let cwd = NodeRef::new("/app/locks").unwrap();
		assert_eq!(resolve_path(&cwd, "l-1").unwrap().path(), "/app/locks/l-1");
		assert_eq!(resolve_path(&cwd, "..").unwrap().path(), "/app");
		assert_eq!(resolve_path(&cwd, "../config").unwrap().path(), "/app/config");
		assert_eq!(resolve_path(&cwd, "/zookeeper/./quota").unwrap().path(), "/zookeeper/quota");
		assert_eq!(resolve_path(&NodeRef::root(), "../..").unwrap().path(), "/");
		assert_eq!(resolve_path(&cwd, ".").unwrap(), cwd);
	}

	#[tokio::test]
	async fn cd_moves_into_existing_nodes_only() {
		let (session, _coordinator) = testing::session().await;
		let mut shell = shell(session);

		shell.handle(&ShellCommand::Cd("app/locks".into())).await.unwrap();
		assert_eq!(shell.cwd.path(), "/app/locks");

		let err = shell.handle(&ShellCommand::Cd("../nope".into())).await.unwrap_err();
		assert_eq!(err.code(), ErrorCode::NoNode);
		assert_eq!(shell.cwd.path(), "/app/locks");
	}

	#[tokio::test]
	async fn expand_completes_in_the_background() {
		let (session, _coordinator) = testing::session().await;
		let mut events = session.subscribe();
		let mut shell = shell(session.clone());
		let app = NodeRef::new("/app").unwrap();

		shell.handle(&ShellCommand::Expand(Some("/app".into()))).await.unwrap();

		let expanded = tokio::time::timeout(Duration::from_secs(5), async {
			loop {
				if let Ok(TreeEvent::Expanded { node, children }) = events.recv().await {
					if node == app {
						return children;
					}
				}
			}
		})
		.await
		.unwrap();
		assert_eq!(expanded, 2);
		assert_eq!(session.tree().status(&app), Some(LoadStatus::Loaded));
	}

	#[tokio::test]
	async fn refresh_reloads_a_node_from_the_server() {
		let (session, coordinator) = testing::session().await;
		let mut shell = shell(session.clone());
		let locks = NodeRef::new("/app/locks").unwrap();

		shell.handle(&ShellCommand::Ls(Some("/app/locks".into()))).await.unwrap();
		coordinator.seed("/app/locks/l-2", "");
		shell.handle(&ShellCommand::Refresh(Some("/app/locks".into()))).await.unwrap();

		assert_eq!(session.tree().children(&locks).unwrap().len(), 2);
	}

	#[tokio::test]
	async fn reconnect_reopens_the_session() {
		let (session, coordinator) = testing::session().await;
		let mut shell = shell(session.clone());

		shell.handle(&ShellCommand::Cd("/app".into())).await.unwrap();
		shell.handle(&ShellCommand::Reconnect).await.unwrap();

		assert!(session.is_connected());
		assert_eq!(shell.cwd, NodeRef::root());
		assert_eq!(coordinator.sessions_opened(), 2);
		assert_eq!(coordinator.open_handles(), 1);
	}

	#[tokio::test]
	async fn quit_stops_the_loop() {
		let (session, _coordinator) = testing::session().await;
		let mut shell = shell(session);
		assert_eq!(shell.handle(&ShellCommand::Quit).await.unwrap(), Flow::Quit);
		assert_eq!(shell.handle(&ShellCommand::State).await.unwrap(), Flow::Continue);
	}
}
