use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "zkb")]
#[command(about = "Browse a ZooKeeper namespace from the command line")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug, -vvv trace)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	#[command(flatten)]
	pub global: GlobalArgs,

	#[command(subcommand)]
	pub command: Commands,
}

/// Connection and output options shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
	/// Server to connect to (host[:port]); falls back to ZKB_SERVER, then profiles
	#[arg(short, long, global = true, value_name = "HOST:PORT")]
	pub server: Option<String>,

	/// Saved profile to connect with
	#[arg(short, long, global = true, value_name = "ALIAS")]
	pub profile: Option<String>,

	/// Profile store location (defaults to ZKB_PROFILES or the user config dir)
	#[arg(long, global = true, value_name = "FILE")]
	pub profiles: Option<PathBuf>,

	/// Connect timeout in seconds
	#[arg(long, global = true, value_name = "SECS")]
	pub timeout: Option<u64>,

	/// Output format
	#[arg(short = 'f', long, global = true, value_enum, default_value_t = OutputFormat::Text)]
	pub format: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// List the children of a node
	Ls {
		#[arg(default_value = "/")]
		path: String,
	},

	/// Print the subtree below a node, loading one level at a time
	Tree {
		#[arg(default_value = "/")]
		path: String,
		/// Levels to load below the node
		#[arg(short, long, default_value_t = 2)]
		depth: usize,
	},

	/// Show a node's data and metadata
	Get { path: String },

	/// Show a node's metadata
	Stat { path: String },

	/// Create a node
	Create {
		path: String,
		/// Initial data (UTF-8)
		data: Option<String>,
		/// Tie the node to this command's session
		#[arg(long)]
		ephemeral: bool,
		/// Append a monotonically increasing suffix to the name
		#[arg(long)]
		sequential: bool,
	},

	/// Replace a node's data
	Set {
		path: String,
		data: String,
		/// Expected data version
		#[arg(long)]
		version: Option<i32>,
	},

	/// Delete a node
	#[command(alias = "delete")]
	Rm {
		path: String,
		/// Expected data version
		#[arg(long)]
		version: Option<i32>,
	},

	/// Interactive browsing shell
	Browse,

	/// Manage saved connection profiles
	Profile {
		#[command(subcommand)]
		action: ProfileAction,
	},
}

#[derive(Subcommand, Debug)]
pub enum ProfileAction {
	/// List saved profiles
	#[command(alias = "ls")]
	List,

	/// Save a profile
	Add {
		alias: String,
		/// host[:port]
		server: String,
		/// Make this the default profile
		#[arg(long)]
		default: bool,
	},

	/// Remove a profile
	#[command(alias = "rm")]
	Remove { alias: String },

	/// Mark a profile as the default
	#[command(name = "default")]
	SetDefault { alias: String },
}

impl Commands {
	/// Name reported in result envelopes.
	pub fn name(&self) -> &'static str {
		match self {
			Commands::Ls { .. } => "ls",
			Commands::Tree { .. } => "tree",
			Commands::Get { .. } => "get",
			Commands::Stat { .. } => "stat",
			Commands::Create { .. } => "create",
			Commands::Set { .. } => "set",
			Commands::Rm { .. } => "rm",
			Commands::Browse => "browse",
			Commands::Profile { action } => match action {
				ProfileAction::List => "profile.list",
				ProfileAction::Add { .. } => "profile.add",
				ProfileAction::Remove { .. } => "profile.remove",
				ProfileAction::SetDefault { .. } => "profile.default",
			},
		}
	}
}
