use clap::Parser;
use tracing::error;
use zkb_cli::cli::Cli;
use zkb_cli::context::CommandContext;
use zkb_cli::{commands, logging};

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let ctx = CommandContext::new(cli.global);
	if let Err(err) = commands::dispatch(cli.command, &ctx).await {
		error!(target = "zkb.cli", error = %err, "command failed");
		std::process::exit(1);
	}
}
