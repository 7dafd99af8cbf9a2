//! Structured output envelope and payload models.

mod data;
mod format;
mod model;

use std::fmt::Display;
use std::time::Duration;

use colored::Colorize;
use serde::Serialize;

pub use data::*;
pub use format::OutputFormat;
pub use model::*;

use crate::error::CliError;

/// Prints a successful result: the payload as text, or the JSON envelope.
pub fn print_result<T: Serialize + Display>(format: OutputFormat, result: &CommandResult<T>) {
	match format {
		OutputFormat::Json => print_json(result),
		OutputFormat::Text => {
			if let Some(data) = &result.data {
				print!("{data}");
			}
		}
	}
}

/// Prints a failure: the JSON envelope on stdout, or a message on stderr.
pub fn print_error(format: OutputFormat, command: &str, err: &CliError, elapsed: Duration) {
	match format {
		OutputFormat::Json => {
			let result = CommandResult::<()>::failure(
				command,
				CommandError {
					code: err.code(),
					message: err.to_string(),
				},
			)
			.with_duration(elapsed);
			print_json(&result);
		}
		OutputFormat::Text => eprintln!("{}: {err}", "error".red().bold()),
	}
}

fn print_json<T: Serialize>(result: &CommandResult<T>) {
	match serde_json::to_string_pretty(result) {
		Ok(json) => println!("{json}"),
		Err(err) => eprintln!("{}: failed to encode result: {err}", "error".red().bold()),
	}
}
