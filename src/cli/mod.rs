//! CLI module for the connector
//!
//! Provides command-line interface for:
//! - serve: load configuration and serve the RPCs over HTTP
//! - check-config: validate configuration and catalogs
//! - describe / list-splits / read-splits: one-shot in-process requests

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, KindArg};
pub use commands::{check_config, describe, list_splits, read_splits, run_command, serve};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{parse_request, read_request, write_json};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli.command)
}
