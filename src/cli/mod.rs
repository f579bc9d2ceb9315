//! CLI module for slotanchor
//!
//! Provides command-line interface for:
//! - create: Create an anchored logical slot
//! - drop: Drop a slot
//! - list: List slots

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{create, drop_slot, execute, list, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    run_command(Cli::parse_args().command)
}
