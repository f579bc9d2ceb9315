//! slotanchor CLI entry point
//!
//! Parses arguments, dispatches to the CLI module, and reports failures
//! as a JSON error object with a non-zero exit status. All logic lives in
//! the CLI module.

use slotanchor::cli;

fn main() {
    if let Err(e) = cli::run() {
        let _ = cli::write_error(e.code_str(), e.message());
        std::process::exit(1);
    }
}
