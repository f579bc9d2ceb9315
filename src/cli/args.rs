//! CLI argument definitions using clap
//!
//! Commands:
//! - slotanchor create --config <path> --role <role> --slot <name> --plugin <plugin>
//!   --lsn <X/X> [--temporary] [--force]
//! - slotanchor drop --config <path> --role <role> --slot <name>
//! - slotanchor list --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::types::Lsn;

/// slotanchor - create logical replication slots at a chosen LSN
#[derive(Parser, Debug)]
#[command(name = "slotanchor")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a logical replication slot anchored at an LSN
    Create {
        /// Path to configuration file
        #[arg(long, default_value = "./slotanchor.json")]
        config: PathBuf,

        /// Role the session runs as
        #[arg(long)]
        role: String,

        /// Name of the new slot
        #[arg(long)]
        slot: String,

        /// Output plugin
        #[arg(long)]
        plugin: String,

        /// Anchor position, e.g. 16/B374D848
        #[arg(long)]
        lsn: Lsn,

        /// Drop the slot when the session ends
        #[arg(long)]
        temporary: bool,

        /// Skip the timeline guard
        #[arg(long)]
        force: bool,
    },

    /// Drop a replication slot
    Drop {
        /// Path to configuration file
        #[arg(long, default_value = "./slotanchor.json")]
        config: PathBuf,

        /// Role the session runs as
        #[arg(long)]
        role: String,

        /// Slot to drop
        #[arg(long)]
        slot: String,
    },

    /// List replication slots
    List {
        /// Path to configuration file
        #[arg(long, default_value = "./slotanchor.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
