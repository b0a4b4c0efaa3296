//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Apply STATE-DELTA blocks to a JSON resource state file
#[derive(Parser, Debug)]
#[command(name = "tally")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Override the state file path from config
    #[arg(short, long, value_name = "FILE", global = true)]
    pub state: Option<PathBuf>,

    /// Run in verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// What to do
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Parse a STATE-DELTA block and print the resulting batch
    Parse {
        /// Text containing the block; standard input when omitted or `-`
        input: Option<PathBuf>,
    },

    /// Parse a STATE-DELTA block and apply it to the state file
    Apply {
        /// Text containing the block; standard input when omitted or `-`
        input: Option<PathBuf>,

        /// Report the changes without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Check the state file's structure
    Validate,

    /// Print an entity's resources as JSON
    Show {
        /// Entity id
        entity: String,
    },

    /// Check whether an entity holds at least AMOUNT of a resource
    Check {
        /// Entity id
        entity: String,

        /// Resource type (`ki`, `rage`, `spell_slot`)
        resource: String,

        /// Required amount
        amount: u64,

        /// Slot level for leveled resources
        #[arg(long, default_value_t = 0)]
        level: u32,
    },

    /// Copy the state file into the backup directory
    Backup,
}
