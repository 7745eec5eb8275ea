//! # linkdb CLI Module
//!
//! This module implements the CLI interface for linkdb.
//!
//! ## Available Commands
//!
//! - `query` - Run a restriction/substitution query
//! - `structure` - Show the nested structure of a link
//! - `list` - Print every link
//! - `status` - Show database status (default)
//! - `init` - Initialize new database
//! - `export` - Export links to a snapshot file
//! - `import` - Import links from a snapshot file

mod commands;

use crate::config::{Backend, Overrides, Settings};
use clap::{Parser, Subcommand};
use linkdb_core::LinkError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// linkdb - associative triple store
///
/// Every link is a triple `(index: source target)`. Queries rewrite the
/// links matching a restriction into a substitution.
#[derive(Parser, Debug)]
#[command(name = "linkdb")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log every engine step (solver, planner, executor)
    #[arg(short, long, global = true)]
    pub trace: bool,

    /// Path to the links database [default: db.links]
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend [default: redb]
    #[arg(short = 'B', long, global = true, value_enum)]
    pub backend: Option<Backend>,

    /// Config file [default: ./linkdb.toml if present]
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Flags that override the config file.
    #[must_use]
    pub fn overrides(&self) -> Overrides {
        Overrides {
            database: self.database.clone(),
            backend: self.backend,
            json: self.json_mode,
        }
    }
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a query, e.g. `'(($i: $s $t)) (($i: $t $s))'`
    Query {
        /// Query text: `(restriction) (substitution)`
        query: String,

        /// Print all links before the query runs
        #[arg(long)]
        before: bool,

        /// Print the changes the query made
        #[arg(long)]
        changes: bool,

        /// Print all links after the query ran
        #[arg(long)]
        after: bool,

        /// Print the raw event log instead of simplified changes
        #[arg(long)]
        raw: bool,
    },

    /// Show the nested structure of a link
    Structure {
        /// Link index
        index: u64,
    },

    /// Print every link
    List,

    /// Show database status
    Status,

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Export links to a snapshot file
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Replace all links with the content of a snapshot file
    Import {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with resolved settings.
pub fn execute(command: Option<Commands>, settings: &Settings) -> Result<(), LinkError> {
    match command {
        Some(Commands::Query {
            query,
            before,
            changes,
            after,
            raw,
        }) => cmd_query(
            settings,
            &query,
            QueryOutput {
                before,
                changes,
                after,
                raw,
            },
        ),
        Some(Commands::Structure { index }) => cmd_structure(settings, index),
        Some(Commands::List) => cmd_list(settings),
        Some(Commands::Status) => cmd_status(settings),
        Some(Commands::Init { force }) => cmd_init(settings, force),
        Some(Commands::Export { output }) => cmd_export(settings, &output),
        Some(Commands::Import { input }) => cmd_import(settings, &input),
        None => {
            // No subcommand - show status by default
            cmd_status(settings)
        }
    }
}
