//! CLI argument definitions using clap
//!
//! Commands:
//! - aerosearch compile --store <path> --index <name> --query <path>
//! - aerosearch search --store <path> --index <name> --query <path>
//! - aerosearch visibility --store <path> --index <name> --snapshot <path>
//! - aerosearch path --store <path> --index <name> --from <index> --to <index>

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::observability::Severity;

/// aerosearch - MVCC-aware query compiler for a sharded search store
#[derive(Parser, Debug)]
#[command(name = "aerosearch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Lowest severity written to stderr
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Severity {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Severity::Trace,
            LogLevel::Info => Severity::Info,
            LogLevel::Warn => Severity::Warn,
            LogLevel::Error => Severity::Error,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile a query into the store's query form
    Compile {
        /// Store fixture (JSON)
        #[arg(long)]
        store: PathBuf,

        /// Home index the query runs against
        #[arg(long)]
        index: String,

        /// Query expression (JSON); read from stdin when omitted
        #[arg(long)]
        query: Option<PathBuf>,

        /// Transaction snapshot (JSON)
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Compiler configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Include the rendered optimized tree
        #[arg(long)]
        explain: bool,
    },

    /// Compile a query and run it against the store fixture
    Search {
        /// Store fixture (JSON)
        #[arg(long)]
        store: PathBuf,

        /// Home index the query runs against
        #[arg(long)]
        index: String,

        /// Query expression (JSON); read from stdin when omitted
        #[arg(long)]
        query: Option<PathBuf>,

        /// Transaction snapshot (JSON)
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Compiler configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List the tuples of an index a snapshot cannot see
    Visibility {
        /// Store fixture (JSON)
        #[arg(long)]
        store: PathBuf,

        /// Index to scan
        #[arg(long)]
        index: String,

        /// Transaction snapshot (JSON)
        #[arg(long)]
        snapshot: PathBuf,
    },

    /// Show the join legs between two indexes
    Path {
        /// Store fixture (JSON)
        #[arg(long)]
        store: PathBuf,

        /// Home index whose links are loaded
        #[arg(long)]
        index: String,

        /// Index the walk ends in
        #[arg(long)]
        from: String,

        /// Index the walk starts from
        #[arg(long)]
        to: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
