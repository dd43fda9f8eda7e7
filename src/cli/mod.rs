//! CLI module for aerosearch
//!
//! Provides command-line interface for:
//! - compile: Lower a query against a store fixture
//! - search: Compile and execute against the fixture
//! - visibility: Invisible tuples for a snapshot
//! - path: Join legs between two indexes

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, LogLevel};
pub use commands::{compile, path, run, run_command, search, visibility};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_json, write_error, write_response};
