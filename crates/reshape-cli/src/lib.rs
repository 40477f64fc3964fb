//! reshape CLI
//!
//! Library half of the `reshape` binary: argument definitions, configuration
//! and the subcommand bodies, kept here so they can be tested without a process.

#![warn(unreachable_pub)]

pub mod cli;
pub mod commands;
pub mod config;

pub use cli::build_cli;
pub use commands::{
    encode_records, inspect, load_evolver, migrate_records, read_records, select_codec,
    stamp_records, InspectReport, MigrateOptions, PathSummary,
};
pub use config::{CliConfig, ConfigError, OutputFormat};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
