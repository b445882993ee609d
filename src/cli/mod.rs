//! Command-line interface for codegen-harness.
//!
//! Provides the single run command: confirm, load, execute, persist.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, run_with_io, Cli};
