//! codegen-harness CLI entry point.
//!
//! Initializes logging and delegates to the CLI module for command handling.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments first to get the log level
    let cli = codegen_harness::cli::parse_cli();

    // Priority: RUST_LOG env var > --log CLI arg > default "info".
    // Logs go to stderr; stdout is reserved for the results document.
    let log_filter = cli.log_level.as_filter();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_filter)))
        .init();

    codegen_harness::cli::run_with_cli(cli).await
}
