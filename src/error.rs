//! Error types for harness operations.
//!
//! Defines the error types for the orchestration core:
//! - Configuration problems (conflicting filters, unknown languages)
//! - Corpus integrity (missing, malformed, or mixed `outputs`)
//! - Document I/O (corpus, launch configs, result persistence)
//!
//! Driver-level failures live in [`crate::driver::DriverError`] and are
//! wrapped here when they propagate out of the orchestrator loop.

use std::path::PathBuf;

use thiserror::Error;

use crate::driver::DriverError;

/// Errors that abort a harness run.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("No driver registered for language '{language}' (prompt '{prompt}')")]
    UnknownLanguage { language: String, prompt: String },

    #[error("Prompt '{0}' has no language")]
    MissingLanguage(String),

    #[error("Conflicting options: {0}")]
    ConflictingOptions(String),

    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error(transparent)]
    InvalidPrompt(#[from] InvalidPromptError),

    #[error("Driver for prompt '{prompt}' left outputs in an invalid state: {reason}")]
    DriverContract { prompt: String, reason: String },

    #[error("Driver failed on prompt '{prompt}': {source}")]
    Driver {
        prompt: String,
        #[source]
        source: DriverError,
    },

    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write results to '{path}': {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A prompt whose `outputs` field cannot be classified.
///
/// A corrupt prompt makes the whole batch untrustworthy, so these are fatal
/// for the run rather than skipped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidPromptError {
    #[error("Prompt '{prompt}' does not have any outputs")]
    MissingOutputs { prompt: String },

    #[error("Prompt '{prompt}' has an outputs field that is not a list")]
    NotAList { prompt: String },

    #[error("Prompt '{prompt}' mixes raw candidates and executed results in its outputs")]
    MixedOutputs { prompt: String },

    #[error("Prompt '{prompt}' has an unrecognized output at index {index}")]
    UnrecognizedOutput { prompt: String, index: usize },
}

/// Convenience alias for harness results.
pub type Result<T> = std::result::Result<T, HarnessError>;
