//! codegen-harness: build and run LLM-generated parallel code.
//!
//! Loads a corpus of prompts with generated candidates, builds and runs each
//! candidate through a per-language driver, and persists the results after
//! every prompt so that long batch runs can be resumed.

pub mod cli;
pub mod config;
pub mod corpus;
pub mod driver;
pub mod error;
pub mod filter;
pub mod model;
pub mod orchestrator;
pub mod persistence;
pub mod safety;

pub use error::{HarnessError, InvalidPromptError};
