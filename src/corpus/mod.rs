//! Prompt corpus loading and result state.
//!
//! A corpus is a JSON array of prompt records. It is loaded once, mutated in
//! place as prompts are executed, and written back by the persistence layer.

pub mod prompt;
pub mod state;

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, Result};

pub use prompt::{CandidateOutput, Outputs, Prompt, ResultRecord};
pub use state::{classify, prepare, Decision, ResultState};

/// Ordered collection of prompts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Corpus {
    prompts: Vec<Prompt>,
}

impl Corpus {
    /// Creates a corpus from prompts.
    pub fn new(prompts: Vec<Prompt>) -> Self {
        Self { prompts }
    }

    /// Loads a corpus from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        load_json(path)
    }

    /// Number of prompts.
    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    /// Returns true if the corpus holds no prompts.
    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    /// Prompts in corpus order.
    pub fn prompts(&self) -> &[Prompt] {
        &self.prompts
    }

    /// Mutable access to a single prompt.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Prompt> {
        self.prompts.get_mut(index)
    }
}

/// Reads and deserializes a JSON document.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|source| HarnessError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| HarnessError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
