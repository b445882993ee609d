//! Launch and problem-size configuration documents.
//!
//! Both documents are loaded verbatim and handed to drivers untouched; only
//! drivers interpret them.
//!
//! Launch configs are keyed by parallelism model:
//!
//! ```json
//! {
//!   "omp": {
//!     "format": "OMP_NUM_THREADS={num_threads} {exec_path} {args}",
//!     "params": [{"num_threads": 1}, {"num_threads": 8}]
//!   }
//! }
//! ```
//!
//! Problem sizes are keyed by problem name, then optionally by model:
//! `{"07_fft_fft_conjugate": {"serial": "(1<<18)", "cuda": "(1<<22)"}}`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::corpus::load_json;
use crate::error::Result;
use crate::model::ParallelismModel;

use super::DriverError;

/// Launch configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LaunchConfigs(pub Value);

impl LaunchConfigs {
    /// Loads the document from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        load_json(path).map(Self)
    }

    /// Launch spec for one model.
    pub fn for_model(
        &self,
        model: ParallelismModel,
    ) -> std::result::Result<LaunchSpec, DriverError> {
        let entry = self
            .0
            .get(model.as_str())
            .ok_or(DriverError::MissingLaunchConfig(model))?;
        let mut spec: LaunchSpec = serde_json::from_value(entry.clone()).map_err(|e| {
            DriverError::InvalidLaunchConfig {
                model,
                reason: e.to_string(),
            }
        })?;
        if spec.params.is_empty() {
            spec.params.push(BTreeMap::new());
        }
        Ok(spec)
    }
}

/// How to launch a built program for one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchSpec {
    /// Shell command template.
    pub format: String,
    /// One entry per run configuration.
    #[serde(default)]
    pub params: Vec<BTreeMap<String, Value>>,
}

impl LaunchSpec {
    /// Renders the command for one parameter set.
    ///
    /// `{exec_path}` and `{args}` are always substituted; every parameter
    /// key is substituted as `{key}`.
    pub fn render(&self, exec_path: &Path, args: &str, params: &BTreeMap<String, Value>) -> String {
        let mut command = self
            .format
            .replace("{exec_path}", &exec_path.display().to_string())
            .replace("{args}", args);
        for (key, value) in params {
            command = command.replace(&format!("{{{}}}", key), &value_to_arg(value));
        }
        command.trim().to_string()
    }
}

fn value_to_arg(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Problem-size document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProblemSizes(pub Value);

impl ProblemSizes {
    /// Loads the document from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        load_json(path).map(Self)
    }

    /// Size expression for a problem under a model.
    ///
    /// A per-model entry wins; a plain value applies to every model.
    pub fn size_for(&self, problem: &str, model: ParallelismModel) -> Option<String> {
        match self.0.get(problem)? {
            Value::Object(by_model) => by_model.get(model.as_str()).map(value_to_arg),
            Value::Null => None,
            other => Some(value_to_arg(other)),
        }
    }
}
