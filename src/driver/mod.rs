//! Drivers that build and run generated candidates.
//!
//! Each driver knows how to:
//! 1. Turn a candidate into a buildable program for one parallelism model
//! 2. Build it under a timeout
//! 3. Run it under every launch configuration for that model
//! 4. Record the outcome as a [`ResultRecord`]
//!
//! The orchestrator creates one driver per prompt through the
//! [`DriverRegistry`] and only ever calls [`Driver::test_all_outputs`].

pub mod config;
pub mod cpp;
pub mod process;
pub mod registry;
pub mod result;
pub mod validity;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::corpus::{CandidateOutput, Outputs, Prompt, ResultRecord};
use crate::model::ParallelismModel;

pub use config::{LaunchConfigs, LaunchSpec, ProblemSizes};
pub use cpp::CppDriver;
pub use process::{CommandOutput, ProcessError};
pub use registry::{DriverFactory, DriverRegistry, Language};
pub use result::{BuildOutput, CandidateResult, RunOutput};

/// Default build timeout.
pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for a single run.
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(120);

/// Everything a driver is constructed from.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Model the prompt targets.
    pub parallelism_model: ParallelismModel,
    /// How to launch built programs, keyed by model.
    pub launch_configs: Arc<LaunchConfigs>,
    /// Problem sizes, keyed by problem name.
    pub problem_sizes: Arc<ProblemSizes>,
    /// Parent directory for build artifacts (system temp dir if unset).
    pub scratch_dir: Option<PathBuf>,
    /// Log commands instead of executing them.
    pub dry_run: bool,
    /// Log compiler stderr when a build fails.
    pub display_build_errors: bool,
    /// Stop running a candidate after its first failed run.
    pub early_exit_runs: bool,
    /// Build timeout.
    pub build_timeout: Duration,
    /// Per-run timeout.
    pub run_timeout: Duration,
}

impl DriverConfig {
    /// Creates a config with default run-control options.
    pub fn new(parallelism_model: ParallelismModel) -> Self {
        Self {
            parallelism_model,
            launch_configs: Arc::new(LaunchConfigs::default()),
            problem_sizes: Arc::new(ProblemSizes::default()),
            scratch_dir: None,
            dry_run: false,
            display_build_errors: false,
            early_exit_runs: false,
            build_timeout: DEFAULT_BUILD_TIMEOUT,
            run_timeout: DEFAULT_RUN_TIMEOUT,
        }
    }

    /// Sets the launch configurations.
    pub fn with_launch_configs(mut self, launch_configs: Arc<LaunchConfigs>) -> Self {
        self.launch_configs = launch_configs;
        self
    }

    /// Sets the problem sizes.
    pub fn with_problem_sizes(mut self, problem_sizes: Arc<ProblemSizes>) -> Self {
        self.problem_sizes = problem_sizes;
        self
    }

    /// Sets the scratch directory.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Enables dry-run mode.
    pub fn dry(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Enables early exit after the first failed run.
    pub fn with_early_exit(mut self, early_exit_runs: bool) -> Self {
        self.early_exit_runs = early_exit_runs;
        self
    }

    /// Sets the build and run timeouts.
    pub fn with_timeouts(mut self, build: Duration, run: Duration) -> Self {
        self.build_timeout = build;
        self.run_timeout = run;
        self
    }
}

/// Trait for per-language drivers.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Language this driver handles.
    fn language(&self) -> &str;

    /// Builds and runs one candidate.
    ///
    /// Build and run failures of the candidate belong in the returned
    /// record; an `Err` aborts the whole run.
    async fn test_output(&self, prompt: &Prompt, candidate: &str)
        -> Result<ResultRecord, DriverError>;

    /// Executes every raw candidate of the prompt and replaces its outputs
    /// with the resulting records. Returns the number of candidates run.
    ///
    /// Outputs are swapped in only once every candidate has a record, so an
    /// error leaves the prompt as it was.
    async fn test_all_outputs(&self, prompt: &mut Prompt) -> Result<usize, DriverError> {
        let candidates: Vec<String> = prompt
            .raw_candidates()
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut records = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let mut record = self.test_output(prompt, &candidate).await?;
            // The record always carries the exact text it was produced from.
            record.generated_output = candidate;
            records.push(CandidateOutput::Executed(record));
        }

        let count = records.len();
        prompt.outputs = Outputs::Candidates(records);
        Ok(count)
    }
}

/// Error type for driver operations.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("No launch configuration for parallelism model '{0}'")]
    MissingLaunchConfig(ParallelismModel),

    #[error("Invalid launch configuration for '{model}': {reason}")]
    InvalidLaunchConfig {
        model: ParallelismModel,
        reason: String,
    },

    #[error("Prompt '{0}' has no problem type; cannot locate its benchmark")]
    MissingProblemType(String),
}
