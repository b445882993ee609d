//! The orchestration loop.
//!
//! Walks the corpus in order, one prompt at a time:
//!
//! ```text
//! filter → result state (skip / reset) → driver → persist
//! ```
//!
//! Prompts are never processed concurrently: builds and runs can hold the
//! whole machine (or an exclusive GPU), and the scratch directory is shared
//! between drivers.

use std::io::Write;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::RunOptions;
use crate::corpus::{classify, prepare, Corpus, Decision, Prompt, ResultState};
use crate::driver::{DriverConfig, DriverRegistry, LaunchConfigs, ProblemSizes};
use crate::error::{HarnessError, Result};
use crate::filter::Rejection;
use crate::model::ParallelismModel;
use crate::persistence::ResultWriter;

/// Counts of what happened to each prompt in a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Prompts in the corpus.
    pub prompts: usize,
    /// Skipped because their model is not under test.
    pub filtered_by_model: usize,
    /// Skipped by the single-problem filter.
    pub filtered_by_name: usize,
    /// Skipped by the problem-type filter.
    pub filtered_by_problem_type: usize,
    /// Skipped because they already had results.
    pub skipped_existing: usize,
    /// Had results which were reset and re-executed.
    pub overwritten: usize,
    /// Handed to a driver.
    pub executed: usize,
    /// Candidates built and run across all executed prompts.
    pub candidates: usize,
}

impl RunSummary {
    fn record_rejection(&mut self, rejection: Rejection) {
        match rejection {
            Rejection::Model => self.filtered_by_model += 1,
            Rejection::Name => self.filtered_by_name += 1,
            Rejection::ProblemType => self.filtered_by_problem_type += 1,
        }
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} prompts: {} executed ({} candidates, {} overwritten), {} already had results, \
             {} filtered out",
            self.prompts,
            self.executed,
            self.candidates,
            self.overwritten,
            self.skipped_existing,
            self.filtered_by_model + self.filtered_by_name + self.filtered_by_problem_type,
        )
    }
}

/// Drives prompts through filtering, execution, and persistence.
pub struct Orchestrator {
    registry: DriverRegistry,
    options: RunOptions,
    launch_configs: Arc<LaunchConfigs>,
    problem_sizes: Arc<ProblemSizes>,
    writer: ResultWriter,
}

impl Orchestrator {
    /// Creates an orchestrator with empty launch and problem-size configs.
    pub fn new(registry: DriverRegistry, options: RunOptions, writer: ResultWriter) -> Self {
        Self {
            registry,
            options,
            launch_configs: Arc::new(LaunchConfigs::default()),
            problem_sizes: Arc::new(ProblemSizes::default()),
            writer,
        }
    }

    /// Sets the launch configurations handed to drivers.
    pub fn with_launch_configs(mut self, launch_configs: LaunchConfigs) -> Self {
        self.launch_configs = Arc::new(launch_configs);
        self
    }

    /// Sets the problem sizes handed to drivers.
    pub fn with_problem_sizes(mut self, problem_sizes: ProblemSizes) -> Self {
        self.problem_sizes = Arc::new(problem_sizes);
        self
    }

    /// Processes every prompt in the corpus.
    ///
    /// The corpus is persisted after each executed prompt. Any error aborts
    /// the run immediately; whatever was persisted before it stays valid.
    pub async fn run(&self, corpus: &mut Corpus) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let total = corpus.len();
        info!("Starting run {} over {} prompts", run_id, total);

        let mut summary = RunSummary {
            prompts: total,
            ..RunSummary::default()
        };

        for index in 0..total {
            let Some(prompt) = corpus.get_mut(index) else {
                break;
            };

            let model = match self.options.filter.check(prompt) {
                Ok(model) => model,
                Err(rejection) => {
                    debug!(
                        "Skipping prompt {} ({}): filtered by {:?}",
                        prompt.name, prompt.parallelism_model, rejection
                    );
                    summary.record_rejection(rejection);
                    continue;
                }
            };

            match prepare(prompt, self.options.overwrite)? {
                Decision::Skip => {
                    debug!(
                        "Skipping prompt {} because it already has results. \
                         Use --overwrite to overwrite existing results.",
                        prompt.name
                    );
                    summary.skipped_existing += 1;
                    continue;
                }
                Decision::ExecuteAfterReset => {
                    debug!("Prompt {} already has results. Overwriting.", prompt.name);
                    summary.overwritten += 1;
                }
                Decision::Execute => {}
            }

            if !self.options.hide_progress {
                info!("[{}/{}] Testing {} ({})", index + 1, total, prompt.name, model);
            }

            summary.candidates += self.execute(prompt, model).await?;
            summary.executed += 1;

            self.writer.flush(corpus)?;
        }

        info!("Run {} finished: {}", run_id, summary);
        Ok(summary)
    }

    /// Writes the final results document.
    pub fn finish<W: Write>(&self, corpus: &Corpus, stdout: &mut W) -> Result<()> {
        self.writer.finish(corpus, stdout)
    }

    /// Runs one prompt through its driver and checks the driver left it
    /// fully executed.
    async fn execute(&self, prompt: &mut Prompt, model: ParallelismModel) -> Result<usize> {
        let language = prompt
            .language()
            .ok_or_else(|| HarnessError::MissingLanguage(prompt.name.clone()))?;
        let driver = self
            .registry
            .create(language, self.driver_config(model))
            .ok_or_else(|| HarnessError::UnknownLanguage {
                language: language.to_string(),
                prompt: prompt.name.clone(),
            })?;

        let count = driver
            .test_all_outputs(prompt)
            .await
            .map_err(|source| HarnessError::Driver {
                prompt: prompt.name.clone(),
                source,
            })?;

        match classify(prompt) {
            Ok(ResultState::HasResults) => Ok(count),
            Ok(ResultState::NoResults) if count == 0 => Ok(count),
            Ok(ResultState::NoResults) => Err(HarnessError::DriverContract {
                prompt: prompt.name.clone(),
                reason: "outputs were not executed".to_string(),
            }),
            Err(e) => Err(HarnessError::DriverContract {
                prompt: prompt.name.clone(),
                reason: e.to_string(),
            }),
        }
    }

    fn driver_config(&self, model: ParallelismModel) -> DriverConfig {
        DriverConfig {
            parallelism_model: model,
            launch_configs: Arc::clone(&self.launch_configs),
            problem_sizes: Arc::clone(&self.problem_sizes),
            scratch_dir: self.options.scratch_dir.clone(),
            dry_run: self.options.dry_run,
            display_build_errors: self.options.display_build_errors,
            early_exit_runs: self.options.early_exit_runs,
            build_timeout: self.options.build_timeout,
            run_timeout: self.options.run_timeout,
        }
    }
}
