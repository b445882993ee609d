//! CLI command definitions for codegen-harness.
//!
//! A single command: load a corpus of generated code, build and run every
//! selected candidate, and write the corpus back with results attached.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use crate::config::{LogLevel, RunOptions};
use crate::corpus::Corpus;
use crate::driver::{DriverRegistry, LaunchConfigs, ProblemSizes};
use crate::error::HarnessError;
use crate::filter::{ProblemSelector, PromptFilter};
use crate::model::ParallelismModel;
use crate::orchestrator::Orchestrator;
use crate::persistence::{Destination, ResultWriter};
use crate::safety;

/// Default build timeout in seconds.
const DEFAULT_BUILD_TIMEOUT_SECS: u64 = 30;

/// Default run timeout in seconds.
const DEFAULT_RUN_TIMEOUT_SECS: u64 = 120;

/// Build and run LLM-generated parallel code and record the results.
#[derive(Parser, Debug)]
#[command(name = "codegen-harness")]
#[command(about = "Build and run generated code samples and record pass/fail/timing results")]
#[command(version)]
#[command(
    long_about = "codegen-harness compiles and runs LLM-generated code for serial, OpenMP, MPI, \
    MPI+OpenMP, Kokkos, CUDA, and HIP prompts and stores the outcome of every candidate \
    in the prompt corpus.\n\nPrompts that already have results are skipped, so an \
    interrupted run can be resumed by running the same command again.\n\nExample usage:\n  \
    codegen-harness generations.json -o results.json --include-models serial omp"
)]
pub struct Cli {
    /// Input JSON file containing the prompts and generated outputs.
    pub input_json: PathBuf,

    /// Output JSON file for results. Omit or use '-' to print to stdout at the end.
    #[arg(short = 'o', long)]
    pub output: Option<String>,

    /// Directory for build artifacts (defaults to the system temp dir).
    #[arg(long, env = "CODEGEN_HARNESS_SCRATCH_DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// How to launch built programs for each parallelism model.
    #[arg(long, default_value = "launch-configs.json")]
    pub launch_configs: PathBuf,

    /// Problem sizes for each benchmark.
    #[arg(long, default_value = "problem-sizes.json")]
    pub problem_sizes: PathBuf,

    /// Root directory of the benchmark driver sources.
    #[arg(long, default_value = "drivers")]
    pub driver_root: PathBuf,

    /// Answer yes to the confirmation prompt.
    #[arg(long)]
    pub yes_to_all: bool,

    /// Dry run: log build and run commands without executing them.
    #[arg(long)]
    pub dry: bool,

    /// Re-run prompts that already have results instead of skipping them.
    #[arg(long)]
    pub overwrite: bool,

    /// Do not log per-prompt progress.
    #[arg(long)]
    pub hide_progress: bool,

    /// Exclude these parallelism models from testing.
    #[arg(
        long,
        value_enum,
        num_args = 1..,
        value_delimiter = ',',
        conflicts_with = "include_models"
    )]
    pub exclude_models: Option<Vec<ParallelismModel>>,

    /// Only test these parallelism models.
    #[arg(long, value_enum, num_args = 1.., value_delimiter = ',')]
    pub include_models: Option<Vec<ParallelismModel>>,

    /// Only test this problem.
    #[arg(long, conflicts_with = "problem_type")]
    pub problem: Option<String>,

    /// Only test problems of this type.
    #[arg(long)]
    pub problem_type: Option<String>,

    /// Stop evaluating a candidate after its first failed run configuration.
    #[arg(long)]
    pub early_exit_runs: bool,

    /// Timeout in seconds for building a program.
    #[arg(long, default_value_t = DEFAULT_BUILD_TIMEOUT_SECS)]
    pub build_timeout: u64,

    /// Timeout in seconds for running a program.
    #[arg(long, default_value_t = DEFAULT_RUN_TIMEOUT_SECS)]
    pub run_timeout: u64,

    /// Log level (debug, info, warning, error, critical).
    #[arg(long = "log", default_value = "info")]
    pub log_level: LogLevel,

    /// On build error, log the compiler's stderr.
    #[arg(long)]
    pub log_build_errors: bool,
}

impl Cli {
    /// Validated run options.
    ///
    /// Conflicting flags are already rejected by clap; this guards callers
    /// that build a `Cli` directly.
    pub fn run_options(&self) -> Result<RunOptions, HarnessError> {
        let problem = match (&self.problem, &self.problem_type) {
            (Some(_), Some(_)) => {
                return Err(HarnessError::ConflictingOptions(
                    "--problem and --problem-type cannot be used together".to_string(),
                ))
            }
            (Some(name), None) => ProblemSelector::Name(name.clone()),
            (None, Some(tag)) => ProblemSelector::ProblemType(tag.clone()),
            (None, None) => ProblemSelector::All,
        };

        let filter = PromptFilter::from_lists(
            self.include_models.as_deref(),
            self.exclude_models.as_deref(),
        )?
        .with_problem(problem);

        Ok(RunOptions {
            filter,
            overwrite: self.overwrite,
            dry_run: self.dry,
            hide_progress: self.hide_progress,
            scratch_dir: self.scratch_dir.clone(),
            early_exit_runs: self.early_exit_runs,
            display_build_errors: self.log_build_errors,
            build_timeout: Duration::from_secs(self.build_timeout),
            run_timeout: Duration::from_secs(self.run_timeout),
        })
    }

    /// Where results are written.
    pub fn destination(&self) -> Destination {
        Destination::from_arg(self.output.as_deref())
    }
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like the log level) before
/// running.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    run_with_io(cli, &mut io::stdin().lock(), &mut io::stderr(), &mut io::stdout()).await
}

/// Run the CLI with explicit streams.
///
/// `input` and `prompt` carry the confirmation; the results document goes
/// to `stdout` when no output file is given.
pub async fn run_with_io<R, W, O>(
    cli: Cli,
    input: &mut R,
    prompt: &mut W,
    stdout: &mut O,
) -> anyhow::Result<()>
where
    R: BufRead,
    W: Write,
    O: Write,
{
    let options = cli.run_options()?;

    if !safety::gate(cli.yes_to_all, input, prompt)? {
        return Ok(());
    }

    let mut corpus = Corpus::load(&cli.input_json)?;
    info!(
        "Loaded {} prompts from {}.",
        corpus.len(),
        cli.input_json.display()
    );

    let launch_configs = LaunchConfigs::load(&cli.launch_configs)?;
    info!("Loaded launch configs from {}.", cli.launch_configs.display());

    let problem_sizes = ProblemSizes::load(&cli.problem_sizes)?;
    info!("Loaded problem sizes from {}.", cli.problem_sizes.display());

    let orchestrator = Orchestrator::new(
        DriverRegistry::builtin(&cli.driver_root),
        options,
        ResultWriter::new(cli.destination()),
    )
    .with_launch_configs(launch_configs)
    .with_problem_sizes(problem_sizes);

    orchestrator.run(&mut corpus).await?;
    orchestrator.finish(&corpus, stdout)?;
    Ok(())
}
