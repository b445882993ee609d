//! C++ driver.
//!
//! Layout expected under the driver root:
//!
//! ```text
//! cpp/
//!   models/<model>-driver.cc                     timing/validation main for each model
//!   benchmarks/<problem_type>/<name>/cpu.cc      serial, omp, mpi, mpi+omp
//!   benchmarks/<problem_type>/<name>/kokkos.cc   kokkos
//!   benchmarks/<problem_type>/<name>/gpu.cu      cuda, hip
//! tpl/kokkos/build/                              Kokkos install (kokkos only)
//! ```
//!
//! Each candidate is written to `generated-code.hpp` in a fresh build
//! directory, which the benchmark source includes.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::corpus::{Prompt, ResultRecord};
use crate::model::ParallelismModel;

use super::config::LaunchSpec;
use super::process::{run_with_timeout, shell, CommandOutput, ProcessError};
use super::result::{BuildOutput, CandidateResult, RunOutput};
use super::validity::check_source;
use super::{Driver, DriverConfig, DriverError};

/// File the candidate is written to.
const GENERATED_SOURCE: &str = "generated-code.hpp";

/// Name of the built executable.
const EXECUTABLE: &str = "a.out";

/// Driver for C++ candidates.
pub struct CppDriver {
    config: DriverConfig,
    driver_root: PathBuf,
}

impl CppDriver {
    /// Creates a driver rooted at `driver_root`.
    ///
    /// A relative root is resolved against the current directory here,
    /// because the compiler and the runs execute inside the build directory.
    pub fn new(config: DriverConfig, driver_root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            driver_root: absolute(driver_root.into()),
        }
    }

    fn model(&self) -> ParallelismModel {
        self.config.parallelism_model
    }

    /// Creates a fresh build directory, removed when dropped.
    fn build_dir(&self) -> std::io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("cpp-build-");
        match &self.config.scratch_dir {
            Some(dir) => {
                let dir = std::path::absolute(dir)?;
                fs::create_dir_all(&dir)?;
                builder.tempdir_in(dir)
            }
            None => builder.tempdir(),
        }
    }

    fn benchmark_dir(&self, prompt: &Prompt) -> Result<PathBuf, DriverError> {
        let problem_type = prompt
            .problem_type()
            .ok_or_else(|| DriverError::MissingProblemType(prompt.name.clone()))?;
        Ok(self
            .driver_root
            .join("cpp")
            .join("benchmarks")
            .join(problem_type)
            .join(&prompt.name))
    }

    /// Full compiler invocation for a candidate.
    fn build_args(&self, prompt: &Prompt, build_dir: &Path) -> Result<Vec<String>, DriverError> {
        let model = self.model();
        let cpp_root = self.driver_root.join("cpp");
        let benchmark_dir = self.benchmark_dir(prompt)?;

        let mut args = vec![compiler(model).to_string()];
        args.extend(compiler_flags(model, &self.driver_root));
        args.push(format!("-I{}", cpp_root.display()));
        args.push(format!("-I{}", benchmark_dir.display()));
        args.push(format!("-I{}", build_dir.display()));

        match self.config.problem_sizes.size_for(&prompt.name, model) {
            Some(size) => args.push(format!("-DDRIVER_PROBLEM_SIZE={}", size)),
            None => warn!(
                "No problem size for {} ({}); using the benchmark default",
                prompt.name, model
            ),
        }

        args.push(
            cpp_root
                .join("models")
                .join(format!("{}-driver.cc", model_file_stem(model)))
                .display()
                .to_string(),
        );
        args.push(benchmark_dir.join(benchmark_source(model)).display().to_string());
        args.push("-o".to_string());
        args.push(build_dir.join(EXECUTABLE).display().to_string());
        args.extend(link_flags(model, &self.driver_root));
        Ok(args)
    }

    async fn build(&self, prompt: &Prompt, build_dir: &Path) -> Result<BuildOutput, DriverError> {
        let args = self.build_args(prompt, build_dir)?;

        if self.config.dry_run {
            info!("[dry run] would build: {}", args.join(" "));
            return Ok(BuildOutput::from_command(CommandOutput::skipped()));
        }
        debug!("Build command: {}", args.join(" "));

        let mut cmd = Command::new(&args[0]);
        cmd.args(&args[1..]).current_dir(build_dir);

        let build = match run_with_timeout(cmd, self.config.build_timeout).await {
            Ok(output) => BuildOutput::from_command(output),
            Err(ProcessError::Timeout(d)) => {
                warn!("Build for {} timed out after {:?}", prompt.name, d);
                BuildOutput::timed_out()
            }
            Err(e) => BuildOutput::failed(e.to_string()),
        };

        if !build.succeeded() && self.config.display_build_errors {
            error!("Build failed for {}:\n{}", prompt.name, build.stderr);
        }
        Ok(build)
    }

    async fn run_all(
        &self,
        spec: &LaunchSpec,
        prompt: &Prompt,
        build_dir: &Path,
    ) -> Vec<RunOutput> {
        let exec_path = build_dir.join(EXECUTABLE);
        let mut runs = Vec::with_capacity(spec.params.len());

        for params in &spec.params {
            let command_line = spec.render(&exec_path, "", params);

            let run = if self.config.dry_run {
                info!("[dry run] would run: {}", command_line);
                RunOutput::from_command(&CommandOutput::skipped(), params.clone())
            } else {
                debug!("Run command: {}", command_line);
                match run_with_timeout(shell(&command_line, build_dir), self.config.run_timeout)
                    .await
                {
                    Ok(output) => RunOutput::from_command(&output, params.clone()),
                    Err(ProcessError::Timeout(d)) => {
                        warn!("Run of {} timed out after {:?}", prompt.name, d);
                        RunOutput::timed_out(params.clone())
                    }
                    Err(e) => {
                        warn!("Run of {} failed: {}", prompt.name, e);
                        RunOutput::failed(params.clone())
                    }
                }
            };

            let passed = run.passed();
            runs.push(run);
            if !passed && self.config.early_exit_runs {
                debug!("Stopping runs for {} after first failure", prompt.name);
                break;
            }
        }
        runs
    }
}

#[async_trait]
impl Driver for CppDriver {
    fn language(&self) -> &str {
        "cpp"
    }

    async fn test_output(
        &self,
        prompt: &Prompt,
        candidate: &str,
    ) -> Result<ResultRecord, DriverError> {
        let spec = self.config.launch_configs.for_model(self.model())?;
        let mut result = CandidateResult::new(candidate);

        let build_dir = match self.build_dir() {
            Ok(dir) => dir,
            Err(e) => {
                warn!("Could not create build directory for {}: {}", prompt.name, e);
                return Ok(finish(result));
            }
        };

        if let Err(e) = write_source(build_dir.path(), prompt, candidate) {
            warn!("Could not write source for {}: {}", prompt.name, e);
            return Ok(finish(result));
        }
        result.source_write_success = true;

        if let Err(issue) = check_source(candidate, self.model()) {
            debug!("Rejected candidate for {}: {}", prompt.name, issue);
            return Ok(finish(result));
        }
        result.is_source_valid = true;

        let build = self.build(prompt, build_dir.path()).await?;
        let built = build.succeeded();
        result.build = Some(build);

        if built {
            result.runs = self.run_all(&spec, prompt, build_dir.path()).await;
        }
        Ok(finish(result))
    }
}

fn absolute(path: PathBuf) -> PathBuf {
    match std::path::absolute(&path) {
        Ok(abs) => abs,
        Err(e) => {
            warn!("Could not resolve {}: {}", path.display(), e);
            path
        }
    }
}

fn finish(mut result: CandidateResult) -> ResultRecord {
    result.completed_at = Utc::now();
    result.into_record()
}

/// Writes the prompt text followed by the candidate.
fn write_source(build_dir: &Path, prompt: &Prompt, candidate: &str) -> std::io::Result<()> {
    let mut source = String::new();
    if let Some(text) = prompt.prompt_text() {
        source.push_str(text);
        if !text.ends_with('\n') {
            source.push('\n');
        }
    }
    source.push_str(candidate);
    source.push('\n');
    fs::write(build_dir.join(GENERATED_SOURCE), source)
}

fn compiler(model: ParallelismModel) -> &'static str {
    match model {
        ParallelismModel::Serial | ParallelismModel::Omp | ParallelismModel::Kokkos => "g++",
        ParallelismModel::Mpi | ParallelismModel::MpiOmp => "mpicxx",
        ParallelismModel::Cuda => "nvcc",
        ParallelismModel::Hip => "hipcc",
    }
}

fn compiler_flags(model: ParallelismModel, driver_root: &Path) -> Vec<String> {
    let mut flags: Vec<String> = ["-std=c++17", "-O3"].map(String::from).to_vec();
    match model {
        ParallelismModel::Serial => {}
        ParallelismModel::Omp => flags.extend(["-fopenmp", "-DUSE_OMP"].map(String::from)),
        ParallelismModel::Mpi => flags.push("-DUSE_MPI".into()),
        ParallelismModel::MpiOmp => {
            flags.extend(["-fopenmp", "-DUSE_MPI", "-DUSE_OMP"].map(String::from))
        }
        ParallelismModel::Kokkos => {
            let kokkos = driver_root.join("tpl").join("kokkos").join("build");
            flags.extend(["-fopenmp", "-DUSE_KOKKOS"].map(String::from));
            flags.push(format!("-I{}", kokkos.join("include").display()));
        }
        ParallelismModel::Cuda => flags.extend(
            [
                "--generate-code",
                "arch=compute_80,code=sm_80",
                "-Xcompiler",
                "-std=c++17 -O3",
                "-DUSE_CUDA",
            ]
            .map(String::from),
        ),
        ParallelismModel::Hip => {
            flags.extend(["-Wno-unused-result", "-DUSE_HIP"].map(String::from))
        }
    }
    flags
}

/// Flags that must come after the sources.
fn link_flags(model: ParallelismModel, driver_root: &Path) -> Vec<String> {
    match model {
        ParallelismModel::Kokkos => {
            let lib = driver_root.join("tpl").join("kokkos").join("build").join("lib64");
            vec![
                lib.join("libkokkoscore.a").display().to_string(),
                lib.join("libkokkoscontainers.a").display().to_string(),
                "-ldl".to_string(),
            ]
        }
        _ => Vec::new(),
    }
}

fn model_file_stem(model: ParallelismModel) -> &'static str {
    match model {
        ParallelismModel::MpiOmp => "mpi-omp",
        other => other.as_str(),
    }
}

fn benchmark_source(model: ParallelismModel) -> &'static str {
    match model {
        ParallelismModel::Kokkos => "kokkos.cc",
        m if m.is_gpu() => "gpu.cu",
        _ => "cpu.cc",
    }
}
