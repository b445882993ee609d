//! Build and run outcomes for a single candidate.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::corpus::ResultRecord;

use super::process::CommandOutput;

/// Outcome of compiling a candidate.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    /// Compiler exit code (`None` if killed or timed out).
    pub exit_code: Option<i32>,
    /// Compiler stdout.
    pub stdout: String,
    /// Compiler stderr.
    pub stderr: String,
    /// Whether the build hit its timeout.
    pub timed_out: bool,
}

impl BuildOutput {
    /// Wraps a finished compiler process.
    pub fn from_command(output: CommandOutput) -> Self {
        Self {
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
            timed_out: false,
        }
    }

    /// A build that hit its timeout.
    pub fn timed_out() -> Self {
        Self {
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            timed_out: true,
        }
    }

    /// A build that could not be started.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            exit_code: None,
            stdout: String::new(),
            stderr: reason.into(),
            timed_out: false,
        }
    }

    /// Returns true if the compiler exited with code 0.
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out
    }
}

/// Outcome of one run configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    /// Program exit code (`None` if killed or timed out).
    pub exit_code: Option<i32>,
    /// Exited with code 0 within the timeout.
    pub did_run: bool,
    /// Program reported its result as correct.
    pub is_valid: bool,
    /// Reported runtime of the generated code, in seconds.
    pub runtime: Option<f64>,
    /// Reported runtime of the sequential baseline, in seconds.
    pub best_sequential_runtime: Option<f64>,
    /// Whether the run hit its timeout.
    pub timed_out: bool,
    /// Launch parameters for this run.
    pub params: BTreeMap<String, Value>,
}

impl RunOutput {
    /// Parses a finished run.
    ///
    /// The benchmark harness prints `Time: <s>`, `BestSequential: <s>` and
    /// `Validation: PASS|FAIL` lines on stdout.
    pub fn from_command(output: &CommandOutput, params: BTreeMap<String, Value>) -> Self {
        let did_run = output.is_success();
        let mut runtime = None;
        let mut best_sequential_runtime = None;
        let mut validation = None;

        for line in output.stdout.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "Time" => runtime = value.parse::<f64>().ok(),
                "BestSequential" => best_sequential_runtime = value.parse::<f64>().ok(),
                "Validation" => validation = Some(value.eq_ignore_ascii_case("pass")),
                _ => {}
            }
        }

        Self {
            exit_code: output.exit_code,
            did_run,
            is_valid: did_run && validation == Some(true),
            runtime,
            best_sequential_runtime,
            timed_out: false,
            params,
        }
    }

    /// A run that hit its timeout.
    pub fn timed_out(params: BTreeMap<String, Value>) -> Self {
        Self {
            exit_code: None,
            did_run: false,
            is_valid: false,
            runtime: None,
            best_sequential_runtime: None,
            timed_out: true,
            params,
        }
    }

    /// A run that could not be started.
    pub fn failed(params: BTreeMap<String, Value>) -> Self {
        Self {
            timed_out: false,
            ..Self::timed_out(params)
        }
    }

    /// Run succeeded and validated.
    pub fn passed(&self) -> bool {
        self.did_run && self.is_valid
    }

    fn to_value(&self) -> Value {
        let params = self.params.clone().into_iter().collect();
        let mut map = serde_json::Map::new();
        map.insert("params".into(), Value::Object(params));
        map.insert("exit_code".into(), self.exit_code.into());
        map.insert("did_run".into(), self.did_run.into());
        map.insert("is_valid".into(), self.is_valid.into());
        map.insert("runtime".into(), self.runtime.into());
        map.insert(
            "best_sequential_runtime".into(),
            self.best_sequential_runtime.into(),
        );
        map.insert("timed_out".into(), self.timed_out.into());
        Value::Object(map)
    }
}

/// Everything learned about one candidate.
#[derive(Debug, Clone)]
pub struct CandidateResult {
    /// The candidate text.
    pub generated_output: String,
    /// Source file was written to the build directory.
    pub source_write_success: bool,
    /// Candidate passed the static source checks.
    pub is_source_valid: bool,
    /// Build outcome, if a build was attempted.
    pub build: Option<BuildOutput>,
    /// Run outcomes, in launch-config order.
    pub runs: Vec<RunOutput>,
    /// When the candidate finished executing.
    pub completed_at: DateTime<Utc>,
}

impl CandidateResult {
    /// Creates an empty result for a candidate.
    pub fn new(generated_output: impl Into<String>) -> Self {
        Self {
            generated_output: generated_output.into(),
            source_write_success: false,
            is_source_valid: false,
            build: None,
            runs: Vec::new(),
            completed_at: Utc::now(),
        }
    }

    /// Build was attempted and succeeded.
    pub fn did_build(&self) -> bool {
        self.build.as_ref().is_some_and(BuildOutput::succeeded)
    }

    /// At least one run exited cleanly.
    pub fn did_any_run(&self) -> bool {
        self.runs.iter().any(|r| r.did_run)
    }

    /// Every run exited cleanly (false when nothing ran).
    pub fn did_all_run(&self) -> bool {
        !self.runs.is_empty() && self.runs.iter().all(|r| r.did_run)
    }

    /// At least one run validated.
    pub fn are_any_valid(&self) -> bool {
        self.runs.iter().any(RunOutput::passed)
    }

    /// Every run validated (false when nothing ran).
    pub fn are_all_valid(&self) -> bool {
        !self.runs.is_empty() && self.runs.iter().all(RunOutput::passed)
    }

    /// Fastest reported sequential baseline across runs.
    pub fn best_sequential_runtime(&self) -> Option<f64> {
        self.runs
            .iter()
            .filter_map(|r| r.best_sequential_runtime)
            .reduce(f64::min)
    }

    /// Converts into the persisted record form.
    pub fn into_record(self) -> ResultRecord {
        let runs: Vec<Value> = self.runs.iter().map(RunOutput::to_value).collect();
        ResultRecord::new(self.generated_output.clone())
            .with_field("source_write_success", self.source_write_success)
            .with_field("is_source_valid", self.is_source_valid)
            .with_field("did_build", self.did_build())
            .with_field(
                "build_timed_out",
                self.build.as_ref().is_some_and(|b| b.timed_out),
            )
            .with_field("did_any_run", self.did_any_run())
            .with_field("did_all_run", self.did_all_run())
            .with_field("are_any_valid", self.are_any_valid())
            .with_field("are_all_valid", self.are_all_valid())
            .with_field("best_sequential_runtime", self.best_sequential_runtime())
            .with_field("runs", runs)
            .with_field("completed_at", self.completed_at.to_rfc3339())
    }
}
