//! Run configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::driver::{DEFAULT_BUILD_TIMEOUT, DEFAULT_RUN_TIMEOUT};
use crate::error::HarnessError;
use crate::filter::PromptFilter;

/// Options controlling one pass over the corpus.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Which prompts take part.
    pub filter: PromptFilter,
    /// Re-execute prompts that already have results.
    pub overwrite: bool,
    /// Log build/run commands instead of executing them.
    pub dry_run: bool,
    /// Suppress per-prompt progress lines.
    pub hide_progress: bool,
    /// Parent directory for build artifacts.
    pub scratch_dir: Option<PathBuf>,
    /// Stop running a candidate after its first failed run.
    pub early_exit_runs: bool,
    /// Log compiler stderr on build failure.
    pub display_build_errors: bool,
    /// Build timeout.
    pub build_timeout: Duration,
    /// Per-run timeout.
    pub run_timeout: Duration,
}

impl RunOptions {
    /// Creates options with defaults: every model, no overwrite.
    pub fn new() -> Self {
        Self {
            filter: PromptFilter::default(),
            overwrite: false,
            dry_run: false,
            hide_progress: false,
            scratch_dir: None,
            early_exit_runs: false,
            display_build_errors: false,
            build_timeout: DEFAULT_BUILD_TIMEOUT,
            run_timeout: DEFAULT_RUN_TIMEOUT,
        }
    }

    /// Sets the prompt filter.
    pub fn with_filter(mut self, filter: PromptFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Enables overwriting existing results.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Enables dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Hides progress lines.
    pub fn with_hide_progress(mut self, hide: bool) -> Self {
        self.hide_progress = hide;
        self
    }

    /// Sets the scratch directory.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Sets the build and run timeouts.
    pub fn with_timeouts(mut self, build: Duration, run: Duration) -> Self {
        self.build_timeout = build;
        self.run_timeout = run;
        self
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Log verbosity accepted by `--log`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Directive for `tracing_subscriber::EnvFilter`.
    ///
    /// There is no level above error, so `critical` maps onto it.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "critical" => Ok(LogLevel::Critical),
            _ => Err(HarnessError::InvalidLogLevel(s.to_string())),
        }
    }
}
