//! Subprocess execution with timeouts.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::debug;

/// Captured result of a finished subprocess.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code (`None` if killed by a signal).
    pub exit_code: Option<i32>,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Output of a command that was not actually executed.
    pub fn skipped() -> Self {
        Self {
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// Checks if the process exited with code 0.
    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Error type for subprocess execution.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Process error: {0}")]
    Wait(#[source] std::io::Error),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

/// Builds a command that runs `command_line` through `sh -c`.
pub fn shell(command_line: &str, working_dir: &Path) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command_line).current_dir(working_dir);
    cmd
}

/// Runs a command to completion, killing it if `timeout` expires first.
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
) -> Result<CommandOutput, ProcessError> {
    let program = cmd.as_std().get_program().to_string_lossy().to_string();

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let start = Instant::now();
    let child = cmd.spawn().map_err(|source| ProcessError::Spawn {
        program: program.clone(),
        source,
    })?;

    // On timeout the child is dropped with the future and killed.
    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => {
            let exit_code = output.status.code();
            debug!("{} exited with {:?} in {:?}", program, exit_code, start.elapsed());
            Ok(CommandOutput {
                exit_code,
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            })
        }
        Ok(Err(e)) => Err(ProcessError::Wait(e)),
        Err(_) => Err(ProcessError::Timeout(timeout)),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_run_captures_output() {
        let temp = TempDir::new().unwrap();
        let output = run_with_timeout(
            shell("echo hello; echo oops 1>&2; exit 3", temp.path()),
            Duration::from_secs(10),
        )
        .await
        .unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.stderr.trim(), "oops");
        assert!(!output.is_success());
    }

    #[tokio::test]
    async fn test_timeout() {
        let temp = TempDir::new().unwrap();
        let err = run_with_timeout(shell("sleep 5", temp.path()), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let temp = TempDir::new().unwrap();
        let mut cmd = Command::new("definitely-not-a-real-binary-xyz");
        cmd.current_dir(temp.path());
        let err = run_with_timeout(cmd, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }

    #[test]
    fn test_skipped_is_success() {
        assert!(CommandOutput::skipped().is_success());
    }
}
