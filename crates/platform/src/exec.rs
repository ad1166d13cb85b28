//! Bounded-timeout subprocess execution.
//!
//! Every external command in this crate runs through these helpers: a
//! timed-out command is treated as a failure, never as a hang. The child
//! is killed when the timeout drops the future.

use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Timeout for existence checks and other lightweight probes.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Timeout for property and capture commands.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from running an external command.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("{command} timed out after {timeout:?}")]
    TimedOut {
        command: String,
        timeout: Duration,
    },

    #[error("{command} exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Human-readable command line for error messages.
fn describe(cmd: &Command) -> String {
    let std_cmd = cmd.as_std();
    let mut parts = vec![std_cmd.get_program().to_string_lossy().into_owned()];
    parts.extend(std_cmd.get_args().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}

/// Run a command to completion within `timeout`, capturing its output.
/// A non-zero exit status is an error.
pub async fn run_command(
    mut cmd: Command,
    timeout: Duration,
) -> Result<std::process::Output, ExecError> {
    let command = describe(&cmd);
    cmd.stdin(Stdio::null()).kill_on_drop(true);

    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| ExecError::TimedOut {
            command: command.clone(),
            timeout,
        })?
        .map_err(|source| ExecError::Spawn {
            command: command.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(ExecError::Failed {
            command,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output)
}

/// Run a command and return its stdout as trimmed UTF-8.
pub async fn run_for_stdout(cmd: Command, timeout: Duration) -> Result<String, ExecError> {
    let output = run_command(cmd, timeout).await?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// True when the command completes successfully within `timeout`.
pub async fn command_succeeds(cmd: Command, timeout: Duration) -> bool {
    run_command(cmd, timeout).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let cmd = Command::new("ghostveil-no-such-binary-d41d8cd9");
        match run_command(cmd, PROBE_TIMEOUT).await {
            Err(ExecError::Spawn { .. }) => {}
            other => panic!("expected Spawn error, got {:?}", other.map(|_| ())),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_failed() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "exit 3"]);
        match run_command(cmd, COMMAND_TIMEOUT).await {
            Err(ExecError::Failed { status, .. }) => assert_eq!(status.code(), Some(3)),
            other => panic!("expected Failed error, got {:?}", other.map(|_| ())),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_command_times_out() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "sleep 5"]);
        match run_command(cmd, Duration::from_millis(100)).await {
            Err(ExecError::TimedOut { .. }) => {}
            other => panic!("expected TimedOut error, got {:?}", other.map(|_| ())),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stdout_is_trimmed() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo '  0x5400007  '"]);
        let out = run_for_stdout(cmd, COMMAND_TIMEOUT).await.unwrap();
        assert_eq!(out, "0x5400007");
    }
}
