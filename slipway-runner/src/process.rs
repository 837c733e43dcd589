//! Subprocess execution
//!
//! Every external tool the pipeline drives (build tools, skopeo, juju, git)
//! goes through [`run_command`], which captures output and enforces a timeout.
//! The child leads its own process group; on timeout, or when the caller gives
//! up on the command, the whole group is killed so no grandchild outlives it.

use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Errors raised before a command could produce an exit status
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {timeout:?}")]
    TimedOut { command: String, timeout: Duration },
}

/// Captured result of a finished command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    /// Exit code, or -1 when the process was terminated by a signal
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Stdout followed by stderr, for diagnostics
    pub fn combined(&self) -> String {
        match (self.stdout.trim().is_empty(), self.stderr.trim().is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}

/// Renders a command line for logs and error messages
pub fn describe(command: &Command) -> String {
    let std = command.as_std();
    let mut parts = vec![std.get_program().to_string_lossy().to_string()];
    parts.extend(std.get_args().map(|arg| arg.to_string_lossy().to_string()));
    parts.join(" ")
}

/// Kills a process group when dropped
struct ProcessGroup {
    pgid: Option<Pid>,
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        let Some(pgid) = self.pgid else { return };
        match killpg(pgid, Signal::SIGKILL) {
            Ok(()) => debug!("Killed process group {}", pgid),
            // Already gone
            Err(nix::errno::Errno::ESRCH) => {}
            Err(e) => warn!("Failed to kill process group {}: {}", pgid, e),
        }
    }
}

/// Runs a command to completion, capturing stdout and stderr
///
/// The child's process group is killed once the command is done with: after a
/// timeout, when the returned future is dropped, or after the leader exits
/// (so backgrounded stragglers do not outlive it).
pub async fn run_command(
    command: &mut Command,
    timeout: Duration,
) -> Result<CommandOutput, ProcessError> {
    let command_line = describe(command);

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .kill_on_drop(true);

    debug!("Running `{}`", command_line);

    let child = command.spawn().map_err(|source| ProcessError::Spawn {
        command: command_line.clone(),
        source,
    })?;
    let _group = ProcessGroup {
        pgid: child
            .id()
            .and_then(|id| i32::try_from(id).ok())
            .map(Pid::from_raw),
    };

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|source| ProcessError::Spawn {
            command: command_line.clone(),
            source,
        })?,
        Err(_) => {
            return Err(ProcessError::TimedOut {
                command: command_line,
                timeout,
            });
        }
    };

    let result = CommandOutput {
        success: output.status.success(),
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    };

    debug!(
        "`{}` exited with code {} (stdout_len={}, stderr_len={})",
        command_line,
        result.exit_code,
        result.stdout.len(),
        result.stderr.len()
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_stdout_and_exit_code() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo hello; echo oops >&2; exit 3");

        let output = run_command(&mut cmd, Duration::from_secs(10)).await.unwrap();
        assert!(!output.success);
        assert_eq!(output.exit_code, 3);
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.stderr.trim(), "oops");
        assert_eq!(output.combined(), "hello\noops\n");
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let mut cmd = Command::new("/nonexistent/slipway-tool");
        let err = run_command(&mut cmd, Duration::from_secs(10))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_timeout() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");

        let err = run_command(&mut cmd, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "`sleep 5` timed out after 100ms");
        match err {
            ProcessError::TimedOut { command, .. } => assert_eq!(command, "sleep 5"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_kills_grandchildren() {
        let dir = tempfile::tempdir().unwrap();
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg("sleep 1 && touch leaked")
            .current_dir(dir.path());

        let err = run_command(&mut cmd, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::TimedOut { .. }));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!dir.path().join("leaked").exists());
    }

    #[tokio::test]
    async fn test_background_stragglers_are_killed() {
        let dir = tempfile::tempdir().unwrap();
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg("(sleep 1; touch leaked) >/dev/null 2>&1 & echo started")
            .current_dir(dir.path());

        let output = run_command(&mut cmd, Duration::from_secs(10)).await.unwrap();
        assert!(output.success);
        assert_eq!(output.stdout.trim(), "started");

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!dir.path().join("leaked").exists());
    }

    #[test]
    fn test_describe() {
        let mut cmd = Command::new("skopeo");
        cmd.arg("copy").arg("a").arg("b");
        assert_eq!(describe(&cmd), "skopeo copy a b");
    }
}
