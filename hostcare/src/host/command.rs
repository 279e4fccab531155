//! External command execution.

use crate::errors::CommandError;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program to run.
    pub program: String,
    /// Arguments, passed verbatim.
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Creates a spec from a program and arguments.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// A non-interactive PowerShell invocation of `script`.
    pub fn powershell(script: impl Into<String>) -> Self {
        Self::new(
            "powershell.exe",
            [
                "-NoProfile".to_string(),
                "-NonInteractive".to_string(),
                "-ExecutionPolicy".to_string(),
                "Bypass".to_string(),
                "-Command".to_string(),
                script.into(),
            ],
        )
    }

    /// The command as one line, for logs and matching.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `-1` if the process was terminated by a signal.
    pub status_code: i32,
    /// Captured stdout, lossily decoded.
    pub stdout: String,
    /// Captured stderr, lossily decoded.
    pub stderr: String,
}

impl CommandOutput {
    /// A zero-exit output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed output.
    pub fn failed(status_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            status_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// True if the exit code is zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.status_code == 0
    }

    /// The most useful single line explaining a failure.
    #[must_use]
    pub fn failure_summary(&self) -> String {
        let text = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        match text.lines().map(str::trim).rfind(|l| !l.is_empty()) {
            Some(line) => format!("exit code {}: {line}", self.status_code),
            None => format!("exit code {}", self.status_code),
        }
    }
}

/// Runs external commands.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `spec` to completion and captures its output.
    ///
    /// A non-zero exit is not an error; the caller inspects
    /// [`CommandOutput::status_code`].
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError>;
}

/// Runs commands with `tokio::process`, killing any that outlive the timeout.
#[derive(Debug, Clone, Copy)]
pub struct SystemCommandRunner {
    timeout: Duration,
}

impl SystemCommandRunner {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        debug!(command = %spec.command_line(), "Running command");
        let child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CommandError::Spawn {
                program: spec.program.clone(),
                source,
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| CommandError::Spawn {
                program: spec.program.clone(),
                source,
            })?,
            Err(_) => {
                return Err(CommandError::Timeout {
                    program: spec.program.clone(),
                    timeout: self.timeout,
                })
            }
        };

        Ok(CommandOutput {
            status_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_powershell_spec() {
        let spec = CommandSpec::powershell("Get-Date");
        assert_eq!(spec.program, "powershell.exe");
        assert_eq!(spec.args.last().map(String::as_str), Some("Get-Date"));
        assert!(spec.command_line().starts_with("powershell.exe -NoProfile"));
    }

    #[test]
    fn test_failure_summary_prefers_stderr() {
        let mut output = CommandOutput::failed(2, "first\nAccess is denied.\n\n");
        assert_eq!(output.failure_summary(), "exit code 2: Access is denied.");

        output.stderr.clear();
        output.stdout = "No installed package found".to_string();
        assert_eq!(output.failure_summary(), "exit code 2: No installed package found");

        output.stdout.clear();
        assert_eq!(output.failure_summary(), "exit code 2");
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let runner = SystemCommandRunner::new(Duration::from_secs(5));
        let err = runner
            .run(&CommandSpec::new("hostcare-no-such-program", Vec::<String>::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_output_and_exit_code() {
        let runner = SystemCommandRunner::new(Duration::from_secs(5));
        let output = runner
            .run(&CommandSpec::new("sh", ["-c", "echo out; echo err >&2; exit 3"]))
            .await
            .unwrap();
        assert_eq!(output.status_code, 3);
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_command() {
        let runner = SystemCommandRunner::new(Duration::from_millis(100));
        let err = runner
            .run(&CommandSpec::new("sleep", ["5"]))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Timeout { .. }));
    }
}
