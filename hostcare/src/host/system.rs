//! Privilege, checkpoint, scheduling, mail and restart adapters.

use super::command::{CommandRunner, CommandSpec};
use super::ps_quote;
use crate::errors::{HostcareError, Result};
use crate::orchestrator::{
    CheckpointService, PrivilegeCheck, RebootPrompt, ScheduledInvocation, TaskScheduler,
};
use crate::report::{ReportTransport, RunReport};
use async_trait::async_trait;
use std::io::Write as _;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Elevation check: `net session` on Windows, `id -u` elsewhere.
pub struct CommandPrivilegeCheck {
    runner: Arc<dyn CommandRunner>,
}

impl CommandPrivilegeCheck {
    /// Creates the check over `runner`.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl PrivilegeCheck for CommandPrivilegeCheck {
    async fn is_elevated(&self) -> Result<bool> {
        if cfg!(windows) {
            let output = self
                .runner
                .run(&CommandSpec::new("net", ["session"]))
                .await?;
            Ok(output.success())
        } else {
            let output = self.runner.run(&CommandSpec::new("id", ["-u"])).await?;
            if !output.success() {
                return Err(HostcareError::collaborator("privilege", output.failure_summary()));
            }
            Ok(output.stdout.trim() == "0")
        }
    }
}

/// System Restore checkpoints through `Checkpoint-Computer`.
pub struct RestorePointService {
    runner: Arc<dyn CommandRunner>,
}

impl RestorePointService {
    /// Creates the service over `runner`.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl CheckpointService for RestorePointService {
    async fn create(&self, description: &str) -> Result<()> {
        let script = format!(
            "Checkpoint-Computer -Description {} -RestorePointType MODIFY_SETTINGS -ErrorAction Stop",
            ps_quote(description)
        );
        let output = self.runner.run(&CommandSpec::powershell(script)).await?;
        if output.success() {
            Ok(())
        } else {
            Err(HostcareError::collaborator("checkpoint", output.failure_summary()))
        }
    }
}

/// Daily tasks through `schtasks.exe`.
pub struct SchtasksScheduler {
    runner: Arc<dyn CommandRunner>,
}

impl SchtasksScheduler {
    /// Creates a scheduler that calls `schtasks` through `runner`.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

fn schtasks_spec(invocation: &ScheduledInvocation, program: &str) -> CommandSpec {
    let action = std::iter::once(format!("\"{program}\""))
        .chain(invocation.arguments())
        .collect::<Vec<_>>()
        .join(" ");
    CommandSpec::new(
        "schtasks",
        [
            "/Create".to_string(),
            "/F".to_string(),
            "/SC".to_string(),
            "DAILY".to_string(),
            "/RL".to_string(),
            "HIGHEST".to_string(),
            "/TN".to_string(),
            invocation.task_name.clone(),
            "/ST".to_string(),
            invocation.time.format("%H:%M").to_string(),
            "/TR".to_string(),
            action,
        ],
    )
}

#[async_trait]
impl TaskScheduler for SchtasksScheduler {
    async fn register(&self, invocation: &ScheduledInvocation) -> Result<()> {
        let program = std::env::current_exe()?;
        let spec = schtasks_spec(invocation, &program.display().to_string());
        let output = self.runner.run(&spec).await?;
        if output.success() {
            Ok(())
        } else {
            Err(HostcareError::collaborator("scheduler", output.failure_summary()))
        }
    }
}

/// Report mail through PowerShell's `Send-MailMessage`.
pub struct SmtpReportTransport {
    runner: Arc<dyn CommandRunner>,
    server: Option<String>,
    from: String,
}

impl SmtpReportTransport {
    /// Sends through `server` as `from`; no server means every send fails.
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        server: Option<String>,
        from: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            server,
            from: from.into(),
        }
    }
}

fn mail_subject(report: &RunReport) -> String {
    let host = report.diagnostics.host_name.as_deref().unwrap_or("unknown host");
    format!("Maintenance {} on {host} ({})", report.status, report.scope)
}

#[async_trait]
impl ReportTransport for SmtpReportTransport {
    async fn send(&self, report: &RunReport, recipient: &str) -> Result<()> {
        let server = self
            .server
            .as_deref()
            .ok_or_else(|| {
                HostcareError::collaborator("report-mail", "no SMTP server configured")
            })?;
        let script = format!(
            "Send-MailMessage -SmtpServer {} -From {} -To {} -Subject {} -Body {} -ErrorAction Stop",
            ps_quote(server),
            ps_quote(&self.from),
            ps_quote(recipient),
            ps_quote(&mail_subject(report)),
            ps_quote(&report.render_text()),
        );
        let output = self.runner.run(&CommandSpec::powershell(script)).await?;
        if output.success() {
            Ok(())
        } else {
            Err(HostcareError::collaborator("report-mail", output.failure_summary()))
        }
    }
}

/// Asks on the terminal and restarts through `shutdown`.
pub struct StdinRebootPrompt {
    runner: Arc<dyn CommandRunner>,
}

impl StdinRebootPrompt {
    /// Creates a prompt that restarts through `runner`.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[async_trait]
impl RebootPrompt for StdinRebootPrompt {
    async fn confirm(&self, message: &str) -> bool {
        {
            let mut stdout = std::io::stdout().lock();
            let _ = write!(stdout, "{message} [y/N] ");
            let _ = stdout.flush();
        }
        let mut line = String::new();
        match BufReader::new(tokio::io::stdin()).read_line(&mut line).await {
            Ok(_) => is_yes(&line),
            Err(_) => false,
        }
    }

    async fn restart(&self) -> Result<()> {
        let spec = if cfg!(windows) {
            CommandSpec::new("shutdown", ["/r", "/t", "60"])
        } else {
            CommandSpec::new("shutdown", ["-r", "+1"])
        };
        let output = self.runner.run(&spec).await?;
        if output.success() {
            Ok(())
        } else {
            Err(HostcareError::collaborator("restart", output.failure_summary()))
        }
    }
}
