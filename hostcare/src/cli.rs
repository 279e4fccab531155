//! Command-line interface using clap.

use crate::errors::{HostcareError, Result};
use crate::orchestrator::RunOptions;
use crate::pipeline::Scope;
use crate::utils::parse_schedule_time;
use chrono::NaiveTime;
use clap::Parser;
use std::path::PathBuf;

/// Hostcare: sequenced host maintenance with dry-run and audit reports
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "hostcare")]
#[command(author, version, about, long_about = None)]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Stages to run: Full, WindowsOnly, AppsOnly, GPU or BIOS
    #[arg(long, default_value = "Full")]
    pub scope: Scope,

    /// Describe every stage without changing the host
    #[arg(long)]
    pub dry_run: bool,

    /// Do not prompt for a restart after the run
    #[arg(long)]
    pub skip_reboot: bool,

    /// Create a restore point before the first stage
    #[arg(long)]
    pub enable_rollback: bool,

    /// Register a daily Full run (with --skip-reboot) after this run
    #[arg(long)]
    pub schedule_task: bool,

    /// Start time for --schedule-task, as HH:MM
    #[arg(long, value_parser = parse_schedule_time, default_value = "03:00")]
    pub schedule_time: NaiveTime,

    /// Audit log file
    #[arg(long, env = "HOSTCARE_LOG_PATH")]
    pub log_path: Option<PathBuf>,

    /// Email the report to this address
    #[arg(long, value_name = "ADDRESS")]
    pub email_report: Option<String>,

    /// Write the report as JSON to this file
    #[arg(long, value_name = "PATH")]
    pub report_json: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long, env = "HOSTCARE_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Turns the parsed flags into run options.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an email address without `@`.
    pub fn run_options(&self) -> Result<RunOptions> {
        if let Some(address) = &self.email_report {
            if !address.contains('@') {
                return Err(HostcareError::Config(format!(
                    "--email-report '{address}' is not an email address"
                )));
            }
        }
        Ok(RunOptions {
            scope: self.scope,
            dry_run: self.dry_run,
            skip_reboot: self.skip_reboot,
            enable_rollback: self.enable_rollback,
            schedule_at: self.schedule_task.then_some(self.schedule_time),
            email_report: self.email_report.clone(),
            report_json: self.report_json.clone(),
        })
    }

    /// The audit log path, defaulting to `hostcare.log` in the temp directory.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.log_path
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("hostcare.log"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("hostcare").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        let options = cli.run_options().unwrap();
        assert_eq!(options, RunOptions::new(Scope::Full));
    }

    #[test]
    fn test_flags_map_to_options() {
        let cli = parse(&[
            "--scope",
            "gpu",
            "--dry-run",
            "--skip-reboot",
            "--enable-rollback",
            "--email-report",
            "ops@example.com",
            "--report-json",
            "out/run.json",
        ]);
        let options = cli.run_options().unwrap();
        assert_eq!(options.scope, Scope::Gpu);
        assert!(options.dry_run && options.skip_reboot && options.enable_rollback);
        assert_eq!(options.email_report.as_deref(), Some("ops@example.com"));
        assert_eq!(options.report_json, Some(PathBuf::from("out/run.json")));
        assert_eq!(options.schedule_at, None);
    }

    #[test]
    fn test_schedule_time_only_used_with_schedule_task() {
        let without = parse(&["--schedule-time", "04:30"]).run_options().unwrap();
        assert_eq!(without.schedule_at, None);

        let with = parse(&["--schedule-task", "--schedule-time", "04:30"])
            .run_options()
            .unwrap();
        assert_eq!(with.schedule_at, NaiveTime::from_hms_opt(4, 30, 0));
    }

    #[test]
    fn test_rejects_bad_values() {
        let cli = |args: &[&str]| {
            Cli::try_parse_from(std::iter::once("hostcare").chain(args.iter().copied()))
        };
        assert!(cli(&["--scope", "everything"]).is_err());
        assert!(cli(&["--schedule-time", "25:00"]).is_err());

        let err = parse(&["--email-report", "ops"]).run_options().unwrap_err();
        assert!(err.is_precondition());
    }
}
