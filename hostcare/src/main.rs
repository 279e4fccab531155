//! Hostcare CLI: sequenced host maintenance
//!
//! ## Usage
//!
//! ```bash
//! hostcare --dry-run                          # Describe a Full run
//! hostcare --scope WindowsOnly --skip-reboot  # Patch the OS only
//! hostcare --enable-rollback --email-report ops@example.com
//! hostcare --schedule-task --schedule-time 03:00
//! ```

use anyhow::Context as _;
use clap::Parser;
use hostcare::cli::Cli;
use hostcare::config::MaintenanceConfig;
use hostcare::diagnostics::TcpConnectivityProbe;
use hostcare::host::{
    CimDisplayAdapters, CimFirmwareQuery, CommandPrivilegeCheck, CommandRunner,
    PowerShellOsUpdater, RestorePointService, SchtasksScheduler, SmtpReportTransport,
    StdinRebootPrompt, SystemCommandRunner, SystemHostProbe, WingetUpgrader,
};
use hostcare::logging::{init_tracing, ConsoleLogSink, FileLogSink, RunLogger};
use hostcare::orchestrator::{Collaborators, Orchestrator};
use hostcare::report::{RunReport, RunStatus};
use hostcare::stages::ports::StagePorts;
use hostcare::stages::StageCatalog;
use std::process::ExitCode;
use std::sync::Arc;

const EXIT_PRECONDITION: u8 = 1;
const EXIT_ABORTED: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(EXIT_PRECONDITION)
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => MaintenanceConfig::load(path)?,
        None => MaintenanceConfig::default(),
    };
    let options = cli.run_options()?;

    let log_path = cli.log_path();
    let file_sink = FileLogSink::open(&log_path)
        .with_context(|| format!("cannot open audit log {}", log_path.display()))?;
    let logger = RunLogger::new(vec![Arc::new(file_sink), Arc::new(ConsoleLogSink::detect())]);

    let orchestrator =
        Orchestrator::new(config.clone(), host_collaborators(&config), logger.clone());

    tokio::select! {
        result = orchestrator.run(&options) => match result {
            Ok(report) => {
                println!("\n{}", report.render_text());
                Ok(exit_code(&report))
            }
            Err(e) if e.is_precondition() => {
                eprintln!("Error: {e}");
                Ok(ExitCode::from(EXIT_PRECONDITION))
            }
            Err(e) => Err(e.into()),
        },
        _ = tokio::signal::ctrl_c() => {
            logger.error("Interrupted; remaining stages were not run");
            logger.flush();
            Ok(ExitCode::from(EXIT_INTERRUPTED))
        }
    }
}

fn exit_code(report: &RunReport) -> ExitCode {
    match report.status {
        RunStatus::Success => ExitCode::SUCCESS,
        RunStatus::Aborted => ExitCode::from(EXIT_ABORTED),
    }
}

fn host_collaborators(config: &MaintenanceConfig) -> Collaborators {
    let runner: Arc<dyn CommandRunner> =
        Arc::new(SystemCommandRunner::new(config.command_timeout()));
    let ports = StagePorts {
        os_updater: Arc::new(PowerShellOsUpdater::new(runner.clone())),
        package_upgrader: Arc::new(WingetUpgrader::new(runner.clone())),
        display_adapters: Arc::new(CimDisplayAdapters::new(runner.clone())),
        firmware: Arc::new(CimFirmwareQuery::new(runner.clone())),
    };

    Collaborators {
        privilege: Arc::new(CommandPrivilegeCheck::new(runner.clone())),
        probe: Arc::new(SystemHostProbe::new(runner.clone())),
        connectivity: Arc::new(TcpConnectivityProbe),
        checkpoint: Arc::new(RestorePointService::new(runner.clone())),
        scheduler: Arc::new(SchtasksScheduler::new(runner.clone())),
        transport: Some(Arc::new(SmtpReportTransport::new(
            runner.clone(),
            config.smtp_server.clone(),
            config.smtp_from.clone(),
        ))),
        reboot: Arc::new(StdinRebootPrompt::new(runner)),
        catalog: StageCatalog::from_ports(config, ports),
    }
}
