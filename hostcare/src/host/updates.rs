//! OS update and package-manager adapters.

use super::command::{CommandRunner, CommandSpec};
use super::{parse_json_list, ps_quote};
use crate::errors::{HostcareError, Result};
use crate::stages::ports::{
    InstallSummary, OsUpdater, PackageUpgrade, PackageUpgrader, PendingUpdate, UpdateCategory,
    UpgradeSummary,
};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, OnceLock};

/// Windows Update through the `Microsoft.Update.Session` COM API.
pub struct PowerShellOsUpdater {
    runner: Arc<dyn CommandRunner>,
}

impl PowerShellOsUpdater {
    /// Creates the updater over `runner`.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

fn search_criteria(category: UpdateCategory) -> &'static str {
    match category {
        UpdateCategory::Software => "IsInstalled=0 and Type='Software' and IsHidden=0",
        UpdateCategory::Drivers => "IsInstalled=0 and Type='Driver' and IsHidden=0",
    }
}

fn scan_script(category: UpdateCategory) -> String {
    format!(
        "$s = New-Object -ComObject Microsoft.Update.Session; \
         $r = $s.CreateUpdateSearcher().Search(\"{}\"); \
         @($r.Updates | ForEach-Object {{ [pscustomobject]@{{ \
         id = $_.Identity.UpdateID; kb = ($_.KBArticleIDs | Select-Object -First 1); \
         title = $_.Title }} }}) | ConvertTo-Json -Compress",
        search_criteria(category)
    )
}

fn install_script(updates: &[PendingUpdate]) -> String {
    let ids = updates
        .iter()
        .map(|u| ps_quote(&u.id))
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "$ids = @({ids}); \
         $s = New-Object -ComObject Microsoft.Update.Session; \
         $r = $s.CreateUpdateSearcher().Search('IsInstalled=0'); \
         $c = New-Object -ComObject Microsoft.Update.UpdateColl; \
         foreach ($u in $r.Updates) {{ if ($ids -contains $u.Identity.UpdateID) {{ \
         if (-not $u.EulaAccepted) {{ $u.AcceptEula() }}; [void]$c.Add($u) }} }}; \
         $d = $s.CreateUpdateDownloader(); $d.Updates = $c; [void]$d.Download(); \
         $i = $s.CreateUpdateInstaller(); $i.Updates = $c; $res = $i.Install(); \
         $out = for ($n = 0; $n -lt $c.Count; $n++) {{ [pscustomobject]@{{ \
         title = $c.Item($n).Title; code = $res.GetUpdateResult($n).ResultCode }} }}; \
         [pscustomobject]@{{ reboot = $res.RebootRequired; results = @($out) }} \
         | ConvertTo-Json -Compress -Depth 3"
    )
}

#[derive(Debug, Deserialize)]
struct InstallResult {
    title: String,
    code: i32,
}

#[derive(Debug, Deserialize)]
struct InstallReport {
    #[serde(default)]
    reboot: bool,
    #[serde(default)]
    results: Vec<InstallResult>,
}

// OperationResultCode: 2 succeeded, 3 succeeded with errors.
fn parse_install_report(stdout: &str) -> Result<InstallSummary> {
    let report: InstallReport = serde_json::from_str(stdout.trim())?;
    let mut summary = InstallSummary {
        reboot_required: report.reboot,
        ..InstallSummary::default()
    };
    for result in report.results {
        if matches!(result.code, 2 | 3) {
            summary.installed.push(result.title);
        } else {
            summary.failed.push(result.title);
        }
    }
    Ok(summary)
}

#[async_trait]
impl OsUpdater for PowerShellOsUpdater {
    async fn scan(&self, category: UpdateCategory) -> Result<Vec<PendingUpdate>> {
        let output = self
            .runner
            .run(&CommandSpec::powershell(scan_script(category)))
            .await?;
        if !output.success() {
            return Err(HostcareError::collaborator(
                "os-update",
                format!("scan failed, {}", output.failure_summary()),
            ));
        }
        parse_json_list(&output.stdout)
    }

    async fn install(&self, updates: &[PendingUpdate]) -> Result<InstallSummary> {
        if updates.is_empty() {
            return Ok(InstallSummary::default());
        }
        let output = self
            .runner
            .run(&CommandSpec::powershell(install_script(updates)))
            .await?;
        if !output.success() {
            return Err(HostcareError::collaborator(
                "os-update",
                format!("install failed, {}", output.failure_summary()),
            ));
        }
        parse_install_report(&output.stdout)
    }
}

/// Application upgrades through `winget`.
pub struct WingetUpgrader {
    runner: Arc<dyn CommandRunner>,
}

impl WingetUpgrader {
    /// Creates an upgrader that runs `winget` through `runner`.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

const WINGET_FLAGS: [&str; 4] = [
    "--silent",
    "--accept-package-agreements",
    "--accept-source-agreements",
    "--disable-interactivity",
];

/// Extracts the package id from a `Found <name> [<id>] Version ...` line.
fn found_package_id(line: &str) -> Option<&str> {
    static FOUND: OnceLock<Option<Regex>> = OnceLock::new();
    let re = FOUND
        .get_or_init(|| Regex::new(r"(?i)\bfound\b.*\[([^\]\s]+)\]").ok())
        .as_ref()?;
    re.captures(line).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Per-package failure lines `winget` prints during an upgrade.
const PACKAGE_FAILURE_PHRASES: [&str; 5] = [
    "installer failed with exit code",
    "installation failed",
    "installer hash does not match",
    "failed to install",
    "an unexpected error occurred while executing the command",
];

fn is_package_failure(lower: &str) -> bool {
    PACKAGE_FAILURE_PHRASES
        .iter()
        .any(|phrase| lower.starts_with(phrase))
}

/// Reads `winget upgrade --all` progress output.
fn parse_upgrade_all(stdout: &str) -> UpgradeSummary {
    let mut summary = UpgradeSummary::default();
    let mut current: Option<String> = None;

    for line in stdout.lines().map(str::trim) {
        let lower = line.to_ascii_lowercase();
        if let Some(id) = found_package_id(line) {
            current = Some(id.to_string());
        } else if lower.starts_with("successfully installed") {
            summary.upgraded += 1;
            current = None;
        } else if is_package_failure(&lower) {
            summary.failed += 1;
            summary
                .failures
                .push(current.take().unwrap_or_else(|| line.to_string()));
        }
    }
    summary
}

fn classify_package_output(
    stdout: &str,
    success: bool,
    failure: impl FnOnce() -> String,
) -> PackageUpgrade {
    let lower = stdout.to_ascii_lowercase();
    if lower.contains("no installed package found") {
        PackageUpgrade::NotInstalled
    } else if lower.contains("no available upgrade found")
        || lower.contains("no applicable upgrade found")
        || lower.contains("no newer package versions")
    {
        PackageUpgrade::UpToDate
    } else if success {
        PackageUpgrade::Upgraded
    } else {
        PackageUpgrade::Failed(failure())
    }
}

#[async_trait]
impl PackageUpgrader for WingetUpgrader {
    async fn upgrade_all(&self) -> Result<UpgradeSummary> {
        let args = std::iter::once("upgrade")
            .chain(std::iter::once("--all"))
            .chain(WINGET_FLAGS);
        let output = self.runner.run(&CommandSpec::new("winget", args)).await?;

        let mut summary = parse_upgrade_all(&output.stdout);
        let nothing_to_do = !matches!(
            classify_package_output(&output.stdout, false, String::new),
            PackageUpgrade::Failed(_)
        );
        if !output.success() && summary.failed == 0 && !nothing_to_do {
            summary.failed = 1;
            summary.failures.push(output.failure_summary());
        }
        Ok(summary)
    }

    async fn upgrade_package(&self, id: &str) -> Result<PackageUpgrade> {
        let args = ["upgrade", "--id", id, "--exact"]
            .into_iter()
            .chain(WINGET_FLAGS);
        let output = self.runner.run(&CommandSpec::new("winget", args)).await?;
        Ok(classify_package_output(&output.stdout, output.success(), || {
            output.failure_summary()
        }))
    }
}
