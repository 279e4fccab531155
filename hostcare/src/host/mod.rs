//! Command-backed implementations of the collaborator ports.
//!
//! Everything here shells out through a [`CommandRunner`], so the parsing
//! can be tested against canned output.

mod command;
mod inventory;
mod system;
mod updates;

pub use command::{CommandOutput, CommandRunner, CommandSpec, SystemCommandRunner};
pub use inventory::{CimDisplayAdapters, CimFirmwareQuery, SystemHostProbe};
pub use system::{
    CommandPrivilegeCheck, RestorePointService, SchtasksScheduler, SmtpReportTransport,
    StdinRebootPrompt,
};
pub use updates::{PowerShellOsUpdater, WingetUpgrader};

use crate::errors::Result;
use serde::de::DeserializeOwned;

/// Quotes `value` as a PowerShell single-quoted string.
pub(crate) fn ps_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Parses `ConvertTo-Json` output that may be empty, one object, or an array.
pub(crate) fn parse_json_list<T: DeserializeOwned>(stdout: &str) -> Result<Vec<T>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<serde_json::Value>(trimmed)? {
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(Into::into))
            .collect(),
        serde_json::Value::Null => Ok(Vec::new()),
        single => Ok(vec![serde_json::from_value(single)?]),
    }
}
