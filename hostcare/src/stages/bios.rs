use super::ports::{FirmwareInfo, FirmwareQuery};
use super::Stage;
use crate::context::RunContext;
use crate::core::{Criticality, StageOutcome};
use crate::errors::Result;
use crate::pipeline::StageId;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Reports installed firmware and points at the board vendor's support page.
///
/// Firmware is never flashed by this stage.
pub struct BiosGuidanceStage {
    firmware: Arc<dyn FirmwareQuery>,
}

impl BiosGuidanceStage {
    /// Creates the stage over a firmware query.
    #[must_use]
    pub fn new(firmware: Arc<dyn FirmwareQuery>) -> Self {
        Self { firmware }
    }
}

impl fmt::Debug for BiosGuidanceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BiosGuidanceStage").finish_non_exhaustive()
    }
}

fn describe(info: &FirmwareInfo) -> String {
    let field = |v: &Option<String>| v.clone().unwrap_or_else(|| "unknown".to_string());
    format!(
        "Firmware {} {} (released {}) on board {}",
        field(&info.vendor),
        field(&info.version),
        field(&info.release_date),
        field(&info.board),
    )
}

fn guidance(info: &FirmwareInfo) -> &'static str {
    let vendor = info
        .vendor
        .as_deref()
        .or(info.board.as_deref())
        .unwrap_or_default()
        .to_ascii_lowercase();
    if vendor.contains("dell") {
        "check https://www.dell.com/support for firmware updates"
    } else if vendor.contains("lenovo") {
        "check https://support.lenovo.com for firmware updates"
    } else if vendor.contains("hp") || vendor.contains("hewlett") {
        "check https://support.hp.com for firmware updates"
    } else if vendor.contains("asus") || vendor.contains("american megatrends") {
        "check the board vendor's support site for firmware updates"
    } else {
        "check the system or board vendor's support site for firmware updates"
    }
}

#[async_trait]
impl Stage for BiosGuidanceStage {
    fn name(&self) -> &str {
        StageId::BiosGuidance.as_str()
    }

    fn criticality(&self) -> Criticality {
        Criticality::Continue
    }

    fn dry_run_description(&self, _ctx: &RunContext) -> String {
        "Would report installed firmware version and vendor update guidance".to_string()
    }

    async fn execute(&self, _ctx: &RunContext) -> Result<StageOutcome> {
        let info = self.firmware.firmware().await?;
        Ok(StageOutcome::success(format!(
            "{}; {}",
            describe(&info),
            guidance(&info)
        )))
    }
}
