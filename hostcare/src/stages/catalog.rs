use super::cleanup::default_cleanup_paths;
use super::gpu_drivers::{
    AdapterTarget, GpuDriverStage, ManualGuidanceMethod, OsUpdateCategoryMethod,
    PackageManagerMethod,
};
use super::ports::StagePorts;
use super::{AppUpgradeStage, BiosGuidanceStage, DiskCleanupStage, Stage, WindowsUpdateStage};
use crate::config::MaintenanceConfig;
use crate::fallback::FallbackChain;
use crate::pipeline::StageId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Maps each [`StageId`] to the stage implementing it.
#[derive(Clone, Default)]
pub struct StageCatalog {
    stages: HashMap<StageId, Arc<dyn Stage>>,
}

impl fmt::Debug for StageCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.stages.keys().map(|id| id.as_str()).collect();
        ids.sort_unstable();
        f.debug_struct("StageCatalog").field("stages", &ids).finish()
    }
}

impl StageCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the built-in stages over the given subsystems.
    #[must_use]
    pub fn from_ports(config: &MaintenanceConfig, ports: StagePorts) -> Self {
        let signatures = config.gpu_vendor_signatures.clone();
        let gpu_chain = FallbackChain::new()
            .then(Arc::new(PackageManagerMethod::new(
                ports.package_upgrader.clone(),
                config.gpu_package_ids.clone(),
            )))
            .then(Arc::new(OsUpdateCategoryMethod::new(
                ports.os_updater.clone(),
                signatures.clone(),
            )))
            .then(Arc::new(ManualGuidanceMethod::new(
                config.gpu_manual_guidance.clone(),
            )));
        let gpu_target = Arc::new(AdapterTarget::new(ports.display_adapters, signatures));

        let cleanup_paths = if config.cleanup_paths.is_empty() {
            default_cleanup_paths()
        } else {
            config.cleanup_paths.clone()
        };

        Self::new()
            .with(
                StageId::WindowsUpdate,
                Arc::new(WindowsUpdateStage::new(ports.os_updater)),
            )
            .with(
                StageId::AppUpgrade,
                Arc::new(AppUpgradeStage::new(ports.package_upgrader)),
            )
            .with(
                StageId::GpuDrivers,
                Arc::new(GpuDriverStage::new(gpu_chain, gpu_target)),
            )
            .with(
                StageId::DiskCleanup,
                Arc::new(DiskCleanupStage::new(cleanup_paths, config.cleanup_min_age())),
            )
            .with(
                StageId::BiosGuidance,
                Arc::new(BiosGuidanceStage::new(ports.firmware)),
            )
    }

    /// Registers (or replaces) the stage for `id`.
    #[must_use]
    pub fn with(mut self, id: StageId, stage: Arc<dyn Stage>) -> Self {
        self.stages.insert(id, stage);
        self
    }

    /// Looks up the stage for `id`.
    #[must_use]
    pub fn get(&self, id: StageId) -> Option<Arc<dyn Stage>> {
        self.stages.get(&id).cloned()
    }

    /// Number of registered stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
