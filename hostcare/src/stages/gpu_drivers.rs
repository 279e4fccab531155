//! GPU driver refresh through a fallback chain.

use super::ports::{
    DisplayAdapter, DisplayAdapterQuery, OsUpdater, PackageUpgrade, PackageUpgrader,
    UpdateCategory,
};
use super::Stage;
use crate::context::RunContext;
use crate::core::{Criticality, StageOutcome};
use crate::errors::Result;
use crate::fallback::{ChainTarget, FallbackChain, FallbackMethod, MethodResult};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

fn matches_vendor(name: &str, signatures: &[String]) -> bool {
    let name = name.to_ascii_lowercase();
    signatures
        .iter()
        .any(|sig| name.contains(&sig.to_ascii_lowercase()))
}

/// Display adapters matching a set of vendor signatures.
pub struct AdapterTarget {
    query: Arc<dyn DisplayAdapterQuery>,
    signatures: Vec<String>,
}

impl AdapterTarget {
    /// Creates a target matching adapter names containing any signature
    /// (case-insensitive).
    #[must_use]
    pub fn new(query: Arc<dyn DisplayAdapterQuery>, signatures: Vec<String>) -> Self {
        Self { query, signatures }
    }

    async fn matching(&self) -> Result<Vec<DisplayAdapter>> {
        let adapters = self.query.adapters().await?;
        Ok(adapters
            .into_iter()
            .filter(|a| matches_vendor(&a.name, &self.signatures))
            .collect())
    }
}

#[async_trait]
impl ChainTarget for AdapterTarget {
    fn description(&self) -> String {
        format!("{} display adapter", self.signatures.join("/"))
    }

    async fn detect(&self) -> Result<Vec<String>> {
        Ok(self
            .matching()
            .await?
            .into_iter()
            .map(|a| a.name)
            .collect())
    }

    async fn version_descriptor(&self) -> String {
        match self.matching().await {
            Ok(adapters) if !adapters.is_empty() => adapters
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            Ok(_) => "no adapter".to_string(),
            Err(e) => format!("unknown ({e})"),
        }
    }
}

/// Upgrades vendor driver packages through the package manager.
pub struct PackageManagerMethod {
    upgrader: Arc<dyn PackageUpgrader>,
    package_ids: Vec<String>,
}

impl PackageManagerMethod {
    /// Creates the method over the given package identifiers.
    #[must_use]
    pub fn new(upgrader: Arc<dyn PackageUpgrader>, package_ids: Vec<String>) -> Self {
        Self {
            upgrader,
            package_ids,
        }
    }
}

#[async_trait]
impl FallbackMethod for PackageManagerMethod {
    fn name(&self) -> &str {
        "package-manager"
    }

    async fn attempt(&self, _ctx: &RunContext) -> MethodResult {
        let mut upgraded = Vec::new();
        let mut current = Vec::new();
        let mut failures = Vec::new();

        for id in &self.package_ids {
            match self.upgrader.upgrade_package(id).await {
                Ok(PackageUpgrade::Upgraded) => upgraded.push(id.as_str()),
                Ok(PackageUpgrade::UpToDate) => current.push(id.as_str()),
                Ok(PackageUpgrade::NotInstalled) => {
                    debug!(package = %id, "Driver package not installed");
                }
                Ok(PackageUpgrade::Failed(msg)) => failures.push(format!("{id}: {msg}")),
                Err(e) => failures.push(format!("{id}: {e}")),
            }
        }

        if !upgraded.is_empty() {
            MethodResult::Success(format!("upgraded {}", upgraded.join(", ")))
        } else if !failures.is_empty() {
            MethodResult::Failed(failures.join("; "))
        } else if !current.is_empty() {
            MethodResult::Success(format!("{} already up to date", current.join(", ")))
        } else {
            MethodResult::Skipped("no vendor driver package installed".to_string())
        }
    }
}

/// Installs driver updates offered through the OS update channel.
pub struct OsUpdateCategoryMethod {
    updater: Arc<dyn OsUpdater>,
    signatures: Vec<String>,
}

impl OsUpdateCategoryMethod {
    /// Creates the method; only offers whose title matches a signature are used.
    #[must_use]
    pub fn new(updater: Arc<dyn OsUpdater>, signatures: Vec<String>) -> Self {
        Self {
            updater,
            signatures,
        }
    }
}

#[async_trait]
impl FallbackMethod for OsUpdateCategoryMethod {
    fn name(&self) -> &str {
        "os-update-category"
    }

    async fn attempt(&self, _ctx: &RunContext) -> MethodResult {
        let offers = match self.updater.scan(UpdateCategory::Drivers).await {
            Ok(offers) => offers,
            Err(e) => return MethodResult::Failed(format!("driver scan failed: {e}")),
        };
        let offers: Vec<_> = offers
            .into_iter()
            .filter(|u| matches_vendor(&u.title, &self.signatures))
            .collect();
        if offers.is_empty() {
            return MethodResult::Skipped("no matching driver offered".to_string());
        }

        match self.updater.install(&offers).await {
            Ok(summary) if summary.failed.is_empty() && !summary.installed.is_empty() => {
                MethodResult::Success(format!("installed {}", summary.installed.join(", ")))
            }
            Ok(summary) if summary.failed.is_empty() => {
                MethodResult::Failed("installer reported nothing installed".to_string())
            }
            Ok(summary) => MethodResult::Failed(format!(
                "failed to install {}",
                summary.failed.join(", ")
            )),
            Err(e) => MethodResult::Failed(format!("install failed: {e}")),
        }
    }
}

/// Points the operator at the vendor download page. Never updates anything.
pub struct ManualGuidanceMethod {
    guidance: String,
}

impl ManualGuidanceMethod {
    /// Creates the method with the given guidance text.
    #[must_use]
    pub fn new(guidance: impl Into<String>) -> Self {
        Self {
            guidance: guidance.into(),
        }
    }
}

#[async_trait]
impl FallbackMethod for ManualGuidanceMethod {
    fn name(&self) -> &str {
        "manual-guidance"
    }

    async fn attempt(&self, _ctx: &RunContext) -> MethodResult {
        MethodResult::Skipped(self.guidance.clone())
    }
}

/// Refreshes GPU drivers. Failure is never fatal to the run.
pub struct GpuDriverStage {
    chain: FallbackChain,
    target: Arc<dyn ChainTarget>,
}

impl fmt::Debug for GpuDriverStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuDriverStage")
            .field("chain", &self.chain)
            .finish_non_exhaustive()
    }
}

impl GpuDriverStage {
    /// Creates the stage over a chain and a target.
    #[must_use]
    pub fn new(chain: FallbackChain, target: Arc<dyn ChainTarget>) -> Self {
        Self { chain, target }
    }
}

#[async_trait]
impl Stage for GpuDriverStage {
    fn name(&self) -> &str {
        crate::pipeline::StageId::GpuDrivers.as_str()
    }

    fn criticality(&self) -> Criticality {
        Criticality::Continue
    }

    fn dry_run_description(&self, _ctx: &RunContext) -> String {
        format!(
            "Would detect {} and try update methods in order: {}",
            self.target.description(),
            self.chain.method_names().join(", ")
        )
    }

    async fn execute(&self, ctx: &RunContext) -> Result<StageOutcome> {
        Ok(self.chain.execute(self.target.as_ref(), ctx).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageStatus;
    use crate::stages::ports::PendingUpdate;
    use crate::testing::{test_context, FakeOsUpdater, FakePackageUpgrader, StaticAdapters};

    fn nvidia() -> Vec<String> {
        vec!["NVIDIA".to_string()]
    }

    #[test]
    fn test_vendor_match_is_case_insensitive() {
        assert!(matches_vendor("NVIDIA GeForce RTX 3070", &nvidia()));
        assert!(matches_vendor("nvidia quadro", &nvidia()));
        assert!(!matches_vendor("AMD Radeon RX 6800", &nvidia()));
    }

    #[tokio::test]
    async fn test_adapter_target_detects_matching_adapters() {
        let adapters = StaticAdapters::new(vec![
            ("Intel(R) UHD Graphics 770", Some("31.0.101.4255")),
            ("NVIDIA GeForce RTX 3070", Some("31.0.15.3623")),
        ]);
        let target = AdapterTarget::new(Arc::new(adapters), nvidia());

        assert_eq!(target.detect().await.unwrap(), vec!["NVIDIA GeForce RTX 3070"]);
        assert_eq!(
            target.version_descriptor().await,
            "NVIDIA GeForce RTX 3070 (driver 31.0.15.3623)"
        );
        assert_eq!(target.description(), "NVIDIA display adapter");
    }

    #[tokio::test]
    async fn test_package_method_outcomes() {
        let ctx = test_context();

        let upgrader = Arc::new(
            FakePackageUpgrader::new()
                .with_package("Nvidia.GeForceExperience", PackageUpgrade::Upgraded),
        );
        let method =
            PackageManagerMethod::new(upgrader, vec!["Nvidia.GeForceExperience".to_string()]);
        assert!(matches!(method.attempt(&ctx).await, MethodResult::Success(_)));

        let upgrader = Arc::new(FakePackageUpgrader::new());
        let method =
            PackageManagerMethod::new(upgrader, vec!["Nvidia.GeForceExperience".to_string()]);
        assert!(matches!(method.attempt(&ctx).await, MethodResult::Skipped(_)));

        let upgrader = Arc::new(
            FakePackageUpgrader::new()
                .with_package("Nvidia.App", PackageUpgrade::Failed("hash mismatch".to_string())),
        );
        let method = PackageManagerMethod::new(upgrader, vec!["Nvidia.App".to_string()]);
        assert_eq!(
            method.attempt(&ctx).await,
            MethodResult::Failed("Nvidia.App: hash mismatch".to_string())
        );
    }

    #[tokio::test]
    async fn test_os_update_method_filters_by_vendor() {
        let ctx = test_context();
        let updater = Arc::new(FakeOsUpdater::new().with_drivers(vec![PendingUpdate {
            id: "1".to_string(),
            kb: None,
            title: "Realtek - Audio - 6.0.9".to_string(),
        }]));
        let method = OsUpdateCategoryMethod::new(updater.clone(), nvidia());

        assert!(matches!(method.attempt(&ctx).await, MethodResult::Skipped(_)));
        assert_eq!(updater.install_calls(), 0);
    }

    #[tokio::test]
    async fn test_os_update_method_installs_matching_offer() {
        let ctx = test_context();
        let updater = Arc::new(FakeOsUpdater::new().with_drivers(vec![PendingUpdate {
            id: "2".to_string(),
            kb: None,
            title: "NVIDIA - Display - 31.0.15.5123".to_string(),
        }]));
        let method = OsUpdateCategoryMethod::new(updater.clone(), nvidia());

        assert_eq!(
            method.attempt(&ctx).await,
            MethodResult::Success("installed NVIDIA - Display - 31.0.15.5123".to_string())
        );
        assert_eq!(updater.install_calls(), 1);
    }

    #[tokio::test]
    async fn test_stage_without_hardware_is_skipped() {
        let ctx = test_context();
        let adapters = Arc::new(StaticAdapters::new(vec![("AMD Radeon RX 6800", None)]));
        let upgrader = Arc::new(FakePackageUpgrader::new());
        let chain = FallbackChain::new().then(Arc::new(PackageManagerMethod::new(
            upgrader.clone(),
            vec!["Nvidia.App".to_string()],
        )));
        let stage = GpuDriverStage::new(chain, Arc::new(AdapterTarget::new(adapters, nvidia())));

        let outcome = stage.execute(&ctx).await.unwrap();
        assert_eq!(outcome.status, StageStatus::SkippedNoHardware);
        assert_eq!(upgrader.package_calls(), 0);
        assert_eq!(stage.criticality(), Criticality::Continue);
    }

    #[tokio::test]
    async fn test_stage_falls_through_to_manual_guidance() {
        let ctx = test_context();
        let adapters = Arc::new(StaticAdapters::new(vec![(
            "NVIDIA GeForce GTX 1080",
            Some("27.21.14.5671"),
        )]));
        let chain = FallbackChain::new()
            .then(Arc::new(PackageManagerMethod::new(
                Arc::new(FakePackageUpgrader::new()),
                vec!["Nvidia.App".to_string()],
            )))
            .then(Arc::new(OsUpdateCategoryMethod::new(
                Arc::new(FakeOsUpdater::new()),
                nvidia(),
            )))
            .then(Arc::new(ManualGuidanceMethod::new(
                "download from https://www.nvidia.com/Download/index.aspx",
            )));
        let stage = GpuDriverStage::new(chain, Arc::new(AdapterTarget::new(adapters, nvidia())));

        let outcome = stage.execute(&ctx).await.unwrap();
        assert_eq!(outcome.status, StageStatus::Failed);
        assert!(outcome.detail.contains("no method applicable"));
        assert!(outcome.detail.contains("manual-guidance: skipped (download from"));
        assert!(outcome.detail.contains("before: NVIDIA GeForce GTX 1080 (driver 27.21.14.5671)"));
    }
}
