//! Diagnostics collection.

use super::{DiagnosticsSnapshot, PowerSource};
use crate::logging::RunLogger;
use crate::utils::{now_utc, Timestamp};
use async_trait::async_trait;
use std::sync::Arc;

/// Source of individual host facts.
///
/// Every query is independent and answers `None` when the host cannot
/// tell (no battery, restore points disabled, query tool missing).
#[async_trait]
pub trait HostProbe: Send + Sync {
    /// Host name.
    async fn host_name(&self) -> Option<String>;

    /// Operating system name and version.
    async fn os_version(&self) -> Option<String>;

    /// Free space on the system volume.
    async fn free_disk_bytes(&self) -> Option<u64>;

    /// Installed physical memory.
    async fn total_memory_bytes(&self) -> Option<u64>;

    /// Power state.
    async fn power_source(&self) -> Option<PowerSource>;

    /// Creation time of the most recent restore point.
    async fn last_checkpoint_time(&self) -> Option<Timestamp>;
}

/// Gathers a [`DiagnosticsSnapshot`] from a [`HostProbe`].
#[derive(Clone)]
pub struct DiagnosticsCollector {
    probe: Arc<dyn HostProbe>,
}

impl std::fmt::Debug for DiagnosticsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticsCollector").finish_non_exhaustive()
    }
}

impl DiagnosticsCollector {
    /// Creates a collector over the given probe.
    #[must_use]
    pub fn new(probe: Arc<dyn HostProbe>) -> Self {
        Self { probe }
    }

    /// Captures a snapshot. Never fails; unanswered queries leave fields empty.
    pub async fn collect(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            captured_at: now_utc(),
            host_name: self.probe.host_name().await,
            os_version: self.probe.os_version().await,
            free_disk_bytes: self.probe.free_disk_bytes().await,
            total_memory_bytes: self.probe.total_memory_bytes().await,
            power_source: self.probe.power_source().await,
            last_checkpoint_time: self.probe.last_checkpoint_time().await,
        }
    }

    /// Captures a snapshot, logs it, and logs each advisory at Warning level.
    pub async fn collect_and_advise(&self, logger: &RunLogger) -> DiagnosticsSnapshot {
        let snapshot = self.collect().await;

        logger.info(format!(
            "System diagnostics: {}",
            snapshot.summary_lines().join(", ")
        ));
        for advisory in snapshot.advisories() {
            logger.warning(advisory.message);
        }

        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::GIB;
    use crate::logging::{CollectingLogSink, LogLevel};
    use crate::testing::StaticHostProbe;

    fn logger() -> (RunLogger, Arc<CollectingLogSink>) {
        let sink = Arc::new(CollectingLogSink::new());
        (RunLogger::new(vec![sink.clone()]), sink)
    }

    #[tokio::test]
    async fn test_collect_copies_probe_answers() {
        let probe = StaticHostProbe::healthy().with_free_disk(42 * GIB);
        let snapshot = DiagnosticsCollector::new(Arc::new(probe)).collect().await;

        assert_eq!(snapshot.host_name.as_deref(), Some("test-host"));
        assert_eq!(snapshot.free_disk_bytes, Some(42 * GIB));
        assert_eq!(snapshot.power_source, Some(PowerSource::Ac));
    }

    #[tokio::test]
    async fn test_unanswered_queries_leave_fields_empty() {
        let snapshot = DiagnosticsCollector::new(Arc::new(StaticHostProbe::unknown()))
            .collect()
            .await;

        assert_eq!(snapshot.host_name, None);
        assert_eq!(snapshot.free_disk_bytes, None);
        assert_eq!(snapshot.power_source, None);
        assert_eq!(snapshot.last_checkpoint_time, None);
    }

    #[tokio::test]
    async fn test_low_disk_emits_exactly_one_warning() {
        let (logger, sink) = logger();
        let probe = StaticHostProbe::healthy().with_free_disk(5 * GIB);
        DiagnosticsCollector::new(Arc::new(probe))
            .collect_and_advise(&logger)
            .await;

        let warnings = sink.records_at(LogLevel::Warning);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.starts_with("Low disk space"));
    }

    #[tokio::test]
    async fn test_ample_disk_emits_no_warning() {
        let (logger, sink) = logger();
        let probe = StaticHostProbe::healthy().with_free_disk(50 * GIB);
        DiagnosticsCollector::new(Arc::new(probe))
            .collect_and_advise(&logger)
            .await;

        assert!(sink.records_at(LogLevel::Warning).is_empty());
        assert_eq!(sink.records_at(LogLevel::Info).len(), 1);
    }
}
