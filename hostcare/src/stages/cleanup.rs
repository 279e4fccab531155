//! Temporary-file cleanup.

use super::Stage;
use crate::context::RunContext;
use crate::core::{Criticality, StageOutcome};
use crate::diagnostics::format_bytes;
use crate::errors::{HostcareError, Result};
use crate::pipeline::StageId;
use async_trait::async_trait;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::debug;

/// Counts accumulated while sweeping cleanup paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupTally {
    /// Roots that could be listed.
    pub roots_scanned: usize,
    /// Roots that could not be listed.
    pub roots_unreadable: Vec<PathBuf>,
    /// Files deleted.
    pub files_removed: usize,
    /// Bytes reclaimed.
    pub bytes_removed: u64,
    /// Files that matched but could not be deleted.
    pub files_failed: usize,
}

impl CleanupTally {
    fn summary(&self) -> String {
        let mut s = format!(
            "Removed {} file(s), reclaimed {}",
            self.files_removed,
            format_bytes(self.bytes_removed)
        );
        if self.files_failed > 0 {
            s.push_str(&format!("; {} file(s) could not be removed", self.files_failed));
        }
        if !self.roots_unreadable.is_empty() {
            s.push_str(&format!(
                "; unreadable: {}",
                self.roots_unreadable
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
        s
    }
}

/// The platform's temporary directories.
#[must_use]
pub fn default_cleanup_paths() -> Vec<PathBuf> {
    let mut paths = vec![std::env::temp_dir()];
    if cfg!(windows) {
        if let Some(root) = std::env::var_os("SystemRoot") {
            paths.push(PathBuf::from(root).join("Temp"));
        }
    }
    paths
}

/// Deletes files older than a minimum age under each cleanup root.
///
/// Roots themselves are kept. Directories emptied by the sweep are removed.
#[derive(Debug, Clone)]
pub struct DiskCleanupStage {
    roots: Vec<PathBuf>,
    min_age: Duration,
}

impl DiskCleanupStage {
    /// Sweeps files under `roots` older than `min_age`.
    #[must_use]
    pub fn new(roots: Vec<PathBuf>, min_age: Duration) -> Self {
        Self { roots, min_age }
    }

    /// Returns the configured roots.
    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

fn sweep_dir(dir: &Path, cutoff: SystemTime, tally: &mut CleanupTally) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let Ok(entry) = entry else {
            tally.files_failed += 1;
            continue;
        };
        let path = entry.path();
        let Ok(meta) = entry.metadata() else {
            tally.files_failed += 1;
            continue;
        };

        if meta.is_dir() {
            if sweep_dir(&path, cutoff, tally).is_err() {
                tally.files_failed += 1;
                continue;
            }
            // Only succeeds when the sweep left it empty.
            let _ = fs::remove_dir(&path);
            continue;
        }

        let old_enough = meta.modified().map(|m| m <= cutoff).unwrap_or(false);
        if !old_enough {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                tally.files_removed += 1;
                tally.bytes_removed += meta.len();
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Could not remove file");
                tally.files_failed += 1;
            }
        }
    }
    Ok(())
}

/// Sweeps every root. Blocking.
pub(crate) fn sweep(roots: &[PathBuf], min_age: Duration) -> CleanupTally {
    let cutoff = SystemTime::now()
        .checked_sub(min_age)
        .unwrap_or(SystemTime::UNIX_EPOCH);
    let mut tally = CleanupTally::default();
    for root in roots {
        match sweep_dir(root, cutoff, &mut tally) {
            Ok(()) => tally.roots_scanned += 1,
            Err(e) => {
                debug!(root = %root.display(), error = %e, "Cleanup root unreadable");
                tally.roots_unreadable.push(root.clone());
            }
        }
    }
    tally
}

#[async_trait]
impl Stage for DiskCleanupStage {
    fn name(&self) -> &str {
        StageId::DiskCleanup.as_str()
    }

    fn criticality(&self) -> Criticality {
        Criticality::Continue
    }

    fn dry_run_description(&self, _ctx: &RunContext) -> String {
        format!(
            "Would delete files older than {}h under: {}",
            self.min_age.as_secs() / 3600,
            self.roots
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }

    async fn execute(&self, ctx: &RunContext) -> Result<StageOutcome> {
        let roots = self.roots.clone();
        let min_age = self.min_age;
        let tally = tokio::task::spawn_blocking(move || sweep(&roots, min_age))
            .await
            .map_err(|e| HostcareError::Collaborator {
                collaborator: "cleanup",
                message: e.to_string(),
            })?;

        if tally.files_failed > 0 {
            ctx.logger().warning(format!(
                "{} file(s) under cleanup paths could not be removed",
                tally.files_failed
            ));
        }

        if tally.roots_scanned == 0 {
            return Ok(StageOutcome::failed(format!(
                "No cleanup path could be read; {}",
                tally.summary()
            )));
        }
        Ok(StageOutcome::success(tally.summary()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_context;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sweep_respects_min_age() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.tmp"), b"12345").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("b.tmp"), b"123").unwrap();

        let kept = sweep(&[dir.path().to_path_buf()], Duration::from_secs(3600));
        assert_eq!(kept.files_removed, 0);
        assert!(dir.path().join("a.tmp").exists());

        let swept = sweep(&[dir.path().to_path_buf()], Duration::ZERO);
        assert_eq!(swept.files_removed, 2);
        assert_eq!(swept.bytes_removed, 8);
        assert_eq!(swept.roots_scanned, 1);
        assert!(dir.path().exists());
        assert!(!dir.path().join("nested").exists());
    }

    #[test]
    fn test_missing_root_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let tally = sweep(&[missing.clone()], Duration::ZERO);
        assert_eq!(tally.roots_scanned, 0);
        assert_eq!(tally.roots_unreadable, vec![missing]);
    }

    #[tokio::test]
    async fn test_stage_fails_only_when_no_root_readable() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");

        let stage = DiskCleanupStage::new(vec![missing.clone()], Duration::ZERO);
        let outcome = stage.execute(&test_context()).await.unwrap();
        assert!(outcome.is_failure());
        assert!(outcome.detail.starts_with("No cleanup path could be read"));

        let stage = DiskCleanupStage::new(vec![missing, dir.path().to_path_buf()], Duration::ZERO);
        let outcome = stage.execute(&test_context()).await.unwrap();
        assert!(outcome.is_success());
        assert!(outcome.detail.contains("unreadable:"));
    }

    #[test]
    fn test_dry_run_description_lists_roots() {
        let stage = DiskCleanupStage::new(
            vec![PathBuf::from("/tmp/a"), PathBuf::from("/tmp/b")],
            Duration::from_secs(24 * 3600),
        );
        assert_eq!(
            stage.dry_run_description(&test_context()),
            "Would delete files older than 24h under: /tmp/a, /tmp/b"
        );
    }
}
