//! Garbage collection for cache entries
//!
//! Removes cache files that have not been rewritten within the retention
//! window. This is independent of token expiry: it bounds the growth of the
//! cache directory when clusters or access keys stop being used.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Default retention for cache files (7 days)
pub const DEFAULT_RETENTION_SECONDS: u64 = 7 * 24 * 60 * 60;

/// Files in the cache directory that are never swept
pub const RESERVED_FILE_NAMES: &[&str] = &["config.toml"];

/// Outcome of a sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Regular files considered
    pub scanned: usize,
    /// Files deleted
    pub removed: usize,
    /// Files that were due for deletion but could not be inspected or removed
    pub failed: usize,
}

/// Age-based sweeper for a cache directory
#[derive(Debug, Clone)]
pub struct Janitor {
    dir: PathBuf,
    retention: Duration,
}

impl Janitor {
    /// Create a janitor for `dir` that removes files older than `retention`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, retention: Duration) -> Self {
        Self {
            dir: dir.into(),
            retention,
        }
    }

    /// The directory being swept
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Sweep relative to the current time
    pub fn sweep(&self) -> SweepReport {
        self.sweep_at(SystemTime::now())
    }

    /// Delete every file directly under the directory whose modification time
    /// is strictly older than `now - retention`.
    ///
    /// Failures are logged and never propagated. An unreadable directory
    /// yields an empty report; a file that cannot be removed is counted in
    /// [`SweepReport::failed`] and the sweep continues.
    pub fn sweep_at(&self, now: SystemTime) -> SweepReport {
        self.sweep_with(now, |path| fs::remove_file(path))
    }

    fn sweep_with(
        &self,
        now: SystemTime,
        mut remove: impl FnMut(&Path) -> io::Result<()>,
    ) -> SweepReport {
        let mut report = SweepReport::default();

        let Some(cutoff) = now.checked_sub(self.retention) else {
            return report;
        };

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(
                    path = %self.dir.display(),
                    error = %e,
                    "Skipping cache sweep: unable to list directory"
                );
                return report;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(path = %self.dir.display(), error = %e, "Unable to read directory entry");
                    report.failed += 1;
                    continue;
                }
            };

            let path = entry.path();
            if is_reserved(&path) {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Unable to stat cache entry");
                    report.failed += 1;
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }
            report.scanned += 1;

            let modified = match metadata.modified() {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Unable to read modification time");
                    report.failed += 1;
                    continue;
                }
            };
            if modified >= cutoff {
                continue;
            }

            match remove(&path) {
                Ok(()) => {
                    report.removed += 1;
                    tracing::debug!(path = %path.display(), "Removed stale cache entry");
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(path = %path.display(), error = %e, "Unable to remove stale cache entry");
                }
            }
        }

        tracing::debug!(
            path = %self.dir.display(),
            scanned = report.scanned,
            removed = report.removed,
            failed = report.failed,
            "Cache sweep finished"
        );
        report
    }
}

fn is_reserved(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| RESERVED_FILE_NAMES.contains(&name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HOUR: Duration = Duration::from_secs(60 * 60);

    fn touch(dir: &Path, name: &str, modified: SystemTime) -> PathBuf {
        let path = dir.join(name);
        let file = fs::File::create(&path).unwrap();
        file.set_modified(modified).unwrap();
        path
    }

    #[test]
    fn removes_only_entries_older_than_retention() {
        let temp = TempDir::new().unwrap();
        let now = SystemTime::now();
        let old = touch(temp.path(), "old_AKIA", now - 3 * HOUR);
        let fresh = touch(temp.path(), "fresh_AKIA", now - HOUR / 2);

        let report = Janitor::new(temp.path(), HOUR).sweep_at(now);

        assert_eq!(
            report,
            SweepReport {
                scanned: 2,
                removed: 1,
                failed: 0
            }
        );
        assert!(!old.exists());
        assert!(fresh.exists());
    }

    #[test]
    fn file_exactly_at_cutoff_is_kept() {
        let temp = TempDir::new().unwrap();
        // Whole seconds survive any filesystem's timestamp granularity.
        let secs = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(secs);
        let edge = touch(temp.path(), "edge_AKIA", now - HOUR);

        let report = Janitor::new(temp.path(), HOUR).sweep_at(now);

        assert_eq!(report.removed, 0);
        assert!(edge.exists());
    }

    #[test]
    fn sweep_in_the_future_removes_everything() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "a_AKIA", SystemTime::now());
        touch(temp.path(), "b_AKIA", SystemTime::now());

        let later = SystemTime::now() + 2 * HOUR;
        let report = Janitor::new(temp.path(), HOUR).sweep_at(later);

        assert_eq!(report.removed, 2);
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn skips_directories_and_reserved_files() {
        let temp = TempDir::new().unwrap();
        let now = SystemTime::now();
        fs::create_dir(temp.path().join("nested")).unwrap();
        let config = touch(temp.path(), "config.toml", now - 100 * HOUR);

        let report = Janitor::new(temp.path(), HOUR).sweep_at(now);

        assert_eq!(report, SweepReport::default());
        assert!(config.exists());
        assert!(temp.path().join("nested").is_dir());
    }

    #[test]
    fn missing_directory_is_not_an_error() {
        let temp = TempDir::new().unwrap();
        let report = Janitor::new(temp.path().join("missing"), HOUR).sweep();
        assert_eq!(report, SweepReport::default());
    }

    #[test]
    fn retention_longer_than_epoch_removes_nothing() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "a_AKIA", SystemTime::UNIX_EPOCH);
        let report = Janitor::new(temp.path(), Duration::MAX).sweep();
        assert_eq!(report.removed, 0);
    }

    #[test]
    fn failed_deletion_does_not_stop_the_sweep() {
        let temp = TempDir::new().unwrap();
        let now = SystemTime::now();
        let stuck = touch(temp.path(), "stuck_AKIA", now - 3 * HOUR);
        let stale = touch(temp.path(), "stale_AKIA", now - 3 * HOUR);
        let fresh = touch(temp.path(), "fresh_AKIA", now);

        let janitor = Janitor::new(temp.path(), HOUR);
        let report = janitor.sweep_with(now, |path| {
            if path == stuck {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
            } else {
                fs::remove_file(path)
            }
        });

        assert_eq!(
            report,
            SweepReport {
                scanned: 3,
                removed: 1,
                failed: 1
            }
        );
        assert!(stuck.exists());
        assert!(!stale.exists());
        assert!(fresh.exists());
    }
}
