use std::path::Path;
use std::time::{Duration, SystemTime};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::Config;
use crate::db::Repository;
use crate::error::Result;

static SNAPSHOT_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^daily_(\d{4}-\d{2}-\d{2})\.json$").unwrap());

pub struct Retention {
    config: Config,
    repository: Repository,
}

impl Retention {
    pub fn new(config: Config, repository: Repository) -> Self {
        Self { config, repository }
    }

    /// Apply every retention policy: purge aged database rows, reclaim
    /// space, and prune cache, log, and analysis files. File pruning is
    /// best effort; an unreadable entry is logged and skipped.
    pub async fn run(&self) -> Result<()> {
        tracing::info!("Starting cleanup");

        let (collections, words, articles) = self
            .repository
            .purge_older_than(self.config.retention_days)
            .await?;
        tracing::info!(
            "Purged {} collections, {} word rows, {} articles older than {} days",
            collections,
            words,
            articles,
            self.config.retention_days
        );
        self.repository.compact().await?;

        let cache = prune_by_age(
            Path::new(&self.config.cache_dir),
            self.config.cache_retention_days,
            None,
        );
        tracing::info!("Removed {} stale cache files", cache);

        let logs = prune_by_age(
            Path::new(&self.config.logs_dir),
            self.config.log_retention_days,
            Some("log"),
        );
        tracing::info!("Removed {} old log files", logs);

        let snapshots = prune_snapshots(
            &self.config.analysis_dir(),
            self.config.analysis_retention_days,
        );
        tracing::info!("Removed {} old analysis snapshots", snapshots);

        Ok(())
    }
}

/// Delete regular files in `dir` whose modification time is older than
/// `retention_days`, optionally restricted to one extension. Returns the
/// number of files removed.
fn prune_by_age(dir: &Path, retention_days: i64, extension: Option<&str>) -> usize {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return 0,
    };
    let cutoff =
        SystemTime::now() - Duration::from_secs(retention_days.max(0) as u64 * 86_400);

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(ext) = extension {
            if path.extension().and_then(|e| e.to_str()) != Some(ext) {
                continue;
            }
        }
        let modified = match entry.metadata().and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                tracing::warn!("Failed to stat {:?}: {}", path, e);
                continue;
            }
        };
        if modified < cutoff {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Failed to remove {:?}: {}", path, e),
            }
        }
    }
    removed
}

/// Delete daily analysis snapshots whose filename date is older than
/// `retention_days`. Files that do not match the snapshot naming scheme
/// are left alone.
fn prune_snapshots(dir: &Path, retention_days: i64) -> usize {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return 0,
    };
    let cutoff =
        chrono::Utc::now().date_naive() - chrono::Days::new(retention_days.max(0) as u64);

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };
        let date = match SNAPSHOT_DATE_RE
            .captures(name)
            .and_then(|c| chrono::NaiveDate::parse_from_str(&c[1], "%Y-%m-%d").ok())
        {
            Some(date) => date,
            None => continue,
        };
        if date < cutoff {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Failed to remove {:?}: {}", path, e),
            }
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_day_retention_removes_fresh_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.xml"), "cached").unwrap();
        std::fs::write(dir.path().join("b.xml"), "cached").unwrap();

        assert_eq!(prune_by_age(dir.path(), 0, None), 2);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn extension_filter_spares_other_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("run.log"), "log").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "keep").unwrap();

        assert_eq!(prune_by_age(dir.path(), 0, Some("log")), 1);
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn long_retention_keeps_everything() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.xml"), "cached").unwrap();

        assert_eq!(prune_by_age(dir.path(), 365, None), 0);
        assert!(dir.path().join("a.xml").exists());
    }

    #[test]
    fn missing_directory_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(prune_by_age(&dir.path().join("absent"), 0, None), 0);
        assert_eq!(prune_snapshots(&dir.path().join("absent"), 0), 0);
    }

    #[test]
    fn snapshots_are_pruned_by_filename_date() {
        let dir = tempfile::tempdir().unwrap();
        let today = chrono::Utc::now().date_naive();
        let old = today - chrono::Days::new(120);
        std::fs::write(
            dir.path().join(format!("daily_{old}.json")),
            "{}",
        )
        .unwrap();
        std::fs::write(
            dir.path().join(format!("daily_{today}.json")),
            "{}",
        )
        .unwrap();
        std::fs::write(dir.path().join("README.md"), "not a snapshot").unwrap();

        assert_eq!(prune_snapshots(dir.path(), 90), 1);
        assert!(dir.path().join(format!("daily_{today}.json")).exists());
        assert!(dir.path().join("README.md").exists());
    }
}
