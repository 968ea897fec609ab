//! Replay and compaction of activity files.
//!
//! Per entry, against `now`:
//!
//! | entry | action |
//! |---|---|
//! | success | keep |
//! | failure within the retry window | replay if the source exists, keep |
//! | failure older than the cleanup window | drop |
//! | any other failure | keep |
//!
//! A file whose entries are all dropped is deleted. A file that loses some
//! entries is rewritten atomically; unparseable lines do not survive the
//! rewrite.

use super::{list_activity_files, ActivityEntry};
use crate::atomic::atomic_write_bytes;
use crate::config::ActivityConfig;
use crate::error::{ReelsortError, Result};
use crate::scanner::{EventHandler, FileEvent};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileStats {
    pub files_checked: usize,
    pub retried: usize,
    pub retry_failed: usize,
    pub entries_dropped: usize,
    pub files_rewritten: usize,
    pub files_deleted: usize,
}

enum Line {
    Keep(String),
    Stale,
    Unparseable,
}

/// Reconcile every activity file in `dir`.
///
/// A file that cannot be read or rewritten is logged and skipped.
pub async fn reconcile_activity(
    dir: &Path,
    handler: &dyn EventHandler,
    now: DateTime<Utc>,
) -> Result<ReconcileStats> {
    let mut stats = ReconcileStats::default();
    let retry_cutoff = now - window(ActivityConfig::RETRY_WINDOW);
    let cleanup_cutoff = now - window(ActivityConfig::CLEANUP_WINDOW);

    for path in list_activity_files(dir)? {
        stats.files_checked += 1;
        if let Err(e) =
            reconcile_file(&path, handler, retry_cutoff, cleanup_cutoff, &mut stats).await
        {
            warn!("Error reconciling activity file {}: {}", path.display(), e);
        }
    }

    info!(
        "Activity reconciliation complete: retried={} dropped={} rewritten={} deleted={}",
        stats.retried, stats.entries_dropped, stats.files_rewritten, stats.files_deleted
    );
    Ok(stats)
}

async fn reconcile_file(
    path: &Path,
    handler: &dyn EventHandler,
    retry_cutoff: DateTime<Utc>,
    cleanup_cutoff: DateTime<Utc>,
    stats: &mut ReconcileStats,
) -> Result<()> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ReelsortError::io_with_path(e, path))?;

    let mut lines = Vec::new();
    for raw in contents.lines().filter(|l| !l.trim().is_empty()) {
        let Ok(entry) = serde_json::from_str::<ActivityEntry>(raw) else {
            lines.push(Line::Unparseable);
            continue;
        };

        if entry.success {
            lines.push(Line::Keep(raw.to_string()));
        } else if entry.ts >= retry_cutoff {
            replay(&entry, handler, stats).await;
            lines.push(Line::Keep(raw.to_string()));
        } else if entry.ts < cleanup_cutoff {
            lines.push(Line::Stale);
        } else {
            lines.push(Line::Keep(raw.to_string()));
        }
    }

    let stale = lines.iter().filter(|l| matches!(l, Line::Stale)).count();
    if stale == 0 {
        return Ok(());
    }
    stats.entries_dropped += stale;

    let kept: Vec<&str> = lines
        .iter()
        .filter_map(|l| match l {
            Line::Keep(raw) => Some(raw.as_str()),
            _ => None,
        })
        .collect();

    if kept.is_empty() {
        tokio::fs::remove_file(path)
            .await
            .map_err(|e| ReelsortError::io_with_path(e, path))?;
        stats.files_deleted += 1;
        debug!("Removed activity file with only stale failures: {}", path.display());
    } else {
        let mut body = kept.join("\n");
        body.push('\n');
        atomic_write_bytes(path, body.as_bytes())?;
        stats.files_rewritten += 1;
        debug!(
            "Compacted {}: kept {} entries, dropped {}",
            path.display(),
            kept.len(),
            lines.len() - kept.len()
        );
    }
    Ok(())
}

async fn replay(entry: &ActivityEntry, handler: &dyn EventHandler, stats: &mut ReconcileStats) {
    if entry.source.as_os_str().is_empty() {
        return;
    }
    if !tokio::fs::try_exists(&entry.source).await.unwrap_or(false) {
        debug!("Not retrying {}: source is gone", entry.source.display());
        return;
    }

    info!("Retrying failed activity: {}", entry.source.display());
    match handler.handle_file_event(&FileEvent::create(&entry.source)).await {
        Ok(()) => stats.retried += 1,
        Err(e) => {
            stats.retry_failed += 1;
            warn!("Retry of {} failed: {}", entry.source.display(), e);
        }
    }
}

fn window(duration: std::time::Duration) -> ChronoDuration {
    ChronoDuration::from_std(duration).unwrap_or(ChronoDuration::zero())
}
