//! Interval-driven rescans of intake folders with health tracking.

use super::handler::{EventHandler, FileEvent};
use crate::activity::reconcile_activity;
use crate::cancel::CancellationToken;
use crate::error::{ReelsortError, Result};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Health of the periodic scanner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerStatus {
    pub healthy: bool,
    pub last_scan: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Ticks that found a scan already running.
    pub skipped_ticks: u64,
    pub scanning: bool,
}

/// Rescans watch paths on an interval and reconciles the activity log.
pub struct PeriodicScanner {
    handler: Arc<dyn EventHandler>,
    watch_paths: Vec<PathBuf>,
    activity_dir: PathBuf,
    interval: Duration,
    status: Mutex<ScannerStatus>,
}

impl PeriodicScanner {
    pub fn new(
        handler: Arc<dyn EventHandler>,
        watch_paths: Vec<PathBuf>,
        activity_dir: impl Into<PathBuf>,
        interval: Duration,
    ) -> Self {
        Self {
            handler,
            watch_paths,
            activity_dir: activity_dir.into(),
            interval,
            status: Mutex::new(ScannerStatus {
                healthy: true,
                ..ScannerStatus::default()
            }),
        }
    }

    pub fn status(&self) -> ScannerStatus {
        self.lock_status().clone()
    }

    pub fn is_healthy(&self) -> bool {
        self.lock_status().healthy
    }

    /// Tick until `cancel` fires. A tick that has started runs to completion.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            "Periodic scanner started: {} watch paths every {:?}",
            self.watch_paths.len(),
            self.interval
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.tick().await,
            }
        }
        info!("Periodic scanner stopped");
    }

    /// Run one scan unless another is already in progress.
    pub async fn tick(&self) {
        {
            let mut status = self.lock_status();
            if status.scanning {
                status.skipped_ticks += 1;
                warn!(
                    "Periodic scan still running, skipping tick ({} skipped)",
                    status.skipped_ticks
                );
                return;
            }
            status.scanning = true;
        }

        let outcome = AssertUnwindSafe(self.scan_body()).catch_unwind().await;
        let now = Utc::now();

        let mut status = self.lock_status();
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(panic) => Some(format!("panic during periodic scan: {}", panic_message(&*panic))),
        };
        match failure {
            None => {
                status.healthy = true;
                status.last_success = Some(now);
                status.last_error = None;
                debug!("Periodic scan completed");
            }
            Some(message) => {
                error!("Periodic scan failed: {}", message);
                status.healthy = false;
                status.last_error = Some(message);
            }
        }
        status.last_scan = Some(now);
        status.scanning = false;
    }

    async fn scan_body(&self) -> Result<()> {
        let mut forwarded = 0usize;
        let mut failed = 0usize;

        for root in &self.watch_paths {
            if !root.is_dir() {
                return Err(ReelsortError::NotADirectory(root.clone()));
            }
            for entry in WalkDir::new(root).follow_links(true) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!("Error walking {}: {}", root.display(), e);
                        continue;
                    }
                };
                if !entry.file_type().is_file() || !self.handler.is_media_file(entry.path()) {
                    continue;
                }

                forwarded += 1;
                let event = FileEvent::create(entry.path());
                if let Err(e) = self.handler.handle_file_event(&event).await {
                    failed += 1;
                    warn!("Periodic scan failed on {}: {}", entry.path().display(), e);
                }
            }
        }

        let stats = reconcile_activity(&self.activity_dir, self.handler.as_ref(), Utc::now()).await?;
        info!(
            "Periodic scan forwarded {} files ({} failed), retried {} activity entries",
            forwarded, failed, stats.retried
        );
        Ok(())
    }

    fn lock_status(&self) -> MutexGuard<'_, ScannerStatus> {
        self.status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::test_support::RecordingHandler;
    use async_trait::async_trait;
    use tempfile::TempDir;
    use tokio::sync::Notify;

    fn scanner_for(handler: Arc<dyn EventHandler>, temp_dir: &TempDir) -> PeriodicScanner {
        PeriodicScanner::new(
            handler,
            vec![temp_dir.path().join("downloads")],
            temp_dir.path().join("activity"),
            Duration::from_secs(60),
        )
    }

    fn seed_downloads(temp_dir: &TempDir) -> PathBuf {
        let downloads = temp_dir.path().join("downloads");
        std::fs::create_dir_all(downloads.join("nested")).unwrap();
        std::fs::write(downloads.join("nested/Robots.2005.mkv"), b"x").unwrap();
        std::fs::write(downloads.join("readme.txt"), b"x").unwrap();
        downloads
    }

    #[tokio::test]
    async fn test_tick_forwards_media_files_and_marks_healthy() {
        let temp_dir = TempDir::new().unwrap();
        let downloads = seed_downloads(&temp_dir);
        let handler = Arc::new(RecordingHandler::default());
        let scanner = scanner_for(handler.clone(), &temp_dir);

        scanner.tick().await;

        assert_eq!(handler.paths(), vec![downloads.join("nested/Robots.2005.mkv")]);
        let status = scanner.status();
        assert!(status.healthy);
        assert!(status.last_scan.is_some());
        assert!(status.last_success.is_some());
        assert!(!status.scanning);
    }

    #[tokio::test]
    async fn test_missing_watch_path_marks_unhealthy() {
        let temp_dir = TempDir::new().unwrap();
        let scanner = scanner_for(Arc::new(RecordingHandler::default()), &temp_dir);

        scanner.tick().await;

        let status = scanner.status();
        assert!(!status.healthy);
        assert!(status.last_error.is_some());
        assert!(status.last_scan.is_some());
        assert!(status.last_success.is_none());
    }

    struct PanickingHandler;

    #[async_trait]
    impl EventHandler for PanickingHandler {
        async fn handle_file_event(&self, _event: &FileEvent) -> Result<()> {
            panic!("handler exploded");
        }
    }

    #[tokio::test]
    async fn test_panic_becomes_tracked_error() {
        let temp_dir = TempDir::new().unwrap();
        seed_downloads(&temp_dir);
        let scanner = scanner_for(Arc::new(PanickingHandler), &temp_dir);

        scanner.tick().await;

        let status = scanner.status();
        assert!(!status.healthy);
        assert!(status.last_error.unwrap().contains("handler exploded"));
        assert!(!status.scanning);

        // Recovers on the next clean tick.
        let scanner = PeriodicScanner {
            handler: Arc::new(RecordingHandler::default()),
            ..scanner
        };
        scanner.tick().await;
        assert!(scanner.is_healthy());
        assert!(scanner.status().last_error.is_none());
    }

    #[derive(Default)]
    struct BlockingHandler {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl EventHandler for BlockingHandler {
        async fn handle_file_event(&self, _event: &FileEvent) -> Result<()> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_overlapping_tick_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        seed_downloads(&temp_dir);
        let handler = Arc::new(BlockingHandler::default());
        let scanner = Arc::new(scanner_for(handler.clone(), &temp_dir));

        let running = {
            let scanner = scanner.clone();
            tokio::spawn(async move { scanner.tick().await })
        };
        handler.entered.notified().await;
        assert!(scanner.status().scanning);

        scanner.tick().await;
        assert_eq!(scanner.status().skipped_ticks, 1);

        handler.release.notify_one();
        running.await.unwrap();
        let status = scanner.status();
        assert!(!status.scanning);
        assert!(status.healthy);
        assert_eq!(status.skipped_ticks, 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let temp_dir = TempDir::new().unwrap();
        seed_downloads(&temp_dir);
        let handler = Arc::new(RecordingHandler::default());
        let scanner = Arc::new(scanner_for(handler.clone(), &temp_dir));
        let cancel = CancellationToken::new();

        let task = {
            let scanner = scanner.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { scanner.run(cancel).await })
        };
        // The first interval tick fires immediately.
        while scanner.status().last_scan.is_none() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        cancel.cancel();
        task.await.unwrap();
        assert_eq!(handler.paths().len(), 1);
    }
}
