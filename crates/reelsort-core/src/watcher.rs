//! Live file system watching for library roots.
//!
//! Debounced notifications are turned into [`FileEvent`]s and handed to the
//! same [`EventHandler`] the periodic scanner uses.

use crate::config::WatchConfig;
use crate::error::{ReelsortError, Result};
use crate::scanner::{EventHandler, FileEvent};
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, Debouncer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Watches library roots and forwards media file changes to a handler.
///
/// Must be created inside a Tokio runtime. Events for paths that still exist
/// become creates, everything else becomes a remove.
pub struct MediaWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
    stop_tx: mpsc::Sender<()>,
    roots: Vec<PathBuf>,
}

impl MediaWatcher {
    pub fn new(roots: &[PathBuf], handler: Arc<dyn EventHandler>) -> Result<Self> {
        Self::with_debounce(roots, handler, WatchConfig::DEBOUNCE)
    }

    pub fn with_debounce(
        roots: &[PathBuf],
        handler: Arc<dyn EventHandler>,
        debounce: Duration,
    ) -> Result<Self> {
        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
        let (event_tx, event_rx) = std::sync::mpsc::channel();

        let mut debouncer = new_debouncer(debounce, event_tx)
            .map_err(|e| ReelsortError::Other(format!("Failed to create file watcher: {}", e)))?;

        for root in roots {
            debouncer
                .watcher()
                .watch(root, RecursiveMode::Recursive)
                .map_err(|e| {
                    ReelsortError::Other(format!("Failed to watch {}: {}", root.display(), e))
                })?;
            info!("Watching {}", root.display());
        }

        let (file_tx, mut file_rx) = mpsc::unbounded_channel::<FileEvent>();
        let relevance = Arc::clone(&handler);

        std::thread::spawn(move || loop {
            if stop_rx.try_recv().is_ok() {
                debug!("Media watcher stopping");
                break;
            }

            match event_rx.recv_timeout(WatchConfig::POLL_INTERVAL) {
                Ok(Ok(events)) => {
                    for event in to_file_events(&events, relevance.as_ref()) {
                        if file_tx.send(event).is_err() {
                            return;
                        }
                    }
                }
                Ok(Err(e)) => warn!("File watcher error: {:?}", e),
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                    warn!("File watcher channel disconnected");
                    break;
                }
            }
        });

        tokio::spawn(async move {
            while let Some(event) = file_rx.recv().await {
                if let Err(e) = handler.handle_file_event(&event).await {
                    warn!("Failed to handle {:?} for {}: {}", event.kind, event.path.display(), e);
                }
            }
            debug!("Media watcher dispatch finished");
        });

        Ok(Self {
            _debouncer: debouncer,
            stop_tx,
            roots: roots.to_vec(),
        })
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub async fn stop(&self) {
        let _ = self.stop_tx.send(()).await;
    }
}

fn to_file_events(events: &[DebouncedEvent], handler: &dyn EventHandler) -> Vec<FileEvent> {
    let mut out: Vec<FileEvent> = Vec::new();
    for event in events {
        if !handler.is_media_file(&event.path) || out.iter().any(|e| e.path == event.path) {
            continue;
        }
        out.push(classify(&event.path));
    }
    out
}

fn classify(path: &Path) -> FileEvent {
    if path.is_file() {
        FileEvent::create(path)
    } else {
        FileEvent::remove(path)
    }
}
