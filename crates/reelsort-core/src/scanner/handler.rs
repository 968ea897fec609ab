//! File events shared by the live watcher, the periodic scan and activity
//! replay.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Video container extensions the engine indexes.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "m4v", "mov", "wmv", "ts", "m2ts", "webm", "flv",
];

/// Path fragments marking bonus content rather than the feature itself.
/// Matched against the whole lowercased path.
pub const EXTRAS_KEYWORDS: &[&str] = &[
    "sample",
    "trailer",
    "extras",
    "extra",
    "featurette",
    "behind the scenes",
    "deleted scene",
    "interview",
    "bonus",
    "cover",
    "artwork",
    "proof",
    "rarbg",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileEventKind {
    Create,
    Modify,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEvent {
    pub kind: FileEventKind,
    pub path: PathBuf,
}

impl FileEvent {
    pub fn create(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: FileEventKind::Create,
            path: path.into(),
        }
    }

    pub fn remove(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: FileEventKind::Remove,
            path: path.into(),
        }
    }
}

/// Receiver of file events.
///
/// The watcher and the periodic scanner may deliver the same path twice;
/// handlers must tolerate repeats.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_file_event(&self, event: &FileEvent) -> Result<()>;

    fn is_media_file(&self, path: &Path) -> bool {
        is_media_file(path)
    }
}

/// Whether `path` has a video extension.
pub fn is_media_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
}

/// Whether `path` looks like a sample, trailer or other extra.
pub fn is_extra_content(path: &Path) -> bool {
    let lower = path.to_string_lossy().to_lowercase();
    EXTRAS_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Handler that records every event it receives.
    #[derive(Default)]
    pub struct RecordingHandler {
        pub events: Mutex<Vec<FileEvent>>,
    }

    impl RecordingHandler {
        pub fn paths(&self) -> Vec<PathBuf> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.path.clone())
                .collect()
        }
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        async fn handle_file_event(&self, event: &FileEvent) -> Result<()> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }
}
