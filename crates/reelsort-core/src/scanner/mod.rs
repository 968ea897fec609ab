//! Library scanning.
//!
//! This module provides:
//! - [`FileScanner`]: full walks of the configured TV and movie roots
//! - [`IndexingHandler`]: per-file indexing for watcher and periodic events
//! - [`PeriodicScanner`]: the interval loop with health tracking

mod file_scanner;
mod handler;
mod periodic;

pub use file_scanner::{
    FileScanner, IndexingHandler, ProgressCallback, ScanOptions, ScanProgress, ScanResult,
};
pub use handler::{
    is_extra_content, is_media_file, EventHandler, FileEvent, FileEventKind, EXTRAS_KEYWORDS,
    VIDEO_EXTENSIONS,
};
pub use periodic::{PeriodicScanner, ScannerStatus};

#[cfg(test)]
pub(crate) use handler::test_support;
