//! Reelsort Core - Headless engine for media library classification and cleanup.
//!
//! This crate indexes TV and movie libraries, classifies files from their
//! names (with an optional AI fallback), ranks copies by quality and builds
//! reviewable plans for duplicate removal, consolidation and renames.
//!
//! # Example
//!
//! ```rust,ignore
//! use reelsort_core::{ClassificationPipeline, FileScanner, MediaIndex, ScanOptions};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> reelsort_core::Result<()> {
//!     let index = Arc::new(MediaIndex::new("/var/lib/reelsort/media.db")?);
//!     let scanner = FileScanner::new(index, Arc::new(ClassificationPipeline::regex_only()));
//!
//!     let options = ScanOptions {
//!         tv_libraries: vec!["/media/tv".into()],
//!         movie_libraries: vec!["/media/movies".into()],
//!         ..ScanOptions::default()
//!     };
//!     let result = scanner.scan_with_options(&options).await?;
//!     println!("Indexed {} files", result.files_scanned);
//!     Ok(())
//! }
//! ```

pub mod activity;
pub mod ai;
pub mod analysis;
pub mod atomic;
pub mod cancel;
pub mod classify;
pub mod config;
pub mod error;
pub mod index;
pub mod models;
pub mod naming;
pub mod plans;
pub mod platform;
pub mod quality;
pub mod scanner;
pub mod transfer;
pub mod watcher;

// Re-export commonly used types
pub use activity::{reconcile_activity, ActivityEntry, ActivityLogger, ReconcileStats};
pub use ai::{AiHelper, AiMatcher, AiResult, CircuitBreaker, OllamaMatcher, SqliteAiCache};
pub use analysis::{analyze_scattered, DuplicateAnalysis, DuplicateAnalyzer, DuplicateGroup};
pub use cancel::{CancellationToken, CancelledError};
pub use classify::{ClassificationPipeline, ClassifyCounters};
pub use config::{DataPaths, EngineConfig};
pub use error::{ReelsortError, Result};
pub use index::{MediaIndex, MediaStore};
pub use models::{ClassificationResult, MediaFile, MediaType, ParseMethod};
pub use plans::{
    ActionOutcome, AuditActionExecutor, AuditGenerator, AuditPlan, ConsolidatePlan,
    DuplicatePlan, PlanKind, PlanStore,
};
pub use platform::Ownership;
pub use scanner::{
    EventHandler, FileEvent, FileScanner, IndexingHandler, PeriodicScanner, ScanOptions,
    ScanResult, ScannerStatus,
};
pub use transfer::{NativeTransfer, Transfer, TransferOptions, TransferResult};
pub use watcher::MediaWatcher;
