//! Full library walks and single-file indexing.

use super::handler::{is_extra_content, is_media_file, EventHandler, FileEvent, FileEventKind};
use crate::activity::{ActivityEntry, ActivityLogger};
use crate::cancel::CancellationToken;
use crate::classify::{ClassificationPipeline, ClassifyCounters};
use crate::config::{LibrariesConfig, ScanConfig};
use crate::error::{ReelsortError, Result};
use crate::index::{MediaIndex, UpsertOutcome};
use crate::models::{MediaFile, MediaType};
use crate::naming::{check_compliance, has_episode_marker};
use crate::quality::{extract_metadata, meets_minimum_size};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Callback invoked with scan progress.
pub type ProgressCallback = Arc<dyn Fn(&ScanProgress) + Send + Sync>;

/// Progress snapshot passed to [`ProgressCallback`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanProgress {
    pub files_scanned: u64,
    /// Empty once the last root is done.
    pub current_path: PathBuf,
    pub libraries_done: usize,
    pub libraries_total: usize,
}

/// What to scan and how to report.
#[derive(Clone, Default)]
pub struct ScanOptions {
    pub tv_libraries: Vec<PathBuf>,
    pub movie_libraries: Vec<PathBuf>,
    pub on_progress: Option<ProgressCallback>,
    pub cancel: Option<CancellationToken>,
}

impl ScanOptions {
    pub fn from_libraries(libraries: &LibrariesConfig) -> Self {
        Self {
            tv_libraries: libraries.tv.clone(),
            movie_libraries: libraries.movies.clone(),
            ..Self::default()
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Totals for one scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanResult {
    /// Files with a video extension.
    pub files_scanned: u64,
    pub files_added: u64,
    pub files_updated: u64,
    /// Extras and undersized files.
    pub files_skipped: u64,
    /// Rows dropped because their file is gone from disk.
    pub files_removed: u64,
    pub duration: Duration,
    /// `path: error` for every file that failed.
    pub errors: Vec<String>,
    pub ai_triggered: u64,
    pub ai_cache_hits: u64,
    pub ai_succeeded: u64,
    pub ai_failed: u64,
    pub needs_review: u64,
    pub cancelled: bool,
}

impl ScanResult {
    fn absorb(&mut self, counters: &ClassifyCounters) {
        self.ai_triggered = counters.ai_triggered;
        self.ai_cache_hits = counters.ai_cache_hits;
        self.ai_succeeded = counters.ai_succeeded;
        self.ai_failed = counters.ai_failed;
        self.needs_review = counters.needs_review;
    }
}

/// Walks library roots and upserts every eligible file into the index.
pub struct FileScanner {
    index: Arc<MediaIndex>,
    pipeline: Arc<ClassificationPipeline>,
}

impl FileScanner {
    pub fn new(index: Arc<MediaIndex>, pipeline: Arc<ClassificationPipeline>) -> Self {
        Self { index, pipeline }
    }

    /// Scan every configured root. Per-file failures are collected in
    /// [`ScanResult::errors`]; a cancelled scan returns what it has so far.
    pub async fn scan_with_options(&self, options: &ScanOptions) -> Result<ScanResult> {
        let start = Instant::now();
        let mut result = ScanResult::default();
        let mut counters = ClassifyCounters::default();

        let roots: Vec<(&PathBuf, MediaType)> = options
            .tv_libraries
            .iter()
            .map(|root| (root, MediaType::Episode))
            .chain(options.movie_libraries.iter().map(|root| (root, MediaType::Movie)))
            .collect();
        let total = roots.len();

        info!("Starting scan of {} libraries", total);

        for (done, (root, media_type)) in roots.into_iter().enumerate() {
            if is_cancelled(options) {
                break;
            }
            report(options, result.files_scanned, root, done, total);

            let finished = self
                .scan_root(root, media_type, (done, total), options, &mut result, &mut counters)
                .await;
            if !finished {
                break;
            }
            report(options, result.files_scanned, root, done + 1, total);
        }

        result.absorb(&counters);
        result.cancelled = is_cancelled(options);
        result.duration = start.elapsed();
        report(options, result.files_scanned, Path::new(""), total, total);

        info!(
            "Scan finished in {:?}: scanned={} added={} updated={} skipped={} removed={} errors={}",
            result.duration,
            result.files_scanned,
            result.files_added,
            result.files_updated,
            result.files_skipped,
            result.files_removed,
            result.errors.len()
        );
        Ok(result)
    }

    /// Returns false when the walk stopped on cancellation.
    async fn scan_root(
        &self,
        root: &Path,
        media_type: MediaType,
        (done, total): (usize, usize),
        options: &ScanOptions,
        result: &mut ScanResult,
        counters: &mut ClassifyCounters,
    ) -> bool {
        if !root.is_dir() {
            warn!("Library root is not a directory: {}", root.display());
            let err = ReelsortError::NotADirectory(root.to_path_buf());
            result.errors.push(err.to_string());
            return true;
        }

        debug!("Scanning {} library at {}", media_type, root.display());
        let mut seen = HashSet::new();

        for entry in WalkDir::new(root).follow_links(true) {
            if is_cancelled(options) {
                info!("Scan cancelled in {}", root.display());
                return false;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Error walking {}: {}", root.display(), e);
                    result.errors.push(format!("{}: {}", root.display(), e));
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_media_file(entry.path()) {
                continue;
            }

            let path = entry.path();
            seen.insert(path.to_path_buf());
            result.files_scanned += 1;
            if result.files_scanned % ScanConfig::PROGRESS_INTERVAL == 0 {
                report(options, result.files_scanned, path, done, total);
            }

            if is_extra_content(path) {
                debug!("Skipping extra: {}", path.display());
                result.files_skipped += 1;
                continue;
            }
            let size = match entry.metadata() {
                Ok(meta) => meta.len(),
                Err(e) => {
                    result.errors.push(format!("{}: {}", path.display(), e));
                    continue;
                }
            };
            if !meets_minimum_size(size, media_type.is_episode()) {
                debug!("Skipping undersized file ({} bytes): {}", size, path.display());
                result.files_skipped += 1;
                continue;
            }

            match index_file(&self.index, &self.pipeline, path, media_type, root, counters).await {
                Ok((_, outcome)) if outcome.inserted => result.files_added += 1,
                Ok(_) => result.files_updated += 1,
                Err(e) => {
                    warn!("Failed to index {}: {}", path.display(), e);
                    result.errors.push(format!("{}: {}", path.display(), e));
                }
            }
        }

        match self.remove_missing(root, &seen) {
            Ok(removed) => result.files_removed += removed,
            Err(e) => result.errors.push(format!("{}: {}", root.display(), e)),
        }
        true
    }

    /// Drop rows under `root` that the walk did not see and that no longer
    /// exist on disk.
    fn remove_missing(&self, root: &Path, seen: &HashSet<PathBuf>) -> Result<u64> {
        let mut removed = 0;
        for file in self.index.list_under_root(root)? {
            if seen.contains(&file.path) || file.path.exists() {
                continue;
            }
            if self.index.delete_by_id(file.id)? {
                debug!("Removed missing file from index: {}", file.path.display());
                removed += 1;
            }
        }
        if removed > 0 {
            info!("Removed {} missing files under {}", removed, root.display());
        }
        Ok(removed)
    }
}

fn is_cancelled(options: &ScanOptions) -> bool {
    options.cancel.as_ref().is_some_and(|c| c.is_cancelled())
}

fn report(options: &ScanOptions, files_scanned: u64, path: &Path, done: usize, total: usize) {
    if let Some(callback) = &options.on_progress {
        callback(&ScanProgress {
            files_scanned,
            current_path: path.to_path_buf(),
            libraries_done: done,
            libraries_total: total,
        });
    }
}

/// Classify one file and upsert it.
///
/// The caller has already applied the extension, extras and size filters.
pub(crate) async fn index_file(
    index: &MediaIndex,
    pipeline: &ClassificationPipeline,
    path: &Path,
    media_type: MediaType,
    library_root: &Path,
    counters: &mut ClassifyCounters,
) -> Result<(MediaFile, UpsertOutcome)> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| ReelsortError::io_with_path(e, path))?;
    let size = metadata.len();
    let modified_at = metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());

    let classification = pipeline.classify(path, media_type, counters).await?;
    let quality = extract_metadata(path, size, media_type.is_episode());
    let compliance = check_compliance(path, media_type);

    let mut file = MediaFile::new(path, media_type, classification.title.clone());
    file.apply_classification(&classification);
    file.size = size;
    file.modified_at = modified_at;
    file.resolution = quality.resolution;
    file.source_type = quality.source_type;
    file.codec = quality.codec;
    file.audio_format = quality.audio_format;
    file.quality_score = quality.quality_score;
    file.is_compliant = compliance.is_compliant;
    file.compliance_issues = compliance.issues;
    file.library_root = library_root.to_path_buf();

    let outcome = index.upsert_by_path(&file)?;
    file.id = outcome.id;
    debug!(
        "Indexed {} as '{}' ({}, {:.2})",
        path.display(),
        file.title,
        file.parse_method,
        file.confidence
    );
    Ok((file, outcome))
}

/// Indexes single files reported by the watcher or the periodic scan.
///
/// Files under a configured TV root are episodes, under a movie root movies;
/// anything else is typed by its episode marker and filed under its parent
/// directory.
pub struct IndexingHandler {
    index: Arc<MediaIndex>,
    pipeline: Arc<ClassificationPipeline>,
    libraries: LibrariesConfig,
    activity: Option<Arc<ActivityLogger>>,
    counters: Mutex<ClassifyCounters>,
}

impl IndexingHandler {
    pub fn new(
        index: Arc<MediaIndex>,
        pipeline: Arc<ClassificationPipeline>,
        libraries: LibrariesConfig,
        activity: Option<Arc<ActivityLogger>>,
    ) -> Self {
        Self {
            index,
            pipeline,
            libraries,
            activity,
            counters: Mutex::new(ClassifyCounters::default()),
        }
    }

    /// AI and review counters accumulated across events.
    pub fn counters(&self) -> ClassifyCounters {
        self.counters
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    fn placement(&self, path: &Path) -> (MediaType, PathBuf) {
        if let Some(root) = self.libraries.tv.iter().find(|r| path.starts_with(r)) {
            return (MediaType::Episode, root.clone());
        }
        if let Some(root) = self.libraries.movies.iter().find(|r| path.starts_with(r)) {
            return (MediaType::Movie, root.clone());
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let media_type = if has_episode_marker(&name) {
            MediaType::Episode
        } else {
            MediaType::Movie
        };
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        (media_type, root)
    }

    fn log_activity(&self, entry: &ActivityEntry) {
        if let Some(activity) = &self.activity {
            if let Err(e) = activity.log(entry) {
                warn!("Failed to write activity entry: {}", e);
            }
        }
    }

    async fn index_event(&self, path: &Path) -> Result<()> {
        if is_extra_content(path) {
            debug!("Ignoring extra: {}", path.display());
            return Ok(());
        }
        let size = match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => meta.len(),
            Ok(_) => return Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("File vanished before indexing: {}", path.display());
                return Ok(());
            }
            Err(e) => return Err(ReelsortError::io_with_path(e, path)),
        };

        let (media_type, root) = self.placement(path);
        if !meets_minimum_size(size, media_type.is_episode()) {
            debug!("Ignoring undersized file ({} bytes): {}", size, path.display());
            return Ok(());
        }

        let start = Instant::now();
        let mut counters = ClassifyCounters::default();
        let outcome =
            index_file(&self.index, &self.pipeline, path, media_type, &root, &mut counters).await;

        if let Ok(mut total) = self.counters.lock() {
            total.ai_triggered += counters.ai_triggered;
            total.ai_cache_hits += counters.ai_cache_hits;
            total.ai_succeeded += counters.ai_succeeded;
            total.ai_failed += counters.ai_failed;
            total.needs_review += counters.needs_review;
        }

        let mut entry = ActivityEntry::new("index", path, outcome.is_ok());
        entry.media_type = media_type.as_str().to_string();
        entry.bytes = Some(size);
        entry.duration_ms = Some(u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX));
        match &outcome {
            Ok((file, _)) => {
                entry.parse_method = file.parse_method.as_str().to_string();
                entry.parsed_title = file.title.clone();
                entry.parsed_year = file.year;
                if file.parse_method == crate::models::ParseMethod::Ai {
                    entry.ai_confidence = Some(file.confidence);
                }
            }
            Err(e) => entry.error = Some(e.to_string()),
        }
        self.log_activity(&entry);

        outcome.map(|_| ())
    }
}

#[async_trait]
impl EventHandler for IndexingHandler {
    async fn handle_file_event(&self, event: &FileEvent) -> Result<()> {
        if !self.is_media_file(&event.path) {
            return Ok(());
        }
        match event.kind {
            FileEventKind::Create | FileEventKind::Modify => self.index_event(&event.path).await,
            FileEventKind::Remove => {
                if self.index.delete_by_path(&event.path)? {
                    info!("Removed {} from index", event.path.display());
                }
                Ok(())
            }
        }
    }
}
