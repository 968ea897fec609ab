//! Activity log: one JSON object per line in `activity-YYYY-MM-DD.jsonl`.
//!
//! [`ActivityLogger`] is the writer. [`reconcile_activity`] replays recent
//! failures and compacts stale ones.

mod reconcile;

pub use reconcile::{reconcile_activity, ReconcileStats};

use crate::config::ActivityConfig;
use crate::error::{ReelsortError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// One processed file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityEntry {
    pub ts: DateTime<Utc>,
    pub action: String,
    pub source: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<PathBuf>,
    pub media_type: String,
    pub parse_method: String,
    pub parsed_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_confidence: Option<f64>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActivityEntry {
    /// Entry stamped now.
    pub fn new(action: impl Into<String>, source: impl Into<PathBuf>, success: bool) -> Self {
        Self {
            ts: Utc::now(),
            action: action.into(),
            source: source.into(),
            success,
            ..Self::default()
        }
    }
}

/// File name holding entries for `date`.
pub fn activity_file_name(date: NaiveDate) -> String {
    format!(
        "{}{}{}",
        ActivityConfig::FILE_PREFIX,
        date.format("%Y-%m-%d"),
        ActivityConfig::FILE_SUFFIX
    )
}

pub(crate) fn is_activity_file(name: &str) -> bool {
    name.starts_with(ActivityConfig::FILE_PREFIX) && name.ends_with(ActivityConfig::FILE_SUFFIX)
}

/// Activity files in `dir`, oldest first. A missing directory yields none.
pub(crate) fn list_activity_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ReelsortError::io_with_path(e, dir)),
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|entry| is_activity_file(&entry.file_name().to_string_lossy()))
        .map(|entry| entry.path())
        .collect();
    files.sort();
    Ok(files)
}

/// Appends entries to the daily activity file.
pub struct ActivityLogger {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl ActivityLogger {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| ReelsortError::io_with_path(e, &dir))?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append `entry` to the file for the day of its timestamp.
    pub fn log(&self, entry: &ActivityEntry) -> Result<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let path = self.dir.join(activity_file_name(entry.ts.date_naive()));
        let _guard = self.write_lock.lock().map_err(|_| ReelsortError::Other(
            "activity log lock poisoned".to_string(),
        ))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ReelsortError::io_with_path(e, &path))?;
        file.write_all(&line)
            .map_err(|e| ReelsortError::io_with_path(e, &path))?;

        debug!("Logged {} for {}", entry.action, entry.source.display());
        Ok(())
    }

    /// Up to `limit` most recent entries, newest first. Unparseable lines
    /// are skipped.
    pub fn recent_entries(&self, limit: usize) -> Result<Vec<ActivityEntry>> {
        let mut results = Vec::new();
        for path in list_activity_files(&self.dir)?.iter().rev() {
            let mut entries = read_entries(path)?;
            entries.reverse();
            for entry in entries {
                results.push(entry);
                if results.len() >= limit {
                    return Ok(results);
                }
            }
        }
        Ok(results)
    }
}

fn read_entries(path: &Path) -> Result<Vec<ActivityEntry>> {
    let file = fs::File::open(path).map_err(|e| ReelsortError::io_with_path(e, path))?;
    let mut entries = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| ReelsortError::io_with_path(e, path))?;
        if let Ok(entry) = serde_json::from_str::<ActivityEntry>(&line) {
            entries.push(entry);
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_file_name_format() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(activity_file_name(date), "activity-2024-03-09.jsonl");
        assert!(is_activity_file("activity-2024-03-09.jsonl"));
        assert!(!is_activity_file("activity-2024-03-09.jsonl.tmp"));
    }

    #[test]
    fn test_log_appends_to_daily_file() {
        let temp_dir = TempDir::new().unwrap();
        let logger = ActivityLogger::new(temp_dir.path().join("activity")).unwrap();

        let mut entry = ActivityEntry::new("index", "/downloads/test.mkv", true);
        entry.ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        entry.parsed_title = "Test Movie".to_string();
        entry.parsed_year = Some(2024);
        entry.ai_confidence = Some(0.92);
        logger.log(&entry).unwrap();
        logger.log(&entry).unwrap();

        let path = logger.dir().join("activity-2024-05-01.jsonl");
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);

        let first: serde_json::Value = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
        assert_eq!(first["ts"], "2024-05-01T12:00:00Z");
        assert_eq!(first["success"], true);
        assert_eq!(first["parsed_year"], 2024);
        assert!(first.get("error").is_none());
    }

    #[test]
    fn test_recent_entries_newest_first() {
        let temp_dir = TempDir::new().unwrap();
        let logger = ActivityLogger::new(temp_dir.path()).unwrap();

        for (day, title) in [(1, "a"), (2, "b"), (2, "c")] {
            let mut entry = ActivityEntry::new("index", format!("/dl/{}.mkv", title), true);
            entry.ts = Utc.with_ymd_and_hms(2024, 5, day, 0, 0, 0).unwrap();
            entry.parsed_title = title.to_string();
            logger.log(&entry).unwrap();
        }

        let recent = logger.recent_entries(2).unwrap();
        let titles: Vec<_> = recent.iter().map(|e| e.parsed_title.as_str()).collect();
        assert_eq!(titles, vec!["c", "b"]);
    }
}
