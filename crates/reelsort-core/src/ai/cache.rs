//! Cache of AI parse results.
//!
//! Keys are normalized so that separator and case variants of one release
//! name share an entry. Two backends exist: a persistent SQLite table and an
//! in-memory TTL cache for runs without a data directory.

use super::matcher::AiResult;
use crate::error::{ReelsortError, Result};
use crate::models::MediaType;
use chrono::{Duration as ChronoDuration, Utc};
use mini_moka::sync::Cache;
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

static SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[._-]+").unwrap());

/// Extensions stripped before normalizing. Anything else is kept so that a
/// name like `Show.S01E01` is not cut at its last dot.
const MEDIA_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "mov", "wmv", "flv", "webm", "m4v", "mpg", "mpeg", "ts", "m2ts",
];

/// Entries unused for this long with little usage are removed by cleanup.
const STALE_AFTER_DAYS: i64 = 90;
const STALE_MAX_USAGE: i64 = 5;

/// Normalize a filename into a cache key.
///
/// ```
/// use reelsort_core::ai::normalize_for_cache;
///
/// assert_eq!(
///     normalize_for_cache("/dl/The.Matrix_1999--1080p.MKV"),
///     "the matrix 1999 1080p"
/// );
/// ```
pub fn normalize_for_cache(filename: &str) -> String {
    let base = Path::new(filename)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());

    let base = match base.rsplit_once('.') {
        Some((stem, ext)) if MEDIA_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) => {
            stem.to_string()
        }
        _ => base,
    };

    let lowered = base.to_lowercase();
    let spaced = SEPARATORS.replace_all(&lowered, " ");
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Identity of a cached parse.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub input_normalized: String,
    pub input_type: MediaType,
    pub model: String,
}

impl CacheKey {
    pub fn new(filename: &str, input_type: MediaType, model: &str) -> Self {
        Self {
            input_normalized: normalize_for_cache(filename),
            input_type,
            model: model.to_string(),
        }
    }

    fn flat(&self) -> String {
        format!("{}|{}|{}", self.model, self.input_type, self.input_normalized)
    }
}

/// Storage for AI parse results.
pub trait AiCache: Send + Sync {
    /// Look up a result. A hit counts as a use.
    fn get(&self, key: &CacheKey) -> Result<Option<AiResult>>;

    /// Store or refresh a result.
    fn put(&self, key: &CacheKey, result: &AiResult) -> Result<()>;
}

/// SQLite-backed cache in table `ai_parse_cache`.
pub struct SqliteAiCache {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteAiCache {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ReelsortError::io_with_path(e, parent))?;
        }
        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::from_connection(conn)
    }

    /// Cache living only as long as the process, for tests.
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS ai_parse_cache (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                input_normalized TEXT NOT NULL,
                input_type TEXT NOT NULL,
                model TEXT NOT NULL,
                title TEXT NOT NULL,
                year INTEGER,
                media_type TEXT NOT NULL DEFAULT '',
                season INTEGER,
                episodes TEXT NOT NULL DEFAULT '[]',
                absolute_episode INTEGER,
                air_date TEXT,
                confidence REAL NOT NULL,
                created_at TEXT NOT NULL,
                last_used_at TEXT NOT NULL,
                usage_count INTEGER NOT NULL DEFAULT 1,
                UNIQUE(input_normalized, input_type, model)
            );",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| ReelsortError::lock_poisoned())
    }

    /// Remove entries not used for 90 days and used fewer than 5 times.
    pub fn cleanup(&self) -> Result<usize> {
        let conn = self.lock()?;
        let cutoff = (Utc::now() - ChronoDuration::days(STALE_AFTER_DAYS)).to_rfc3339();
        let removed = conn.execute(
            "DELETE FROM ai_parse_cache WHERE last_used_at < ?1 AND usage_count < ?2",
            params![cutoff, STALE_MAX_USAGE],
        )?;
        debug!("Removed {} stale AI cache entries", removed);
        Ok(removed)
    }

    pub fn len(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: usize =
            conn.query_row("SELECT COUNT(*) FROM ai_parse_cache", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Usage count of one entry, if present.
    pub fn usage_count(&self, key: &CacheKey) -> Result<Option<i64>> {
        let conn = self.lock()?;
        let count = conn
            .query_row(
                "SELECT usage_count FROM ai_parse_cache
                 WHERE input_normalized = ?1 AND input_type = ?2 AND model = ?3",
                params![key.input_normalized, key.input_type.as_str(), key.model],
                |row| row.get(0),
            )
            .optional()?;
        Ok(count)
    }
}

impl AiCache for SqliteAiCache {
    fn get(&self, key: &CacheKey) -> Result<Option<AiResult>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT id, title, year, media_type, season, episodes, absolute_episode,
                        air_date, confidence
                 FROM ai_parse_cache
                 WHERE input_normalized = ?1 AND input_type = ?2 AND model = ?3",
                params![key.input_normalized, key.input_type.as_str(), key.model],
                |row| {
                    let episodes_json: String = row.get(5)?;
                    Ok((
                        row.get::<_, i64>(0)?,
                        AiResult {
                            title: row.get(1)?,
                            year: row.get(2)?,
                            media_type: row.get(3)?,
                            season: row.get(4)?,
                            episodes: serde_json::from_str(&episodes_json).unwrap_or_default(),
                            absolute_episode: row.get(6)?,
                            air_date: row.get(7)?,
                            confidence: row.get(8)?,
                        },
                    ))
                },
            )
            .optional()?;

        let Some((id, result)) = row else {
            return Ok(None);
        };

        // Usage tracking is best effort; a failed bump still returns the hit.
        if let Err(e) = conn.execute(
            "UPDATE ai_parse_cache SET last_used_at = ?1, usage_count = usage_count + 1
             WHERE id = ?2",
            params![Utc::now().to_rfc3339(), id],
        ) {
            warn!("Failed to update AI cache usage: {}", e);
        }
        Ok(Some(result))
    }

    fn put(&self, key: &CacheKey, result: &AiResult) -> Result<()> {
        let conn = self.lock()?;
        let episodes = serde_json::to_string(&result.episodes)?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO ai_parse_cache (
                 input_normalized, input_type, model, title, year, media_type, season,
                 episodes, absolute_episode, air_date, confidence,
                 created_at, last_used_at, usage_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12, 1)
             ON CONFLICT(input_normalized, input_type, model) DO UPDATE SET
                 title = excluded.title,
                 year = excluded.year,
                 media_type = excluded.media_type,
                 season = excluded.season,
                 episodes = excluded.episodes,
                 absolute_episode = excluded.absolute_episode,
                 air_date = excluded.air_date,
                 confidence = excluded.confidence,
                 last_used_at = excluded.last_used_at,
                 usage_count = usage_count + 1",
            params![
                key.input_normalized,
                key.input_type.as_str(),
                key.model,
                result.title,
                result.year,
                result.media_type,
                result.season,
                episodes,
                result.absolute_episode,
                result.air_date,
                result.confidence,
                now,
            ],
        )?;
        debug!("Cached AI result for '{}'", key.input_normalized);
        Ok(())
    }
}

/// In-memory cache with a time-to-live.
pub struct MemoryAiCache {
    cache: Cache<String, AiResult>,
}

impl MemoryAiCache {
    pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);
    pub const DEFAULT_CAPACITY: u64 = 10_000;

    pub fn new(ttl: Duration, capacity: u64) -> Self {
        Self {
            cache: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(capacity)
                .build(),
        }
    }
}

impl Default for MemoryAiCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL, Self::DEFAULT_CAPACITY)
    }
}

impl AiCache for MemoryAiCache {
    fn get(&self, key: &CacheKey) -> Result<Option<AiResult>> {
        Ok(self.cache.get(&key.flat()))
    }

    fn put(&self, key: &CacheKey, result: &AiResult) -> Result<()> {
        self.cache.insert(key.flat(), result.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(title: &str) -> AiResult {
        AiResult {
            title: title.to_string(),
            year: Some(2005),
            media_type: "movie".to_string(),
            season: None,
            episodes: vec![],
            absolute_episode: None,
            air_date: None,
            confidence: 0.9,
        }
    }

    #[test]
    fn test_normalize_for_cache() {
        assert_eq!(normalize_for_cache("Robots.2005.mkv"), "robots 2005");
        assert_eq!(normalize_for_cache("robots_2005.MP4"), "robots 2005");
        assert_eq!(normalize_for_cache("Show.S01E01"), "show s01e01");
        assert_eq!(normalize_for_cache("  A  -  B .avi"), "a b");
    }

    #[test]
    fn test_separator_variants_share_a_key() {
        let a = CacheKey::new("The.Office.S01E01.mkv", MediaType::Episode, "m");
        let b = CacheKey::new("the_office-s01e01.mp4", MediaType::Episode, "m");
        assert_eq!(a, b);
    }

    #[test]
    fn test_sqlite_cache_round_trip_bumps_usage() {
        let cache = SqliteAiCache::in_memory().unwrap();
        let key = CacheKey::new("Robots.2005.mkv", MediaType::Movie, "qwen");

        assert!(cache.get(&key).unwrap().is_none());
        cache.put(&key, &result("Robots")).unwrap();
        assert_eq!(cache.usage_count(&key).unwrap(), Some(1));

        let hit = cache.get(&key).unwrap().unwrap();
        assert_eq!(hit.title, "Robots");
        assert_eq!(hit.year, Some(2005));
        assert_eq!(cache.usage_count(&key).unwrap(), Some(2));
        assert_eq!(cache.len().unwrap(), 1);
    }

    #[test]
    fn test_sqlite_cache_isolates_models_and_types() {
        let cache = SqliteAiCache::in_memory().unwrap();
        let key = CacheKey::new("Robots.mkv", MediaType::Movie, "a");
        cache.put(&key, &result("Robots")).unwrap();

        assert!(cache
            .get(&CacheKey::new("Robots.mkv", MediaType::Movie, "b"))
            .unwrap()
            .is_none());
        assert!(cache
            .get(&CacheKey::new("Robots.mkv", MediaType::Episode, "a"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_sqlite_cache_persists_to_disk() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("ai-cache.db");
        let key = CacheKey::new("Heat.1995.mkv", MediaType::Movie, "m");
        {
            let cache = SqliteAiCache::new(&path).unwrap();
            cache.put(&key, &result("Heat")).unwrap();
        }
        let cache = SqliteAiCache::new(&path).unwrap();
        assert_eq!(cache.get(&key).unwrap().unwrap().title, "Heat");
        assert_eq!(cache.cleanup().unwrap(), 0);
    }

    #[test]
    fn test_memory_cache() {
        let cache = MemoryAiCache::default();
        let key = CacheKey::new("Robots.mkv", MediaType::Movie, "m");
        assert!(cache.get(&key).unwrap().is_none());
        cache.put(&key, &result("Robots")).unwrap();
        assert_eq!(cache.get(&key).unwrap().unwrap().title, "Robots");
    }
}
