//! SQLite media index storing one row per media file.

use crate::error::{ReelsortError, Result};
use crate::models::{MediaFile, MediaType};
use crate::quality::compare_candidates;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use super::store::MediaStore;

const SELECT_COLUMNS: &str = "id, path, size, modified_at, media_type, title, normalized_title,
    year, season, episode, resolution, source_type, codec, audio_format, quality_score,
    is_compliant, compliance_issues, source, source_priority, library_root, confidence,
    parse_method, needs_review, created_at, updated_at";

/// Result of [`MediaIndex::upsert_by_path`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub id: i64,
    /// False when an existing row for the path was updated.
    pub inserted: bool,
}

/// A title whose files are spread over more than one library root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleConflict {
    pub normalized_title: String,
    pub year: Option<i32>,
    pub media_type: MediaType,
    /// Distinct library roots, sorted.
    pub locations: Vec<PathBuf>,
    pub files: Vec<MediaFile>,
}

/// SQLite-backed media index.
pub struct MediaIndex {
    db_path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl MediaIndex {
    /// Create or open a media index at the given path.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| ReelsortError::Io {
                    message: format!("Failed to create directory {}", parent.display()),
                    path: Some(parent.to_path_buf()),
                    source: Some(e),
                })?;
            }
        }

        let conn = Connection::open(&db_path)?;
        Self::configure_connection(&conn)?;
        Self::ensure_schema(&conn)?;

        Ok(Self {
            db_path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA busy_timeout=30000;
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
            ",
        )?;
        Ok(())
    }

    fn ensure_schema(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS media_files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                path TEXT NOT NULL UNIQUE,
                size INTEGER NOT NULL,
                modified_at TEXT NOT NULL,
                media_type TEXT NOT NULL,
                title TEXT NOT NULL,
                normalized_title TEXT NOT NULL,
                year INTEGER,
                season INTEGER,
                episode INTEGER,
                resolution TEXT NOT NULL DEFAULT 'unknown',
                source_type TEXT NOT NULL DEFAULT 'unknown',
                codec TEXT NOT NULL DEFAULT 'unknown',
                audio_format TEXT NOT NULL DEFAULT 'unknown',
                quality_score INTEGER NOT NULL DEFAULT 0,
                is_compliant INTEGER NOT NULL DEFAULT 0,
                compliance_issues TEXT NOT NULL DEFAULT '[]',
                source TEXT NOT NULL,
                source_priority INTEGER NOT NULL,
                library_root TEXT NOT NULL DEFAULT '',
                confidence REAL NOT NULL DEFAULT 1.0,
                parse_method TEXT NOT NULL DEFAULT 'regex',
                needs_review INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_media_identity
             ON media_files(normalized_title, year, season, episode)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_media_root ON media_files(library_root)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_media_type ON media_files(media_type)",
            [],
        )?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| ReelsortError::lock_poisoned())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Insert a row, or update the row already stored for `file.path`.
    ///
    /// The stored `created_at` survives updates.
    pub fn upsert_by_path(&self, file: &MediaFile) -> Result<UpsertOutcome> {
        let conn = self.lock()?;
        let path = path_text(&file.path);

        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM media_files WHERE path = ?1",
                params![path],
                |row| row.get(0),
            )
            .optional()?;

        let issues_json = serde_json::to_string(&file.compliance_issues)?;
        conn.execute(
            "INSERT INTO media_files (path, size, modified_at, media_type, title, normalized_title,
                                      year, season, episode, resolution, source_type, codec,
                                      audio_format, quality_score, is_compliant, compliance_issues,
                                      source, source_priority, library_root, confidence,
                                      parse_method, needs_review, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                     ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24)
             ON CONFLICT(path) DO UPDATE SET
                 size=excluded.size,
                 modified_at=excluded.modified_at,
                 media_type=excluded.media_type,
                 title=excluded.title,
                 normalized_title=excluded.normalized_title,
                 year=excluded.year,
                 season=excluded.season,
                 episode=excluded.episode,
                 resolution=excluded.resolution,
                 source_type=excluded.source_type,
                 codec=excluded.codec,
                 audio_format=excluded.audio_format,
                 quality_score=excluded.quality_score,
                 is_compliant=excluded.is_compliant,
                 compliance_issues=excluded.compliance_issues,
                 source=excluded.source,
                 source_priority=excluded.source_priority,
                 library_root=excluded.library_root,
                 confidence=excluded.confidence,
                 parse_method=excluded.parse_method,
                 needs_review=excluded.needs_review,
                 updated_at=excluded.updated_at",
            params![
                path,
                size_to_sql(file.size),
                file.modified_at.to_rfc3339(),
                file.media_type.as_str(),
                file.title,
                file.normalized_title,
                file.year,
                file.season,
                file.episode,
                file.resolution,
                file.source_type,
                file.codec,
                file.audio_format,
                file.quality_score,
                file.is_compliant,
                issues_json,
                file.source,
                file.source_priority,
                path_text(&file.library_root),
                file.confidence,
                file.parse_method.as_str(),
                file.needs_review,
                file.created_at.to_rfc3339(),
                Utc::now().to_rfc3339(),
            ],
        )?;

        let outcome = match existing {
            Some(id) => UpsertOutcome { id, inserted: false },
            None => UpsertOutcome {
                id: conn.last_insert_rowid(),
                inserted: true,
            },
        };
        debug!("Upserted media file {}: {}", outcome.id, path);
        Ok(outcome)
    }

    /// Get a file by row id.
    pub fn get_by_id(&self, id: i64) -> Result<Option<MediaFile>> {
        let conn = self.lock()?;
        let result = conn
            .query_row(
                &format!("SELECT {} FROM media_files WHERE id = ?1", SELECT_COLUMNS),
                params![id],
                Self::row_to_record,
            )
            .optional()?;
        Ok(result)
    }

    /// Get a file by its unique path.
    pub fn get_by_path(&self, path: &Path) -> Result<Option<MediaFile>> {
        let conn = self.lock()?;
        let result = conn
            .query_row(
                &format!("SELECT {} FROM media_files WHERE path = ?1", SELECT_COLUMNS),
                params![path_text(path)],
                Self::row_to_record,
            )
            .optional()?;
        Ok(result)
    }

    /// Delete a file by row id. Returns whether a row was removed.
    pub fn delete_by_id(&self, id: i64) -> Result<bool> {
        let conn = self.lock()?;
        let rows_affected = conn.execute("DELETE FROM media_files WHERE id = ?1", params![id])?;
        if rows_affected > 0 {
            debug!("Deleted media file: {}", id);
        }
        Ok(rows_affected > 0)
    }

    /// Delete a file by path. Returns whether a row was removed.
    pub fn delete_by_path(&self, path: &Path) -> Result<bool> {
        let conn = self.lock()?;
        let path = path_text(path);
        let rows_affected =
            conn.execute("DELETE FROM media_files WHERE path = ?1", params![path])?;
        if rows_affected > 0 {
            debug!("Deleted media file: {}", path);
        }
        Ok(rows_affected > 0)
    }

    /// Overwrite the row with id `file.id`.
    pub fn update(&self, file: &MediaFile) -> Result<()> {
        let conn = self.lock()?;
        let issues_json = serde_json::to_string(&file.compliance_issues)?;
        let rows_affected = conn.execute(
            "UPDATE media_files SET
                path = ?2, size = ?3, modified_at = ?4, media_type = ?5, title = ?6,
                normalized_title = ?7, year = ?8, season = ?9, episode = ?10,
                resolution = ?11, source_type = ?12, codec = ?13, audio_format = ?14,
                quality_score = ?15, is_compliant = ?16, compliance_issues = ?17,
                source = ?18, source_priority = ?19, library_root = ?20, confidence = ?21,
                parse_method = ?22, needs_review = ?23, updated_at = ?24
             WHERE id = ?1",
            params![
                file.id,
                path_text(&file.path),
                size_to_sql(file.size),
                file.modified_at.to_rfc3339(),
                file.media_type.as_str(),
                file.title,
                file.normalized_title,
                file.year,
                file.season,
                file.episode,
                file.resolution,
                file.source_type,
                file.codec,
                file.audio_format,
                file.quality_score,
                file.is_compliant,
                issues_json,
                file.source,
                file.source_priority,
                path_text(&file.library_root),
                file.confidence,
                file.parse_method.as_str(),
                file.needs_review,
                Utc::now().to_rfc3339(),
            ],
        )?;
        if rows_affected == 0 {
            return Err(ReelsortError::MediaFileNotFound { id: file.id });
        }
        debug!("Updated media file {}: {}", file.id, file.path.display());
        Ok(())
    }

    /// Number of rows of one media type.
    pub fn count_by_type(&self, media_type: MediaType) -> Result<usize> {
        let conn = self.lock()?;
        let count: usize = conn.query_row(
            "SELECT COUNT(*) FROM media_files WHERE media_type = ?1",
            params![media_type.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Total number of rows.
    pub fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: usize = conn.query_row("SELECT COUNT(*) FROM media_files", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Every row recorded under `library_root`, ordered by path.
    pub fn list_under_root(&self, library_root: &Path) -> Result<Vec<MediaFile>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM media_files WHERE library_root = ?1 ORDER BY path",
            SELECT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![path_text(library_root)], Self::row_to_record)?;
        Self::collect_rows(rows)
    }

    /// Rows with confidence below `threshold`, least confident first.
    pub fn low_confidence_files(&self, threshold: f64, limit: usize) -> Result<Vec<MediaFile>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM media_files WHERE confidence < ?1
             ORDER BY confidence ASC, path ASC LIMIT ?2",
            SELECT_COLUMNS
        ))?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![threshold, limit], Self::row_to_record)?;
        Self::collect_rows(rows)
    }

    /// Movie groups sharing `(normalized_title, year)`, each ordered best first.
    pub fn duplicate_movie_groups(&self) -> Result<Vec<Vec<MediaFile>>> {
        let conn = self.lock()?;
        let keys: Vec<(String, Option<i32>)> = {
            let mut stmt = conn.prepare(
                "SELECT normalized_title, year
                 FROM media_files
                 WHERE media_type = 'movie'
                 GROUP BY normalized_title, year
                 HAVING COUNT(*) > 1
                 ORDER BY normalized_title, year",
            )?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect::<rusqlite::Result<_>>()?
        };

        let mut groups = Vec::with_capacity(keys.len());
        for (title, year) in keys {
            let files = Self::group_files(&conn, MediaType::Movie, &title, year, None, None)?;
            groups.push(files);
        }
        Ok(groups)
    }

    /// Episode groups sharing `(normalized_title, year, season, episode)`,
    /// each ordered best first. Rows missing season or episode are excluded.
    pub fn duplicate_episode_groups(&self) -> Result<Vec<Vec<MediaFile>>> {
        let conn = self.lock()?;
        type EpisodeKey = (String, Option<i32>, Option<i32>, Option<i32>);
        let keys: Vec<EpisodeKey> = {
            let mut stmt = conn.prepare(
                "SELECT normalized_title, year, season, episode
                 FROM media_files
                 WHERE media_type = 'episode' AND season IS NOT NULL AND episode IS NOT NULL
                 GROUP BY normalized_title, year, season, episode
                 HAVING COUNT(*) > 1
                 ORDER BY normalized_title, year, season, episode",
            )?;
            let rows =
                stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?;
            rows.collect::<rusqlite::Result<_>>()?
        };

        let mut groups = Vec::with_capacity(keys.len());
        for (title, year, season, episode) in keys {
            let files =
                Self::group_files(&conn, MediaType::Episode, &title, year, season, episode)?;
            groups.push(files);
        }
        Ok(groups)
    }

    /// Titles whose files live under more than one library root.
    pub fn title_conflicts(&self) -> Result<Vec<TitleConflict>> {
        let conn = self.lock()?;
        let keys: Vec<(String, Option<i32>, String)> = {
            let mut stmt = conn.prepare(
                "SELECT normalized_title, year, media_type
                 FROM media_files
                 GROUP BY normalized_title, year, media_type
                 HAVING COUNT(DISTINCT library_root) > 1
                 ORDER BY normalized_title, year, media_type",
            )?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
            rows.collect::<rusqlite::Result<_>>()?
        };

        let mut conflicts = Vec::with_capacity(keys.len());
        for (title, year, media_type) in keys {
            let media_type = MediaType::from_str(&media_type)?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM media_files
                 WHERE normalized_title = ?1 AND year IS ?2 AND media_type = ?3
                 ORDER BY library_root, path",
                SELECT_COLUMNS
            ))?;
            let rows = stmt.query_map(
                params![title, year, media_type.as_str()],
                Self::row_to_record,
            )?;
            let files = Self::collect_rows(rows)?;

            let mut locations: Vec<PathBuf> = files.iter().map(|f| f.library_root.clone()).collect();
            locations.sort();
            locations.dedup();

            conflicts.push(TitleConflict {
                normalized_title: title,
                year,
                media_type,
                locations,
                files,
            });
        }
        Ok(conflicts)
    }

    /// Checkpoint the WAL file.
    pub fn checkpoint_wal(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE)")?;
        debug!("Checkpointed WAL");
        Ok(())
    }

    fn group_files(
        conn: &Connection,
        media_type: MediaType,
        title: &str,
        year: Option<i32>,
        season: Option<i32>,
        episode: Option<i32>,
    ) -> Result<Vec<MediaFile>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM media_files
             WHERE media_type = ?1 AND normalized_title = ?2
               AND year IS ?3 AND season IS ?4 AND episode IS ?5",
            SELECT_COLUMNS
        ))?;
        let rows = stmt.query_map(
            params![media_type.as_str(), title, year, season, episode],
            Self::row_to_record,
        )?;
        let mut files = Self::collect_rows(rows)?;
        sort_best_first(&mut files);
        Ok(files)
    }

    fn collect_rows(
        rows: impl Iterator<Item = rusqlite::Result<MediaFile>>,
    ) -> Result<Vec<MediaFile>> {
        let mut files = Vec::new();
        for row in rows {
            match row {
                Ok(file) => files.push(file),
                Err(e) => warn!("Error reading media row: {}", e),
            }
        }
        Ok(files)
    }

    /// Convert a row selected with [`SELECT_COLUMNS`].
    fn row_to_record(row: &Row) -> rusqlite::Result<MediaFile> {
        let issues_json: String = row.get(16)?;
        let compliance_issues: Vec<String> =
            serde_json::from_str(&issues_json).unwrap_or_default();
        let size: i64 = row.get(2)?;

        Ok(MediaFile {
            id: row.get(0)?,
            path: PathBuf::from(row.get::<_, String>(1)?),
            size: u64::try_from(size).unwrap_or(0),
            modified_at: timestamp_column(row, 3)?,
            media_type: parsed_column(row, 4)?,
            title: row.get(5)?,
            normalized_title: row.get(6)?,
            year: row.get(7)?,
            season: row.get(8)?,
            episode: row.get(9)?,
            resolution: row.get(10)?,
            source_type: row.get(11)?,
            codec: row.get(12)?,
            audio_format: row.get(13)?,
            quality_score: row.get(14)?,
            is_compliant: row.get(15)?,
            compliance_issues,
            source: row.get(17)?,
            source_priority: row.get(18)?,
            library_root: PathBuf::from(row.get::<_, String>(19)?),
            confidence: row.get(20)?,
            parse_method: parsed_column(row, 21)?,
            needs_review: row.get(22)?,
            created_at: timestamp_column(row, 23)?,
            updated_at: timestamp_column(row, 24)?,
        })
    }
}

impl MediaStore for MediaIndex {
    fn get_by_id(&self, id: i64) -> Result<Option<MediaFile>> {
        MediaIndex::get_by_id(self, id)
    }

    fn get_by_path(&self, path: &Path) -> Result<Option<MediaFile>> {
        MediaIndex::get_by_path(self, path)
    }

    fn update(&self, file: &MediaFile) -> Result<()> {
        MediaIndex::update(self, file)
    }

    fn delete_by_id(&self, id: i64) -> Result<bool> {
        MediaIndex::delete_by_id(self, id)
    }
}

/// Order copies best first: score, then size, then path.
pub(crate) fn sort_best_first(files: &mut [MediaFile]) {
    files.sort_by(|a, b| {
        let a_path = a.path.to_string_lossy();
        let b_path = b.path.to_string_lossy();
        compare_candidates(
            (b.quality_score, b.size, &*b_path),
            (a.quality_score, a.size, &*a_path),
        )
    });
}

fn path_text(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn size_to_sql(size: u64) -> i64 {
    i64::try_from(size).unwrap_or(i64::MAX)
}

fn timestamp_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parsed_column<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = ReelsortError>,
{
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ParseMethod;
    use tempfile::TempDir;

    fn create_test_index() -> (MediaIndex, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("media.db");
        let index = MediaIndex::new(&db_path).unwrap();
        (index, temp_dir)
    }

    fn movie(path: &str, root: &str, score: i64, size: u64) -> MediaFile {
        let mut file = MediaFile::new(path, MediaType::Movie, "Robots");
        file.year = Some(2005);
        file.quality_score = score;
        file.size = size;
        file.library_root = PathBuf::from(root);
        file
    }

    fn episode(path: &str, season: Option<i32>, episode: Option<i32>) -> MediaFile {
        let mut file = MediaFile::new(path, MediaType::Episode, "The Office");
        file.season = season;
        file.episode = episode;
        file.size = 100;
        file.library_root = PathBuf::from("/tv");
        file
    }

    #[test]
    fn test_upsert_and_get() {
        let (index, _temp) = create_test_index();
        let mut file = movie("/movies/Robots (2005)/Robots (2005).mkv", "/movies", 284, 4_000);
        file.compliance_issues = vec!["missing_year".to_string()];
        file.parse_method = ParseMethod::Folder;

        let outcome = index.upsert_by_path(&file).unwrap();
        assert!(outcome.inserted);

        let loaded = index.get_by_id(outcome.id).unwrap().unwrap();
        assert_eq!(loaded.path, file.path);
        assert_eq!(loaded.year, Some(2005));
        assert_eq!(loaded.compliance_issues, vec!["missing_year".to_string()]);
        assert_eq!(loaded.parse_method, ParseMethod::Folder);
        assert_eq!(loaded.media_type, MediaType::Movie);

        let by_path = index.get_by_path(&file.path).unwrap().unwrap();
        assert_eq!(by_path.id, outcome.id);
    }

    #[test]
    fn test_upsert_updates_existing_path() {
        let (index, _temp) = create_test_index();
        let mut file = movie("/movies/a.mkv", "/movies", 100, 1);
        let first = index.upsert_by_path(&file).unwrap();

        file.quality_score = 300;
        let second = index.upsert_by_path(&file).unwrap();

        assert!(!second.inserted);
        assert_eq!(first.id, second.id);
        assert_eq!(index.count().unwrap(), 1);
        assert_eq!(index.get_by_id(first.id).unwrap().unwrap().quality_score, 300);
    }

    #[test]
    fn test_delete() {
        let (index, _temp) = create_test_index();
        let a = index.upsert_by_path(&movie("/m/a.mkv", "/m", 1, 1)).unwrap();
        index.upsert_by_path(&movie("/m/b.mkv", "/m", 1, 1)).unwrap();

        assert!(index.delete_by_id(a.id).unwrap());
        assert!(!index.delete_by_id(a.id).unwrap());
        assert!(index.delete_by_path(Path::new("/m/b.mkv")).unwrap());
        assert_eq!(index.count().unwrap(), 0);
    }

    #[test]
    fn test_update_missing_row() {
        let (index, _temp) = create_test_index();
        let mut file = movie("/m/a.mkv", "/m", 1, 1);
        file.id = 99;
        assert!(matches!(
            index.update(&file),
            Err(ReelsortError::MediaFileNotFound { id: 99 })
        ));
    }

    #[test]
    fn test_count_by_type_and_root() {
        let (index, _temp) = create_test_index();
        index.upsert_by_path(&movie("/m/a.mkv", "/m", 1, 1)).unwrap();
        index.upsert_by_path(&episode("/tv/x/S01E01.mkv", Some(1), Some(1))).unwrap();
        index.upsert_by_path(&episode("/tv/x/S01E02.mkv", Some(1), Some(2))).unwrap();

        assert_eq!(index.count_by_type(MediaType::Movie).unwrap(), 1);
        assert_eq!(index.count_by_type(MediaType::Episode).unwrap(), 2);
        assert_eq!(index.list_under_root(Path::new("/tv")).unwrap().len(), 2);
    }

    #[test]
    fn test_duplicate_movies_best_first() {
        let (index, _temp) = create_test_index();
        index.upsert_by_path(&movie("/a/robots.mkv", "/a", 84, 4_400)).unwrap();
        index.upsert_by_path(&movie("/b/robots.mkv", "/b", 284, 4_000)).unwrap();
        let mut other = movie("/a/cars.mkv", "/a", 1, 1);
        other.normalized_title = "cars".to_string();
        index.upsert_by_path(&other).unwrap();

        let groups = index.duplicate_movie_groups().unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[0][0].quality_score, 284);
    }

    #[test]
    fn test_tie_break_prefers_size_then_path() {
        let (index, _temp) = create_test_index();
        index.upsert_by_path(&movie("/b/robots.mkv", "/b", 200, 10)).unwrap();
        index.upsert_by_path(&movie("/a/robots.mkv", "/a", 200, 10)).unwrap();
        index.upsert_by_path(&movie("/c/robots.mkv", "/c", 200, 5)).unwrap();

        let groups = index.duplicate_movie_groups().unwrap();
        let order: Vec<_> = groups[0].iter().map(|f| f.path.clone()).collect();
        assert_eq!(
            order,
            vec![
                PathBuf::from("/a/robots.mkv"),
                PathBuf::from("/b/robots.mkv"),
                PathBuf::from("/c/robots.mkv"),
            ]
        );
    }

    #[test]
    fn test_duplicate_episodes_skip_missing_numbers() {
        let (index, _temp) = create_test_index();
        index.upsert_by_path(&episode("/tv/a.mkv", Some(1), Some(1))).unwrap();
        index.upsert_by_path(&episode("/tv/b.mkv", Some(1), Some(1))).unwrap();
        index.upsert_by_path(&episode("/tv/c.mkv", None, None)).unwrap();
        index.upsert_by_path(&episode("/tv/d.mkv", None, None)).unwrap();

        let groups = index.duplicate_episode_groups().unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
    }

    #[test]
    fn test_title_conflicts() {
        let (index, _temp) = create_test_index();
        index.upsert_by_path(&movie("/a/robots.mkv", "/a", 1, 1)).unwrap();
        index.upsert_by_path(&movie("/b/robots.mkv", "/b", 1, 1)).unwrap();
        let mut single = movie("/a/cars.mkv", "/a", 1, 1);
        single.normalized_title = "cars".to_string();
        index.upsert_by_path(&single).unwrap();

        let conflicts = index.title_conflicts().unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].normalized_title, "robots");
        assert_eq!(
            conflicts[0].locations,
            vec![PathBuf::from("/a"), PathBuf::from("/b")]
        );
    }

    #[test]
    fn test_low_confidence_files() {
        let (index, _temp) = create_test_index();
        let mut low = movie("/m/low.mkv", "/m", 1, 1);
        low.confidence = 0.3;
        let mut mid = movie("/m/mid.mkv", "/m", 1, 1);
        mid.confidence = 0.6;
        index.upsert_by_path(&low).unwrap();
        index.upsert_by_path(&mid).unwrap();
        index.upsert_by_path(&movie("/m/high.mkv", "/m", 1, 1)).unwrap();

        let files = index.low_confidence_files(0.8, 10).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, PathBuf::from("/m/low.mkv"));
        assert_eq!(index.low_confidence_files(0.8, 1).unwrap().len(), 1);
    }
}
