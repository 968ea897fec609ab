//! Media file records and classification results.

use crate::error::ReelsortError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Kind of media a library root holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Episode,
}

impl MediaType {
    /// Value stored in the index `media_type` column.
    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Episode => "episode",
        }
    }

    pub fn is_episode(self) -> bool {
        self == MediaType::Episode
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = ReelsortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "movie" => Ok(MediaType::Movie),
            "episode" | "tv" | "series" => Ok(MediaType::Episode),
            other => Err(ReelsortError::Validation {
                field: "media_type".to_string(),
                message: format!("unknown media type '{}'", other),
            }),
        }
    }
}

/// Which pipeline stage produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMethod {
    Regex,
    Folder,
    Ai,
}

impl ParseMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            ParseMethod::Regex => "regex",
            ParseMethod::Folder => "folder",
            ParseMethod::Ai => "ai",
        }
    }
}

impl fmt::Display for ParseMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParseMethod {
    type Err = ReelsortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regex" => Ok(ParseMethod::Regex),
            "folder" => Ok(ParseMethod::Folder),
            "ai" => Ok(ParseMethod::Ai),
            other => Err(ReelsortError::Validation {
                field: "parse_method".to_string(),
                message: format!("unknown parse method '{}'", other),
            }),
        }
    }
}

/// Identity assigned to one file by the classification pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Grouping key, see [`crate::naming::normalize_title`].
    pub normalized_title: String,
    /// Human-readable title as parsed.
    pub title: String,
    pub year: Option<i32>,
    pub season: Option<i32>,
    pub episode: Option<i32>,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    pub parse_method: ParseMethod,
}

impl ClassificationResult {
    pub fn needs_review(&self) -> bool {
        self.confidence < crate::config::ScanConfig::NEEDS_REVIEW_THRESHOLD
    }
}

/// A file row in the media index.
///
/// `path` is unique. Rows sharing `(normalized_title, year)` for movies, or
/// `(normalized_title, year, season, episode)` for episodes, form a
/// duplicate group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFile {
    /// Zero until the row has been persisted.
    pub id: i64,
    pub path: PathBuf,
    pub size: u64,
    pub modified_at: DateTime<Utc>,
    pub media_type: MediaType,
    pub title: String,
    pub normalized_title: String,
    pub year: Option<i32>,
    pub season: Option<i32>,
    pub episode: Option<i32>,
    pub resolution: String,
    pub source_type: String,
    pub codec: String,
    pub audio_format: String,
    pub quality_score: i64,
    pub is_compliant: bool,
    pub compliance_issues: Vec<String>,
    /// Provenance of the row, `filesystem` for scans.
    pub source: String,
    pub source_priority: i64,
    pub library_root: PathBuf,
    pub confidence: f64,
    pub parse_method: ParseMethod,
    pub needs_review: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaFile {
    /// A fresh record with empty quality fields, for callers that fill the rest.
    pub fn new(path: impl Into<PathBuf>, media_type: MediaType, title: impl Into<String>) -> Self {
        let title = title.into();
        let now = Utc::now();
        Self {
            id: 0,
            path: path.into(),
            size: 0,
            modified_at: now,
            media_type,
            normalized_title: crate::naming::normalize_title(&title),
            title,
            year: None,
            season: None,
            episode: None,
            resolution: "unknown".to_string(),
            source_type: "unknown".to_string(),
            codec: "unknown".to_string(),
            audio_format: "unknown".to_string(),
            quality_score: 0,
            is_compliant: false,
            compliance_issues: Vec::new(),
            source: crate::config::ScanConfig::SOURCE_FILESYSTEM.to_string(),
            source_priority: crate::config::ScanConfig::SOURCE_PRIORITY_FILESYSTEM,
            library_root: PathBuf::new(),
            confidence: 1.0,
            parse_method: ParseMethod::Regex,
            needs_review: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a classification, keeping `needs_review` in step with confidence.
    pub fn apply_classification(&mut self, result: &ClassificationResult) {
        self.title = result.title.clone();
        self.normalized_title = result.normalized_title.clone();
        self.year = result.year;
        self.season = result.season;
        self.episode = result.episode;
        self.confidence = result.confidence;
        self.parse_method = result.parse_method;
        self.needs_review = result.needs_review();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_round_trips_through_strings() {
        assert_eq!("movie".parse::<MediaType>().unwrap(), MediaType::Movie);
        assert_eq!("series".parse::<MediaType>().unwrap(), MediaType::Episode);
        assert!("podcast".parse::<MediaType>().is_err());
        assert_eq!(MediaType::Episode.to_string(), "episode");
    }

    #[test]
    fn test_apply_classification_sets_review_flag() {
        let mut file = MediaFile::new("/movies/x.mkv", MediaType::Movie, "x");
        file.apply_classification(&ClassificationResult {
            normalized_title: "robots".into(),
            title: "Robots".into(),
            year: Some(2005),
            season: None,
            episode: None,
            confidence: 0.7,
            parse_method: ParseMethod::Regex,
        });
        assert!(file.needs_review);
        assert_eq!(file.normalized_title, "robots");
        assert_eq!(file.year, Some(2005));
    }
}
