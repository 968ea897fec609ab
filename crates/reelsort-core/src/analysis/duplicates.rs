//! Duplicate detection and best-copy selection.

use crate::error::Result;
use crate::index::{sort_best_first, MediaIndex};
use crate::models::{MediaFile, MediaType};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::info;

/// Copies of one movie or episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// See [`group_id`].
    pub id: String,
    pub normalized_title: String,
    /// Display title of the best copy.
    pub title: String,
    pub year: Option<i32>,
    pub season: Option<i32>,
    pub episode: Option<i32>,
    pub media_type: MediaType,
    /// Best first.
    pub files: Vec<MediaFile>,
    pub best_file_id: i64,
    /// Total size minus the size of the best copy.
    pub reclaimable_bytes: u64,
}

impl DuplicateGroup {
    /// Build a group from rows sharing an identity key. Returns `None` for
    /// fewer than two files.
    pub fn from_files(mut files: Vec<MediaFile>) -> Option<Self> {
        if files.len() < 2 {
            return None;
        }
        sort_best_first(&mut files);

        let best = &files[0];
        let total: u64 = files.iter().map(|f| f.size).sum();
        let (season, episode) = match best.media_type {
            MediaType::Episode => (best.season, best.episode),
            MediaType::Movie => (None, None),
        };

        Some(Self {
            id: group_id(&best.normalized_title, best.year, season, episode),
            normalized_title: best.normalized_title.clone(),
            title: best.title.clone(),
            year: best.year,
            season,
            episode,
            media_type: best.media_type,
            best_file_id: best.id,
            reclaimable_bytes: total.saturating_sub(best.size),
            files,
        })
    }

    pub fn best(&self) -> Option<&MediaFile> {
        self.files.iter().find(|f| f.id == self.best_file_id)
    }

    /// Every copy except the best.
    pub fn redundant(&self) -> impl Iterator<Item = &MediaFile> {
        self.files.iter().filter(move |f| f.id != self.best_file_id)
    }
}

/// Output of [`DuplicateAnalyzer::analyze`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DuplicateAnalysis {
    pub groups: Vec<DuplicateGroup>,
    pub total_groups: usize,
    pub total_files: usize,
    pub reclaimable_bytes: u64,
}

impl DuplicateAnalysis {
    pub fn from_groups(groups: Vec<DuplicateGroup>) -> Self {
        Self {
            total_groups: groups.len(),
            total_files: groups.iter().map(|g| g.files.len()).sum(),
            reclaimable_bytes: groups.iter().map(|g| g.reclaimable_bytes).sum(),
            groups,
        }
    }
}

/// Stable id for an identity key: hex of the first 8 bytes of the SHA-256 of
/// `title-year-sN-eN`, with absent parts left out.
pub fn group_id(title: &str, year: Option<i32>, season: Option<i32>, episode: Option<i32>) -> String {
    let mut parts = vec![title.to_lowercase()];
    if let Some(year) = year {
        parts.push(year.to_string());
    }
    if let Some(season) = season {
        parts.push(format!("s{}", season));
    }
    if let Some(episode) = episode {
        parts.push(format!("e{}", episode));
    }
    let digest = Sha256::digest(parts.join("-").as_bytes());
    hex::encode(&digest[..8])
}

/// Finds duplicate groups in the index.
pub struct DuplicateAnalyzer {
    index: Arc<MediaIndex>,
}

impl DuplicateAnalyzer {
    pub fn new(index: Arc<MediaIndex>) -> Self {
        Self { index }
    }

    /// Movie groups followed by episode groups.
    pub fn analyze(&self) -> Result<DuplicateAnalysis> {
        let groups: Vec<DuplicateGroup> = self
            .index
            .duplicate_movie_groups()?
            .into_iter()
            .chain(self.index.duplicate_episode_groups()?)
            .filter_map(DuplicateGroup::from_files)
            .collect();

        let analysis = DuplicateAnalysis::from_groups(groups);
        info!(
            "Found {} duplicate groups ({} files, {} bytes reclaimable)",
            analysis.total_groups, analysis.total_files, analysis.reclaimable_bytes
        );
        Ok(analysis)
    }
}
