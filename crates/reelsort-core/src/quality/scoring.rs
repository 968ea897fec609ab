//! Ranking score for choosing between copies of the same title.
//!
//! The ranking score is `resolution + source + size bonus`. Resolution tiers are
//! spaced so that no size bonus can lift a file over the next tier up, and the
//! source tiers do the same for files of equal resolution.

use super::{QualityInfo, Resolution, Source};
use crate::config::ScanConfig;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Score assigned to zero-byte files, below every non-empty score.
pub const EMPTY_FILE_PENALTY: i64 = -1000;

const GIB: u64 = 1024 * 1024 * 1024;
const MOVIE_SIZE_CAP_GIB: u64 = 45;
const EPISODE_SIZE_CAP_GIB: u64 = 10;
/// Per-GiB weight when the resolution is unlabeled.
const UNKNOWN_RESOLUTION_PER_GIB: u64 = 20;
const UNKNOWN_RESOLUTION_CAP: i64 = 150;

fn resolution_points(resolution: Resolution, size_gib: u64) -> i64 {
    match resolution {
        Resolution::P4320 => 500,
        Resolution::P2160 => 400,
        Resolution::P1080 => 300,
        Resolution::P720 => 200,
        Resolution::P576 => 150,
        Resolution::P480 => 100,
        Resolution::Unknown => {
            let points = size_gib.saturating_mul(UNKNOWN_RESOLUTION_PER_GIB);
            i64::try_from(points).map_or(UNKNOWN_RESOLUTION_CAP, |p| p.min(UNKNOWN_RESOLUTION_CAP))
        }
    }
}

fn source_points(source: Source) -> i64 {
    match source {
        Source::Remux => 100,
        Source::BluRay => 80,
        Source::WebDl => 60,
        Source::WebRip => 50,
        Source::Hdtv => 40,
        Source::DvdRip => 20,
        _ => 0,
    }
}

/// Size bonus: one point per whole GiB up to the media-type cap.
fn size_bonus(size: u64, is_episode: bool) -> i64 {
    let cap = if is_episode {
        EPISODE_SIZE_CAP_GIB
    } else {
        MOVIE_SIZE_CAP_GIB
    };
    // Both operands are bounded by the cap, so the conversion cannot fail.
    i64::try_from((size / GIB).min(cap)).unwrap_or(0)
}

/// Ranking score for a file of `size` bytes.
pub fn score_file(info: &QualityInfo, size: u64, is_episode: bool) -> i64 {
    if size == 0 {
        return EMPTY_FILE_PENALTY;
    }
    let size_gib = size / GIB;
    resolution_points(info.resolution, size_gib)
        + source_points(info.source)
        + size_bonus(size, is_episode)
}

/// Order two candidates; `Greater` means `a` is the better copy.
///
/// Higher score wins, then larger size, then the lexicographically smaller path.
pub fn compare_candidates(
    a: (i64, u64, &str),
    b: (i64, u64, &str),
) -> Ordering {
    a.0.cmp(&b.0)
        .then_with(|| a.1.cmp(&b.1))
        .then_with(|| b.2.cmp(a.2))
}

/// Path with the highest ranking score, or `None` for an empty map.
pub fn find_best_file(files: &HashMap<PathBuf, u64>, is_episode: bool) -> Option<PathBuf> {
    files
        .iter()
        .map(|(path, &size)| {
            let info = QualityInfo::parse(&path.to_string_lossy());
            (score_file(&info, size, is_episode), size, path)
        })
        .max_by(|a, b| {
            compare_candidates(
                (a.0, a.1, &a.2.to_string_lossy()),
                (b.0, b.1, &b.2.to_string_lossy()),
            )
        })
        .map(|(_, _, path)| path.clone())
}

/// Whether a file is large enough to be real content rather than a stub.
pub fn meets_minimum_size(size: u64, is_episode: bool) -> bool {
    if is_episode {
        size >= ScanConfig::MIN_EPISODE_SIZE
    } else {
        size >= ScanConfig::MIN_MOVIE_SIZE
    }
}

/// Index-ready quality fields for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityMetadata {
    pub resolution: String,
    pub source_type: String,
    pub codec: String,
    pub audio_format: String,
    pub quality_score: i64,
}

/// Parse a path and compute everything the index stores about its quality.
pub fn extract_metadata(path: &Path, size: u64, is_episode: bool) -> QualityMetadata {
    let info = QualityInfo::parse_from_path(path);
    QualityMetadata {
        resolution: info.resolution.as_str().to_string(),
        source_type: info.source.as_str().to_string(),
        codec: info.codec.as_str().to_string(),
        audio_format: info.audio.as_str().to_string(),
        quality_score: score_file(&info, size, is_episode),
    }
}
