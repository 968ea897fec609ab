//! Titles spread across several library roots.

use crate::error::Result;
use crate::index::{MediaIndex, TitleConflict};
use crate::models::{MediaFile, MediaType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// One file that consolidation would move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScatteredMove {
    pub file_id: i64,
    pub source_path: PathBuf,
    pub target_path: PathBuf,
    pub size: u64,
}

/// A title with files under more than one library root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScatteredItem {
    pub normalized_title: String,
    pub title: String,
    pub year: Option<i32>,
    pub media_type: MediaType,
    /// Sorted.
    pub locations: Vec<PathBuf>,
    pub target_location: PathBuf,
    pub moves: Vec<ScatteredMove>,
    pub files_to_move: usize,
    pub bytes_to_move: u64,
}

impl ScatteredItem {
    /// Pick the root holding the most files (then the most bytes, then the
    /// lexicographically smallest) and plan moves for everything else.
    pub fn from_conflict(conflict: TitleConflict) -> Option<Self> {
        let target = choose_target(&conflict.files)?;
        let moves: Vec<ScatteredMove> = conflict
            .files
            .iter()
            .filter(|f| f.library_root != target)
            .map(|f| ScatteredMove {
                file_id: f.id,
                source_path: f.path.clone(),
                target_path: relocate(f, &target),
                size: f.size,
            })
            .collect();

        let title = conflict
            .files
            .first()
            .map(|f| f.title.clone())
            .unwrap_or_else(|| conflict.normalized_title.clone());

        Some(Self {
            normalized_title: conflict.normalized_title,
            title,
            year: conflict.year,
            media_type: conflict.media_type,
            locations: conflict.locations,
            target_location: target,
            files_to_move: moves.len(),
            bytes_to_move: moves.iter().map(|m| m.size).sum(),
            moves,
        })
    }
}

/// Output of [`analyze_scattered`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScatteredAnalysis {
    pub items: Vec<ScatteredItem>,
    pub total_items: usize,
    pub total_moves: usize,
    pub total_bytes: u64,
}

/// Scattered titles from the index conflict query.
pub fn analyze_scattered(index: &MediaIndex) -> Result<ScatteredAnalysis> {
    let items: Vec<ScatteredItem> = index
        .title_conflicts()?
        .into_iter()
        .filter_map(ScatteredItem::from_conflict)
        .collect();

    let analysis = ScatteredAnalysis {
        total_items: items.len(),
        total_moves: items.iter().map(|i| i.files_to_move).sum(),
        total_bytes: items.iter().map(|i| i.bytes_to_move).sum(),
        items,
    };
    info!(
        "Found {} scattered titles ({} moves, {} bytes)",
        analysis.total_items, analysis.total_moves, analysis.total_bytes
    );
    Ok(analysis)
}

fn choose_target(files: &[MediaFile]) -> Option<PathBuf> {
    let mut per_root: BTreeMap<&Path, (usize, u64)> = BTreeMap::new();
    for file in files {
        let entry = per_root.entry(file.library_root.as_path()).or_default();
        entry.0 += 1;
        entry.1 += file.size;
    }
    // Most files, then most bytes, then the smallest path.
    per_root
        .into_iter()
        .max_by(|(a_root, a), (b_root, b)| a.cmp(b).then_with(|| b_root.cmp(a_root)))
        .map(|(root, _)| root.to_path_buf())
}

/// Same path relative to its root, re-rooted under `target`.
fn relocate(file: &MediaFile, target: &Path) -> PathBuf {
    match file.path.strip_prefix(&file.library_root) {
        Ok(relative) if !relative.as_os_str().is_empty() => target.join(relative),
        _ => target.join(file.path.file_name().unwrap_or_default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file(id: i64, path: &str, root: &str, size: u64) -> MediaFile {
        let mut file = MediaFile::new(path, MediaType::Episode, "Lost");
        file.id = id;
        file.library_root = PathBuf::from(root);
        file.size = size;
        file
    }

    fn conflict(files: Vec<MediaFile>) -> TitleConflict {
        let mut locations: Vec<PathBuf> = files.iter().map(|f| f.library_root.clone()).collect();
        locations.sort();
        locations.dedup();
        TitleConflict {
            normalized_title: "lost".to_string(),
            year: None,
            media_type: MediaType::Episode,
            locations,
            files,
        }
    }

    #[test]
    fn test_target_has_most_files() {
        let item = ScatteredItem::from_conflict(conflict(vec![
            file(1, "/tv1/Lost/Season 01/Lost S01E01.mkv", "/tv1", 10),
            file(2, "/tv2/Lost/Season 01/Lost S01E02.mkv", "/tv2", 10),
            file(3, "/tv2/Lost/Season 01/Lost S01E03.mkv", "/tv2", 10),
        ]))
        .unwrap();

        assert_eq!(item.target_location, PathBuf::from("/tv2"));
        assert_eq!(item.files_to_move, 1);
        assert_eq!(item.bytes_to_move, 10);
        assert_eq!(
            item.moves[0].target_path,
            PathBuf::from("/tv2/Lost/Season 01/Lost S01E01.mkv")
        );
    }

    #[test]
    fn test_target_ties_break_on_bytes_then_path() {
        let by_bytes = ScatteredItem::from_conflict(conflict(vec![
            file(1, "/a/x.mkv", "/a", 10),
            file(2, "/b/x.mkv", "/b", 20),
        ]))
        .unwrap();
        assert_eq!(by_bytes.target_location, PathBuf::from("/b"));

        let by_path = ScatteredItem::from_conflict(conflict(vec![
            file(1, "/b/x.mkv", "/b", 10),
            file(2, "/a/x.mkv", "/a", 10),
        ]))
        .unwrap();
        assert_eq!(by_path.target_location, PathBuf::from("/a"));
        assert_eq!(by_path.moves[0].source_path, PathBuf::from("/b/x.mkv"));
    }

    #[test]
    fn test_analyze_scattered_from_index() {
        let temp_dir = TempDir::new().unwrap();
        let index = MediaIndex::new(temp_dir.path().join("media.db")).unwrap();
        for (path, root) in [
            ("/tv1/Lost/S01E01.mkv", "/tv1"),
            ("/tv2/Lost/S01E02.mkv", "/tv2"),
            ("/tv2/Heroes/S01E01.mkv", "/tv2"),
        ] {
            let mut f = file(0, path, root, 5);
            if path.contains("Heroes") {
                f.normalized_title = "heroes".to_string();
            }
            index.upsert_by_path(&f).unwrap();
        }

        let analysis = analyze_scattered(&index).unwrap();
        assert_eq!(analysis.total_items, 1);
        assert_eq!(analysis.total_moves, 1);
        assert_eq!(analysis.total_bytes, 5);
        assert_eq!(analysis.items[0].target_location, PathBuf::from("/tv1"));
    }
}
