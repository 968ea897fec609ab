//! Library naming convention checks and canonical relative paths.
//!
//! Movies live at `Title (Year)/Title (Year).ext`, episodes at
//! `Show (Year)/Season NN/Show (Year) SxxEyy.ext`.

use super::{is_obfuscated_filename, parse_episode_name, parse_movie_name, has_year_in_parentheses};
use crate::models::MediaType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const MARKERS: &[&str] = &[
    "2160P", "1080P", "720P", "480P", "4K", "UHD", "8K", "BLURAY", "BLU-RAY", "BDRIP", "BRRIP",
    "WEB-DL", "WEBDL", "WEBRIP", "HDTV", "DVDRIP", "DVDSCR", "X264", "X265", "H264", "H265",
    "H.264", "H.265", "HEVC", "XVID", "AAC", "AC3", "DTS", "ATMOS", "TRUEHD", "HDR", "REMUX",
];

/// Characters that break media servers or filesystems.
const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Result of a naming check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compliance {
    pub is_compliant: bool,
    pub issues: Vec<String>,
}

impl Compliance {
    fn from_issues(issues: Vec<String>) -> Self {
        Self {
            is_compliant: issues.is_empty(),
            issues,
        }
    }
}

fn has_release_markers(filename: &str) -> bool {
    let upper = filename.to_uppercase();
    MARKERS.iter().any(|m| upper.contains(m))
}

/// Drop characters that cannot appear in a single path component.
pub fn sanitize_component(s: &str) -> String {
    s.chars().filter(|c| !INVALID_CHARS.contains(c)).collect::<String>().trim().to_string()
}

fn titled(title: &str, year: Option<i32>) -> String {
    let title = sanitize_component(title);
    match year {
        Some(year) => format!("{} ({})", title, year),
        None => title,
    }
}

/// `Title (Year)/Title (Year).ext`
pub fn movie_relative_path(title: &str, year: Option<i32>, ext: &str) -> PathBuf {
    let name = titled(title, year);
    PathBuf::from(&name).join(format!("{}.{}", name, ext))
}

/// `Show (Year)/Season NN/Show (Year) SxxEyy.ext`
pub fn episode_relative_path(
    title: &str,
    year: Option<i32>,
    season: i32,
    episode: i32,
    ext: &str,
) -> PathBuf {
    let show = titled(title, year);
    PathBuf::from(&show)
        .join(format!("Season {:02}", season))
        .join(format!("{} S{:02}E{:02}.{}", show, season, episode, ext))
}

/// Check a file path against the library naming convention.
pub fn check_compliance(path: &Path, media_type: MediaType) -> Compliance {
    match media_type {
        MediaType::Movie => check_movie(path),
        MediaType::Episode => check_episode(path),
    }
}

fn name_parts(path: &Path) -> (String, String, String) {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parent = path
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    (filename, parent, ext)
}

fn check_movie(path: &Path) -> Compliance {
    let (filename, parent, ext) = name_parts(path);
    let movie = match parse_movie_name(&filename) {
        Ok(movie) => movie,
        Err(e) => return Compliance::from_issues(vec![format!("invalid_filename: {}", e)]),
    };

    let mut issues = Vec::new();
    if movie.year.is_none() {
        issues.push("missing_year: missing year".to_string());
    } else if !has_year_in_parentheses(&filename) {
        issues.push("invalid_year_format: year must be in format (YYYY)".to_string());
    }
    if has_release_markers(&filename) {
        issues.push("release_markers: contains quality/codec markers".to_string());
    }

    let expected_folder = titled(&movie.title, movie.year);
    let expected_file = format!("{}.{}", expected_folder, ext);
    if filename != expected_file {
        issues.push(format!("invalid_filename: expected '{}'", expected_file));
    }
    if parent != expected_folder {
        issues.push(format!(
            "invalid_folder_structure: folder should be '{}'",
            expected_folder
        ));
    }
    Compliance::from_issues(issues)
}

fn check_episode(path: &Path) -> Compliance {
    let (filename, parent, ext) = name_parts(path);
    if is_obfuscated_filename(&filename) {
        return Compliance::from_issues(vec![
            "obfuscated_filename: obfuscated filename requires review".to_string(),
        ]);
    }
    let episode = match parse_episode_name(&filename) {
        Ok(episode) => episode,
        Err(e) => return Compliance::from_issues(vec![format!("invalid_filename: {}", e)]),
    };

    let mut issues = Vec::new();
    let expected_season = format!("Season {:02}", episode.season);
    if parent != expected_season {
        issues.push(format!(
            "wrong_season_folder: folder should be '{}'",
            expected_season
        ));
    }
    if has_release_markers(&filename) {
        issues.push("release_markers: contains quality/codec markers".to_string());
    }
    let show = titled(&episode.title, episode.year);
    let expected_file = format!(
        "{} S{:02}E{:02}.{}",
        show, episode.season, episode.episode, ext
    );
    if filename != expected_file {
        issues.push(format!("invalid_filename: expected '{}'", expected_file));
    }
    Compliance::from_issues(issues)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compliant_movie() {
        let c = check_compliance(
            Path::new("/media/Movies/Robots (2005)/Robots (2005).mkv"),
            MediaType::Movie,
        );
        assert!(c.is_compliant, "{:?}", c.issues);
    }

    #[test]
    fn test_scene_movie_is_not_compliant() {
        let c = check_compliance(
            Path::new("/downloads/Heat.1995.1080p.BluRay.mkv"),
            MediaType::Movie,
        );
        assert!(!c.is_compliant);
        assert!(c.issues.iter().any(|i| i.starts_with("release_markers")));
        assert!(c.issues.iter().any(|i| i.starts_with("invalid_year_format")));
    }

    #[test]
    fn test_compliant_episode() {
        let c = check_compliance(
            Path::new("/tv/Doctor Who (2005)/Season 03/Doctor Who (2005) S03E07.mkv"),
            MediaType::Episode,
        );
        assert!(c.is_compliant, "{:?}", c.issues);
    }

    #[test]
    fn test_episode_in_wrong_folder() {
        let c = check_compliance(
            Path::new("/tv/Doctor Who (2005)/Doctor Who (2005) S03E07.mkv"),
            MediaType::Episode,
        );
        assert!(c.issues.iter().any(|i| i.starts_with("wrong_season_folder")));
    }

    #[test]
    fn test_relative_paths() {
        assert_eq!(
            movie_relative_path("Robots", Some(2005), "mkv"),
            PathBuf::from("Robots (2005)/Robots (2005).mkv")
        );
        assert_eq!(
            episode_relative_path("Spider-Man: The Series", Some(1994), 1, 2, "mp4"),
            PathBuf::from("Spider-Man The Series (1994)/Season 01/Spider-Man The Series (1994) S01E02.mp4")
        );
    }
}
