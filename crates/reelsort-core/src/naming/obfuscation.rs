//! Detection of scrambled release filenames and recovery from parent folders.
//!
//! Downloaders often leave the real release name on the folder and a hash or
//! random token on the file itself:
//!
//! ```text
//! /downloads/Inception.2010.1080p.BluRay-GRP/30e2dc4173fc4798bbe5fd40137ed621.mkv
//! ```

use super::{
    has_episode_marker, is_garbage_title, parse_episode_name, parse_episode_stem,
    parse_movie_name, parse_movie_stem, stem, EpisodeInfo, MovieInfo, ParseFailure, YEAR,
};
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

/// How many parent folders are inspected above an obfuscated file.
const MAX_FOLDER_DEPTH: usize = 3;

static HEX_STRING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{32,}$").unwrap());

static UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[0-9a-fA-F]{8}[-_]?[0-9a-fA-F]{4}[-_]?[0-9a-fA-F]{4}[-_]?[0-9a-fA-F]{4}[-_]?[0-9a-fA-F]{12}$",
    )
    .unwrap()
});

static BASE64_LIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9+/=]{20,}$").unwrap());

/// A parse recovered from a path, along with the name it was taken from.
///
/// `source_name` is the filename when the file was readable, otherwise the
/// parent folder that supplied the title. Confidence is scored against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderParse<T> {
    pub info: T,
    pub source_name: String,
    pub from_folder: bool,
}

/// True for hash, UUID and random-token filenames.
pub fn is_obfuscated_filename(filename: &str) -> bool {
    let base = stem(
        &Path::new(filename)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| filename.to_string()),
    );

    if base.len() < 8 {
        return false;
    }
    if HEX_STRING.is_match(&base) || UUID.is_match(&base) {
        return true;
    }
    if has_episode_marker(&base) || YEAR.is_match(&base) {
        return false;
    }
    if is_garbage_title(&base)
        && !base.contains(' ')
        && !base.contains('.')
        && has_high_entropy(&base)
    {
        return true;
    }
    if base.len() >= 20 && is_random_alphanumeric(&base) {
        return true;
    }
    BASE64_LIKE.is_match(&base) && has_high_entropy(&base)
}

fn is_random_alphanumeric(s: &str) -> bool {
    if s.len() < 20 {
        return false;
    }
    let upper = s.chars().any(|c| c.is_uppercase());
    let lower = s.chars().any(|c| c.is_lowercase());
    let digits = s.chars().filter(|c| c.is_ascii_digit()).count();
    if !upper || !lower || digits == 0 {
        return false;
    }
    let ratio = digits as f64 / s.chars().count() as f64;
    if !(0.05..=0.5).contains(&ratio) {
        return false;
    }
    has_high_entropy(s)
}

/// Random strings repeat few characters: unique/total above 0.4.
fn has_high_entropy(s: &str) -> bool {
    let total = s.chars().count();
    if total < 10 {
        return false;
    }
    let unique: HashSet<char> = s.chars().collect();
    unique.len() as f64 / total as f64 > 0.4
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Up to [`MAX_FOLDER_DEPTH`] parent folder names, nearest first.
fn parent_folders(path: &Path) -> impl Iterator<Item = String> + '_ {
    path.ancestors()
        .skip(1)
        .take(MAX_FOLDER_DEPTH)
        .filter_map(|dir| dir.file_name())
        .map(|name| name.to_string_lossy().into_owned())
}

/// Parse an episode, falling back to the first parent folder that carries an
/// episode marker when the filename is obfuscated.
pub fn parse_episode_from_path(path: &Path) -> Result<FolderParse<EpisodeInfo>, ParseFailure> {
    let filename = file_name(path);
    if !is_obfuscated_filename(&filename) {
        return parse_episode_name(&filename).map(|info| FolderParse {
            info,
            source_name: filename,
            from_folder: false,
        });
    }

    for folder in parent_folders(path) {
        if has_episode_marker(&folder) {
            return parse_episode_stem(&folder).map(|info| FolderParse {
                info,
                source_name: folder,
                from_folder: true,
            });
        }
    }
    Err(ParseFailure::NoUsableFolder)
}

/// Parse a movie, falling back to the nearest parent folder that is neither
/// obfuscated itself nor an episode folder and yields a non-garbage title.
pub fn parse_movie_from_path(path: &Path) -> Result<FolderParse<MovieInfo>, ParseFailure> {
    let filename = file_name(path);
    if !is_obfuscated_filename(&filename) {
        return parse_movie_name(&filename).map(|info| FolderParse {
            info,
            source_name: filename,
            from_folder: false,
        });
    }

    for folder in parent_folders(path) {
        if is_obfuscated_filename(&format!("{}.mkv", folder)) || has_episode_marker(&folder) {
            continue;
        }
        if let Ok(info) = parse_movie_stem(&folder) {
            if !is_garbage_title(&info.title) {
                return Ok(FolderParse {
                    info,
                    source_name: folder,
                    from_folder: true,
                });
            }
        }
    }
    Err(ParseFailure::NoUsableFolder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_obfuscated_names() {
        assert!(is_obfuscated_filename("30e2dc4173fc4798bbe5fd40137ed621.mkv"));
        assert!(is_obfuscated_filename("675d7595-3e9b-4602-9464-6424b664c6d7.mkv"));
        assert!(is_obfuscated_filename("RTVA3rFvM11jjtr6pdNPpUDg2.mkv"));
    }

    #[test]
    fn test_release_names_are_not_obfuscated() {
        assert!(!is_obfuscated_filename("Inception.2010.1080p.BluRay.mkv"));
        assert!(!is_obfuscated_filename("The.Office.S02E03.mkv"));
        assert!(!is_obfuscated_filename("Robots.mkv"));
        assert!(!is_obfuscated_filename("/media/Movies/Robots (2005)/Robots (2005).mkv"));
    }

    #[test]
    fn test_movie_recovered_from_parent_folder() {
        let parse = parse_movie_from_path(Path::new(
            "/downloads/Inception.2010.1080p.BluRay-GRP/30e2dc4173fc4798bbe5fd40137ed621.mkv",
        ))
        .unwrap();
        assert!(parse.from_folder);
        assert_eq!(parse.info.title, "Inception");
        assert_eq!(parse.info.year, Some(2010));
        assert_eq!(parse.source_name, "Inception.2010.1080p.BluRay-GRP");
    }

    #[test]
    fn test_movie_skips_obfuscated_folders() {
        let parse = parse_movie_from_path(Path::new(
            "/downloads/Heat.1995.1080p/a8f3c91d2b7e4f60a1d9c3b5e7f20486/30e2dc4173fc4798bbe5fd40137ed621.mkv",
        ))
        .unwrap();
        assert_eq!(parse.info.title, "Heat");
    }

    #[test]
    fn test_episode_recovered_from_parent_folder() {
        let parse = parse_episode_from_path(Path::new(
            "/downloads/The.White.Lotus.S02E07.1080p/30e2dc4173fc4798bbe5fd40137ed621.mkv",
        ))
        .unwrap();
        assert_eq!(parse.info.title, "The White Lotus");
        assert_eq!(parse.info.season, 2);
        assert_eq!(parse.info.episode, 7);
    }

    #[test]
    fn test_no_usable_folder() {
        let result =
            parse_episode_from_path(Path::new("/downloads/stuff/30e2dc4173fc4798bbe5fd40137ed621.mkv"));
        assert_eq!(result, Err(ParseFailure::NoUsableFolder));
    }

    #[test]
    fn test_readable_filename_parses_directly() {
        let parse = parse_movie_from_path(Path::new("/movies/Robots (2005)/Robots (2005).mkv")).unwrap();
        assert!(!parse.from_folder);
        assert_eq!(parse.source_name, "Robots (2005).mkv");
    }
}
