//! Release-name parsing for movies and TV episodes.
//!
//! Parsers take a filename (or folder name) and produce a cleaned display title
//! plus year and episode numbers. The submodules add the obfuscation detector,
//! the title-confidence score, title normalization and library-layout checks.

mod compliance;
mod confidence;
mod normalize;
mod obfuscation;

pub use compliance::{
    check_compliance, episode_relative_path, movie_relative_path, sanitize_component, Compliance,
};
pub use confidence::{calculate_title_confidence, is_garbage_title};
pub use normalize::normalize_title;
pub use obfuscation::{
    is_obfuscated_filename, parse_episode_from_path, parse_movie_from_path, FolderParse,
};

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Four-digit years 1900-2099 on word boundaries.
static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(19|20)\d{2}\b").unwrap());

/// Year in parentheses, e.g. `(2005)`.
static YEAR_PAREN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\((\d{4})\)").unwrap());

/// `S01E02` style markers.
static EPISODE_SE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[Ss](\d{1,2})[Ee](\d{1,3})").unwrap());

/// `1x02` style markers.
static EPISODE_X: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})x(\d{1,3})\b").unwrap());

/// Trailing `-GROUP` release tag, matched before separators are flattened.
static RELEASE_GROUP_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-[A-Za-z0-9]+$").unwrap());

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Quality, codec and scene markers removed from titles.
static RELEASE_MARKERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\b\d{3,4}[pi]\b",
        r"\b(4K|UHD)\b",
        r"\b(HDR10\+?|HDR|DoVi|DV)\b",
        r"\b(DTS HD|DTS X|DTS|TrueHD|Atmos|AAC|AC3|DDP?\d?|FLAC)\b",
        r"\b\d \d\b",
        r"\b(BluRay|Blu ray|BDRip|BRRip|REMUX|WEB DL|WEBDL|WEBRip|WEB)\b",
        r"\b(HDTV|DVDRip|DVD)\b",
        r"\b(AMZN|NF|ATVP|HULU|DSNP|HMAX)\b",
        r"\b(x264|x265|HEVC|AVC|H ?264|H ?265|AV1|XviD)\b",
        r"\b(PROPER|REPACK|iNTERNAL|LIMITED|EXTENDED|UNRATED)\b",
        r"\b(DUAL|MULTI|DUB|SUBS?)\b",
        r"\b(RARBG|YTS|YIFY)\b",
        r"\bv\d+\b",
        r"\[.*?\]",
        r"\b(8bit|10bit|12bit)\b",
    ]
    .iter()
    .map(|p| Regex::new(&format!("(?i){}", p)).unwrap())
    .collect()
});

/// Parsed movie identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieInfo {
    pub title: String,
    pub year: Option<i32>,
}

/// Parsed episode identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeInfo {
    pub title: String,
    pub year: Option<i32>,
    pub season: i32,
    pub episode: i32,
}

/// Why a name could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    NoEpisodeMarker,
    EmptyTitle,
    NoUsableFolder,
}

impl std::fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseFailure::NoEpisodeMarker => write!(f, "no episode marker"),
            ParseFailure::EmptyTitle => write!(f, "no title left after cleanup"),
            ParseFailure::NoUsableFolder => write!(f, "no parent folder carries a usable name"),
        }
    }
}

/// Base name with its extension removed.
pub(crate) fn stem(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}

/// True when the name carries an `SxxEyy` or `NxMM` marker.
pub fn has_episode_marker(name: &str) -> bool {
    EPISODE_SE.is_match(name) || EPISODE_X.is_match(name)
}

pub fn has_year_in_parentheses(name: &str) -> bool {
    YEAR_PAREN.is_match(name)
}

/// Parse a movie filename such as `Heat.1995.1080p.BluRay.x264-GRP.mkv`.
pub fn parse_movie_name(filename: &str) -> Result<MovieInfo, ParseFailure> {
    parse_movie_stem(&stem(filename))
}

/// Parse a name that has no extension (folder names).
pub(crate) fn parse_movie_stem(base: &str) -> Result<MovieInfo, ParseFailure> {
    let year = extract_year(base);
    let mut cleaned = strip_release_markers(base);
    if let Some(year) = year {
        cleaned = remove_year(&cleaned, year);
    }
    let title = collapse_spaces(&cleaned);
    if title.is_empty() {
        return Err(ParseFailure::EmptyTitle);
    }
    Ok(MovieInfo { title, year })
}

/// Parse an episode filename such as `The.Office.S02E03.720p.HDTV.mkv`.
pub fn parse_episode_name(filename: &str) -> Result<EpisodeInfo, ParseFailure> {
    parse_episode_stem(&stem(filename))
}

pub(crate) fn parse_episode_stem(base: &str) -> Result<EpisodeInfo, ParseFailure> {
    let (season, episode, start) =
        extract_episode_info(base).ok_or(ParseFailure::NoEpisodeMarker)?;

    let title_part = &base[..start];
    let year = extract_year(base);
    let mut cleaned = strip_release_markers(title_part);
    if let Some(year) = year {
        cleaned = remove_year(&cleaned, year);
    }
    let title = collapse_spaces(&cleaned);
    if title.is_empty() {
        return Err(ParseFailure::EmptyTitle);
    }
    Ok(EpisodeInfo {
        title,
        year,
        season,
        episode,
    })
}

/// Prefer a parenthesized year, otherwise the last plausible bare year.
pub fn extract_year(s: &str) -> Option<i32> {
    if let Some(caps) = YEAR_PAREN.captures(s) {
        if let Ok(year) = caps[1].parse::<i32>() {
            if (1900..=2099).contains(&year) {
                return Some(year);
            }
        }
    }
    YEAR.find_iter(s)
        .filter_map(|m| m.as_str().parse::<i32>().ok())
        .filter(|y| !matches!(y, 1920 | 1440 | 1280 | 2160))
        .last()
}

/// Season, episode and byte offset of the marker.
fn extract_episode_info(s: &str) -> Option<(i32, i32, usize)> {
    let caps = EPISODE_SE.captures(s).or_else(|| EPISODE_X.captures(s))?;
    let whole = caps.get(0)?;
    let season = caps[1].parse().ok()?;
    let episode = caps[2].parse().ok()?;
    Some((season, episode, whole.start()))
}

fn strip_release_markers(s: &str) -> String {
    let mut out = RELEASE_GROUP_SUFFIX.replace(s, "").into_owned();
    out = out.replace(['.', '_', '-'], " ");
    for re in RELEASE_MARKERS.iter() {
        out = re.replace_all(&out, " ").into_owned();
    }
    out
}

fn remove_year(s: &str, year: i32) -> String {
    let pattern = format!(r"[\(\[]?\b{}\b[\)\]]?", year);
    match Regex::new(&pattern) {
        Ok(re) => {
            // Keep a leading year that is the title itself ("2012", "1917").
            let trimmed = s.trim_start();
            let leading = trimmed.starts_with(&year.to_string())
                && re.find_iter(s).count() > 1;
            if leading {
                let offset = s.len() - trimmed.len() + 4;
                let (head, tail) = s.split_at(offset);
                format!("{}{}", head, re.replace_all(tail, " "))
            } else {
                re.replace_all(s, " ").into_owned()
            }
        }
        Err(_) => s.to_string(),
    }
}

fn collapse_spaces(s: &str) -> String {
    WHITESPACE.replace_all(s, " ").trim().to_string()
}
