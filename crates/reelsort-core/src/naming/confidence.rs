//! Heuristic confidence that a parsed title is the real title.

use super::{has_year_in_parentheses, is_obfuscated_filename};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static CODEC_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(x264|x265|h264|h265|hevc|avc|av1|xvid|divx)$").unwrap());

static RESOLUTION_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(2160p|1080p|720p|480p|4k|uhd)$").unwrap());

static PAREN_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((19\d{2}|20\d{2})\)").unwrap());

static PLAIN_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(19|20)\d{2}\b").unwrap());

const CODEC_MARKERS: &[&str] = &[
    "x264", "x265", "h264", "h265", "hevc", "avc", "av1", "xvid", "divx", "aac", "ac3", "dts",
    "truehd", "atmos", "10bit", "8bit", "hdr", "remux", "bluray", "webrip", "webdl", "hdtv",
];

const RELEASE_GROUPS: &[&str] = &[
    "rarbg", "yts", "yify", "sparks", "fgt", "ntb", "flux", "ettv", "eztv", "tgx", "evo",
    "ion10", "psa", "qxr", "tigole", "amiable", "geckos", "cmrg", "lol", "dimension", "killers",
];

/// Markers whose presence in the raw filename costs a little confidence.
const FILENAME_RELEASE_MARKERS: &[&str] = &[
    "RARBG", "YTS", "YIFY", "SPARKS", "FGT", "NTB", "FLUX", "BLURAY", "WEB-DL", "WEBRIP",
    "HDTV", "REMUX",
];

/// All-caps words that are legitimate in titles.
const LEGIT_CAPS: &[&str] = &[
    "tv", "usa", "uk", "us", "fbi", "cia", "csi", "ncis", "nyc", "la", "ii", "iii", "iv", "vi",
    "vii", "viii", "ix", "xi", "xii", "ok", "mr", "dr", "sos", "ufo", "it", "wall-e",
];

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "of", "and", "in", "to", "for", "on", "by", "with", "vs", "vs.",
];

fn has_letter_and_digit(word: &str) -> bool {
    word.chars().any(|c| c.is_ascii_digit()) && word.chars().any(|c| c.is_ascii_alphabetic())
}

/// True when a title looks like release-group residue rather than a name.
///
/// Single words are only flagged when they are codec markers, release groups or
/// mix letters with digits. Two-word titles are flagged by any garbage word;
/// longer titles once half their words are garbage.
pub fn is_garbage_title(title: &str) -> bool {
    let words: Vec<&str> = title.split_whitespace().collect();
    if words.is_empty() {
        return true;
    }

    if let [word] = words.as_slice() {
        let lower = word.to_lowercase();
        return CODEC_MARKERS.contains(&lower.as_str())
            || RELEASE_GROUPS.contains(&lower.as_str())
            || has_letter_and_digit(word);
    }

    let mut garbage = 0usize;
    for word in &words {
        let lower = word.to_lowercase();
        if STOPWORDS.contains(&lower.as_str()) {
            continue;
        }
        if RELEASE_GROUPS.contains(&lower.as_str()) || has_letter_and_digit(word) {
            garbage += 1;
            continue;
        }
        let all_caps = word.len() <= 6 && *word == word.to_uppercase() && *word != lower;
        if all_caps && !LEGIT_CAPS.contains(&lower.as_str()) {
            garbage += 1;
        }
    }

    if words.len() <= 2 {
        return garbage > 0;
    }
    garbage as f64 / words.len() as f64 >= 0.5
}

/// The same year appearing twice, e.g. `Matrix (1999) (1999)`. A year at the
/// very start is treated as part of the title.
fn has_duplicate_year(s: &str) -> bool {
    let paren: Vec<_> = PAREN_YEAR.captures_iter(s).collect();
    let within_paren = |pos: usize| {
        paren.iter().any(|c| {
            c.get(0)
                .is_some_and(|m| pos >= m.start() && pos < m.end())
        })
    };

    let mut counts: HashMap<&str, usize> = HashMap::new();
    let paren_years = paren.iter().filter_map(|c| c.get(1)).map(|m| m.as_str());
    let plain_years = PLAIN_YEAR
        .find_iter(s)
        .filter(|m| m.start() > 0 && !within_paren(m.start()))
        .map(|m| m.as_str());

    for year in paren_years.chain(plain_years) {
        let count = counts.entry(year).or_insert(0);
        *count += 1;
        if *count > 1 {
            return true;
        }
    }
    false
}

fn has_release_markers(filename: &str) -> bool {
    let upper = filename.to_uppercase();
    FILENAME_RELEASE_MARKERS.iter().any(|m| upper.contains(m))
}

/// Confidence in [0, 1] that `title` is a clean parse of `original_filename`.
///
/// Starts at 1.0 and applies:
///
/// | condition | delta |
/// |---|---|
/// | garbage title | -0.8 |
/// | obfuscated filename | -0.9 |
/// | duplicated year | -0.5 |
/// | title shorter than 3 | -0.5 |
/// | ends with codec | -0.4 |
/// | ends with resolution | -0.4 |
/// | single word longer than 3 | -0.3 |
/// | release markers in filename | -0.1 |
/// | `(YYYY)` in filename | +0.1 |
pub fn calculate_title_confidence(title: &str, original_filename: &str) -> f64 {
    let mut confidence: f64 = 1.0;

    if is_garbage_title(title) {
        confidence -= 0.8;
    }
    if is_obfuscated_filename(original_filename) {
        confidence -= 0.9;
    }
    if has_duplicate_year(original_filename) {
        confidence -= 0.5;
    }

    if title.chars().count() < 3 {
        confidence -= 0.5;
    }
    if CODEC_SUFFIX.is_match(title) {
        confidence -= 0.4;
    }
    if RESOLUTION_SUFFIX.is_match(title) {
        confidence -= 0.4;
    }
    if !title.contains(' ') && title.chars().count() > 3 {
        confidence -= 0.3;
    }
    if has_release_markers(original_filename) {
        confidence -= 0.1;
    }

    if has_year_in_parentheses(original_filename) {
        confidence += 0.1;
    }

    confidence.clamp(0.0, 1.0)
}
