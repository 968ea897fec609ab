//! Quality detection and ranking for media files.
//!
//! [`QualityInfo::parse`] reads release markers from a filename. Scores are always
//! derived from the parsed fields on demand:
//!
//! - [`QualityInfo::score`] is the base quality score (no size component).
//! - [`score_file`] is the ranking score used to pick the best duplicate copy.

mod patterns;
mod scoring;

pub use scoring::{
    compare_candidates, extract_metadata, find_best_file, meets_minimum_size, score_file,
    QualityMetadata, EMPTY_FILE_PENALTY,
};

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::Path;

/// Vertical resolution tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    Unknown,
    P480,
    P576,
    P720,
    P1080,
    P2160,
    P4320,
}

impl Resolution {
    /// Points in the base score. Unknown sits between 576p and 720p.
    pub fn points(self) -> i64 {
        match self {
            Resolution::P480 => 5,
            Resolution::P576 => 7,
            Resolution::P720 => 15,
            Resolution::P1080 => 25,
            Resolution::P2160 => 40,
            Resolution::P4320 => 50,
            Resolution::Unknown => 10,
        }
    }

    /// Label stored in the index.
    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::P480 => "480p",
            Resolution::P576 => "576p",
            Resolution::P720 => "720p",
            Resolution::P1080 => "1080p",
            Resolution::P2160 => "2160p",
            Resolution::P4320 => "4320p",
            Resolution::Unknown => "unknown",
        }
    }
}

/// Release source tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    Unknown,
    Cam,
    Telesync,
    Telecine,
    DvdScr,
    DvdRip,
    Hdtv,
    WebRip,
    WebDl,
    BluRay,
    Remux,
}

impl Source {
    pub fn points(self) -> i64 {
        match self {
            Source::Cam => 5,
            Source::Telesync => 10,
            Source::Telecine => 15,
            Source::DvdScr => 20,
            Source::DvdRip => 25,
            Source::Hdtv => 30,
            Source::WebRip => 35,
            Source::WebDl => 40,
            Source::BluRay => 50,
            Source::Remux => 60,
            Source::Unknown => 20,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Source::Cam => "CAM",
            Source::Telesync => "TS",
            Source::Telecine => "TC",
            Source::DvdScr => "DVDScr",
            Source::DvdRip => "DVDRip",
            Source::Hdtv => "HDTV",
            Source::WebRip => "WEBRip",
            Source::WebDl => "WEB-DL",
            Source::BluRay => "BluRay",
            Source::Remux => "REMUX",
            Source::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HdrFormat {
    None,
    Hlg,
    Hdr10,
    Hdr10Plus,
    DolbyVision,
}

impl HdrFormat {
    pub fn points(self) -> i64 {
        match self {
            HdrFormat::None => 0,
            HdrFormat::Hlg => 8,
            HdrFormat::Hdr10 => 10,
            HdrFormat::Hdr10Plus => 12,
            HdrFormat::DolbyVision => 15,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HdrFormat::None => "",
            HdrFormat::Hlg => "HLG",
            HdrFormat::Hdr10 => "HDR10",
            HdrFormat::Hdr10Plus => "HDR10+",
            HdrFormat::DolbyVision => "DV",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioCodec {
    Unknown,
    Aac,
    Ac3,
    Eac3,
    Dts,
    DtsHd,
    DtsHdMa,
    DtsX,
    TrueHd,
    Atmos,
}

impl AudioCodec {
    pub fn points(self) -> i64 {
        match self {
            AudioCodec::Unknown => 0,
            AudioCodec::Aac => 2,
            AudioCodec::Ac3 => 4,
            AudioCodec::Eac3 => 5,
            AudioCodec::Dts => 6,
            AudioCodec::DtsHd => 8,
            AudioCodec::DtsHdMa => 10,
            AudioCodec::DtsX => 11,
            AudioCodec::TrueHd => 12,
            AudioCodec::Atmos => 15,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AudioCodec::Unknown => "unknown",
            AudioCodec::Aac => "AAC",
            AudioCodec::Ac3 => "DD",
            AudioCodec::Eac3 => "DD+",
            AudioCodec::Dts => "DTS",
            AudioCodec::DtsHd => "DTS-HD",
            AudioCodec::DtsHdMa => "DTS-HD MA",
            AudioCodec::DtsX => "DTS:X",
            AudioCodec::TrueHd => "TrueHD",
            AudioCodec::Atmos => "Atmos",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoCodec {
    Unknown,
    Av1,
    X265,
    X264,
    Vp9,
    Xvid,
}

impl VideoCodec {
    pub fn as_str(self) -> &'static str {
        match self {
            VideoCodec::Unknown => "unknown",
            VideoCodec::Av1 => "AV1",
            VideoCodec::X265 => "x265",
            VideoCodec::X264 => "x264",
            VideoCodec::Vp9 => "VP9",
            VideoCodec::Xvid => "XviD",
        }
    }
}

/// Quality markers parsed from a release name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityInfo {
    pub resolution: Resolution,
    pub source: Source,
    pub hdr: HdrFormat,
    pub audio: AudioCodec,
    pub codec: VideoCodec,
    pub is_3d: bool,
    pub is_proper: bool,
    pub is_extended: bool,
}

impl QualityInfo {
    /// Parse quality markers from a filename or path.
    ///
    /// Only the base name without its extension is inspected.
    pub fn parse(filename: &str) -> Self {
        let path = Path::new(filename);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| filename.to_string());
        let upper = stem.to_uppercase();

        Self {
            resolution: patterns::match_resolution(&upper),
            source: patterns::match_source(&upper),
            hdr: patterns::match_hdr(&upper),
            audio: patterns::match_audio(&upper),
            codec: patterns::match_codec(&upper),
            is_3d: patterns::is_3d(&upper),
            is_proper: patterns::is_proper(&upper),
            is_extended: patterns::is_extended(&upper),
        }
    }

    /// Parse from a full path, taking the source tier from the parent folder
    /// when the filename carries none.
    pub fn parse_from_path(path: &Path) -> Self {
        let mut info = Self::parse(&path.to_string_lossy());
        if info.source == Source::Unknown {
            if let Some(parent) = path.parent().and_then(|p| p.file_name()) {
                // Folder names have no extension; append one so the stem survives.
                let folder = format!("{}.dir", parent.to_string_lossy());
                let parent_info = Self::parse(&folder);
                if parent_info.source != Source::Unknown {
                    info.source = parent_info.source;
                }
            }
        }
        info
    }

    /// Base quality score: source + resolution + HDR + audio + PROPER + Extended.
    pub fn score(&self) -> i64 {
        let mut score = self.source.points()
            + self.resolution.points()
            + self.hdr.points()
            + self.audio.points();
        if self.is_proper {
            score += 3;
        }
        if self.is_extended {
            score += 2;
        }
        score
    }

    /// Strict comparison on the base score.
    pub fn compare(&self, other: &QualityInfo) -> Ordering {
        self.score().cmp(&other.score())
    }

    pub fn is_better_than(&self, other: &QualityInfo) -> bool {
        self.compare(other) == Ordering::Greater
    }
}

impl fmt::Display for QualityInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.resolution != Resolution::Unknown {
            parts.push(self.resolution.as_str());
        }
        if self.source != Source::Unknown {
            parts.push(self.source.as_str());
        }
        if self.hdr != HdrFormat::None {
            parts.push(self.hdr.as_str());
        }
        if parts.is_empty() {
            write!(f, "Unknown")
        } else {
            write!(f, "{}", parts.join(" "))
        }
    }
}
