//! Release-name patterns for quality detection.
//!
//! Every matcher runs against the uppercased base name. Within a category the
//! first matching pattern wins, so the order of each `match_*` function is the
//! precedence order.

use super::{AudioCodec, HdrFormat, Resolution, Source, VideoCodec};
use regex::Regex;
use std::sync::LazyLock;

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($re).unwrap());
    };
}

// Resolution
pattern!(RES_4320, r"(?i)\b(4320[PI]|8K)\b");
pattern!(RES_2160, r"(?i)\b(2160[PI]|4K|UHD)\b");
pattern!(RES_1080, r"(?i)\b1080[PI]\b");
pattern!(RES_720, r"(?i)\b720[PI]\b");
pattern!(RES_576, r"(?i)\b576[PI]\b");
pattern!(RES_480, r"(?i)\b480[PI]\b");

// Source
pattern!(SRC_REMUX, r"(?i)\bREMUX\b");
pattern!(SRC_BLURAY, r"(?i)\b(BLURAY|BLU-RAY|BDRIP|BRRIP|BD)\b");
pattern!(SRC_WEBDL, r"(?i)\b(WEB-DL|WEBDL|WEB\.DL)\b");
pattern!(SRC_WEBRIP, r"(?i)\b(WEBRIP|WEB-RIP|WEB)\b");
pattern!(SRC_HDTV, r"(?i)\b(HDTV|PDTV|DSR)\b");
pattern!(SRC_DVDRIP, r"(?i)\b(DVDRIP|DVD-RIP|DVD)\b");
pattern!(SRC_DVDSCR, r"(?i)\b(DVDSCR|DVD-SCR|DVDSCREENER)\b");
pattern!(SRC_TC, r"(?i)\b(TC|TELECINE)\b");
pattern!(SRC_TS, r"(?i)\b(TS|TELESYNC|HDTS)\b");
pattern!(SRC_CAM, r"(?i)\b(CAM|HDCAM|CAMRIP)\b");

// HDR
pattern!(HDR_DV, r"(?i)\b(DV|DOVI|DOLBY\.?VISION)\b");
pattern!(HDR_10_PLUS, r"(?i)(HDR10\+|HDR10PLUS)");
pattern!(HDR_10, r"(?i)\b(HDR10|HDR)\b");
pattern!(HDR_HLG, r"(?i)\bHLG\b");

// Audio
pattern!(AUDIO_ATMOS, r"(?i)\bATMOS\b");
pattern!(AUDIO_TRUEHD, r"(?i)\b(TRUEHD|TRUE-HD)\b");
pattern!(AUDIO_DTSX, r"(?i)\b(DTS-X|DTSX)\b");
pattern!(AUDIO_DTSHDMA, r"(?i)\b(DTS-HD\.?MA|DTS-HD\.MASTER\.AUDIO)\b");
pattern!(AUDIO_DTSHD, r"(?i)\b(DTS-HD|DTSHD)\b");
pattern!(AUDIO_DTS, r"(?i)\bDTS\b");
pattern!(AUDIO_EAC3, r"(?i)(EAC3|E-AC-3|DD\+|DDP\d|DOLBY\.?DIGITAL\.?PLUS)");
pattern!(AUDIO_AC3, r"(?i)\b(AC3|AC-3|DD|DOLBY\.?DIGITAL)\b");
pattern!(AUDIO_AAC, r"(?i)\bAAC\b");

// Flags
pattern!(THREE_D, r"(?i)\b(3D|SBS|HSBS|OU|HOU)\b");
pattern!(PROPER, r"(?i)\b(PROPER|REPACK|RERIP)\b");
pattern!(EXTENDED, r"(?i)\b(EXTENDED|UNCUT|UNRATED|DC|DIRECTORS\.?CUT)\b");

pub(super) fn match_resolution(upper: &str) -> Resolution {
    [
        (&RES_4320, Resolution::P4320),
        (&RES_2160, Resolution::P2160),
        (&RES_1080, Resolution::P1080),
        (&RES_720, Resolution::P720),
        (&RES_576, Resolution::P576),
        (&RES_480, Resolution::P480),
    ]
    .into_iter()
    .find(|(re, _)| re.is_match(upper))
    .map_or(Resolution::Unknown, |(_, r)| r)
}

pub(super) fn match_source(upper: &str) -> Source {
    [
        (&SRC_REMUX, Source::Remux),
        (&SRC_BLURAY, Source::BluRay),
        (&SRC_WEBDL, Source::WebDl),
        (&SRC_WEBRIP, Source::WebRip),
        (&SRC_HDTV, Source::Hdtv),
        (&SRC_DVDRIP, Source::DvdRip),
        (&SRC_DVDSCR, Source::DvdScr),
        (&SRC_TC, Source::Telecine),
        (&SRC_TS, Source::Telesync),
        (&SRC_CAM, Source::Cam),
    ]
    .into_iter()
    .find(|(re, _)| re.is_match(upper))
    .map_or(Source::Unknown, |(_, s)| s)
}

pub(super) fn match_hdr(upper: &str) -> HdrFormat {
    [
        (&HDR_DV, HdrFormat::DolbyVision),
        (&HDR_10_PLUS, HdrFormat::Hdr10Plus),
        (&HDR_10, HdrFormat::Hdr10),
        (&HDR_HLG, HdrFormat::Hlg),
    ]
    .into_iter()
    .find(|(re, _)| re.is_match(upper))
    .map_or(HdrFormat::None, |(_, h)| h)
}

pub(super) fn match_audio(upper: &str) -> AudioCodec {
    [
        (&AUDIO_ATMOS, AudioCodec::Atmos),
        (&AUDIO_TRUEHD, AudioCodec::TrueHd),
        (&AUDIO_DTSX, AudioCodec::DtsX),
        (&AUDIO_DTSHDMA, AudioCodec::DtsHdMa),
        (&AUDIO_DTSHD, AudioCodec::DtsHd),
        (&AUDIO_DTS, AudioCodec::Dts),
        (&AUDIO_EAC3, AudioCodec::Eac3),
        (&AUDIO_AC3, AudioCodec::Ac3),
        (&AUDIO_AAC, AudioCodec::Aac),
    ]
    .into_iter()
    .find(|(re, _)| re.is_match(upper))
    .map_or(AudioCodec::Unknown, |(_, a)| a)
}

/// Substring match, preferred codecs first.
pub(super) fn match_codec(upper: &str) -> VideoCodec {
    const TABLE: &[(&[&str], VideoCodec)] = &[
        (&["AV1"], VideoCodec::Av1),
        (&["HEVC", "H.265", "H265", "X265"], VideoCodec::X265),
        (&["H.264", "H264", "X264", "AVC"], VideoCodec::X264),
        (&["VP9"], VideoCodec::Vp9),
        (&["XVID"], VideoCodec::Xvid),
    ];
    TABLE
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| upper.contains(n)))
        .map_or(VideoCodec::Unknown, |(_, c)| *c)
}

pub(super) fn is_3d(upper: &str) -> bool {
    THREE_D.is_match(upper)
}

pub(super) fn is_proper(upper: &str) -> bool {
    PROPER.is_match(upper)
}

pub(super) fn is_extended(upper: &str) -> bool {
    EXTENDED.is_match(upper)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_precedence() {
        assert_eq!(match_resolution("MOVIE.8K.2160P"), Resolution::P4320);
        assert_eq!(match_resolution("MOVIE.UHD.BLURAY"), Resolution::P2160);
        assert_eq!(match_resolution("MOVIE.1080I.HDTV"), Resolution::P1080);
        assert_eq!(match_resolution("MOVIE_1080P"), Resolution::Unknown);
    }

    #[test]
    fn test_source_precedence() {
        assert_eq!(match_source("MOVIE.1080P.BLURAY.REMUX"), Source::Remux);
        assert_eq!(match_source("MOVIE.WEB-DL.X264"), Source::WebDl);
        assert_eq!(match_source("MOVIE.WEB.H264"), Source::WebRip);
        assert_eq!(match_source("MOVIE.DVD"), Source::DvdRip);
        assert_eq!(match_source("MOVIE.HDCAM"), Source::Cam);
    }

    #[test]
    fn test_dvd_is_not_dolby_vision() {
        assert_eq!(match_hdr("MOVIE.DVDRIP"), HdrFormat::None);
        assert_eq!(match_hdr("MOVIE.2160P.DV.HDR10"), HdrFormat::DolbyVision);
        assert_eq!(match_hdr("MOVIE.HDR10+.WEB"), HdrFormat::Hdr10Plus);
    }

    #[test]
    fn test_audio_precedence() {
        assert_eq!(match_audio("MOVIE.TRUEHD.ATMOS.7.1"), AudioCodec::Atmos);
        assert_eq!(match_audio("MOVIE.DTS-HD.MA.5.1"), AudioCodec::DtsHdMa);
        assert_eq!(match_audio("MOVIE.DDP5.1"), AudioCodec::Eac3);
        assert_eq!(match_audio("MOVIE.AC3"), AudioCodec::Ac3);
    }

    #[test]
    fn test_codec_substrings() {
        assert_eq!(match_codec("MOVIE.1080P.HEVC"), VideoCodec::X265);
        assert_eq!(match_codec("MOVIE.AVC.REMUX"), VideoCodec::X264);
        assert_eq!(match_codec("MOVIE.1080P"), VideoCodec::Unknown);
    }
}
