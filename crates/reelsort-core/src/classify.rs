//! Classification pipeline: regex, folder fallback, AI fallback.
//!
//! Each stage only replaces the current best parse when it improves on it.
//! The stages run in a fixed order:
//!
//! 1. Regex parse of the filename. A file the regex cannot parse is
//!    rejected and the later stages never see it.
//! 2. Folder parse, only for obfuscated filenames; wins only with strictly
//!    higher confidence, scored against the folder it came from.
//! 3. AI parse, only when enabled and the current confidence is below the
//!    auto-trigger threshold. AI errors are counted and never abort the file.

use crate::ai::AiHelper;
use crate::config::{AiConfig, ScanConfig};
use crate::error::{ReelsortError, Result};
use crate::models::{ClassificationResult, MediaType, ParseMethod};
use crate::naming::{
    calculate_title_confidence, is_obfuscated_filename, normalize_title, parse_episode_from_path,
    parse_episode_name, parse_movie_from_path, parse_movie_name,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-run AI and review counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyCounters {
    /// AI stage ran and was not answered from the cache.
    pub ai_triggered: u64,
    /// AI stage answered from the cache.
    pub ai_cache_hits: u64,
    /// AI result replaced the current best.
    pub ai_succeeded: u64,
    /// AI call failed, including circuit-open rejections.
    pub ai_failed: u64,
    pub needs_review: u64,
}

#[derive(Debug, Clone)]
struct Candidate {
    title: String,
    year: Option<i32>,
    season: Option<i32>,
    episode: Option<i32>,
    confidence: f64,
    method: ParseMethod,
}

/// True when `confidence` beats the current best. Equal is not enough.
fn improves(current: &Candidate, confidence: f64) -> bool {
    confidence > current.confidence
}

/// Runs the staged title classification for one file at a time.
pub struct ClassificationPipeline {
    ai: Option<Arc<AiHelper>>,
    ai_enabled: bool,
    confidence_threshold: f64,
    auto_trigger_threshold: f64,
}

impl ClassificationPipeline {
    pub fn new(config: &AiConfig, ai: Option<Arc<AiHelper>>) -> Self {
        Self {
            ai_enabled: config.enabled && ai.is_some(),
            ai,
            confidence_threshold: config.confidence_threshold,
            auto_trigger_threshold: config.auto_trigger_threshold,
        }
    }

    /// Pipeline with the AI stage disabled.
    pub fn regex_only() -> Self {
        Self::new(&AiConfig::default(), None)
    }

    pub fn ai_enabled(&self) -> bool {
        self.ai_enabled
    }

    /// Classify `path` as `media_type`.
    ///
    /// Fails with [`ReelsortError::Unparseable`] when the filename does not
    /// parse. Folder and AI stages can only upgrade a regex result.
    pub async fn classify(
        &self,
        path: &Path,
        media_type: MediaType,
        counters: &mut ClassifyCounters,
    ) -> Result<ClassificationResult> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut best = regex_stage(&filename, media_type).ok_or_else(|| {
            ReelsortError::Unparseable {
                path: path.to_path_buf(),
            }
        })?;

        if is_obfuscated_filename(&filename) {
            if let Some(folder) = folder_stage(path, media_type) {
                if improves(&best, folder.confidence) {
                    debug!(
                        "Folder parse of {} beats filename ({:.2})",
                        path.display(),
                        folder.confidence
                    );
                    best = folder;
                }
            }
        }

        if self.ai_enabled && best.confidence < self.auto_trigger_threshold {
            if let Some(ai) = &self.ai {
                if let Some(candidate) = self
                    .ai_stage(ai, &filename, media_type, &best, counters)
                    .await
                {
                    best = candidate;
                }
            }
        }

        let result = ClassificationResult {
            normalized_title: normalize_title(&best.title),
            title: best.title,
            year: best.year,
            season: best.season,
            episode: best.episode,
            confidence: best.confidence,
            parse_method: best.method,
        };
        if result.confidence < ScanConfig::NEEDS_REVIEW_THRESHOLD {
            counters.needs_review += 1;
        }
        Ok(result)
    }

    async fn ai_stage(
        &self,
        ai: &AiHelper,
        filename: &str,
        media_type: MediaType,
        current: &Candidate,
        counters: &mut ClassifyCounters,
    ) -> Option<Candidate> {
        let (result, cached) = match ai.try_parse(filename, media_type).await {
            Ok(answer) => answer,
            Err(e) => {
                counters.ai_triggered += 1;
                counters.ai_failed += 1;
                if e.is_circuit_open() {
                    debug!("AI skipped for {}: {}", filename, e);
                } else {
                    warn!("AI parse failed for {}: {}", filename, e);
                }
                return None;
            }
        };
        if cached {
            counters.ai_cache_hits += 1;
        } else {
            counters.ai_triggered += 1;
        }

        let accept =
            result.confidence >= self.confidence_threshold || improves(current, result.confidence);
        if !accept {
            debug!(
                "AI result for {} ({:.2}) does not improve on current parse",
                filename, result.confidence
            );
            return None;
        }
        counters.ai_succeeded += 1;

        let mut candidate = Candidate {
            title: result.title.clone(),
            year: result.year,
            season: current.season,
            episode: current.episode,
            confidence: result.confidence,
            method: ParseMethod::Ai,
        };
        if media_type.is_episode() {
            if let Some(season) = result.season {
                candidate.season = Some(season);
                if let Some(episode) = result.first_episode() {
                    candidate.episode = Some(episode);
                }
            }
        }
        Some(candidate)
    }
}

fn regex_stage(filename: &str, media_type: MediaType) -> Option<Candidate> {
    match media_type {
        MediaType::Movie => parse_movie_name(filename).ok().map(|m| Candidate {
            confidence: calculate_title_confidence(&m.title, filename),
            title: m.title,
            year: m.year,
            season: None,
            episode: None,
            method: ParseMethod::Regex,
        }),
        MediaType::Episode => parse_episode_name(filename).ok().map(|e| Candidate {
            confidence: calculate_title_confidence(&e.title, filename),
            title: e.title,
            year: e.year,
            season: Some(e.season),
            episode: Some(e.episode),
            method: ParseMethod::Regex,
        }),
    }
}

fn folder_stage(path: &Path, media_type: MediaType) -> Option<Candidate> {
    match media_type {
        MediaType::Movie => {
            let parse = parse_movie_from_path(path).ok().filter(|p| p.from_folder)?;
            Some(Candidate {
                confidence: calculate_title_confidence(&parse.info.title, &parse.source_name),
                title: parse.info.title,
                year: parse.info.year,
                season: None,
                episode: None,
                method: ParseMethod::Folder,
            })
        }
        MediaType::Episode => {
            let parse = parse_episode_from_path(path).ok().filter(|p| p.from_folder)?;
            Some(Candidate {
                confidence: calculate_title_confidence(&parse.info.title, &parse.source_name),
                title: parse.info.title,
                year: parse.info.year,
                season: Some(parse.info.season),
                episode: Some(parse.info.episode),
                method: ParseMethod::Folder,
            })
        }
    }
}
