//! Audit plans: AI review of low-confidence index rows.

use super::types::{AuditAction, AuditItem, AuditPlan, AuditSummary, ACTION_RENAME};
use crate::ai::AiHelper;
use crate::error::Result;
use crate::index::MediaIndex;
use crate::models::MediaType;
use crate::naming::{normalize_title, sanitize_component};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Builds an [`AuditPlan`] by asking the AI about each low-confidence file.
pub struct AuditGenerator {
    index: Arc<MediaIndex>,
    ai: Arc<AiHelper>,
    /// Minimum AI confidence for a suggested rename.
    confidence_threshold: f64,
}

impl AuditGenerator {
    pub fn new(index: Arc<MediaIndex>, ai: Arc<AiHelper>, confidence_threshold: f64) -> Self {
        Self {
            index,
            ai,
            confidence_threshold,
        }
    }

    /// Review up to `limit` files whose stored confidence is below
    /// `threshold`.
    pub async fn generate(&self, threshold: f64, limit: usize) -> Result<AuditPlan> {
        let files = self.index.low_confidence_files(threshold, limit)?;
        info!("Auditing {} files below confidence {:.2}", files.len(), threshold);

        let mut summary = AuditSummary {
            total_files: files.len(),
            ..AuditSummary::default()
        };
        let mut items = Vec::with_capacity(files.len());
        let mut actions = Vec::new();

        for file in &files {
            let mut item = AuditItem::from(file);
            let filename = file
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            summary.ai_total_calls += 1;
            let ai = match self.ai.try_parse(&filename, file.media_type).await {
                Ok((ai, _cached)) => {
                    summary.ai_success_count += 1;
                    ai
                }
                Err(e) => {
                    warn!("AI audit of {} failed: {}", file.path.display(), e);
                    summary.ai_error_count += 1;
                    item.skip_reason = Some(format!("ai error: {}", e));
                    items.push(item);
                    continue;
                }
            };

            let ai_type = match ai.media_type.as_str() {
                "tv" => Some(MediaType::Episode),
                "movie" => Some(MediaType::Movie),
                _ => None,
            };
            if ai_type.is_some_and(|t| t != file.media_type) {
                debug!(
                    "Skipping {}: AI says {} but the file is indexed as {}",
                    file.path.display(),
                    ai.media_type,
                    file.media_type
                );
                summary.type_mismatches_skipped += 1;
                item.skip_reason = Some("type mismatch".to_string());
                items.push(item);
                continue;
            }

            if ai.confidence < self.confidence_threshold {
                summary.confidence_too_low += 1;
                item.skip_reason = Some(format!("ai confidence {:.2} too low", ai.confidence));
                items.push(item);
                continue;
            }

            if normalize_title(&ai.title) == file.normalized_title {
                summary.title_unchanged += 1;
                item.skip_reason = Some("title unchanged".to_string());
                items.push(item);
                continue;
            }

            let season = ai.season.or(file.season);
            let episode = ai.first_episode().or(file.episode);
            let year = ai.year.or(file.year);
            let (season, episode) = match file.media_type {
                MediaType::Episode => (season, episode),
                MediaType::Movie => (None, None),
            };

            let Some(new_path) = build_correct_path(&file.path, &ai.title, year, season, episode)
            else {
                warn!(
                    "Skipping {}: AI title {:?} is not a usable file name",
                    file.path.display(),
                    ai.title
                );
                item.skip_reason = Some("invalid title".to_string());
                items.push(item);
                continue;
            };

            actions.push(AuditAction {
                item_id: file.id,
                action: ACTION_RENAME.to_string(),
                new_title: Some(ai.title.clone()),
                new_year: year,
                new_season: season,
                new_episode: episode,
                new_path: Some(new_path),
                reasoning: Some(format!(
                    "AI suggested: {} (confidence: {:.2})",
                    ai.title, ai.confidence
                )),
                confidence: ai.confidence,
            });
            items.push(item);
        }

        summary.files_to_rename = actions.iter().filter(|a| a.action == ACTION_RENAME).count();
        summary.files_to_delete = actions.len() - summary.files_to_rename;
        summary.files_to_skip = summary.total_files - actions.len();
        if !items.is_empty() {
            summary.avg_confidence =
                items.iter().map(|i| i.confidence).sum::<f64>() / items.len() as f64;
        }

        info!(
            "Audit plan: {} renames, {} skipped, {} AI errors",
            summary.files_to_rename, summary.files_to_skip, summary.ai_error_count
        );
        Ok(AuditPlan {
            created_at: Utc::now(),
            command: "audit".to_string(),
            summary,
            items,
            actions,
        })
    }
}

/// Library-style name for a corrected file, in the same directory with the
/// same extension.
///
/// Episodes become `Title (Year) - S01E02.ext` and movies `Title (Year).ext`;
/// the year part is dropped when unknown. Path separators are stripped from
/// `title`; `None` when nothing but dots is left.
pub fn build_correct_path(
    current: &Path,
    title: &str,
    year: Option<i32>,
    season: Option<i32>,
    episode: Option<i32>,
) -> Option<PathBuf> {
    let title = sanitize_component(title);
    if title.chars().all(|c| c == '.') {
        return None;
    }
    let dir = current.parent().unwrap_or_else(|| Path::new(""));
    let ext = current
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let stem = match (year, season, episode) {
        (Some(y), Some(s), Some(e)) => format!("{} ({}) - S{:02}E{:02}", title, y, s, e),
        (None, Some(s), Some(e)) => format!("{} - S{:02}E{:02}", title, s, e),
        (Some(y), _, _) => format!("{} ({})", title, y),
        (None, _, _) => title.to_string(),
    };
    Some(dir.join(format!("{}{}", stem, ext)))
}
