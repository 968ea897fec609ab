//! Plan documents written to the plans directory.
//!
//! Paths are absolute and sizes are bytes. There is no schema version field;
//! unknown fields are ignored on load.

use crate::analysis::{DuplicateAnalysis, ScatteredAnalysis};
use crate::models::{MediaFile, MediaType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const ACTION_RENAME: &str = "rename";
pub const ACTION_DELETE: &str = "delete";
pub const ACTION_MOVE: &str = "move";

/// Plan spelling of a media type: episodes are `series`.
pub fn plan_media_type(media_type: MediaType) -> &'static str {
    match media_type {
        MediaType::Movie => "movie",
        MediaType::Episode => "series",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub id: i64,
    pub path: PathBuf,
    pub size: u64,
    pub quality_score: i64,
    pub resolution: String,
    pub source_type: String,
}

impl From<&MediaFile> for FileInfo {
    fn from(file: &MediaFile) -> Self {
        Self {
            id: file.id,
            path: file.path.clone(),
            size: file.size,
            quality_score: file.quality_score,
            resolution: file.resolution.clone(),
            source_type: file.source_type.clone(),
        }
    }
}

/// One redundant copy to delete and the copy that stays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicatePlanItem {
    pub group_id: String,
    pub title: String,
    pub year: Option<i32>,
    pub media_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<i32>,
    pub keep: FileInfo,
    pub delete: FileInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateSummary {
    pub total_groups: usize,
    pub files_to_delete: usize,
    pub space_reclaimable: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicatePlan {
    pub created_at: DateTime<Utc>,
    pub command: String,
    pub summary: DuplicateSummary,
    pub plans: Vec<DuplicatePlanItem>,
}

impl DuplicatePlan {
    /// One item per redundant copy, keeping each group's best file.
    pub fn from_analysis(analysis: &DuplicateAnalysis) -> Self {
        let mut plans = Vec::new();
        for group in &analysis.groups {
            let Some(best) = group.best() else {
                continue;
            };
            for redundant in group.redundant() {
                plans.push(DuplicatePlanItem {
                    group_id: group.id.clone(),
                    title: group.title.clone(),
                    year: group.year,
                    media_type: plan_media_type(group.media_type).to_string(),
                    season: group.season,
                    episode: group.episode,
                    keep: FileInfo::from(best),
                    delete: FileInfo::from(redundant),
                });
            }
        }

        Self {
            created_at: Utc::now(),
            command: "duplicates".to_string(),
            summary: DuplicateSummary {
                total_groups: analysis.total_groups,
                files_to_delete: plans.len(),
                space_reclaimable: analysis.reclaimable_bytes,
            },
            plans,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOperation {
    pub action: String,
    pub source_path: PathBuf,
    pub target_path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidatePlanItem {
    /// Position of the title in the analysis, starting at 1.
    pub conflict_id: i64,
    pub title: String,
    pub year: Option<i32>,
    pub media_type: String,
    pub target_location: PathBuf,
    pub operations: Vec<MoveOperation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidateSummary {
    pub total_conflicts: usize,
    pub total_moves: usize,
    pub total_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidatePlan {
    pub created_at: DateTime<Utc>,
    pub command: String,
    pub summary: ConsolidateSummary,
    pub plans: Vec<ConsolidatePlanItem>,
}

impl ConsolidatePlan {
    pub fn from_analysis(analysis: &ScatteredAnalysis) -> Self {
        let plans: Vec<ConsolidatePlanItem> = analysis
            .items
            .iter()
            .filter(|item| !item.moves.is_empty())
            .zip(1..)
            .map(|(item, conflict_id)| ConsolidatePlanItem {
                conflict_id,
                title: item.title.clone(),
                year: item.year,
                media_type: plan_media_type(item.media_type).to_string(),
                target_location: item.target_location.clone(),
                operations: item
                    .moves
                    .iter()
                    .map(|m| MoveOperation {
                        action: ACTION_MOVE.to_string(),
                        source_path: m.source_path.clone(),
                        target_path: m.target_path.clone(),
                        size: m.size,
                    })
                    .collect(),
            })
            .collect();

        Self {
            created_at: Utc::now(),
            command: "consolidate".to_string(),
            summary: ConsolidateSummary {
                total_conflicts: plans.len(),
                total_moves: plans.iter().map(|p| p.operations.len()).sum(),
                total_bytes: plans
                    .iter()
                    .flat_map(|p| p.operations.iter())
                    .map(|op| op.size)
                    .sum(),
            },
            plans,
        }
    }
}

/// A low-confidence file under review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditItem {
    pub id: i64,
    pub path: PathBuf,
    pub size: u64,
    pub media_type: String,
    pub title: String,
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<i32>,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

impl From<&MediaFile> for AuditItem {
    fn from(file: &MediaFile) -> Self {
        let known = |s: &str| (!s.is_empty() && s != "unknown").then(|| s.to_string());
        Self {
            id: file.id,
            path: file.path.clone(),
            size: file.size,
            media_type: file.media_type.as_str().to_string(),
            title: file.title.clone(),
            year: file.year,
            season: file.season,
            episode: file.episode,
            confidence: file.confidence,
            resolution: known(&file.resolution),
            source_type: known(&file.source_type),
            skip_reason: None,
        }
    }
}

/// A suggested correction for one [`AuditItem`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditAction {
    pub item_id: i64,
    /// [`ACTION_RENAME`] or [`ACTION_DELETE`].
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_season: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_episode: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub confidence: f64,
}

impl AuditAction {
    pub fn delete(item_id: i64) -> Self {
        Self {
            item_id,
            action: ACTION_DELETE.to_string(),
            new_title: None,
            new_year: None,
            new_season: None,
            new_episode: None,
            new_path: None,
            reasoning: None,
            confidence: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditSummary {
    pub total_files: usize,
    pub files_to_rename: usize,
    pub files_to_delete: usize,
    pub files_to_skip: usize,
    pub avg_confidence: f64,
    pub ai_total_calls: usize,
    pub ai_success_count: usize,
    pub ai_error_count: usize,
    pub type_mismatches_skipped: usize,
    pub confidence_too_low: usize,
    pub title_unchanged: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditPlan {
    pub created_at: DateTime<Utc>,
    pub command: String,
    pub summary: AuditSummary,
    pub items: Vec<AuditItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<AuditAction>,
}

impl AuditPlan {
    pub fn item(&self, id: i64) -> Option<&AuditItem> {
        self.items.iter().find(|item| item.id == id)
    }
}
