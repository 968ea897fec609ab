//! Reviewable plans and their execution.
//!
//! Analyses become plan documents (`duplicates.json`, `consolidate.json`,
//! `audit.json`) saved by [`PlanStore`]. Nothing touches the library until
//! an [`AuditActionExecutor`] runs a plan.

mod audit;
mod executor;
mod store;
mod types;

pub use audit::{build_correct_path, AuditGenerator};
pub use executor::{ActionOutcome, AuditActionExecutor, PlanExecutionReport};
pub use store::{PlanKind, PlanStore};
pub use types::{
    plan_media_type, AuditAction, AuditItem, AuditPlan, AuditSummary, ConsolidatePlan,
    ConsolidatePlanItem, ConsolidateSummary, DuplicatePlan, DuplicatePlanItem, DuplicateSummary,
    FileInfo, MoveOperation, ACTION_DELETE, ACTION_MOVE, ACTION_RENAME,
};
