//! SQLite media index.
//!
//! This module provides:
//! - Media file rows keyed by path, upserted by the scanner
//! - Duplicate group and cross-root conflict queries
//! - The [`MediaStore`] seam used by the audit executor

mod media_index;
mod store;

pub use media_index::{MediaIndex, TitleConflict, UpsertOutcome};
pub(crate) use media_index::sort_best_first;
pub use store::MediaStore;
