//! Derived views over the media index.
//!
//! - [`DuplicateAnalyzer`]: copies of the same movie or episode, best first
//! - [`analyze_scattered`]: titles whose files sit under several library roots
//!
//! Nothing here is persisted; plans freeze these views, see [`crate::plans`].

mod duplicates;
mod scattered;

pub use duplicates::{group_id, DuplicateAnalysis, DuplicateAnalyzer, DuplicateGroup};
pub use scattered::{analyze_scattered, ScatteredAnalysis, ScatteredItem, ScatteredMove};
