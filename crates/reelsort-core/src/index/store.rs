//! Record access the audit executor needs from the index.

use crate::error::Result;
use crate::models::MediaFile;
use std::path::Path;

/// The subset of [`super::MediaIndex`] that plan execution mutates.
///
/// Executors take `Arc<dyn MediaStore>` so tests can inject a store whose
/// writes fail.
pub trait MediaStore: Send + Sync {
    fn get_by_id(&self, id: i64) -> Result<Option<MediaFile>>;

    fn get_by_path(&self, path: &Path) -> Result<Option<MediaFile>>;

    /// Overwrite the stored row with id `file.id`.
    fn update(&self, file: &MediaFile) -> Result<()>;

    /// Returns whether a row was removed.
    fn delete_by_id(&self, id: i64) -> Result<bool>;
}
