//! Applies audit, duplicate and consolidation plan actions to files and
//! index rows.

use super::types::{
    AuditAction, AuditItem, AuditPlan, ConsolidatePlan, ConsolidatePlanItem, DuplicatePlan,
    MoveOperation, ACTION_DELETE, ACTION_MOVE, ACTION_RENAME,
};
use crate::error::{ReelsortError, Result};
use crate::index::MediaStore;
use crate::models::MediaFile;
use crate::naming::normalize_title;
use crate::platform::{can_delete, fix_permissions, Ownership};
use crate::transfer::{Transfer, TransferOptions};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What one executed (or previewed) action did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub item_id: i64,
    pub action: String,
    pub dry_run: bool,
    pub path: PathBuf,
    /// Destination of a rename.
    pub new_path: Option<PathBuf>,
    /// Delete found the file already gone and only dropped the row.
    pub file_already_missing: bool,
    pub permissions_fixed: bool,
}

/// Per-item results of running a whole plan.
#[derive(Debug, Default)]
pub struct PlanExecutionReport {
    pub outcomes: Vec<ActionOutcome>,
    /// `(item id, error)` for every action that failed.
    pub failures: Vec<(i64, ReelsortError)>,
}

impl PlanExecutionReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    fn record(&mut self, item_id: i64, result: Result<ActionOutcome>) {
        match result {
            Ok(outcome) => self.outcomes.push(outcome),
            Err(e) => self.failures.push((item_id, e)),
        }
    }
}

/// Executes rename, delete and move actions against a [`MediaStore`].
///
/// Renames and moves never overwrite an existing file.
pub struct AuditActionExecutor {
    store: Arc<dyn MediaStore>,
    transfer: Arc<dyn Transfer>,
    ownership: Ownership,
    options: TransferOptions,
}

impl AuditActionExecutor {
    pub fn new(store: Arc<dyn MediaStore>, transfer: Arc<dyn Transfer>, ownership: Ownership) -> Self {
        Self {
            store,
            transfer,
            ownership,
            options: TransferOptions::default(),
        }
    }

    /// Run `action` for `item`. A dry run reads the record and touches
    /// nothing.
    pub fn execute(&self, item: &AuditItem, action: &AuditAction, dry_run: bool) -> Result<ActionOutcome> {
        let kind = action.action.as_str();
        if kind != ACTION_RENAME && kind != ACTION_DELETE {
            return Err(ReelsortError::UnknownAction(action.action.clone()));
        }

        let file = self
            .store
            .get_by_id(item.id)?
            .ok_or(ReelsortError::MediaFileNotFound { id: item.id })?;

        let mut outcome = ActionOutcome {
            item_id: item.id,
            action: action.action.clone(),
            dry_run,
            path: file.path.clone(),
            new_path: action.new_path.clone(),
            ..ActionOutcome::default()
        };

        if dry_run {
            match kind {
                ACTION_RENAME => info!(
                    "[dry run] Would rename {} -> {}",
                    file.path.display(),
                    action.new_path.as_deref().unwrap_or(Path::new("?")).display()
                ),
                _ => info!("[dry run] Would delete {}", file.path.display()),
            }
            return Ok(outcome);
        }

        match kind {
            ACTION_RENAME => self.rename(file, action)?,
            _ => self.delete(&file, &mut outcome)?,
        }
        Ok(outcome)
    }

    /// Run every action in `plan`, collecting failures per item.
    pub fn execute_plan(&self, plan: &AuditPlan, dry_run: bool) -> PlanExecutionReport {
        let mut report = PlanExecutionReport::default();
        for action in &plan.actions {
            let result = match plan.item(action.item_id) {
                Some(item) => self.execute(item, action, dry_run),
                None => Err(ReelsortError::MediaFileNotFound { id: action.item_id }),
            };
            if let Err(e) = &result {
                warn!("Audit action {} for item {} failed: {}", action.action, action.item_id, e);
            }
            report.record(action.item_id, result);
        }
        info!(
            "Audit plan executed: {} succeeded, {} failed",
            report.succeeded(),
            report.failed()
        );
        report
    }

    /// Delete the redundant copy of every item in a duplicate plan.
    pub fn execute_duplicates(&self, plan: &DuplicatePlan, dry_run: bool) -> PlanExecutionReport {
        let mut report = PlanExecutionReport::default();
        for entry in &plan.plans {
            let item = AuditItem {
                id: entry.delete.id,
                path: entry.delete.path.clone(),
                size: entry.delete.size,
                media_type: entry.media_type.clone(),
                title: entry.title.clone(),
                year: entry.year,
                season: entry.season,
                episode: entry.episode,
                confidence: 1.0,
                resolution: None,
                source_type: None,
                skip_reason: None,
            };
            let result = self.execute(&item, &AuditAction::delete(item.id), dry_run);
            if let Err(e) = &result {
                warn!("Failed to delete duplicate {}: {}", entry.delete.path.display(), e);
            }
            report.record(item.id, result);
        }
        report
    }

    /// Move every scattered file in a consolidation plan under its target
    /// root. Failures are keyed by the plan item's conflict id.
    pub fn execute_consolidate(&self, plan: &ConsolidatePlan, dry_run: bool) -> PlanExecutionReport {
        let mut report = PlanExecutionReport::default();
        for item in &plan.plans {
            for op in &item.operations {
                let result = self.consolidate_move(item, op, dry_run);
                if let Err(e) = &result {
                    warn!(
                        "Failed to move {} for {}: {}",
                        op.source_path.display(),
                        item.title,
                        e
                    );
                }
                report.record(item.conflict_id, result);
            }
        }
        info!(
            "Consolidation plan executed: {} succeeded, {} failed",
            report.succeeded(),
            report.failed()
        );
        report
    }

    fn delete(&self, file: &MediaFile, outcome: &mut ActionOutcome) -> Result<()> {
        let path = file.path.as_path();
        if !path.exists() {
            self.store.delete_by_id(file.id)?;
            outcome.file_already_missing = true;
            info!("File already gone, removed record: {}", path.display());
            return Ok(());
        }

        if !can_delete(path)? {
            match fix_permissions(path, self.ownership) {
                Ok(()) => outcome.permissions_fixed = true,
                Err(e) => warn!("Could not fix permissions on {}: {}", path.display(), e),
            }
        }

        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                self.store.delete_by_id(file.id)?;
                warn!(
                    "Removed index record for {} but the file could not be deleted: {}",
                    path.display(),
                    e
                );
                return Err(ReelsortError::RecordRemovedDespiteFsFailure {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        }

        if let Err(e) = self.store.delete_by_id(file.id) {
            warn!("Deleted {} but index cleanup failed: {}", path.display(), e);
            return Err(e);
        }
        info!("Deleted {}", path.display());
        Ok(())
    }

    fn rename(&self, file: MediaFile, action: &AuditAction) -> Result<()> {
        let new_path = action.new_path.clone().ok_or_else(|| ReelsortError::Validation {
            field: "new_path".to_string(),
            message: format!("rename of item {} has no target path", action.item_id),
        })?;
        let old_path = file.path.clone();

        self.relocate(file, &new_path, |file| {
            if let Some(title) = &action.new_title {
                file.title = title.clone();
                file.normalized_title = normalize_title(title);
            }
            if action.new_year.is_some() {
                file.year = action.new_year;
            }
            if action.new_season.is_some() {
                file.season = action.new_season;
            }
            if action.new_episode.is_some() {
                file.episode = action.new_episode;
            }
        })?;

        info!("Renamed {} -> {}", old_path.display(), new_path.display());
        Ok(())
    }

    fn consolidate_move(
        &self,
        item: &ConsolidatePlanItem,
        op: &MoveOperation,
        dry_run: bool,
    ) -> Result<ActionOutcome> {
        if op.action != ACTION_MOVE {
            return Err(ReelsortError::UnknownAction(op.action.clone()));
        }

        let file = self
            .store
            .get_by_path(&op.source_path)?
            .ok_or_else(|| ReelsortError::Validation {
                field: "source_path".to_string(),
                message: format!("{} is not indexed", op.source_path.display()),
            })?;

        let outcome = ActionOutcome {
            item_id: file.id,
            action: op.action.clone(),
            dry_run,
            path: file.path.clone(),
            new_path: Some(op.target_path.clone()),
            ..ActionOutcome::default()
        };

        if dry_run {
            info!(
                "[dry run] Would move {} -> {}",
                op.source_path.display(),
                op.target_path.display()
            );
            return Ok(outcome);
        }

        if !op.source_path.exists() {
            return Err(ReelsortError::FileNotFound(op.source_path.clone()));
        }

        self.relocate(file, &op.target_path, |file| {
            file.library_root = item.target_location.clone();
        })?;
        info!("Moved {} -> {}", op.source_path.display(), op.target_path.display());
        Ok(outcome)
    }

    /// Move `file` to `new_path`, apply `edit` and persist the row. The move
    /// is reversed when the row cannot be written. An occupied `new_path`
    /// fails before anything is touched.
    fn relocate(
        &self,
        mut file: MediaFile,
        new_path: &Path,
        edit: impl FnOnce(&mut MediaFile),
    ) -> Result<()> {
        if new_path
            .try_exists()
            .map_err(|e| ReelsortError::io_with_path(e, new_path))?
        {
            return Err(ReelsortError::DestinationExists(new_path.to_path_buf()));
        }

        let old_path = file.path.clone();
        let result = self.transfer.move_file(&old_path, new_path, &self.options)?;
        if !result.success {
            return Err(ReelsortError::TransferFailed {
                src: old_path,
                dest: new_path.to_path_buf(),
                reason: result.error.unwrap_or_else(|| "transfer reported failure".to_string()),
            });
        }

        file.path = new_path.to_path_buf();
        edit(&mut file);
        file.updated_at = Utc::now();

        if let Err(e) = self.store.update(&file) {
            warn!(
                "Index update failed after moving {} -> {}, rolling back: {}",
                old_path.display(),
                new_path.display(),
                e
            );
            match self.transfer.move_file(new_path, &old_path, &self.options) {
                Ok(rollback) if rollback.success => {
                    debug!("Rolled back {} -> {}", new_path.display(), old_path.display());
                }
                Ok(rollback) => error!(
                    "Rollback of {} failed: {}",
                    new_path.display(),
                    rollback.error.unwrap_or_default()
                ),
                Err(rollback_err) => {
                    error!("Rollback of {} failed: {}", new_path.display(), rollback_err)
                }
            }
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::transfer::TransferResult;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Store wrapper whose updates can be made to fail.
    pub struct FailingStore {
        pub inner: Arc<dyn MediaStore>,
        pub fail_updates: AtomicBool,
    }

    impl FailingStore {
        pub fn new(inner: Arc<dyn MediaStore>) -> Self {
            Self {
                inner,
                fail_updates: AtomicBool::new(true),
            }
        }
    }

    impl MediaStore for FailingStore {
        fn get_by_id(&self, id: i64) -> Result<Option<MediaFile>> {
            self.inner.get_by_id(id)
        }

        fn get_by_path(&self, path: &Path) -> Result<Option<MediaFile>> {
            self.inner.get_by_path(path)
        }

        fn update(&self, file: &MediaFile) -> Result<()> {
            if self.fail_updates.load(Ordering::SeqCst) {
                return Err(ReelsortError::Database {
                    message: "injected update failure".to_string(),
                    source: None,
                });
            }
            self.inner.update(file)
        }

        fn delete_by_id(&self, id: i64) -> Result<bool> {
            self.inner.delete_by_id(id)
        }
    }

    /// Transfer that records moves and delegates to the real mover.
    #[derive(Default)]
    pub struct RecordingTransfer {
        pub moves: Mutex<Vec<(PathBuf, PathBuf)>>,
    }

    impl Transfer for RecordingTransfer {
        fn move_file(&self, src: &Path, dst: &Path, options: &TransferOptions) -> Result<TransferResult> {
            self.moves
                .lock()
                .unwrap()
                .push((src.to_path_buf(), dst.to_path_buf()));
            crate::transfer::NativeTransfer::new().move_file(src, dst, options)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{FailingStore, RecordingTransfer};
    use super::*;
    use crate::index::MediaIndex;
    use crate::models::MediaType;
    use tempfile::TempDir;

    struct Fixture {
        _temp_dir: TempDir,
        index: Arc<MediaIndex>,
        file: MediaFile,
        dir: PathBuf,
    }

    fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("movies");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("Robts.2005.mkv");
        std::fs::write(&path, b"video").unwrap();

        let index = Arc::new(MediaIndex::new(temp_dir.path().join("media.db")).unwrap());
        let mut file = MediaFile::new(&path, MediaType::Movie, "Robts");
        file.year = Some(2005);
        file.confidence = 0.4;
        file.id = index.upsert_by_path(&file).unwrap().id;

        Fixture {
            _temp_dir: temp_dir,
            index,
            file,
            dir,
        }
    }

    fn rename_action(fx: &Fixture) -> AuditAction {
        AuditAction {
            item_id: fx.file.id,
            action: ACTION_RENAME.to_string(),
            new_title: Some("Robots".to_string()),
            new_year: Some(2005),
            new_season: None,
            new_episode: None,
            new_path: Some(fx.dir.join("Robots (2005).mkv")),
            reasoning: None,
            confidence: 0.9,
        }
    }

    fn executor(store: Arc<dyn MediaStore>, transfer: Arc<dyn Transfer>) -> AuditActionExecutor {
        AuditActionExecutor::new(store, transfer, Ownership::default())
    }

    #[test]
    fn test_unknown_action_and_missing_record() {
        let fx = fixture();
        let exec = executor(fx.index.clone(), Arc::new(RecordingTransfer::default()));
        let item = AuditItem::from(&fx.file);

        let mut action = rename_action(&fx);
        action.action = "move".to_string();
        assert!(matches!(
            exec.execute(&item, &action, false),
            Err(ReelsortError::UnknownAction(_))
        ));

        let mut ghost = item.clone();
        ghost.id = 999;
        assert!(matches!(
            exec.execute(&ghost, &rename_action(&fx), true),
            Err(ReelsortError::MediaFileNotFound { id: 999 })
        ));
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let fx = fixture();
        let transfer = Arc::new(RecordingTransfer::default());
        let exec = executor(fx.index.clone(), transfer.clone());
        let item = AuditItem::from(&fx.file);

        let outcome = exec.execute(&item, &rename_action(&fx), true).unwrap();
        assert!(outcome.dry_run);
        exec.execute(&item, &AuditAction::delete(item.id), true).unwrap();

        assert!(fx.file.path.exists());
        assert!(transfer.moves.lock().unwrap().is_empty());
        let record = fx.index.get_by_id(fx.file.id).unwrap().unwrap();
        assert_eq!(record.path, fx.file.path);
        assert_eq!(record.title, "Robts");
    }

    #[test]
    fn test_rename_updates_record() {
        let fx = fixture();
        let exec = executor(fx.index.clone(), Arc::new(RecordingTransfer::default()));
        let action = rename_action(&fx);

        exec.execute(&AuditItem::from(&fx.file), &action, false).unwrap();

        let new_path = action.new_path.unwrap();
        assert!(!fx.file.path.exists());
        assert!(new_path.exists());
        let record = fx.index.get_by_id(fx.file.id).unwrap().unwrap();
        assert_eq!(record.path, new_path);
        assert_eq!(record.title, "Robots");
        assert_eq!(record.normalized_title, "robots");
    }

    #[test]
    fn test_rename_rolls_back_when_update_fails() {
        let fx = fixture();
        let transfer = Arc::new(RecordingTransfer::default());
        let store = Arc::new(FailingStore::new(fx.index.clone()));
        let exec = executor(store, transfer.clone());
        let action = rename_action(&fx);

        let err = exec.execute(&AuditItem::from(&fx.file), &action, false).unwrap_err();
        assert!(matches!(err, ReelsortError::Database { .. }));

        let new_path = action.new_path.unwrap();
        assert!(fx.file.path.exists());
        assert!(!new_path.exists());
        let moves = transfer.moves.lock().unwrap();
        assert_eq!(moves.len(), 2);
        assert_eq!(moves[1], (new_path, fx.file.path.clone()));
        assert_eq!(fx.index.get_by_id(fx.file.id).unwrap().unwrap().path, fx.file.path);
    }

    #[test]
    fn test_delete_removes_file_and_record() {
        let fx = fixture();
        let exec = executor(fx.index.clone(), Arc::new(RecordingTransfer::default()));

        let outcome = exec
            .execute(&AuditItem::from(&fx.file), &AuditAction::delete(fx.file.id), false)
            .unwrap();

        assert!(!outcome.file_already_missing);
        assert!(!fx.file.path.exists());
        assert!(fx.index.get_by_id(fx.file.id).unwrap().is_none());
    }

    #[test]
    fn test_rename_refuses_occupied_destination() {
        let fx = fixture();
        let transfer = Arc::new(RecordingTransfer::default());
        let exec = executor(fx.index.clone(), transfer.clone());
        let action = rename_action(&fx);
        let occupied = action.new_path.clone().unwrap();
        std::fs::write(&occupied, b"keep me").unwrap();

        let err = exec.execute(&AuditItem::from(&fx.file), &action, false).unwrap_err();

        assert!(matches!(err, ReelsortError::DestinationExists(ref p) if p == &occupied));
        assert!(transfer.moves.lock().unwrap().is_empty());
        assert_eq!(std::fs::read(&occupied).unwrap(), b"keep me");
        assert_eq!(std::fs::read(&fx.file.path).unwrap(), b"video");
        assert_eq!(fx.index.get_by_id(fx.file.id).unwrap().unwrap().path, fx.file.path);
    }

    #[test]
    fn test_delete_drops_record_when_removal_fails() {
        let fx = fixture();
        // A directory at the indexed path makes remove_file fail.
        std::fs::remove_file(&fx.file.path).unwrap();
        std::fs::create_dir(&fx.file.path).unwrap();
        std::fs::write(fx.file.path.join("sample.mkv"), b"x").unwrap();
        let exec = executor(fx.index.clone(), Arc::new(RecordingTransfer::default()));

        let err = exec
            .execute(&AuditItem::from(&fx.file), &AuditAction::delete(fx.file.id), false)
            .unwrap_err();

        match err {
            ReelsortError::RecordRemovedDespiteFsFailure { path, .. } => {
                assert_eq!(path, fx.file.path)
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(fx.index.get_by_id(fx.file.id).unwrap().is_none());
        assert!(fx.file.path.is_dir());
    }

    #[test]
    fn test_delete_of_missing_file_drops_record() {
        let fx = fixture();
        std::fs::remove_file(&fx.file.path).unwrap();
        let exec = executor(fx.index.clone(), Arc::new(RecordingTransfer::default()));

        let outcome = exec
            .execute(&AuditItem::from(&fx.file), &AuditAction::delete(fx.file.id), false)
            .unwrap();

        assert!(outcome.file_already_missing);
        assert!(fx.index.get_by_id(fx.file.id).unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_delete_fixes_read_only_file() {
        use std::os::unix::fs::PermissionsExt;
        let fx = fixture();
        std::fs::set_permissions(&fx.file.path, std::fs::Permissions::from_mode(0o444)).unwrap();
        let exec = executor(fx.index.clone(), Arc::new(RecordingTransfer::default()));

        let outcome = exec
            .execute(&AuditItem::from(&fx.file), &AuditAction::delete(fx.file.id), false)
            .unwrap();

        assert!(outcome.permissions_fixed);
        assert!(!fx.file.path.exists());
    }

    #[test]
    fn test_execute_plan_collects_failures() {
        let fx = fixture();
        let exec = executor(fx.index.clone(), Arc::new(RecordingTransfer::default()));
        let plan = AuditPlan {
            created_at: Utc::now(),
            command: "audit".to_string(),
            summary: Default::default(),
            items: vec![AuditItem::from(&fx.file)],
            actions: vec![rename_action(&fx), AuditAction::delete(404)],
        };

        let report = exec.execute_plan(&plan, false);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures[0].0, 404);
    }

    fn consolidate_plan(fx: &Fixture, target_root: &Path, op: MoveOperation) -> ConsolidatePlan {
        ConsolidatePlan {
            created_at: Utc::now(),
            command: "consolidate".to_string(),
            summary: Default::default(),
            plans: vec![ConsolidatePlanItem {
                conflict_id: 1,
                title: fx.file.title.clone(),
                year: fx.file.year,
                media_type: "movie".to_string(),
                target_location: target_root.to_path_buf(),
                operations: vec![op],
            }],
        }
    }

    #[test]
    fn test_consolidate_moves_file_and_rehomes_record() {
        let fx = fixture();
        let target_root = fx.dir.parent().unwrap().join("storage2");
        let target = target_root.join("movies/Robts.2005.mkv");
        let exec = executor(fx.index.clone(), Arc::new(RecordingTransfer::default()));
        let plan = consolidate_plan(
            &fx,
            &target_root,
            MoveOperation {
                action: ACTION_MOVE.to_string(),
                source_path: fx.file.path.clone(),
                target_path: target.clone(),
                size: 5,
            },
        );

        let report = exec.execute_consolidate(&plan, false);

        assert_eq!(report.failed(), 0);
        assert_eq!(report.outcomes[0].item_id, fx.file.id);
        assert!(!fx.file.path.exists());
        assert_eq!(std::fs::read(&target).unwrap(), b"video");
        let record = fx.index.get_by_id(fx.file.id).unwrap().unwrap();
        assert_eq!(record.path, target);
        assert_eq!(record.library_root, target_root);
    }

    #[test]
    fn test_consolidate_rejects_unknown_operation_and_unindexed_source() {
        let fx = fixture();
        let exec = executor(fx.index.clone(), Arc::new(RecordingTransfer::default()));
        let target_root = fx.dir.parent().unwrap().join("storage2");
        let mut plan = consolidate_plan(
            &fx,
            &target_root,
            MoveOperation {
                action: "copy".to_string(),
                source_path: fx.file.path.clone(),
                target_path: target_root.join("a.mkv"),
                size: 5,
            },
        );
        plan.plans[0].operations.push(MoveOperation {
            action: ACTION_MOVE.to_string(),
            source_path: fx.dir.join("stray.mkv"),
            target_path: target_root.join("stray.mkv"),
            size: 5,
        });

        let report = exec.execute_consolidate(&plan, false);

        assert_eq!(report.failed(), 2);
        assert!(matches!(report.failures[0].1, ReelsortError::UnknownAction(_)));
        assert!(matches!(report.failures[1].1, ReelsortError::Validation { .. }));
        assert!(fx.file.path.exists());
    }
}
