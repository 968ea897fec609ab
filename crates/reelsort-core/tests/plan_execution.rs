//! Audit, duplicate and consolidation plan execution against a real index
//! and filesystem.

use reelsort_core::plans::{AuditAction, AuditItem, DuplicatePlan, ACTION_RENAME};
use reelsort_core::{
    analyze_scattered, AuditActionExecutor, ConsolidatePlan, DuplicateAnalyzer, MediaFile,
    MediaIndex, MediaStore, MediaType, NativeTransfer, Ownership, ReelsortError,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Store whose updates fail while `fail` is set.
struct FlakyStore {
    index: Arc<MediaIndex>,
    fail: AtomicBool,
}

impl MediaStore for FlakyStore {
    fn get_by_id(&self, id: i64) -> reelsort_core::Result<Option<MediaFile>> {
        self.index.get_by_id(id)
    }

    fn get_by_path(&self, path: &Path) -> reelsort_core::Result<Option<MediaFile>> {
        self.index.get_by_path(path)
    }

    fn update(&self, file: &MediaFile) -> reelsort_core::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ReelsortError::Other("disk full".to_string()));
        }
        self.index.update(file)
    }

    fn delete_by_id(&self, id: i64) -> reelsort_core::Result<bool> {
        self.index.delete_by_id(id)
    }
}

struct Library {
    temp_dir: TempDir,
    index: Arc<MediaIndex>,
}

impl Library {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let index = Arc::new(MediaIndex::new(temp_dir.path().join("media.db")).unwrap());
        Self { temp_dir, index }
    }

    fn add(&self, relative: &str, title: &str, score: i64) -> MediaFile {
        self.add_with(relative, title, score, b"video", None)
    }

    /// Index a movie with `contents`, optionally under a library root
    /// relative to the temp dir.
    fn add_with(
        &self,
        relative: &str,
        title: &str,
        score: i64,
        contents: &[u8],
        root: Option<&str>,
    ) -> MediaFile {
        let path = self.temp_dir.path().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        let mut file = MediaFile::new(&path, MediaType::Movie, title);
        file.year = Some(2005);
        file.quality_score = score;
        file.size = contents.len() as u64;
        if let Some(root) = root {
            file.library_root = self.temp_dir.path().join(root);
        }
        file.id = self.index.upsert_by_path(&file).unwrap().id;
        file
    }

    fn executor(&self, store: Arc<dyn MediaStore>) -> AuditActionExecutor {
        AuditActionExecutor::new(store, Arc::new(NativeTransfer::new()), Ownership::default())
    }
}

fn rename_to(file: &MediaFile, target: &Path) -> AuditAction {
    AuditAction {
        item_id: file.id,
        action: ACTION_RENAME.to_string(),
        new_title: Some("Robots".to_string()),
        new_year: Some(2005),
        new_season: None,
        new_episode: None,
        new_path: Some(target.to_path_buf()),
        reasoning: Some("AI suggested: Robots (confidence: 0.95)".to_string()),
        confidence: 0.95,
    }
}

#[test]
fn test_rename_dry_run_then_real() {
    let lib = Library::new();
    let file = lib.add("movies/Robts.2005.mkv", "Robts", 0);
    let target: PathBuf = lib.temp_dir.path().join("movies/Robots (2005)/Robots (2005).mkv");
    let executor = lib.executor(lib.index.clone());
    let item = AuditItem::from(&file);
    let action = rename_to(&file, &target);

    let preview = executor.execute(&item, &action, true).unwrap();
    assert!(preview.dry_run);
    assert!(file.path.exists());
    assert!(!target.exists());
    assert_eq!(lib.index.get_by_id(file.id).unwrap().unwrap().path, file.path);

    executor.execute(&item, &action, false).unwrap();
    assert!(!file.path.exists());
    assert!(target.exists());
    let record = lib.index.get_by_id(file.id).unwrap().unwrap();
    assert_eq!(record.path, target);
    assert_eq!(record.title, "Robots");
}

#[test]
fn test_rename_reverses_move_when_persistence_fails() {
    let lib = Library::new();
    let file = lib.add("movies/Robts.2005.mkv", "Robts", 0);
    let target = lib.temp_dir.path().join("movies/Robots (2005).mkv");
    let store = Arc::new(FlakyStore {
        index: lib.index.clone(),
        fail: AtomicBool::new(true),
    });
    let executor = lib.executor(store);

    let err = executor
        .execute(&AuditItem::from(&file), &rename_to(&file, &target), false)
        .unwrap_err();
    assert!(err.to_string().contains("disk full"));
    assert!(file.path.exists());
    assert!(!target.exists());
    assert_eq!(lib.index.get_by_id(file.id).unwrap().unwrap().path, file.path);
}

#[test]
fn test_rename_onto_indexed_file_changes_nothing() {
    let lib = Library::new();
    let misnamed = lib.add_with("movies/Robts.2005.mkv", "Robts", 0, b"AAAA-misnamed", None);
    let good = lib.add_with(
        "movies/Robots (2005).mkv",
        "Robots",
        0,
        b"BBBB-the-good-copy",
        None,
    );
    let executor = lib.executor(lib.index.clone());

    let err = executor
        .execute(&AuditItem::from(&misnamed), &rename_to(&misnamed, &good.path), false)
        .unwrap_err();

    assert!(matches!(err, ReelsortError::DestinationExists(ref p) if p == &good.path));
    assert_eq!(std::fs::read(&misnamed.path).unwrap(), b"AAAA-misnamed");
    assert_eq!(std::fs::read(&good.path).unwrap(), b"BBBB-the-good-copy");

    let misnamed_row = lib.index.get_by_id(misnamed.id).unwrap().unwrap();
    assert_eq!(misnamed_row.path, misnamed.path);
    assert_eq!(misnamed_row.title, "Robts");
    assert_eq!(
        lib.index.get_by_path(&good.path).unwrap().unwrap().id,
        good.id
    );
}

#[test]
fn test_consolidate_plan_gathers_scattered_title() {
    let lib = Library::new();
    let stay_a = lib.add_with(
        "storage1/Lost Highway (2005)/a.mkv",
        "Lost Highway",
        0,
        b"a",
        Some("storage1"),
    );
    let stay_b = lib.add_with(
        "storage1/Lost Highway (2005)/b.mkv",
        "Lost Highway",
        0,
        b"b",
        Some("storage1"),
    );
    let stray = lib.add_with(
        "storage2/Lost Highway (2005)/c.mkv",
        "Lost Highway",
        0,
        b"c",
        Some("storage2"),
    );

    let analysis = analyze_scattered(&lib.index).unwrap();
    let plan = ConsolidatePlan::from_analysis(&analysis);
    assert_eq!(plan.summary.total_moves, 1);
    let target = lib.temp_dir.path().join("storage1/Lost Highway (2005)/c.mkv");
    assert_eq!(plan.plans[0].operations[0].target_path, target);

    let executor = lib.executor(lib.index.clone());
    let preview = executor.execute_consolidate(&plan, true);
    assert_eq!(preview.succeeded(), 1);
    assert!(stray.path.exists());
    assert!(!target.exists());

    let report = executor.execute_consolidate(&plan, false);
    assert_eq!(report.failed(), 0);
    assert!(!stray.path.exists());
    assert_eq!(std::fs::read(&target).unwrap(), b"c");
    assert!(stay_a.path.exists() && stay_b.path.exists());
    let moved = lib.index.get_by_id(stray.id).unwrap().unwrap();
    assert_eq!(moved.path, target);
    assert_eq!(moved.library_root, lib.temp_dir.path().join("storage1"));
    assert!(analyze_scattered(&lib.index).unwrap().items.is_empty());
}

#[test]
fn test_consolidate_move_never_overwrites() {
    let lib = Library::new();
    lib.add_with("storage1/Robots (2005)/Robots.mkv", "Robots", 0, b"one", Some("storage1"));
    lib.add_with("storage1/Robots (2005)/extra.mkv", "Robots", 0, b"two", Some("storage1"));
    let stray = lib.add_with(
        "storage2/Robots (2005)/Robots.mkv",
        "Robots",
        0,
        b"three",
        Some("storage2"),
    );

    let plan = ConsolidatePlan::from_analysis(&analyze_scattered(&lib.index).unwrap());
    let target = plan.plans[0].operations[0].target_path.clone();
    let report = lib.executor(lib.index.clone()).execute_consolidate(&plan, false);

    assert_eq!(report.failed(), 1);
    assert!(matches!(report.failures[0].1, ReelsortError::DestinationExists(_)));
    assert_eq!(std::fs::read(&target).unwrap(), b"one");
    assert_eq!(std::fs::read(&stray.path).unwrap(), b"three");
    assert_eq!(lib.index.get_by_id(stray.id).unwrap().unwrap().path, stray.path);
}

#[test]
fn test_duplicate_plan_deletes_redundant_copies() {
    let lib = Library::new();
    let best = lib.add("a/Robots (2005).mkv", "Robots", 284);
    let worse = lib.add("b/Robots (2005).mkv", "Robots", 84);

    let analysis = DuplicateAnalyzer::new(lib.index.clone()).analyze().unwrap();
    let plan = DuplicatePlan::from_analysis(&analysis);
    let executor = lib.executor(lib.index.clone());

    let preview = executor.execute_duplicates(&plan, true);
    assert_eq!(preview.succeeded(), 1);
    assert!(worse.path.exists());

    let report = executor.execute_duplicates(&plan, false);
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed(), 0);
    assert!(best.path.exists());
    assert!(!worse.path.exists());
    assert!(lib.index.get_by_id(worse.id).unwrap().is_none());
    assert_eq!(lib.index.count().unwrap(), 1);
}
