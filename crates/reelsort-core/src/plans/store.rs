//! Plan files under the plans directory.

use super::types::{AuditPlan, ConsolidatePlan, DuplicatePlan};
use crate::atomic::{atomic_read_json, atomic_write_json};
use crate::error::{ReelsortError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// The three plan files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanKind {
    Duplicates,
    Consolidate,
    Audit,
}

impl PlanKind {
    pub const ALL: [PlanKind; 3] = [PlanKind::Duplicates, PlanKind::Consolidate, PlanKind::Audit];

    pub fn file_name(self) -> &'static str {
        match self {
            PlanKind::Duplicates => "duplicates.json",
            PlanKind::Consolidate => "consolidate.json",
            PlanKind::Audit => "audit.json",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlanKind::Duplicates => "duplicates",
            PlanKind::Consolidate => "consolidate",
            PlanKind::Audit => "audit",
        }
    }
}

impl fmt::Display for PlanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanKind {
    type Err = ReelsortError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "duplicates" | "duplicate" => Ok(PlanKind::Duplicates),
            "consolidate" | "consolidation" => Ok(PlanKind::Consolidate),
            "audit" => Ok(PlanKind::Audit),
            other => Err(ReelsortError::Validation {
                field: "plan".to_string(),
                message: format!("unknown plan kind '{}'", other),
            }),
        }
    }
}

/// Reads and writes plan documents. Last writer wins.
#[derive(Debug, Clone)]
pub struct PlanStore {
    dir: PathBuf,
}

impl PlanStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, kind: PlanKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    fn archive_path(&self, kind: PlanKind) -> PathBuf {
        self.dir.join(format!("{}.old", kind.file_name()))
    }

    fn save<T: Serialize>(&self, kind: PlanKind, plan: &T) -> Result<PathBuf> {
        let path = self.path(kind);
        atomic_write_json(&path, plan)?;
        info!("Saved {} plan to {}", kind, path.display());
        Ok(path)
    }

    fn load<T: DeserializeOwned>(&self, kind: PlanKind) -> Result<Option<T>> {
        atomic_read_json(&self.path(kind))
    }

    pub fn save_duplicates(&self, plan: &DuplicatePlan) -> Result<PathBuf> {
        self.save(PlanKind::Duplicates, plan)
    }

    pub fn load_duplicates(&self) -> Result<Option<DuplicatePlan>> {
        self.load(PlanKind::Duplicates)
    }

    pub fn save_consolidate(&self, plan: &ConsolidatePlan) -> Result<PathBuf> {
        self.save(PlanKind::Consolidate, plan)
    }

    pub fn load_consolidate(&self) -> Result<Option<ConsolidatePlan>> {
        self.load(PlanKind::Consolidate)
    }

    pub fn save_audit(&self, plan: &AuditPlan) -> Result<PathBuf> {
        self.save(PlanKind::Audit, plan)
    }

    pub fn load_audit(&self) -> Result<Option<AuditPlan>> {
        self.load(PlanKind::Audit)
    }

    /// Remove a plan. A missing plan is not an error.
    pub fn delete(&self, kind: PlanKind) -> Result<()> {
        let path = self.path(kind);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!("Deleted {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ReelsortError::io_with_path(e, path)),
        }
    }

    /// Rename the plan to `<name>.json.old`, replacing any earlier archive.
    /// Returns false when there was nothing to archive.
    pub fn archive(&self, kind: PlanKind) -> Result<bool> {
        let path = self.path(kind);
        if !path.exists() {
            return Ok(false);
        }
        let old = self.archive_path(kind);
        match std::fs::remove_file(&old) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(ReelsortError::io_with_path(e, old)),
        }
        std::fs::rename(&path, &old).map_err(|e| ReelsortError::io_with_path(e, &path))?;
        info!("Archived {} plan to {}", kind, old.display());
        Ok(true)
    }
}
