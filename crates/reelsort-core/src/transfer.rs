//! Moving media files between locations.
//!
//! [`NativeTransfer`] renames in place when source and destination share a
//! filesystem and falls back to copy, fsync, size check and source removal
//! when they do not. An occupied destination is never overwritten.

use crate::error::{ReelsortError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Options for one move.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferOptions {
    /// Compare destination and source sizes after a copy.
    pub verify_size: bool,
    /// Remove a partially written destination when a copy fails.
    pub delete_partial: bool,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            verify_size: true,
            delete_partial: true,
        }
    }
}

/// Outcome of a move.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransferResult {
    pub success: bool,
    pub bytes_total: u64,
    /// Zero when the move was a same-filesystem rename.
    pub bytes_copied: u64,
    pub duration: Duration,
    pub error: Option<String>,
}

/// Moves a single file from `src` to `dst`.
pub trait Transfer: Send + Sync {
    fn move_file(&self, src: &Path, dst: &Path, options: &TransferOptions)
        -> Result<TransferResult>;
}

/// Rename with a copy fallback across filesystems.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeTransfer;

impl NativeTransfer {
    pub fn new() -> Self {
        Self
    }

    fn copy_across(
        &self,
        src: &Path,
        dst: &Path,
        bytes_total: u64,
        options: &TransferOptions,
    ) -> Result<u64> {
        let copied = match std::fs::copy(src, dst) {
            Ok(copied) => copied,
            Err(e) => {
                if options.delete_partial {
                    let _ = std::fs::remove_file(dst);
                }
                return Err(transfer_failed(src, dst, format!("copy failed: {}", e)));
            }
        };

        File::open(dst)
            .and_then(|f| f.sync_all())
            .map_err(|e| ReelsortError::io_with_path(e, dst))?;

        if options.verify_size {
            let written = std::fs::metadata(dst)
                .map_err(|e| ReelsortError::io_with_path(e, dst))?
                .len();
            if written != bytes_total {
                if options.delete_partial {
                    let _ = std::fs::remove_file(dst);
                }
                return Err(transfer_failed(
                    src,
                    dst,
                    format!("size mismatch: expected {} bytes, wrote {}", bytes_total, written),
                ));
            }
        }

        if let Err(e) = std::fs::remove_file(src) {
            warn!(
                "Copied {} to {} but could not remove the source: {}",
                src.display(),
                dst.display(),
                e
            );
            return Err(transfer_failed(src, dst, format!("source removal failed: {}", e)));
        }
        Ok(copied)
    }
}

impl Transfer for NativeTransfer {
    fn move_file(
        &self,
        src: &Path,
        dst: &Path,
        options: &TransferOptions,
    ) -> Result<TransferResult> {
        let start = Instant::now();
        let bytes_total = std::fs::metadata(src)
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => ReelsortError::FileNotFound(src.to_path_buf()),
                _ => ReelsortError::io_with_path(e, src),
            })?
            .len();

        if dst.try_exists().map_err(|e| ReelsortError::io_with_path(e, dst))? {
            return Err(ReelsortError::DestinationExists(dst.to_path_buf()));
        }

        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ReelsortError::io_with_path(e, parent))?;
        }

        let bytes_copied = match std::fs::rename(src, dst) {
            Ok(()) => {
                debug!("Renamed {} -> {}", src.display(), dst.display());
                0
            }
            Err(e) if is_cross_device(&e) => {
                debug!("Rename crosses filesystems, copying: {}", e);
                let copied = self.copy_across(src, dst, bytes_total, options)?;
                info!(
                    "Moved {} -> {} by copy ({} bytes)",
                    src.display(),
                    dst.display(),
                    copied
                );
                copied
            }
            Err(e) => return Err(transfer_failed(src, dst, e.to_string())),
        };

        Ok(TransferResult {
            success: true,
            bytes_total,
            bytes_copied,
            duration: start.elapsed(),
            error: None,
        })
    }
}

fn transfer_failed(src: &Path, dst: &Path, reason: String) -> ReelsortError {
    ReelsortError::TransferFailed {
        src: src.to_path_buf(),
        dest: dst.to_path_buf(),
        reason,
    }
}

fn is_cross_device(err: &io::Error) -> bool {
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(nix::errno::Errno::EXDEV as i32)
    }
    #[cfg(not(unix))]
    {
        let _ = err;
        false
    }
}
