//! File permission checks and repair for deletes.
//!
//! # Platform Behavior
//! - **Linux/macOS**: write bits on the file and its directory, `chmod 0644`,
//!   optional `chown` through `nix`
//! - **Windows**: read-only attribute only; ownership is ignored

use crate::config::PermissionsConfig;
use crate::error::{ReelsortError, Result};
use std::path::Path;
use tracing::debug;

/// Target ownership resolved from [`PermissionsConfig`]. `None` keeps the
/// current owner or group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ownership {
    pub uid: Option<u32>,
    pub gid: Option<u32>,
}

impl Ownership {
    /// Resolve configured user and group names or numeric ids.
    pub fn resolve(config: &PermissionsConfig) -> Result<Self> {
        let uid = match config.user.as_deref().map(str::trim) {
            Some(user) if !user.is_empty() => Some(resolve_uid(user)?),
            _ => None,
        };
        let gid = match config.group.as_deref().map(str::trim) {
            Some(group) if !group.is_empty() => Some(resolve_gid(group)?),
            _ => None,
        };
        Ok(Self { uid, gid })
    }

    pub fn is_empty(&self) -> bool {
        self.uid.is_none() && self.gid.is_none()
    }
}

#[cfg(unix)]
fn resolve_uid(user: &str) -> Result<u32> {
    if let Ok(uid) = user.parse::<u32>() {
        return Ok(uid);
    }
    match nix::unistd::User::from_name(user) {
        Ok(Some(u)) => Ok(u.uid.as_raw()),
        Ok(None) => Err(ReelsortError::Config {
            message: format!("unknown user '{}'", user),
        }),
        Err(e) => Err(ReelsortError::Config {
            message: format!("failed to look up user '{}': {}", user, e),
        }),
    }
}

#[cfg(unix)]
fn resolve_gid(group: &str) -> Result<u32> {
    if let Ok(gid) = group.parse::<u32>() {
        return Ok(gid);
    }
    match nix::unistd::Group::from_name(group) {
        Ok(Some(g)) => Ok(g.gid.as_raw()),
        Ok(None) => Err(ReelsortError::Config {
            message: format!("unknown group '{}'", group),
        }),
        Err(e) => Err(ReelsortError::Config {
            message: format!("failed to look up group '{}': {}", group, e),
        }),
    }
}

#[cfg(not(unix))]
fn resolve_uid(user: &str) -> Result<u32> {
    user.parse::<u32>().map_err(|_| ReelsortError::Config {
        message: format!("user names are not supported on this platform: '{}'", user),
    })
}

#[cfg(not(unix))]
fn resolve_gid(group: &str) -> Result<u32> {
    group.parse::<u32>().map_err(|_| ReelsortError::Config {
        message: format!("group names are not supported on this platform: '{}'", group),
    })
}

/// Whether the current process can remove `path`.
///
/// A missing file is reported as not deletable.
pub fn can_delete(path: &Path) -> Result<bool> {
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(ReelsortError::io_with_path(e, path)),
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let Some(dir) = path.parent() else {
            return Ok(false);
        };
        let dir_meta = std::fs::metadata(dir).map_err(|e| ReelsortError::io_with_path(e, dir))?;
        if dir_meta.permissions().mode() & 0o200 == 0 {
            return Ok(false);
        }
        Ok(metadata.permissions().mode() & 0o200 != 0)
    }

    #[cfg(not(unix))]
    {
        Ok(!metadata.permissions().readonly())
    }
}

/// Make `path` owner-writable (mode 0644) and apply `ownership` if set.
pub fn fix_permissions(path: &Path, ownership: Ownership) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644))
            .map_err(|e| ReelsortError::io_with_path(e, path))?;
        debug!("Set permissions (0644) on: {}", path.display());

        if !ownership.is_empty() {
            use nix::unistd::{chown, Gid, Uid};
            chown(
                path,
                ownership.uid.map(Uid::from_raw),
                ownership.gid.map(Gid::from_raw),
            )
            .map_err(|e| ReelsortError::io_with_path(std::io::Error::from(e), path))?;
            debug!(
                "Changed ownership of {} to {:?}:{:?}",
                path.display(),
                ownership.uid,
                ownership.gid
            );
        }
    }

    #[cfg(not(unix))]
    {
        let mut permissions = std::fs::metadata(path)
            .map_err(|e| ReelsortError::io_with_path(e, path))?
            .permissions();
        permissions.set_readonly(false);
        std::fs::set_permissions(path, permissions)
            .map_err(|e| ReelsortError::io_with_path(e, path))?;
        let _ = ownership;
        debug!("Cleared read-only flag on: {}", path.display());
    }

    Ok(())
}
