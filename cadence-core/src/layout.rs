//! On-disk layout under `~/.cadence/` and the shared atomic write helper.
//!
//! ```text
//! ~/.cadence/
//!   config.yaml
//!   events.json
//!   workspaces.json
//!   codebases/<codebase_id>.json
//! ```
//!
//! Every function takes `home` explicitly; [`home`] resolves it for callers
//! outside tests.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{io_err, StoreError};

pub fn cadence_root(home: &Path) -> PathBuf {
    home.join(".cadence")
}

pub fn config_path(home: &Path) -> PathBuf {
    cadence_root(home).join("config.yaml")
}

pub fn events_path(home: &Path) -> PathBuf {
    cadence_root(home).join("events.json")
}

pub fn workspaces_path(home: &Path) -> PathBuf {
    cadence_root(home).join("workspaces.json")
}

pub fn codebases_dir(home: &Path) -> PathBuf {
    cadence_root(home).join("codebases")
}

/// Resolve the user's home directory.
pub fn home() -> Result<PathBuf, StoreError> {
    dirs::home_dir().ok_or(StoreError::HomeNotFound)
}

/// Write `bytes` to `path` atomically.
///
/// Flow: create parent (mode `0700`) → uniquely named `.<file>.*.tmp` sibling
/// → `chmod 0600` → rename over `path`. Concurrent writers of the same target
/// never share a temp file; the last rename wins.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        set_dir_permissions(dir)?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut tmp = tempfile::Builder::new()
        .prefix(&format!(".{file_name}."))
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| io_err(dir, e))?;
    tmp.write_all(bytes).map_err(|e| io_err(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| io_err(tmp.path(), e))?;
    set_file_permissions(tmp.path())?;
    tmp.persist(path).map_err(|e| io_err(path, e.error))?;
    Ok(())
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}
