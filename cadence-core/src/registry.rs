//! Per-codebase config registry.
//!
//! # Storage layout
//!
//! ```text
//! ~/.cadence/
//!   codebases/
//!     <codebase_id>.json   (one file per codebase, mode 0600)
//! ```
//!
//! # API pattern
//!
//! Every function has two forms:
//! - `fn_at(home: &Path, …)` takes an explicit home and is what tests use
//! - `fn(…)` derives home from `dirs::home_dir()` and delegates to `_at`
//!
//! [`FileCodebaseStore`] wraps the `_at` functions behind the
//! [`CodebaseStore`] trait consumed by the registration service.

use std::path::{Path, PathBuf};

use crate::error::{io_err, StoreError};
use crate::layout;
use crate::types::{CodebaseConfig, CodebaseId};

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.cadence/codebases/<id>.json`, pure.
pub fn codebase_path_at(home: &Path, id: &CodebaseId) -> PathBuf {
    layout::codebases_dir(home).join(format!("{}.json", id.0))
}

/// An id is stored as a single file name: no separators, not `.` or `..`.
pub fn is_valid_codebase_id(id: &CodebaseId) -> bool {
    let id = id.0.as_str();
    !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(['/', '\\', '\0'])
}

fn checked_path_at(home: &Path, id: &CodebaseId) -> Result<PathBuf, StoreError> {
    if !is_valid_codebase_id(id) {
        return Err(StoreError::InvalidCodebaseId(id.clone()));
    }
    Ok(codebase_path_at(home, id))
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Returns [`StoreError::CodebaseNotFound`] if absent and
/// [`StoreError::Json`] (with the path) if the file is malformed.
pub fn load_codebase_at(home: &Path, id: &CodebaseId) -> Result<CodebaseConfig, StoreError> {
    let path = checked_path_at(home, id)?;
    if !path.exists() {
        return Err(StoreError::CodebaseNotFound(id.clone()));
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    serde_json::from_str(&contents).map_err(|source| StoreError::Json { path, source })
}

/// `load_codebase_at` convenience wrapper.
pub fn load_codebase(id: &CodebaseId) -> Result<CodebaseConfig, StoreError> {
    load_codebase_at(&layout::home()?, id)
}

/// Every stored config, sorted by codebase id.
pub fn list_codebases_at(home: &Path) -> Result<Vec<CodebaseConfig>, StoreError> {
    let dir = layout::codebases_dir(home);
    if !dir.exists() {
        return Ok(vec![]);
    }

    let mut entries: Vec<_> = std::fs::read_dir(&dir)
        .map_err(|e| io_err(&dir, e))?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("json"))
        .collect();
    entries.sort_by_key(|e| e.file_name());

    let mut configs = Vec::with_capacity(entries.len());
    for entry in entries {
        let path = entry.path();
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        let config = serde_json::from_str(&contents)
            .map_err(|source| StoreError::Json { path, source })?;
        configs.push(config);
    }
    Ok(configs)
}

/// `list_codebases_at` convenience wrapper.
pub fn list_codebases() -> Result<Vec<CodebaseConfig>, StoreError> {
    list_codebases_at(&layout::home()?)
}

// ---------------------------------------------------------------------------
// 3. Save (atomic) / delete
// ---------------------------------------------------------------------------

/// Atomically write `config`, overwriting any prior entry for its id.
/// Ids that are not a plain file name are [`StoreError::InvalidCodebaseId`].
pub fn save_codebase_at(home: &Path, config: &CodebaseConfig) -> Result<(), StoreError> {
    let path = checked_path_at(home, &config.codebase_id)?;
    let json = serde_json::to_vec_pretty(config)?;
    layout::write_atomic(&path, &json)
}

/// `save_codebase_at` convenience wrapper.
pub fn save_codebase(config: &CodebaseConfig) -> Result<(), StoreError> {
    save_codebase_at(&layout::home()?, config)
}

/// Remove the stored config. Missing entries are [`StoreError::CodebaseNotFound`].
pub fn delete_codebase_at(home: &Path, id: &CodebaseId) -> Result<(), StoreError> {
    let path = checked_path_at(home, id)?;
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            Err(StoreError::CodebaseNotFound(id.clone()))
        }
        Err(err) => Err(io_err(&path, err)),
    }
}

/// `delete_codebase_at` convenience wrapper.
pub fn delete_codebase(id: &CodebaseId) -> Result<(), StoreError> {
    delete_codebase_at(&layout::home()?, id)
}

// ---------------------------------------------------------------------------
// 4. Trait seam
// ---------------------------------------------------------------------------

pub trait CodebaseStore: Send + Sync {
    fn load(&self, id: &CodebaseId) -> Result<CodebaseConfig, StoreError>;
    fn save(&self, config: &CodebaseConfig) -> Result<(), StoreError>;
    fn delete(&self, id: &CodebaseId) -> Result<(), StoreError>;
    fn list(&self) -> Result<Vec<CodebaseConfig>, StoreError>;
}

/// [`CodebaseStore`] rooted at an explicit home directory.
#[derive(Debug, Clone)]
pub struct FileCodebaseStore {
    home: PathBuf,
}

impl FileCodebaseStore {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }
}

impl CodebaseStore for FileCodebaseStore {
    fn load(&self, id: &CodebaseId) -> Result<CodebaseConfig, StoreError> {
        load_codebase_at(&self.home, id)
    }

    fn save(&self, config: &CodebaseConfig) -> Result<(), StoreError> {
        save_codebase_at(&self.home, config)
    }

    fn delete(&self, id: &CodebaseId) -> Result<(), StoreError> {
        delete_codebase_at(&self.home, id)
    }

    fn list(&self) -> Result<Vec<CodebaseConfig>, StoreError> {
        list_codebases_at(&self.home)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
