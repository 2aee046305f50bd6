use std::path::{Path, PathBuf};

use cadence_core::{CodebaseId, CodebaseRoot};
use sha2::{Digest, Sha256};

use crate::error::{io_err, ResolveError};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// `<name>_<first 16 bytes of SHA-256(path), hex>`.
///
/// Pure in (name, path): re-registering a codebase yields the same id.
/// Path separators and control characters in `name` become `_` so the id is
/// always a single file name.
pub fn generate_codebase_id(name: &str, path: &Path) -> CodebaseId {
    let digest = Sha256::digest(path.to_string_lossy().as_bytes());
    let name: String = name
        .chars()
        .map(|c| if matches!(c, '/' | '\\') || c.is_control() { '_' } else { c })
        .collect();
    CodebaseId(format!("{name}_{}", hex::encode(&digest[..16])))
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// A directory is a git repository when it has a `.git` entry (directory for
/// a clone, file for a worktree or submodule).
pub fn is_git_repository(dir: &Path) -> bool {
    dir.join(".git").exists()
}

/// Resolve the codebase roots inside `workspace`.
///
/// - `workspace` is a git repository → that one root, named `name`
/// - otherwise every non-hidden child directory that is a git repository,
///   named after the directory, sorted by path
/// - none found → `workspace` itself, named `name`
pub fn find_codebase_paths(workspace: &Path, name: &str) -> Result<Vec<CodebaseRoot>, ResolveError> {
    let meta = std::fs::metadata(workspace).map_err(|e| io_err(workspace, e))?;
    if !meta.is_dir() {
        return Err(ResolveError::NotADirectory(workspace.to_path_buf()));
    }

    let whole = || CodebaseRoot {
        name: name.to_string(),
        path: workspace.to_path_buf(),
    };

    if is_git_repository(workspace) {
        return Ok(vec![whole()]);
    }

    let mut children: Vec<PathBuf> = std::fs::read_dir(workspace)
        .map_err(|e| io_err(workspace, e))?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .map(|e| e.path())
        .filter(|p| is_git_repository(p))
        .collect();
    children.sort();

    if children.is_empty() {
        return Ok(vec![whole()]);
    }

    Ok(children
        .into_iter()
        .map(|path| CodebaseRoot {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path,
        })
        .collect())
}

/// Seam used by the registration service; tests substitute fixed roots.
pub trait CodebaseResolver: Send + Sync {
    fn find_codebase_paths(
        &self,
        workspace: &Path,
        name: &str,
    ) -> Result<Vec<CodebaseRoot>, ResolveError>;

    fn codebase_id(&self, name: &str, path: &Path) -> CodebaseId {
        generate_codebase_id(name, path)
    }
}

/// [`CodebaseResolver`] backed by [`find_codebase_paths`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GitCodebaseResolver;

impl CodebaseResolver for GitCodebaseResolver {
    fn find_codebase_paths(
        &self,
        workspace: &Path,
        name: &str,
    ) -> Result<Vec<CodebaseRoot>, ResolveError> {
        find_codebase_paths(workspace, name)
    }
}
