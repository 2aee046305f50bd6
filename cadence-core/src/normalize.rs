//! Path normalization: event-relative → workspace-absolute.
//!
//! Pure functions, no I/O. A path already under the workspace root is left
//! alone; anything else is joined onto the root. Absolute paths outside the
//! root are re-rooted under it, the same as joining their components.

use std::path::{Component, Path, PathBuf};

use crate::types::EventKind;

/// `true` when `sub` is strictly below `parent` (component-wise).
pub fn is_subdir(parent: &Path, sub: &Path) -> bool {
    sub != parent && sub.starts_with(parent)
}

/// Normalize one candidate path against `workspace`.
///
/// Empty input yields the workspace root itself.
pub fn to_workspace_absolute(workspace: &Path, candidate: &Path) -> PathBuf {
    if candidate.as_os_str().is_empty() || candidate == workspace {
        return workspace.to_path_buf();
    }
    if is_subdir(workspace, candidate) {
        return candidate.to_path_buf();
    }
    let mut joined = workspace.to_path_buf();
    for component in candidate.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::CurDir => {}
            other => joined.push(other.as_os_str()),
        }
    }
    joined
}

/// Normalize every path an event carries. Workspace kinds are unchanged.
pub fn normalize_kind(workspace: &Path, kind: &EventKind) -> EventKind {
    match kind {
        EventKind::AddFile { path } => EventKind::AddFile {
            path: to_workspace_absolute(workspace, path),
        },
        EventKind::ModifyFile { path } => EventKind::ModifyFile {
            path: to_workspace_absolute(workspace, path),
        },
        EventKind::DeleteFile { path } => EventKind::DeleteFile {
            path: to_workspace_absolute(workspace, path),
        },
        EventKind::RenameFile { source, target } => EventKind::RenameFile {
            source: to_workspace_absolute(workspace, source),
            target: to_workspace_absolute(workspace, target),
        },
        EventKind::OpenWorkspace => EventKind::OpenWorkspace,
        EventKind::RebuildWorkspace => EventKind::RebuildWorkspace,
    }
}
