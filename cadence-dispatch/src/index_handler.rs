//! Index handler: one handling contract over the six event kinds.
//!
//! Each call runs claim → precondition → delegation → finalization. The
//! claim moves the index status to `building`, so intake cannot rewrite the
//! event while it is being handled. Whatever the delegation does, the event
//! leaves with its index status at `success` or `failed`.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;

use cadence_core::normalize::normalize_kind;
use cadence_core::reader::WorkspaceReader;
use cadence_core::store::{EventStore, WorkspaceStore};
use cadence_core::{Event, EventKind, TargetSystem};

use crate::error::HandleError;
use crate::lifecycle::{check_precondition, claim, finalize, Expect, Precondition};
use crate::targets::IndexEngine;

/// A consumer of ledger events. The dispatcher selects events by the
/// handler's [`target`](EventHandler::target) status column.
pub trait EventHandler: Send + Sync {
    fn target(&self) -> TargetSystem;

    fn handle(&self, event: &Event) -> Result<(), HandleError>;
}

pub struct IndexHandler {
    events: Arc<dyn EventStore>,
    workspaces: Arc<dyn WorkspaceStore>,
    engine: Arc<dyn IndexEngine>,
    reader: Arc<dyn WorkspaceReader>,
}

impl IndexHandler {
    pub fn new(
        events: Arc<dyn EventStore>,
        workspaces: Arc<dyn WorkspaceStore>,
        engine: Arc<dyn IndexEngine>,
        reader: Arc<dyn WorkspaceReader>,
    ) -> Self {
        Self {
            events,
            workspaces,
            engine,
            reader,
        }
    }

    /// add-file and modify-file.
    fn index_file(&self, workspace: &Path, path: &Path) -> Result<(), HandleError> {
        match check_precondition(self.reader.as_ref(), path, Expect::File) {
            Precondition::Fail(err) => Err(err),
            Precondition::Skip => {
                tracing::debug!(path = %path.display(), "directory event, nothing to index");
                Ok(())
            }
            Precondition::Proceed => self
                .engine
                .index_files(workspace, &[path.to_path_buf()])
                .map_err(HandleError::delegation("index files", path)),
        }
    }

    fn open_workspace(&self, workspace: &Path) -> Result<(), HandleError> {
        match check_precondition(self.reader.as_ref(), workspace, Expect::Directory) {
            Precondition::Fail(err) => return Err(err),
            Precondition::Skip => {
                tracing::debug!(workspace = %workspace.display(), "workspace is not a directory, skipping");
                return Ok(());
            }
            Precondition::Proceed => {}
        }

        self.workspaces
            .update_progress(workspace, 0, Utc::now().timestamp())
            .map_err(|source| HandleError::Progress {
                workspace: workspace.to_path_buf(),
                source,
            })?;

        let metrics = self
            .engine
            .index_workspace(workspace)
            .map_err(HandleError::delegation("index workspace", workspace))?;
        tracing::info!(
            workspace = %workspace.display(),
            total_files = metrics.total_files,
            succeeded = metrics.total_succeed,
            failed = metrics.total_failed,
            "workspace indexed",
        );
        // Counter only; the event still succeeds.
        if let Err(err) = self.workspaces.update_progress(
            workspace,
            metrics.total_files,
            Utc::now().timestamp(),
        ) {
            tracing::warn!(workspace = %workspace.display(), error = %err, "failed to record index progress");
        }
        Ok(())
    }

    /// Removal must succeed before the open flow runs.
    fn rebuild_workspace(&self, workspace: &Path) -> Result<(), HandleError> {
        self.engine
            .remove_all_indexes(workspace)
            .map_err(HandleError::delegation("remove all indexes", workspace))?;
        self.open_workspace(workspace)
    }
}

impl EventHandler for IndexHandler {
    fn target(&self) -> TargetSystem {
        TargetSystem::Index
    }

    fn handle(&self, event: &Event) -> Result<(), HandleError> {
        let Some(event) = claim(self.events.as_ref(), event, self.target())? else {
            tracing::debug!(event_id = %event.id, "event already claimed, skipping");
            return Ok(());
        };
        let workspace = event.workspace.as_path();
        let outcome = match normalize_kind(workspace, &event.kind) {
            EventKind::AddFile { path } | EventKind::ModifyFile { path } => {
                self.index_file(workspace, &path)
            }
            EventKind::DeleteFile { path } => self
                .engine
                .remove_indexes(workspace, std::slice::from_ref(&path))
                .map_err(HandleError::delegation("remove indexes", &path)),
            EventKind::RenameFile { source, target } => self
                .engine
                .rename_indexes(workspace, &source, &target)
                .map_err(HandleError::delegation("rename indexes", &source)),
            EventKind::OpenWorkspace => self.open_workspace(workspace),
            EventKind::RebuildWorkspace => self.rebuild_workspace(workspace),
        };
        finalize(self.events.as_ref(), &event, self.target(), outcome)
    }
}
