//! Read side of the ledger: how far indexing of one workspace has got.

use std::path::{Path, PathBuf};

use serde::Serialize;

use cadence_core::store::{EventStore, WorkspaceStore};
use cadence_core::{Event, EventStatus, TargetSystem};

use crate::error::IntakeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    /// Workspace switched off; nothing is dispatched.
    Pending,
    /// At least one event waits for or is under a handler.
    Running,
    Failed,
    Success,
}

impl std::fmt::Display for IndexState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            IndexState::Pending => "pending",
            IndexState::Running => "running",
            IndexState::Failed => "failed",
            IndexState::Success => "success",
        })
    }
}

/// Events of a workspace per index status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub init: usize,
    pub building: usize,
    pub failed: usize,
    pub success: usize,
}

impl StatusCounts {
    fn tally<'a>(events: impl IntoIterator<Item = &'a Event>) -> Self {
        let mut counts = Self::default();
        for event in events {
            match event.status(TargetSystem::Index) {
                EventStatus::Init => counts.init += 1,
                EventStatus::Building => counts.building += 1,
                EventStatus::Failed => counts.failed += 1,
                EventStatus::Success => counts.success += 1,
            }
        }
        counts
    }

    /// Outstanding work wins over failures; failures win over success.
    pub fn state(&self) -> IndexState {
        if self.init > 0 || self.building > 0 {
            IndexState::Running
        } else if self.failed > 0 {
            IndexState::Failed
        } else {
            IndexState::Success
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStatus {
    pub workspace: PathBuf,
    pub state: IndexState,
    /// Files reported by the last whole-workspace index.
    pub indexed_files: u64,
    /// Unix seconds of the last progress update.
    pub process_ts: i64,
    pub events: StatusCounts,
    /// Source path of every failed event (the workspace for workspace kinds).
    pub failed_paths: Vec<PathBuf>,
}

/// Index status of a tracked workspace.
///
/// A switched-off workspace reports [`IndexState::Pending`] with empty
/// counts. Unknown workspaces are [`IntakeError::UnknownWorkspace`].
pub fn index_status(
    events: &dyn EventStore,
    workspaces: &dyn WorkspaceStore,
    workspace: &Path,
) -> Result<IndexStatus, IntakeError> {
    let tracked = workspaces
        .workspace_by_path(workspace)?
        .ok_or_else(|| IntakeError::UnknownWorkspace(workspace.to_path_buf()))?;

    let mut status = IndexStatus {
        workspace: tracked.path.clone(),
        state: IndexState::Pending,
        indexed_files: tracked.codegraph_file_num,
        process_ts: tracked.codegraph_ts,
        events: StatusCounts::default(),
        failed_paths: vec![],
    };
    if !tracked.is_active() {
        return Ok(status);
    }

    let ledger = events.events_for_workspace(&tracked.path)?;
    status.events = StatusCounts::tally(&ledger);
    status.state = status.events.state();
    status.failed_paths = ledger
        .iter()
        .filter(|e| e.index_status == EventStatus::Failed)
        .map(|e| {
            e.kind
                .source_path()
                .map_or_else(|| e.workspace.clone(), Path::to_path_buf)
        })
        .collect();
    Ok(status)
}
