//! Producer side of the ledger: publishing events and the index switch.

use std::path::Path;

use cadence_core::normalize::normalize_kind;
use cadence_core::store::{EventStore, WorkspaceStore};
use cadence_core::types::{ACTIVE, INACTIVE};
use cadence_core::{EventId, EventKind, EventUpdate, StoreError};

use crate::error::IntakeError;

/// Record `incoming` events for `workspace`; returns how many were accepted.
///
/// Paths are normalized first. When the newest event for the same source
/// path has not been touched by any consumer yet (every status `init`), it is
/// rewritten with the new kind instead of queuing another event. The rewrite
/// is refused by the store once a handler has claimed the event, and a new
/// event is queued instead. An open-workspace event tracks the workspace if
/// it is unknown; an existing workspace keeps its switch. Failures on single
/// events are logged and skipped.
pub fn publish_events(
    events: &dyn EventStore,
    workspaces: &dyn WorkspaceStore,
    workspace: &Path,
    incoming: &[EventKind],
) -> Result<usize, IntakeError> {
    if incoming
        .iter()
        .any(|kind| matches!(kind, EventKind::OpenWorkspace))
    {
        ensure_workspace(workspaces, workspace)?;
    }

    let mut accepted = 0;
    for kind in incoming {
        let kind = normalize_kind(workspace, kind);
        match publish_one(events, workspace, &kind) {
            Ok(()) => accepted += 1,
            Err(err) => tracing::warn!(
                workspace = %workspace.display(),
                event_type = %kind.event_type(),
                error = %err,
                "failed to publish event",
            ),
        }
    }
    Ok(accepted)
}

fn publish_one(events: &dyn EventStore, workspace: &Path, kind: &EventKind) -> Result<(), StoreError> {
    if let Some(latest) = events.latest_event_for_source(workspace, kind.source_path())? {
        if latest.is_pending() {
            match events.update_event(&EventUpdate::kind(latest.id, kind.clone())) {
                Ok(()) => {
                    tracing::debug!(event_id = %latest.id, "coalesced into pending event");
                    return Ok(());
                }
                Err(StoreError::NotPending(id)) => {
                    tracing::debug!(event_id = %id, "pending event was claimed, queuing a new one");
                }
                Err(err) => return Err(err),
            }
        }
    }
    events.create_event(workspace, kind.clone()).map(|_| ())
}

/// Track `workspace` as active if it is unknown. Returns whether it was
/// created.
fn ensure_workspace(
    workspaces: &dyn WorkspaceStore,
    workspace: &Path,
) -> Result<bool, IntakeError> {
    if workspaces.workspace_by_path(workspace)?.is_some() {
        return Ok(false);
    }
    workspaces.create_workspace(&workspace_name(workspace), workspace, ACTIVE)?;
    tracing::info!(workspace = %workspace.display(), "workspace tracked");
    Ok(true)
}

fn workspace_name(workspace: &Path) -> String {
    workspace
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| workspace.display().to_string())
}

/// Explicitly request a full index of `workspace`.
///
/// Unlike a published open-workspace event this turns the workspace on:
/// an unknown workspace is tracked active, a switched-off one is switched
/// back on. A fresh open-workspace event is always queued.
pub fn trigger_index(
    events: &dyn EventStore,
    workspaces: &dyn WorkspaceStore,
    workspace: &Path,
) -> Result<EventId, IntakeError> {
    if !ensure_workspace(workspaces, workspace)? {
        let switched = switch_index(workspaces, workspace, "on")?;
        if switched {
            tracing::info!(workspace = %workspace.display(), "workspace switched on by trigger");
        }
    }
    let event = events.create_event(workspace, EventKind::OpenWorkspace)?;
    tracing::info!(workspace = %workspace.display(), event_id = %event.id, "index triggered");
    Ok(event.id)
}

/// Turn dispatch for a tracked workspace `on` or `off`.
///
/// Returns whether the stored flag changed.
pub fn switch_index(
    workspaces: &dyn WorkspaceStore,
    workspace: &Path,
    switch: &str,
) -> Result<bool, IntakeError> {
    let active = match switch {
        "on" => ACTIVE,
        "off" => INACTIVE,
        other => return Err(IntakeError::InvalidSwitch(other.to_string())),
    };
    let current = workspaces
        .workspace_by_path(workspace)?
        .ok_or_else(|| IntakeError::UnknownWorkspace(workspace.to_path_buf()))?;

    if current.active == active {
        tracing::info!(workspace = %workspace.display(), switch, "index switch unchanged");
        return Ok(false);
    }
    workspaces.set_active(workspace, active)?;
    tracing::info!(workspace = %workspace.display(), switch, "index switch updated");
    Ok(true)
}
