mod common;

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use rstest::rstest;

use cadence_core::reader::FsWorkspaceReader;
use cadence_core::store::{EventStore, JsonEventStore, JsonWorkspaceStore, WorkspaceStore};
use cadence_core::types::ACTIVE;
use cadence_core::{EventKind, EventStatus, TargetSystem};
use cadence_dispatch::intake::publish_events;
use cadence_dispatch::{
    DispatchConfig, Dispatcher, EventHandler, HandleError, IndexEngine, IndexHandler,
    IndexMetrics, TargetError,
};

use common::{EngineCall, Fixture, FlakyEventStore, RecordingEngine};

fn handler(fx: &Fixture, engine: &Arc<RecordingEngine>) -> IndexHandler {
    IndexHandler::new(
        fx.events.clone(),
        fx.workspaces.clone(),
        engine.clone(),
        Arc::new(FsWorkspaceReader),
    )
}

#[test]
fn add_file_indexes_and_marks_success() {
    let fx = Fixture::new();
    let file = fx.write_file("src/main.rs", "fn main() {}");
    let engine = Arc::new(RecordingEngine::default());
    let event = fx.publish(EventKind::AddFile { path: file.clone() });

    handler(&fx, &engine).handle(&event).unwrap();

    assert_eq!(engine.calls(), vec![EngineCall::IndexFiles(vec![file])]);
    let stored = fx.reload(event.id);
    assert_eq!(stored.index_status, EventStatus::Success);
    assert_eq!(stored.embedding_status, EventStatus::Init);
}

#[test]
fn relative_paths_resolve_against_workspace() {
    let fx = Fixture::new();
    let file = fx.write_file("lib/util.rs", "");
    let engine = Arc::new(RecordingEngine::default());
    let event = fx.publish(EventKind::ModifyFile {
        path: PathBuf::from("lib/util.rs"),
    });

    handler(&fx, &engine).handle(&event).unwrap();

    assert_eq!(engine.calls(), vec![EngineCall::IndexFiles(vec![file])]);
}

#[test]
fn missing_file_fails_without_delegating() {
    let fx = Fixture::new();
    let engine = Arc::new(RecordingEngine::default());
    let event = fx.publish(EventKind::AddFile {
        path: fx.workspace.join("ghost.rs"),
    });

    let err = handler(&fx, &engine).handle(&event).unwrap_err();

    assert!(matches!(err, HandleError::NotExists(_)));
    assert!(err.to_string().starts_with("path does not exist"));
    assert!(engine.calls().is_empty());
    assert_eq!(fx.reload(event.id).index_status, EventStatus::Failed);
}

#[rstest]
#[case::add(|path| EventKind::AddFile { path })]
#[case::modify(|path| EventKind::ModifyFile { path })]
fn directory_file_events_are_successful_no_ops(#[case] kind: fn(PathBuf) -> EventKind) {
    let fx = Fixture::new();
    std::fs::create_dir_all(fx.workspace.join("pkg")).unwrap();
    let engine = Arc::new(RecordingEngine::default());
    let event = fx.publish(kind(fx.workspace.join("pkg")));

    handler(&fx, &engine).handle(&event).unwrap();

    assert!(engine.calls().is_empty());
    assert_eq!(fx.reload(event.id).index_status, EventStatus::Success);
}

#[test]
fn open_on_a_file_is_a_successful_no_op() {
    let fx = Fixture::new();
    let not_a_dir = fx.home.path().join("workspace.txt");
    std::fs::write(&not_a_dir, "").unwrap();
    let engine = Arc::new(RecordingEngine::default());
    let event = fx
        .events
        .create_event(&not_a_dir, EventKind::OpenWorkspace)
        .unwrap();

    handler(&fx, &engine).handle(&event).unwrap();

    assert!(engine.calls().is_empty());
    assert_eq!(fx.reload(event.id).index_status, EventStatus::Success);
}

#[test]
fn engine_failure_marks_failed() {
    let fx = Fixture::new();
    let file = fx.write_file("a.rs", "");
    let engine = Arc::new(RecordingEngine::failing());
    let event = fx.publish(EventKind::ModifyFile { path: file });

    let err = handler(&fx, &engine).handle(&event).unwrap_err();

    assert!(matches!(err, HandleError::Delegation { operation: "index files", .. }));
    assert_eq!(fx.reload(event.id).index_status, EventStatus::Failed);
}

#[test]
fn delete_skips_the_existence_check() {
    let fx = Fixture::new();
    let engine = Arc::new(RecordingEngine::default());
    let gone = fx.workspace.join("removed.rs");
    let event = fx.publish(EventKind::DeleteFile { path: gone.clone() });

    handler(&fx, &engine).handle(&event).unwrap();

    assert_eq!(engine.calls(), vec![EngineCall::RemoveIndexes(vec![gone])]);
    assert_eq!(fx.reload(event.id).index_status, EventStatus::Success);
}

#[test]
fn rename_passes_both_normalized_paths() {
    let fx = Fixture::new();
    let engine = Arc::new(RecordingEngine::default());
    let event = fx.publish(EventKind::RenameFile {
        source: PathBuf::from("old.rs"),
        target: PathBuf::from("new.rs"),
    });

    handler(&fx, &engine).handle(&event).unwrap();

    assert_eq!(
        engine.calls(),
        vec![EngineCall::Rename(
            fx.workspace.join("old.rs"),
            fx.workspace.join("new.rs")
        )]
    );
}

#[test]
fn open_resets_progress_then_records_indexed_files() {
    let fx = Fixture::new();
    fx.workspaces
        .create_workspace("project", &fx.workspace, ACTIVE)
        .unwrap();
    fx.workspaces
        .update_progress(&fx.workspace, 42, 1)
        .unwrap();
    let engine = Arc::new(RecordingEngine::default());
    let event = fx.publish(EventKind::OpenWorkspace);

    handler(&fx, &engine).handle(&event).unwrap();

    assert_eq!(
        engine.calls(),
        vec![EngineCall::IndexWorkspace(fx.workspace.clone())]
    );
    let ws = fx.workspaces.workspace_by_path(&fx.workspace).unwrap().unwrap();
    assert_eq!(ws.codegraph_file_num, 3);
    assert!(ws.codegraph_ts > 1);
    assert_eq!(fx.reload(event.id).index_status, EventStatus::Success);
}

#[test]
fn open_of_untracked_workspace_fails_on_progress() {
    let fx = Fixture::new();
    let engine = Arc::new(RecordingEngine::default());
    let event = fx.publish(EventKind::OpenWorkspace);

    let err = handler(&fx, &engine).handle(&event).unwrap_err();

    assert!(matches!(err, HandleError::Progress { .. }));
    assert!(engine.calls().is_empty());
    assert_eq!(fx.reload(event.id).index_status, EventStatus::Failed);
}

#[test]
fn open_of_missing_workspace_fails() {
    let fx = Fixture::new();
    std::fs::remove_dir_all(&fx.workspace).unwrap();
    let engine = Arc::new(RecordingEngine::default());
    let event = fx.publish(EventKind::OpenWorkspace);

    let err = handler(&fx, &engine).handle(&event).unwrap_err();

    assert!(matches!(err, HandleError::NotExists(_)));
    assert_eq!(fx.reload(event.id).index_status, EventStatus::Failed);
}

#[test]
fn rebuild_clears_before_reindexing() {
    let fx = Fixture::new();
    fx.workspaces
        .create_workspace("project", &fx.workspace, ACTIVE)
        .unwrap();
    let engine = Arc::new(RecordingEngine::default());
    let event = fx.publish(EventKind::RebuildWorkspace);

    handler(&fx, &engine).handle(&event).unwrap();

    assert_eq!(
        engine.calls(),
        vec![
            EngineCall::RemoveAll(fx.workspace.clone()),
            EngineCall::IndexWorkspace(fx.workspace.clone()),
        ]
    );
}

#[test]
fn rebuild_stops_when_removal_fails() {
    let fx = Fixture::new();
    fx.workspaces
        .create_workspace("project", &fx.workspace, ACTIVE)
        .unwrap();
    let engine = Arc::new(RecordingEngine::default());
    engine.fail_remove_all.store(true, Ordering::SeqCst);
    let event = fx.publish(EventKind::RebuildWorkspace);

    let err = handler(&fx, &engine).handle(&event).unwrap_err();

    assert!(matches!(err, HandleError::Delegation { operation: "remove all indexes", .. }));
    assert_eq!(engine.calls(), vec![EngineCall::RemoveAll(fx.workspace.clone())]);
    assert_eq!(fx.reload(event.id).index_status, EventStatus::Failed);
}

#[test]
fn write_back_failure_replaces_success() {
    let fx = Fixture::new();
    let engine = Arc::new(RecordingEngine::default());
    let event = fx.publish(EventKind::DeleteFile {
        path: fx.workspace.join("x.rs"),
    });
    let flaky = Arc::new(FlakyEventStore::new(fx.events.clone()));
    flaky.fail_updates.store(true, Ordering::SeqCst);
    let handler = IndexHandler::new(
        flaky,
        fx.workspaces.clone(),
        engine.clone(),
        Arc::new(FsWorkspaceReader),
    );

    let err = handler.handle(&event).unwrap_err();

    match err {
        HandleError::Finalize {
            status, original, ..
        } => {
            assert_eq!(status, EventStatus::Success);
            assert!(original.is_none());
        }
        other => panic!("unexpected error: {other}"),
    }
    // Claimed but never settled; released when the ledger is reopened.
    assert_eq!(fx.reload(event.id).index_status, EventStatus::Building);
    let reopened = JsonEventStore::open_at(fx.home.path()).unwrap();
    assert_eq!(
        reopened.event(event.id).unwrap().unwrap().index_status,
        EventStatus::Init
    );
}

#[test]
fn write_back_failure_keeps_the_original_error() {
    let fx = Fixture::new();
    let engine = Arc::new(RecordingEngine::default());
    let event = fx.publish(EventKind::AddFile {
        path: fx.workspace.join("missing.rs"),
    });
    let flaky = Arc::new(FlakyEventStore::new(fx.events.clone()));
    flaky.fail_updates.store(true, Ordering::SeqCst);
    let handler = IndexHandler::new(
        flaky,
        fx.workspaces.clone(),
        engine,
        Arc::new(FsWorkspaceReader),
    );

    let err = handler.handle(&event).unwrap_err();

    let message = err.to_string();
    assert!(message.contains("failed to mark event"), "{message}");
    assert!(message.contains("while recording: path does not exist"), "{message}");
    match err {
        HandleError::Finalize {
            status, original, ..
        } => {
            assert_eq!(status, EventStatus::Failed);
            assert!(matches!(original.as_deref(), Some(HandleError::NotExists(_))));
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ---------------------------------------------------------------------------
// Claiming
// ---------------------------------------------------------------------------

#[test]
fn handled_kind_is_the_one_stored_at_claim_time() {
    let fx = Fixture::new();
    let gone = fx.workspace.join("a.rs");
    let engine = Arc::new(RecordingEngine::default());
    let snapshot = fx.publish(EventKind::AddFile { path: gone.clone() });
    publish_events(
        fx.events.as_ref(),
        fx.workspaces.as_ref(),
        &fx.workspace,
        &[EventKind::DeleteFile { path: gone.clone() }],
    )
    .unwrap();

    handler(&fx, &engine).handle(&snapshot).unwrap();

    assert_eq!(engine.calls(), vec![EngineCall::RemoveIndexes(vec![gone])]);
    assert_eq!(fx.reload(snapshot.id).index_status, EventStatus::Success);
}

#[test]
fn already_claimed_event_is_left_alone() {
    let fx = Fixture::new();
    let engine = Arc::new(RecordingEngine::default());
    let event = fx.publish(EventKind::DeleteFile {
        path: fx.workspace.join("x.rs"),
    });
    fx.events.claim_event(event.id, TargetSystem::Index).unwrap();

    handler(&fx, &engine).handle(&event).unwrap();

    assert!(engine.calls().is_empty());
    assert_eq!(fx.reload(event.id).index_status, EventStatus::Building);
}

#[test]
fn claim_failure_records_nothing() {
    let fx = Fixture::new();
    let engine = Arc::new(RecordingEngine::default());
    let event = fx.publish(EventKind::DeleteFile {
        path: fx.workspace.join("x.rs"),
    });
    let flaky = Arc::new(FlakyEventStore::new(fx.events.clone()));
    flaky.fail_claims.store(true, Ordering::SeqCst);
    let handler = IndexHandler::new(
        flaky,
        fx.workspaces.clone(),
        engine.clone(),
        Arc::new(FsWorkspaceReader),
    );

    let err = handler.handle(&event).unwrap_err();

    assert!(matches!(err, HandleError::Claim { .. }), "{err}");
    assert!(engine.calls().is_empty());
    assert_eq!(fx.reload(event.id).index_status, EventStatus::Init);
}

/// Publishes a delete for the file it is asked to index, the way an editor
/// can while a dispatch tick is in flight.
struct PublishingEngine {
    inner: RecordingEngine,
    events: Arc<JsonEventStore>,
    workspaces: Arc<JsonWorkspaceStore>,
}

impl IndexEngine for PublishingEngine {
    fn index_files(&self, workspace: &Path, paths: &[PathBuf]) -> Result<(), TargetError> {
        let deletes: Vec<_> = paths
            .iter()
            .map(|p| EventKind::DeleteFile { path: p.clone() })
            .collect();
        publish_events(
            self.events.as_ref(),
            self.workspaces.as_ref(),
            workspace,
            &deletes,
        )
        .map_err(|e| TargetError::new(e.to_string()))?;
        self.inner.index_files(workspace, paths)
    }

    fn remove_indexes(&self, workspace: &Path, paths: &[PathBuf]) -> Result<(), TargetError> {
        self.inner.remove_indexes(workspace, paths)
    }

    fn rename_indexes(&self, workspace: &Path, source: &Path, target: &Path) -> Result<(), TargetError> {
        self.inner.rename_indexes(workspace, source, target)
    }

    fn index_workspace(&self, workspace: &Path) -> Result<IndexMetrics, TargetError> {
        self.inner.index_workspace(workspace)
    }

    fn remove_all_indexes(&self, workspace: &Path) -> Result<(), TargetError> {
        self.inner.remove_all_indexes(workspace)
    }
}

#[test]
fn event_published_mid_handle_is_queued_not_merged() {
    let fx = Fixture::new();
    let file = fx.write_file("a.rs", "fn a() {}");
    fx.workspaces
        .create_workspace("project", &fx.workspace, ACTIVE)
        .unwrap();
    let engine = Arc::new(PublishingEngine {
        inner: RecordingEngine::default(),
        events: fx.events.clone(),
        workspaces: fx.workspaces.clone(),
    });
    let handler = IndexHandler::new(
        fx.events.clone(),
        fx.workspaces.clone(),
        engine.clone(),
        Arc::new(FsWorkspaceReader),
    );
    let dispatcher = Dispatcher::new(fx.events.clone(), handler, DispatchConfig::default());
    let add = fx.publish(EventKind::AddFile { path: file.clone() });

    // The delete queued during the add is a new event and is reached by the
    // later delete-file batch of the same call.
    let report = dispatcher.process_events(&[fx.workspace.clone()]).unwrap();

    let handled = fx.reload(add.id);
    assert_eq!(handled.kind, EventKind::AddFile { path: file.clone() });
    assert_eq!(handled.index_status, EventStatus::Success);
    assert_eq!(report.succeeded, 2);
    assert_eq!(
        engine.inner.calls(),
        vec![
            EngineCall::IndexFiles(vec![file.clone()]),
            EngineCall::RemoveIndexes(vec![file.clone()]),
        ]
    );
    let delete = fx
        .events
        .latest_event_for_source(&fx.workspace, Some(&file))
        .unwrap()
        .unwrap();
    assert_ne!(delete.id, add.id);
    assert_eq!(delete.index_status, EventStatus::Success);
}
