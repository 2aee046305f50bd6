#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use cadence_core::store::{EventQuery, EventStore, JsonEventStore, JsonWorkspaceStore};
use cadence_core::{Event, EventId, EventKind, EventType, EventUpdate, StoreError, TargetSystem};
use cadence_dispatch::{
    DocGenerator, ExportOptions, GeneratedDoc, IndexEngine, IndexMetrics, TargetError,
};

/// Temp home plus a workspace directory inside it.
pub struct Fixture {
    pub home: TempDir,
    pub workspace: PathBuf,
    pub events: Arc<JsonEventStore>,
    pub workspaces: Arc<JsonWorkspaceStore>,
}

impl Fixture {
    pub fn new() -> Self {
        let home = TempDir::new().unwrap();
        let workspace = home.path().join("project");
        std::fs::create_dir_all(&workspace).unwrap();
        let events = Arc::new(JsonEventStore::open_at(home.path()).unwrap());
        let workspaces = Arc::new(JsonWorkspaceStore::open_at(home.path()).unwrap());
        Self {
            home,
            workspace,
            events,
            workspaces,
        }
    }

    pub fn write_file(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.workspace.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn publish(&self, kind: EventKind) -> Event {
        self.events.create_event(&self.workspace, kind).unwrap()
    }

    pub fn reload(&self, id: EventId) -> Event {
        self.events.event(id).unwrap().unwrap()
    }
}

// ---------------------------------------------------------------------------
// Index engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    IndexFiles(Vec<PathBuf>),
    RemoveIndexes(Vec<PathBuf>),
    Rename(PathBuf, PathBuf),
    IndexWorkspace(PathBuf),
    RemoveAll(PathBuf),
}

#[derive(Default)]
pub struct RecordingEngine {
    pub calls: Mutex<Vec<EngineCall>>,
    pub fail: AtomicBool,
    pub fail_remove_all: AtomicBool,
}

impl RecordingEngine {
    pub fn failing() -> Self {
        let engine = Self::default();
        engine.fail.store(true, Ordering::SeqCst);
        engine
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: EngineCall) -> Result<(), TargetError> {
        self.calls.lock().unwrap().push(call);
        if self.fail.load(Ordering::SeqCst) {
            Err(TargetError::new("engine unavailable"))
        } else {
            Ok(())
        }
    }
}

impl IndexEngine for RecordingEngine {
    fn index_files(&self, _workspace: &Path, paths: &[PathBuf]) -> Result<(), TargetError> {
        self.record(EngineCall::IndexFiles(paths.to_vec()))
    }

    fn remove_indexes(&self, _workspace: &Path, paths: &[PathBuf]) -> Result<(), TargetError> {
        self.record(EngineCall::RemoveIndexes(paths.to_vec()))
    }

    fn rename_indexes(
        &self,
        _workspace: &Path,
        source: &Path,
        target: &Path,
    ) -> Result<(), TargetError> {
        self.record(EngineCall::Rename(source.to_path_buf(), target.to_path_buf()))
    }

    fn index_workspace(&self, workspace: &Path) -> Result<IndexMetrics, TargetError> {
        self.record(EngineCall::IndexWorkspace(workspace.to_path_buf()))?;
        Ok(IndexMetrics {
            total_files: 3,
            total_succeed: 3,
            total_failed: 0,
        })
    }

    fn remove_all_indexes(&self, workspace: &Path) -> Result<(), TargetError> {
        self.calls
            .lock()
            .unwrap()
            .push(EngineCall::RemoveAll(workspace.to_path_buf()));
        if self.fail_remove_all.load(Ordering::SeqCst) {
            return Err(TargetError::new("remove-all refused"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Doc generator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocCall {
    GenerateRules,
    GenerateWiki,
    ExportRules(ExportOptions),
    ExportWiki(ExportOptions),
}

#[derive(Default)]
pub struct RecordingGenerator {
    pub calls: Mutex<Vec<DocCall>>,
    pub fail_rules: AtomicBool,
    pub fail_wiki: AtomicBool,
}

impl RecordingGenerator {
    pub fn calls(&self) -> Vec<DocCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl DocGenerator for RecordingGenerator {
    fn generate_rules(&self, _workspace: &Path) -> Result<GeneratedDoc, TargetError> {
        self.calls.lock().unwrap().push(DocCall::GenerateRules);
        if self.fail_rules.load(Ordering::SeqCst) {
            return Err(TargetError::new("rules generator crashed"));
        }
        Ok(GeneratedDoc {
            content: "# rules".into(),
        })
    }

    fn generate_wiki(&self, _workspace: &Path) -> Result<GeneratedDoc, TargetError> {
        self.calls.lock().unwrap().push(DocCall::GenerateWiki);
        if self.fail_wiki.load(Ordering::SeqCst) {
            return Err(TargetError::new("wiki generator crashed"));
        }
        Ok(GeneratedDoc {
            content: "# wiki".into(),
        })
    }

    fn export_rules(&self, _workspace: &Path, options: &ExportOptions) -> Result<(), TargetError> {
        self.calls
            .lock()
            .unwrap()
            .push(DocCall::ExportRules(options.clone()));
        Ok(())
    }

    fn export_wiki(&self, _workspace: &Path, options: &ExportOptions) -> Result<(), TargetError> {
        self.calls
            .lock()
            .unwrap()
            .push(DocCall::ExportWiki(options.clone()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Store wrappers
// ---------------------------------------------------------------------------

/// Delegates to an inner store, failing chosen operations on demand.
pub struct FlakyEventStore {
    pub inner: Arc<JsonEventStore>,
    pub fail_updates: AtomicBool,
    pub fail_claims: AtomicBool,
    pub fail_fetch_for: Mutex<Option<EventType>>,
}

impl FlakyEventStore {
    pub fn new(inner: Arc<JsonEventStore>) -> Self {
        Self {
            inner,
            fail_updates: AtomicBool::new(false),
            fail_claims: AtomicBool::new(false),
            fail_fetch_for: Mutex::new(None),
        }
    }

    fn injected(what: &str) -> StoreError {
        StoreError::Io {
            path: PathBuf::from("events.json"),
            source: std::io::Error::new(std::io::ErrorKind::Other, what.to_string()),
        }
    }
}

impl EventStore for FlakyEventStore {
    fn events_by_type_and_status(&self, query: &EventQuery) -> Result<Vec<Event>, StoreError> {
        if *self.fail_fetch_for.lock().unwrap() == Some(query.event_type) {
            return Err(Self::injected("fetch failed"));
        }
        self.inner.events_by_type_and_status(query)
    }

    fn update_event(&self, update: &EventUpdate) -> Result<(), StoreError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(Self::injected("disk full"));
        }
        self.inner.update_event(update)
    }

    fn claim_event(&self, id: EventId, target: TargetSystem) -> Result<Option<Event>, StoreError> {
        if self.fail_claims.load(Ordering::SeqCst) {
            return Err(Self::injected("claim failed"));
        }
        self.inner.claim_event(id, target)
    }

    fn events_for_workspace(&self, workspace: &Path) -> Result<Vec<Event>, StoreError> {
        self.inner.events_for_workspace(workspace)
    }

    fn create_event(&self, workspace: &Path, kind: EventKind) -> Result<Event, StoreError> {
        self.inner.create_event(workspace, kind)
    }

    fn latest_event_for_source(
        &self,
        workspace: &Path,
        source: Option<&Path>,
    ) -> Result<Option<Event>, StoreError> {
        self.inner.latest_event_for_source(workspace, source)
    }

    fn event(&self, id: EventId) -> Result<Option<Event>, StoreError> {
        self.inner.event(id)
    }
}
