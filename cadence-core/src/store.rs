//! Event ledger and workspace table.
//!
//! The orchestrator talks to both through the [`EventStore`] and
//! [`WorkspaceStore`] traits. The JSON-backed implementations keep the whole
//! document in memory behind a `Mutex` and rewrite it atomically on every
//! mutation (see [`crate::layout::write_atomic`]). A failed write rolls the
//! in-memory change back so memory never runs ahead of disk.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{io_err, StoreError};
use crate::layout;
use crate::types::{
    Event, EventId, EventKind, EventStatus, EventType, EventUpdate, TargetSystem, Workspace,
};

// ---------------------------------------------------------------------------
// 1. Contracts
// ---------------------------------------------------------------------------

/// Selection filter for [`EventStore::events_by_type_and_status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    pub event_type: EventType,
    /// Only events of these workspaces. Empty selects nothing.
    pub workspaces: Vec<PathBuf>,
    /// Whose status `statuses` is matched against.
    pub target: TargetSystem,
    pub statuses: Vec<EventStatus>,
    pub limit: usize,
    pub include_deleted: bool,
    /// Only events with an id greater than this.
    pub cursor: Option<EventId>,
}

pub trait EventStore: Send + Sync {
    /// Matching events, least recently updated first, at most `query.limit`.
    fn events_by_type_and_status(&self, query: &EventQuery) -> Result<Vec<Event>, StoreError>;

    /// Apply a partial update. Unknown ids are [`StoreError::EventNotFound`];
    /// a `pending_only` update of a claimed event is [`StoreError::NotPending`].
    fn update_event(&self, update: &EventUpdate) -> Result<(), StoreError>;

    /// Atomically move the event's `target` status to `building` and return
    /// it as claimed. `None` when another handler already holds it.
    fn claim_event(&self, id: EventId, target: TargetSystem) -> Result<Option<Event>, StoreError>;

    /// Every non-deleted event of `workspace`, oldest first.
    fn events_for_workspace(&self, workspace: &Path) -> Result<Vec<Event>, StoreError>;

    /// Append a new event with every status at `init`.
    fn create_event(&self, workspace: &Path, kind: EventKind) -> Result<Event, StoreError>;

    /// Most recently created event for `workspace` whose source path equals
    /// `source` (`None` matches workspace kinds).
    fn latest_event_for_source(
        &self,
        workspace: &Path,
        source: Option<&Path>,
    ) -> Result<Option<Event>, StoreError>;

    fn event(&self, id: EventId) -> Result<Option<Event>, StoreError>;
}

pub trait WorkspaceStore: Send + Sync {
    fn list_workspaces(&self) -> Result<Vec<Workspace>, StoreError>;

    /// Workspaces carrying the exact active sentinel.
    fn active_workspaces(&self) -> Result<Vec<Workspace>, StoreError> {
        Ok(self
            .list_workspaces()?
            .into_iter()
            .filter(Workspace::is_active)
            .collect())
    }

    fn workspace_by_path(&self, path: &Path) -> Result<Option<Workspace>, StoreError>;

    fn create_workspace(&self, name: &str, path: &Path, active: &str)
        -> Result<Workspace, StoreError>;

    fn set_active(&self, path: &Path, active: &str) -> Result<(), StoreError>;

    /// Overwrite the codegraph progress counters of `path`.
    fn update_progress(&self, path: &Path, file_num: u64, timestamp: i64)
        -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// 2. JSON event ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
struct EventLedger {
    next_id: u64,
    events: Vec<Event>,
}

impl EventLedger {
    fn release_claims(&mut self) -> usize {
        let mut released = 0;
        for event in &mut self.events {
            for status in [&mut event.index_status, &mut event.embedding_status] {
                if *status == EventStatus::Building {
                    *status = EventStatus::Init;
                    released += 1;
                }
            }
        }
        released
    }
}

/// [`EventStore`] persisted at `~/.cadence/events.json`.
#[derive(Debug)]
pub struct JsonEventStore {
    path: PathBuf,
    ledger: Mutex<EventLedger>,
}

impl JsonEventStore {
    /// Load the ledger. Claims left `building` by a process that stopped
    /// mid-handle are released back to `init`.
    pub fn open_at(home: &Path) -> Result<Self, StoreError> {
        let path = layout::events_path(home);
        let mut ledger: EventLedger = load_document(&path)?;
        if ledger.release_claims() > 0 {
            save_document(&path, &ledger)?;
        }
        Ok(Self {
            path,
            ledger: Mutex::new(ledger),
        })
    }

    /// `open_at` convenience wrapper.
    pub fn open() -> Result<Self, StoreError> {
        Self::open_at(&layout::home()?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, EventLedger>, StoreError> {
        self.ledger
            .lock()
            .map_err(|_| StoreError::Poisoned("event ledger"))
    }
}

impl EventStore for JsonEventStore {
    fn events_by_type_and_status(&self, query: &EventQuery) -> Result<Vec<Event>, StoreError> {
        let ledger = self.lock()?;
        let mut matched: Vec<Event> = ledger
            .events
            .iter()
            .filter(|e| e.kind.event_type() == query.event_type)
            .filter(|e| query.workspaces.iter().any(|w| *w == e.workspace))
            .filter(|e| query.statuses.contains(&e.status(query.target)))
            .filter(|e| query.include_deleted || !e.deleted)
            .filter(|e| query.cursor.map_or(true, |cursor| e.id > cursor))
            .cloned()
            .collect();
        // Failed events get a fresh `updated_at`, so they queue behind
        // untouched work instead of starving it.
        matched.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then(a.id.cmp(&b.id)));
        matched.truncate(query.limit);
        Ok(matched)
    }

    fn update_event(&self, update: &EventUpdate) -> Result<(), StoreError> {
        let mut ledger = self.lock()?;
        let index = ledger
            .events
            .iter()
            .position(|e| e.id == update.id)
            .ok_or(StoreError::EventNotFound(update.id))?;

        if update.pending_only && !ledger.events[index].is_pending() {
            return Err(StoreError::NotPending(update.id));
        }

        let previous = ledger.events[index].clone();
        {
            let event = &mut ledger.events[index];
            if let Some(kind) = &update.kind {
                event.kind = kind.clone();
            }
            if let Some(status) = update.index_status {
                event.index_status = status;
            }
            if let Some(status) = update.embedding_status {
                event.embedding_status = status;
            }
            event.updated_at = update.updated_at;
        }

        if let Err(err) = save_document(&self.path, &*ledger) {
            ledger.events[index] = previous;
            return Err(err);
        }
        Ok(())
    }

    fn claim_event(&self, id: EventId, target: TargetSystem) -> Result<Option<Event>, StoreError> {
        let mut ledger = self.lock()?;
        let index = ledger
            .events
            .iter()
            .position(|e| e.id == id)
            .ok_or(StoreError::EventNotFound(id))?;
        if ledger.events[index].status(target) == EventStatus::Building {
            return Ok(None);
        }

        let previous = ledger.events[index].clone();
        {
            let event = &mut ledger.events[index];
            match target {
                TargetSystem::Index => event.index_status = EventStatus::Building,
                TargetSystem::Embedding => event.embedding_status = EventStatus::Building,
            }
            event.updated_at = Utc::now();
        }

        if let Err(err) = save_document(&self.path, &*ledger) {
            ledger.events[index] = previous;
            return Err(err);
        }
        Ok(Some(ledger.events[index].clone()))
    }

    fn events_for_workspace(&self, workspace: &Path) -> Result<Vec<Event>, StoreError> {
        let ledger = self.lock()?;
        Ok(ledger
            .events
            .iter()
            .filter(|e| e.workspace == workspace && !e.deleted)
            .cloned()
            .collect())
    }

    fn create_event(&self, workspace: &Path, kind: EventKind) -> Result<Event, StoreError> {
        let mut ledger = self.lock()?;
        let now = Utc::now();
        ledger.next_id += 1;
        let event = Event {
            id: EventId(ledger.next_id),
            workspace: workspace.to_path_buf(),
            kind,
            index_status: EventStatus::Init,
            embedding_status: EventStatus::Init,
            deleted: false,
            created_at: now,
            updated_at: now,
        };
        ledger.events.push(event.clone());

        if let Err(err) = save_document(&self.path, &*ledger) {
            ledger.events.pop();
            ledger.next_id -= 1;
            return Err(err);
        }
        Ok(event)
    }

    fn latest_event_for_source(
        &self,
        workspace: &Path,
        source: Option<&Path>,
    ) -> Result<Option<Event>, StoreError> {
        let ledger = self.lock()?;
        Ok(ledger
            .events
            .iter()
            .filter(|e| e.workspace == workspace && e.kind.source_path() == source)
            .max_by_key(|e| e.id)
            .cloned())
    }

    fn event(&self, id: EventId) -> Result<Option<Event>, StoreError> {
        let ledger = self.lock()?;
        Ok(ledger.events.iter().find(|e| e.id == id).cloned())
    }
}

// ---------------------------------------------------------------------------
// 3. JSON workspace table
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
struct WorkspaceTable {
    next_id: u64,
    workspaces: Vec<Workspace>,
}

/// [`WorkspaceStore`] persisted at `~/.cadence/workspaces.json`.
#[derive(Debug)]
pub struct JsonWorkspaceStore {
    path: PathBuf,
    table: Mutex<WorkspaceTable>,
}

impl JsonWorkspaceStore {
    pub fn open_at(home: &Path) -> Result<Self, StoreError> {
        let path = layout::workspaces_path(home);
        let table = load_document(&path)?;
        Ok(Self {
            path,
            table: Mutex::new(table),
        })
    }

    /// `open_at` convenience wrapper.
    pub fn open() -> Result<Self, StoreError> {
        Self::open_at(&layout::home()?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, WorkspaceTable>, StoreError> {
        self.table
            .lock()
            .map_err(|_| StoreError::Poisoned("workspace table"))
    }

    /// Mutate the workspace at `path` and persist, restoring it on failure.
    fn modify(
        &self,
        path: &Path,
        apply: impl FnOnce(&mut Workspace),
    ) -> Result<(), StoreError> {
        let mut table = self.lock()?;
        let index = table
            .workspaces
            .iter()
            .position(|w| w.path == path)
            .ok_or_else(|| StoreError::WorkspaceNotFound(path.to_path_buf()))?;

        let previous = table.workspaces[index].clone();
        apply(&mut table.workspaces[index]);
        table.workspaces[index].updated_at = Utc::now();

        if let Err(err) = save_document(&self.path, &*table) {
            table.workspaces[index] = previous;
            return Err(err);
        }
        Ok(())
    }
}

impl WorkspaceStore for JsonWorkspaceStore {
    fn list_workspaces(&self) -> Result<Vec<Workspace>, StoreError> {
        Ok(self.lock()?.workspaces.clone())
    }

    fn workspace_by_path(&self, path: &Path) -> Result<Option<Workspace>, StoreError> {
        let table = self.lock()?;
        Ok(table.workspaces.iter().find(|w| w.path == path).cloned())
    }

    fn create_workspace(
        &self,
        name: &str,
        path: &Path,
        active: &str,
    ) -> Result<Workspace, StoreError> {
        let mut table = self.lock()?;
        if let Some(existing) = table.workspaces.iter().find(|w| w.path == path) {
            return Ok(existing.clone());
        }

        let now = Utc::now();
        table.next_id += 1;
        let workspace = Workspace {
            id: table.next_id,
            name: name.to_string(),
            path: path.to_path_buf(),
            active: active.to_string(),
            codegraph_file_num: 0,
            codegraph_ts: 0,
            created_at: now,
            updated_at: now,
        };
        table.workspaces.push(workspace.clone());

        if let Err(err) = save_document(&self.path, &*table) {
            table.workspaces.pop();
            table.next_id -= 1;
            return Err(err);
        }
        Ok(workspace)
    }

    fn set_active(&self, path: &Path, active: &str) -> Result<(), StoreError> {
        self.modify(path, |w| w.active = active.to_string())
    }

    fn update_progress(
        &self,
        path: &Path,
        file_num: u64,
        timestamp: i64,
    ) -> Result<(), StoreError> {
        self.modify(path, |w| {
            w.codegraph_file_num = file_num;
            w.codegraph_ts = timestamp;
        })
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn load_document<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
    if !path.exists() {
        return Ok(T::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_json::from_str(&contents).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn save_document<T: Serialize>(path: &Path, document: &T) -> Result<(), StoreError> {
    let json = serde_json::to_vec_pretty(document)?;
    layout::write_atomic(path, &json)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
