//! Domain types for the Cadence orchestrator.
//!
//! All path fields use `PathBuf`. Every type round-trips through serde so the
//! JSON ledger, the codebase registry and the daemon protocol share one shape.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Stable identifier of an event in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for EventId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Identifier of the client (editor instance) that owns a codebase config.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub String);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ClientId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Codebase identifier, a pure function of (name, path).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CodebaseId(pub String);

impl fmt::Display for CodebaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for CodebaseId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CodebaseId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Fieldless tag of an [`EventKind`], used for store queries and ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    AddFile,
    ModifyFile,
    DeleteFile,
    RenameFile,
    OpenWorkspace,
    RebuildWorkspace,
}

impl EventType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            EventType::AddFile => "add_file",
            EventType::ModifyFile => "modify_file",
            EventType::DeleteFile => "delete_file",
            EventType::RenameFile => "rename_file",
            EventType::OpenWorkspace => "open_workspace",
            EventType::RebuildWorkspace => "rebuild_workspace",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "add_file" => Ok(EventType::AddFile),
            "modify_file" => Ok(EventType::ModifyFile),
            "delete_file" => Ok(EventType::DeleteFile),
            "rename_file" => Ok(EventType::RenameFile),
            "open_workspace" => Ok(EventType::OpenWorkspace),
            "rebuild_workspace" => Ok(EventType::RebuildWorkspace),
            other => Err(format!(
                "unknown event type '{other}'; expected: add_file, modify_file, delete_file, \
                 rename_file, open_workspace, rebuild_workspace"
            )),
        }
    }
}

/// What changed. Closed over the six kinds the orchestrator understands.
///
/// Paths are as reported by the producer and may be workspace-relative; see
/// [`crate::normalize::normalize_kind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    AddFile { path: PathBuf },
    ModifyFile { path: PathBuf },
    DeleteFile { path: PathBuf },
    RenameFile { source: PathBuf, target: PathBuf },
    OpenWorkspace,
    RebuildWorkspace,
}

impl EventKind {
    pub fn event_type(&self) -> EventType {
        match self {
            EventKind::AddFile { .. } => EventType::AddFile,
            EventKind::ModifyFile { .. } => EventType::ModifyFile,
            EventKind::DeleteFile { .. } => EventType::DeleteFile,
            EventKind::RenameFile { .. } => EventType::RenameFile,
            EventKind::OpenWorkspace => EventType::OpenWorkspace,
            EventKind::RebuildWorkspace => EventType::RebuildWorkspace,
        }
    }

    /// Source path for file kinds; `None` for workspace kinds.
    pub fn source_path(&self) -> Option<&Path> {
        match self {
            EventKind::AddFile { path }
            | EventKind::ModifyFile { path }
            | EventKind::DeleteFile { path } => Some(path),
            EventKind::RenameFile { source, .. } => Some(source),
            EventKind::OpenWorkspace | EventKind::RebuildWorkspace => None,
        }
    }
}

/// Per-target processing status.
///
/// `init → building → {success | failed}` per attempt. `building` marks an
/// event a handler has claimed; its kind can no longer be rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Init,
    Building,
    Failed,
    Success,
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EventStatus::Init => "init",
            EventStatus::Building => "building",
            EventStatus::Failed => "failed",
            EventStatus::Success => "success",
        })
    }
}

/// Consumers whose progress is tracked per event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSystem {
    Index,
    Embedding,
}

impl fmt::Display for TargetSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TargetSystem::Index => "index",
            TargetSystem::Embedding => "embedding",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub workspace: PathBuf,
    pub kind: EventKind,
    pub index_status: EventStatus,
    pub embedding_status: EventStatus,
    /// Soft-delete marker owned by retention tooling; never set here.
    #[serde(default)]
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn status(&self, target: TargetSystem) -> EventStatus {
        match target {
            TargetSystem::Index => self.index_status,
            TargetSystem::Embedding => self.embedding_status,
        }
    }

    /// No consumer has touched the event yet.
    pub fn is_pending(&self) -> bool {
        self.index_status == EventStatus::Init && self.embedding_status == EventStatus::Init
    }
}

/// Partial update addressed by event id. `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventUpdate {
    pub id: EventId,
    pub kind: Option<EventKind>,
    pub index_status: Option<EventStatus>,
    pub embedding_status: Option<EventStatus>,
    /// Refuse the update with [`crate::StoreError::NotPending`] unless the
    /// event is still untouched by every consumer.
    pub pending_only: bool,
    pub updated_at: DateTime<Utc>,
}

impl EventUpdate {
    /// Status write-back for one event/target pair.
    pub fn status(id: EventId, target: TargetSystem, status: EventStatus) -> Self {
        let mut update = Self {
            id,
            kind: None,
            index_status: None,
            embedding_status: None,
            pending_only: false,
            updated_at: Utc::now(),
        };
        match target {
            TargetSystem::Index => update.index_status = Some(status),
            TargetSystem::Embedding => update.embedding_status = Some(status),
        }
        update
    }

    /// Replace the kind of a still-pending event.
    pub fn kind(id: EventId, kind: EventKind) -> Self {
        Self {
            id,
            kind: Some(kind),
            index_status: None,
            embedding_status: None,
            pending_only: true,
            updated_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Workspaces
// ---------------------------------------------------------------------------

/// The only `active` value that enables dispatch for a workspace.
pub const ACTIVE: &str = "true";
pub const INACTIVE: &str = "false";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: u64,
    pub name: String,
    pub path: PathBuf,
    /// Boolean-as-string; anything other than [`ACTIVE`] is inactive.
    pub active: String,
    #[serde(default)]
    pub codegraph_file_num: u64,
    /// Unix seconds of the last progress update.
    #[serde(default)]
    pub codegraph_ts: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workspace {
    pub fn is_active(&self) -> bool {
        self.active == ACTIVE
    }
}

// ---------------------------------------------------------------------------
// Codebases
// ---------------------------------------------------------------------------

/// A codebase root discovered inside a client workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodebaseRoot {
    pub name: String,
    pub path: PathBuf,
}

/// What an unregister or sync call reports back per codebase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodebaseDescriptor {
    pub id: CodebaseId,
    pub name: String,
    pub path: PathBuf,
}

/// Identity and sync state for one codebase root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodebaseConfig {
    pub client_id: ClientId,
    pub codebase_id: CodebaseId,
    pub codebase_name: String,
    pub codebase_path: PathBuf,
    /// Relative path → content hash.
    #[serde(default)]
    pub hash_tree: BTreeMap<String, String>,
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
    pub register_time: DateTime<Utc>,
}

impl CodebaseConfig {
    pub fn descriptor(&self) -> CodebaseDescriptor {
        CodebaseDescriptor {
            id: self.codebase_id.clone(),
            name: self.codebase_name.clone(),
            path: self.codebase_path.clone(),
        }
    }
}

/// Endpoint and credential for the remote sync service. Held in memory by the
/// sync client only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub client_id: String,
    pub server_url: String,
    pub token: String,
}

impl SyncConfig {
    /// All three fields are required before a hash tree can be fetched.
    pub fn is_complete(&self) -> bool {
        !self.client_id.is_empty() && !self.server_url.is_empty() && !self.token.is_empty()
    }
}
