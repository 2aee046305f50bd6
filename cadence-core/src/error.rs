//! Error types for cadence-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{CodebaseId, EventId};

/// Errors raised by the event ledger, workspace store, codebase registry and
/// settings loader.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse settings at {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Serialization on the write path; the in-memory value is always valid.
    #[error("serialization error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    #[error("codebase config {0} not found")]
    CodebaseNotFound(CodebaseId),

    #[error("event {0} not found")]
    EventNotFound(EventId),

    /// A pending-only update hit an event a consumer already claimed.
    #[error("event {0} is no longer pending")]
    NotPending(EventId),

    /// The id would not name a file inside the codebases directory.
    #[error("invalid codebase id '{0}'")]
    InvalidCodebaseId(CodebaseId),

    #[error("workspace {} not found", .0.display())]
    WorkspaceNotFound(PathBuf),

    /// Another thread panicked while holding a store lock.
    #[error("store lock poisoned: {0}")]
    Poisoned(&'static str),
}

/// Errors from [`crate::reader::WorkspaceReader`].
#[derive(Debug, Error)]
pub enum ReadError {
    /// The distinguished "path does not exist" condition handlers branch on.
    #[error("path does not exist: {}", .0.display())]
    NotExists(PathBuf),

    #[error("failed to stat {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
