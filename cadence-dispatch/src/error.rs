//! Error types for cadence-dispatch.

use std::path::PathBuf;

use thiserror::Error;

use cadence_core::{EventId, EventStatus, EventType, ReadError, StoreError};

use crate::dispatcher::DispatchReport;

/// Failure reported by a target system (index engine, document generator).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TargetError(pub String);

impl TargetError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<std::io::Error> for TargetError {
    fn from(err: std::io::Error) -> Self {
        Self(err.to_string())
    }
}

/// Outcome of one handler invocation that was not a success.
#[derive(Debug, Error)]
pub enum HandleError {
    /// Precondition stat found nothing; the event is marked failed.
    #[error("path does not exist: {}", .0.display())]
    NotExists(PathBuf),

    #[error("failed to stat {}: {source}", .path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: ReadError,
    },

    #[error("{operation} failed for {}: {source}", .path.display())]
    Delegation {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: TargetError,
    },

    #[error("failed to update progress for {}: {source}", .workspace.display())]
    Progress {
        workspace: PathBuf,
        #[source]
        source: StoreError,
    },

    #[error("failed to claim event {id}: {source}")]
    Claim {
        id: EventId,
        #[source]
        source: StoreError,
    },

    /// The status write-back failed. `original` is the delegation error the
    /// write was recording, if the delegation itself failed.
    #[error("failed to mark event {id} {status}: {source}{}", describe_original(.original))]
    Finalize {
        id: EventId,
        status: EventStatus,
        #[source]
        source: StoreError,
        original: Option<Box<HandleError>>,
    },

    /// Accumulated errors of a best-effort pass.
    #[error("{}", join_errors(.0))]
    Multiple(Vec<HandleError>),
}

impl HandleError {
    /// `map_err` adapter wrapping a target failure with its operation.
    pub(crate) fn delegation(
        operation: &'static str,
        path: impl Into<PathBuf>,
    ) -> impl FnOnce(TargetError) -> Self {
        let path = path.into();
        move |source| HandleError::Delegation {
            operation,
            path,
            source,
        }
    }
}

fn describe_original(original: &Option<Box<HandleError>>) -> String {
    match original {
        Some(err) => format!(" (while recording: {err})"),
        None => String::new(),
    }
}

fn join_errors(errors: &[HandleError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that stop a dispatch call.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The store could not produce a batch. Earlier types in the order were
    /// handled and are summarized in `report`.
    #[error("failed to fetch {event_type} events: {source}")]
    Fetch {
        event_type: EventType,
        #[source]
        source: StoreError,
        report: DispatchReport,
    },

    #[error("failed to list active workspaces: {0}")]
    Workspaces(#[from] StoreError),
}

/// Errors from publishing events or switching a workspace.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid index switch '{0}'; expected on or off")]
    InvalidSwitch(String),

    #[error("workspace {} is not tracked", .0.display())]
    UnknownWorkspace(PathBuf),
}
