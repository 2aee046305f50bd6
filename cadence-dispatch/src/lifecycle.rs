//! Shared handler steps: claiming, the stat precondition and status
//! finalization.

use std::path::Path;

use cadence_core::reader::WorkspaceReader;
use cadence_core::store::EventStore;
use cadence_core::{Event, EventStatus, EventUpdate, ReadError, TargetSystem};

use crate::error::HandleError;

/// What the path under an event is expected to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Expect {
    File,
    Directory,
}

#[derive(Debug)]
pub(crate) enum Precondition {
    Proceed,
    /// Wrong kind of entry; recorded as success without delegating.
    Skip,
    Fail(HandleError),
}

pub(crate) fn check_precondition(
    reader: &dyn WorkspaceReader,
    path: &Path,
    expect: Expect,
) -> Precondition {
    match reader.stat(path) {
        Err(ReadError::NotExists(missing)) => Precondition::Fail(HandleError::NotExists(missing)),
        Err(source) => Precondition::Fail(HandleError::Stat {
            path: path.to_path_buf(),
            source,
        }),
        Ok(info) => match (expect, info.is_dir) {
            (Expect::File, true) | (Expect::Directory, false) => Precondition::Skip,
            _ => Precondition::Proceed,
        },
    }
}

/// Mark `event` `building` for `target` and return the claimed copy.
///
/// The claimed copy carries the kind stored at claim time, which may be newer
/// than the batch snapshot if intake coalesced into it meanwhile. `None` means
/// another handler holds the event.
pub(crate) fn claim(
    store: &dyn EventStore,
    event: &Event,
    target: TargetSystem,
) -> Result<Option<Event>, HandleError> {
    store
        .claim_event(event.id, target)
        .map_err(|source| HandleError::Claim {
            id: event.id,
            source,
        })
}

/// Record `outcome` as the event's status for `target`, then return it.
///
/// A failed write replaces a successful outcome and wraps a failed one, so
/// the caller always sees the write-back problem.
pub(crate) fn finalize(
    store: &dyn EventStore,
    event: &Event,
    target: TargetSystem,
    outcome: Result<(), HandleError>,
) -> Result<(), HandleError> {
    let status = if outcome.is_ok() {
        EventStatus::Success
    } else {
        EventStatus::Failed
    };

    match store.update_event(&EventUpdate::status(event.id, target, status)) {
        Ok(()) => outcome,
        Err(source) => Err(HandleError::Finalize {
            id: event.id,
            status,
            source,
            original: outcome.err().map(Box::new),
        }),
    }
}
