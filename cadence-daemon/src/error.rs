use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the daemon runtime, its services and the socket protocol.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store error: {0}")]
    Store(#[from] cadence_core::StoreError),

    #[error("{0}")]
    Sync(#[from] cadence_sync::SyncError),

    #[error("dispatch error: {0}")]
    Dispatch(#[from] cadence_dispatch::DispatchError),

    #[error("{0}")]
    Intake(#[from] cadence_dispatch::IntakeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("daemon protocol error: {0}")]
    Protocol(String),

    #[error("daemon is not running (socket missing: {socket})")]
    DaemonNotRunning { socket: PathBuf },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
