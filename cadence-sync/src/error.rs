//! Error types for cadence-sync.

use thiserror::Error;

use cadence_core::StoreError;
use cadence_detector::ResolveError;

/// All errors that can arise from registration and sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Codebase roots could not be resolved for the workspace.
    #[error("failed to find codebase paths: {0}")]
    Resolve(#[from] ResolveError),

    /// An error from the codebase registry.
    #[error("registry error: {0}")]
    Store(#[from] StoreError),

    #[error("sync config is not properly set, please check clientId, serverURL and token")]
    ConfigIncomplete,

    /// The request never produced an HTTP response.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<ureq::Transport>,
    },

    #[error("failed to get hash tree, status: {status}, response: {body}")]
    Status { status: u16, body: String },

    /// The response body was not the expected JSON document.
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: std::io::Error,
    },
}
