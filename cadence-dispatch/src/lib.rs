//! # cadence-dispatch
//!
//! Drives pending change events into their target systems.
//!
//! A [`Dispatcher`] pulls bounded batches per event type in a fixed order
//! and hands each event to an [`EventHandler`]. The [`IndexHandler`] checks
//! preconditions, delegates to an [`IndexEngine`] and always finalizes the
//! event's index status. The [`DocHandler`] generates missing documentation
//! artifacts on open-workspace and stays outside the status ledger.
//! [`intake`] is the producer side: publishing events, triggering a full
//! index and switching workspaces on or off. [`status`] reads the ledger
//! back as a per-workspace index state.

pub mod dispatcher;
pub mod doc_handler;
pub mod error;
pub mod index_handler;
pub mod intake;
mod lifecycle;
pub mod status;
pub mod targets;

pub use dispatcher::{
    active_workspace_paths, DispatchConfig, DispatchReport, Dispatcher, DISPATCH_ORDER,
    RETRY_ELIGIBLE_STATUSES,
};
pub use doc_handler::{
    ArtifactKind, ArtifactSpec, DocHandler, DocReport, DEFAULT_ARTIFACTS, RULES_ARTIFACT,
    WIKI_ARTIFACT,
};
pub use error::{DispatchError, HandleError, IntakeError, TargetError};
pub use index_handler::{EventHandler, IndexHandler};
pub use status::{index_status, IndexState, IndexStatus, StatusCounts};
pub use targets::{
    DocGenerator, ExportFormat, ExportMode, ExportOptions, GeneratedDoc, IndexEngine, IndexMetrics,
};
