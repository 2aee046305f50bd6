//! Batch dispatcher.
//!
//! For each event type in [`DISPATCH_ORDER`], fetch one batch of events in a
//! [`RETRY_ELIGIBLE_STATUSES`] state for the given workspaces and hand them to
//! the handler one at a time. A failing event is logged and skipped. A failing
//! fetch stops the call.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use cadence_core::config::DEFAULT_BATCH_SIZE;
use cadence_core::store::{EventQuery, EventStore, WorkspaceStore};
use cadence_core::{EventStatus, EventType, StoreError, Workspace};

use crate::error::DispatchError;
use crate::index_handler::EventHandler;

/// Workspace-level kinds first so file events land on a fresh index.
pub const DISPATCH_ORDER: [EventType; 6] = [
    EventType::RebuildWorkspace,
    EventType::OpenWorkspace,
    EventType::AddFile,
    EventType::ModifyFile,
    EventType::DeleteFile,
    EventType::RenameFile,
];

/// Statuses a dispatch call re-selects. Handlers never leave `init`, so an
/// event is picked up until it reaches `success`.
pub const RETRY_ELIGIBLE_STATUSES: [EventStatus; 2] = [EventStatus::Init, EventStatus::Failed];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Per-type batch bound for one call.
    pub batch_size: usize,
    pub statuses: Vec<EventStatus>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            statuses: RETRY_ELIGIBLE_STATUSES.to_vec(),
        }
    }
}

impl DispatchConfig {
    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            ..Self::default()
        }
    }
}

/// Tally of one dispatch call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub succeeded: usize,
    pub failed: usize,
    /// Events handled per type, either outcome.
    pub by_type: BTreeMap<EventType, usize>,
}

impl DispatchReport {
    pub fn handled(&self) -> usize {
        self.succeeded + self.failed
    }

    fn record(&mut self, event_type: EventType, ok: bool) {
        if ok {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        *self.by_type.entry(event_type).or_default() += 1;
    }
}

pub struct Dispatcher<H> {
    events: Arc<dyn EventStore>,
    handler: H,
    config: DispatchConfig,
}

impl<H: EventHandler> Dispatcher<H> {
    pub fn new(events: Arc<dyn EventStore>, handler: H, config: DispatchConfig) -> Self {
        Self {
            events,
            handler,
            config,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Run one dispatch cycle over `workspaces`.
    ///
    /// Returns [`DispatchError::Fetch`] if a batch cannot be read; types
    /// earlier in the order have been handled by then and are counted in the
    /// error's report.
    pub fn process_events(&self, workspaces: &[PathBuf]) -> Result<DispatchReport, DispatchError> {
        let mut report = DispatchReport::default();
        if workspaces.is_empty() {
            return Ok(report);
        }

        for event_type in DISPATCH_ORDER {
            let query = EventQuery {
                event_type,
                workspaces: workspaces.to_vec(),
                target: self.handler.target(),
                statuses: self.config.statuses.clone(),
                limit: self.config.batch_size,
                include_deleted: false,
                cursor: None,
            };
            let batch = match self.events.events_by_type_and_status(&query) {
                Ok(batch) => batch,
                Err(source) => {
                    return Err(DispatchError::Fetch {
                        event_type,
                        source,
                        report,
                    })
                }
            };
            if batch.is_empty() {
                continue;
            }
            tracing::debug!(event_type = %event_type, count = batch.len(), "dispatching batch");

            for event in &batch {
                match self.handler.handle(event) {
                    Ok(()) => report.record(event_type, true),
                    Err(err) => {
                        tracing::warn!(
                            event_id = %event.id,
                            event_type = %event_type,
                            workspace = %event.workspace.display(),
                            error = %err,
                            "event handling failed",
                        );
                        report.record(event_type, false);
                    }
                }
            }
        }

        Ok(report)
    }
}

/// Paths of workspaces carrying the exact active sentinel.
pub fn active_workspace_paths(store: &dyn WorkspaceStore) -> Result<Vec<PathBuf>, StoreError> {
    Ok(store
        .active_workspaces()?
        .into_iter()
        .filter(Workspace::is_active)
        .map(|w| w.path)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_kinds_come_first() {
        assert_eq!(DISPATCH_ORDER[0], EventType::RebuildWorkspace);
        assert_eq!(DISPATCH_ORDER[1], EventType::OpenWorkspace);
        assert_eq!(DISPATCH_ORDER.len(), 6);
    }

    #[test]
    fn default_config_uses_shared_constants() {
        let config = DispatchConfig::default();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.statuses, RETRY_ELIGIBLE_STATUSES.to_vec());
        assert_eq!(DispatchConfig::with_batch_size(0).batch_size, 1);
    }

    #[test]
    fn report_counts_per_type() {
        let mut report = DispatchReport::default();
        report.record(EventType::AddFile, true);
        report.record(EventType::AddFile, false);
        report.record(EventType::DeleteFile, true);
        assert_eq!(report.handled(), 3);
        assert_eq!(report.by_type[&EventType::AddFile], 2);
    }
}
