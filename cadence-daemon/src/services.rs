//! The daemon's synchronous core: stores, dispatchers and the registration
//! service wired from [`Settings`].
//!
//! Everything here blocks; the runtime calls it from `spawn_blocking`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use cadence_core::config::Settings;
use cadence_core::reader::{FsWorkspaceReader, WorkspaceReader};
use cadence_core::registry::FileCodebaseStore;
use cadence_core::store::{JsonEventStore, JsonWorkspaceStore};
use cadence_detector::{GitCodebaseResolver, ScannerIgnoreLoader};
use cadence_dispatch::{
    active_workspace_paths, index_status, intake, DispatchConfig, DispatchReport, Dispatcher, DocGenerator,
    DocHandler, DocReport, IndexEngine, IndexHandler,
};
use cadence_sync::{HttpSyncClient, RegistrationService};

use crate::error::DaemonError;
use crate::external::{CommandDocGenerator, CommandIndexEngine};
use crate::protocol::DaemonRequest;

/// Outcome of one dispatch tick.
#[derive(Debug, Clone, Serialize)]
pub struct TickSummary {
    pub source: String,
    pub at: DateTime<Utc>,
    pub workspaces: usize,
    /// `None` when no index engine is configured.
    pub dispatch: Option<DispatchReport>,
    /// `None` when no document generator is configured.
    pub docs: Option<DocReport>,
    pub duration_ms: u128,
}

pub struct Services {
    home: PathBuf,
    tick_interval: Duration,
    events: Arc<JsonEventStore>,
    workspaces: Arc<JsonWorkspaceStore>,
    dispatcher: Option<Dispatcher<IndexHandler>>,
    docs: Option<DocHandler>,
    registration: RegistrationService,
}

impl Services {
    /// Wire the configured external programs as target systems.
    pub fn from_settings(home: &Path, settings: &Settings) -> Result<Self, DaemonError> {
        let engine = settings
            .indexer
            .as_ref()
            .map(|cmd| Arc::new(CommandIndexEngine::new(cmd)) as Arc<dyn IndexEngine>);
        let generator = settings
            .docs
            .as_ref()
            .map(|cmd| Arc::new(CommandDocGenerator::new(cmd)) as Arc<dyn DocGenerator>);
        Self::with_targets(home, settings, engine, generator)
    }

    /// Like [`Services::from_settings`] with the target systems supplied by
    /// the caller. A missing target disables its part of the tick.
    pub fn with_targets(
        home: &Path,
        settings: &Settings,
        engine: Option<Arc<dyn IndexEngine>>,
        generator: Option<Arc<dyn DocGenerator>>,
    ) -> Result<Self, DaemonError> {
        let events = Arc::new(JsonEventStore::open_at(home)?);
        let workspaces = Arc::new(JsonWorkspaceStore::open_at(home)?);
        let reader: Arc<dyn WorkspaceReader> = Arc::new(FsWorkspaceReader);

        let dispatcher = engine.map(|engine| {
            let handler =
                IndexHandler::new(events.clone(), workspaces.clone(), engine, reader.clone());
            Dispatcher::new(
                events.clone(),
                handler,
                DispatchConfig::with_batch_size(settings.dispatch.batch_size),
            )
        });
        let docs = generator.map(|generator| DocHandler::new(generator, reader.clone()));

        let registration = RegistrationService::new(
            Arc::new(GitCodebaseResolver),
            Arc::new(FileCodebaseStore::new(home)),
            Arc::new(HttpSyncClient::new()),
            Arc::new(ScannerIgnoreLoader::new(
                settings.scanner.folder_ignore_patterns.clone(),
            )),
            reader,
            settings.scanner.max_file_size_kb(),
        );

        if dispatcher.is_none() {
            tracing::warn!("no indexer configured; index events stay pending");
        }
        if docs.is_none() {
            tracing::info!("no docs generator configured; documentation pass disabled");
        }

        Ok(Self {
            home: home.to_path_buf(),
            tick_interval: Duration::from_secs(settings.dispatch.tick_seconds.max(1)),
            events,
            workspaces,
            dispatcher,
            docs,
            registration,
        })
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub fn indexer_enabled(&self) -> bool {
        self.dispatcher.is_some()
    }

    pub fn docs_enabled(&self) -> bool {
        self.docs.is_some()
    }

    /// One dispatch tick: active workspaces through the index dispatcher,
    /// then the documentation pass.
    pub fn tick(&self, source: &str) -> Result<TickSummary, DaemonError> {
        let started = Instant::now();
        let paths = active_workspace_paths(self.workspaces.as_ref())?;

        let dispatch = match &self.dispatcher {
            Some(dispatcher) => Some(dispatcher.process_events(&paths)?),
            None => None,
        };
        let docs = self.docs.as_ref().map(|docs| docs.process_workspaces(&paths));

        let summary = TickSummary {
            source: source.to_string(),
            at: Utc::now(),
            workspaces: paths.len(),
            dispatch,
            docs,
            duration_ms: started.elapsed().as_millis(),
        };
        if summary.dispatch.as_ref().map_or(0, DispatchReport::handled) > 0 {
            tracing::info!(
                source,
                workspaces = summary.workspaces,
                succeeded = summary.dispatch.as_ref().map_or(0, |r| r.succeeded),
                failed = summary.dispatch.as_ref().map_or(0, |r| r.failed),
                duration_ms = summary.duration_ms,
                "dispatch tick completed",
            );
        }
        Ok(summary)
    }

    /// Serve a registration, sync or intake request. Runtime commands
    /// (status, stop, dispatch) are answered by the runtime itself.
    pub fn handle(&self, request: &DaemonRequest) -> Result<Value, DaemonError> {
        match request {
            DaemonRequest::Register(req) => {
                let codebases = self.registration.register(req)?;
                Ok(json!({ "codebases": codebases }))
            }
            DaemonRequest::Unregister(req) => {
                let codebases = self.registration.unregister(req)?;
                Ok(json!({ "codebases": codebases }))
            }
            DaemonRequest::Sync(req) => {
                let codebases = self.registration.sync(req)?;
                Ok(json!({ "codebases": codebases }))
            }
            DaemonRequest::CheckIgnore(req) => {
                Ok(serde_json::to_value(self.registration.check_ignore(req)?)?)
            }
            DaemonRequest::SyncConfig(config) => {
                self.registration.update_sync_config(config.clone());
                Ok(json!({ "updated": true, "server_url": config.server_url }))
            }
            DaemonRequest::Publish { workspace, events } => {
                let accepted = intake::publish_events(
                    self.events.as_ref(),
                    self.workspaces.as_ref(),
                    workspace,
                    events,
                )?;
                Ok(json!({ "accepted": accepted, "received": events.len() }))
            }
            DaemonRequest::Switch { workspace, switch } => {
                let changed = intake::switch_index(self.workspaces.as_ref(), workspace, switch)?;
                Ok(json!({ "changed": changed, "switch": switch }))
            }
            DaemonRequest::Trigger { workspace } => {
                let event_id =
                    intake::trigger_index(self.events.as_ref(), self.workspaces.as_ref(), workspace)?;
                Ok(json!({ "event_id": event_id, "workspace": workspace }))
            }
            DaemonRequest::IndexStatus { workspace } => {
                let status =
                    index_status(self.events.as_ref(), self.workspaces.as_ref(), workspace)?;
                Ok(serde_json::to_value(status)?)
            }
            DaemonRequest::Status | DaemonRequest::Stop | DaemonRequest::Dispatch => Err(
                DaemonError::Protocol(format!("'{}' is handled by the runtime", request.name())),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::store::{EventStore, WorkspaceStore};
    use cadence_core::{ClientId, EventKind, EventStatus};
    use cadence_dispatch::{IndexMetrics, TargetError};
    use cadence_sync::WorkspaceRequest;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingEngine {
        indexed: Mutex<Vec<PathBuf>>,
    }

    impl IndexEngine for CountingEngine {
        fn index_files(&self, _w: &Path, paths: &[PathBuf]) -> Result<(), TargetError> {
            self.indexed.lock().unwrap().extend_from_slice(paths);
            Ok(())
        }
        fn remove_indexes(&self, _w: &Path, _p: &[PathBuf]) -> Result<(), TargetError> {
            Ok(())
        }
        fn rename_indexes(&self, _w: &Path, _s: &Path, _t: &Path) -> Result<(), TargetError> {
            Ok(())
        }
        fn index_workspace(&self, _w: &Path) -> Result<IndexMetrics, TargetError> {
            Ok(IndexMetrics::default())
        }
        fn remove_all_indexes(&self, _w: &Path) -> Result<(), TargetError> {
            Ok(())
        }
    }

    fn setup(engine: Option<Arc<dyn IndexEngine>>) -> (TempDir, PathBuf, Services) {
        let home = TempDir::new().unwrap();
        let workspace = home.path().join("project");
        std::fs::create_dir_all(&workspace).unwrap();
        let services =
            Services::with_targets(home.path(), &Settings::default(), engine, None).unwrap();
        (home, workspace, services)
    }

    #[test]
    fn tick_indexes_published_files() {
        let engine = Arc::new(CountingEngine::default());
        let (_home, workspace, services) = setup(Some(engine.clone() as Arc<dyn IndexEngine>));
        std::fs::write(workspace.join("main.rs"), "fn main() {}").unwrap();

        services
            .handle(&DaemonRequest::Publish {
                workspace: workspace.clone(),
                events: vec![
                    EventKind::OpenWorkspace,
                    EventKind::AddFile {
                        path: PathBuf::from("main.rs"),
                    },
                ],
            })
            .unwrap();
        let summary = services.tick("test").unwrap();

        assert_eq!(summary.workspaces, 1);
        let report = summary.dispatch.unwrap();
        assert_eq!(report.failed, 0);
        assert_eq!(report.succeeded, 2);
        assert_eq!(*engine.indexed.lock().unwrap(), vec![workspace.join("main.rs")]);
        assert!(summary.docs.is_none());
    }

    #[test]
    fn without_indexer_events_stay_pending() {
        let (_home, workspace, services) = setup(None);

        services
            .handle(&DaemonRequest::Publish {
                workspace: workspace.clone(),
                events: vec![EventKind::OpenWorkspace],
            })
            .unwrap();
        let summary = services.tick("test").unwrap();

        assert!(summary.dispatch.is_none());
        let pending = services
            .events
            .latest_event_for_source(&workspace, None)
            .unwrap()
            .unwrap();
        assert_eq!(pending.index_status, EventStatus::Init);
    }

    #[test]
    fn switch_off_removes_workspace_from_tick() {
        let (_home, workspace, services) =
            setup(Some(Arc::new(CountingEngine::default()) as Arc<dyn IndexEngine>));
        services
            .handle(&DaemonRequest::Publish {
                workspace: workspace.clone(),
                events: vec![EventKind::OpenWorkspace],
            })
            .unwrap();

        let data = services
            .handle(&DaemonRequest::Switch {
                workspace: workspace.clone(),
                switch: "off".into(),
            })
            .unwrap();

        assert_eq!(data["changed"], true);
        assert!(services.workspaces.active_workspaces().unwrap().is_empty());
        assert_eq!(services.tick("test").unwrap().workspaces, 0);
    }

    #[test]
    fn trigger_then_tick_reports_success() {
        let (_home, workspace, services) =
            setup(Some(Arc::new(CountingEngine::default()) as Arc<dyn IndexEngine>));

        let data = services
            .handle(&DaemonRequest::Trigger {
                workspace: workspace.clone(),
            })
            .unwrap();
        assert!(data["event_id"].as_u64().is_some());

        let status = services
            .handle(&DaemonRequest::IndexStatus {
                workspace: workspace.clone(),
            })
            .unwrap();
        assert_eq!(status["state"], "running");
        assert_eq!(status["events"]["init"], 1);

        services.tick("test").unwrap();
        let status = services
            .handle(&DaemonRequest::IndexStatus {
                workspace: workspace.clone(),
            })
            .unwrap();
        assert_eq!(status["state"], "success");
        assert_eq!(status["events"]["success"], 1);
    }

    #[test]
    fn status_of_untracked_workspace_is_an_error() {
        let (_home, workspace, services) = setup(None);
        let err = services
            .handle(&DaemonRequest::IndexStatus { workspace })
            .unwrap_err();
        assert!(matches!(err, DaemonError::Intake(_)));
    }

    #[test]
    fn register_returns_codebases() {
        let (_home, workspace, services) = setup(None);

        let data = services
            .handle(&DaemonRequest::Register(WorkspaceRequest {
                client_id: ClientId::from("c1"),
                workspace_path: workspace.clone(),
                workspace_name: "project".into(),
                file_paths: vec![],
            }))
            .unwrap();

        assert_eq!(data["codebases"].as_array().unwrap().len(), 1);
        assert_eq!(data["codebases"][0]["codebase_name"], "project");
    }

    #[test]
    fn runtime_commands_are_rejected() {
        let (_home, _workspace, services) = setup(None);
        let err = services.handle(&DaemonRequest::Stop).unwrap_err();
        assert!(err.to_string().contains("'stop' is handled by the runtime"));
    }
}
