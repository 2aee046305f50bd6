//! Registration/sync service.
//!
//! Every operation resolves the workspace into codebase roots first, then
//! works per codebase. A failure on one codebase is logged and skipped; only
//! a failed resolution fails the whole request.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use cadence_core::reader::WorkspaceReader;
use cadence_core::registry::CodebaseStore;
use cadence_core::{ClientId, CodebaseConfig, CodebaseDescriptor, CodebaseRoot, SyncConfig};
use cadence_detector::{CodebaseResolver, IgnoreLoader};

use crate::client::SyncClient;
use crate::error::SyncError;

pub const REASON_NO_CODEBASE: &str = "no codebase found";
pub const REASON_NOTHING_IGNORED: &str = "no ignored files found";

/// A client request naming a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceRequest {
    pub client_id: ClientId,
    pub workspace_path: PathBuf,
    pub workspace_name: String,
    /// Absolute paths to check; only read by check-ignore.
    #[serde(default)]
    pub file_paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckIgnoreResult {
    /// Always `false`; callers read `ignored_files` and `reason`.
    pub should_ignore: bool,
    pub reason: String,
    pub ignored_files: Vec<PathBuf>,
}

impl CheckIgnoreResult {
    fn nothing(reason: &str) -> Self {
        Self {
            should_ignore: false,
            reason: reason.to_string(),
            ignored_files: Vec::new(),
        }
    }

    fn hit(reason: String, file: &Path) -> Self {
        Self {
            should_ignore: false,
            reason,
            ignored_files: vec![file.to_path_buf()],
        }
    }
}

pub struct RegistrationService {
    resolver: Arc<dyn CodebaseResolver>,
    store: Arc<dyn CodebaseStore>,
    client: Arc<dyn SyncClient>,
    ignore_loader: Arc<dyn IgnoreLoader>,
    reader: Arc<dyn WorkspaceReader>,
    max_file_size_kb: u64,
}

impl RegistrationService {
    pub fn new(
        resolver: Arc<dyn CodebaseResolver>,
        store: Arc<dyn CodebaseStore>,
        client: Arc<dyn SyncClient>,
        ignore_loader: Arc<dyn IgnoreLoader>,
        reader: Arc<dyn WorkspaceReader>,
        max_file_size_kb: u64,
    ) -> Self {
        Self {
            resolver,
            store,
            client,
            ignore_loader,
            reader,
            max_file_size_kb,
        }
    }

    pub fn client(&self) -> &Arc<dyn SyncClient> {
        &self.client
    }

    fn resolve(&self, request: &WorkspaceRequest) -> Result<Vec<CodebaseRoot>, SyncError> {
        self.resolver
            .find_codebase_paths(&request.workspace_path, &request.workspace_name)
            .map_err(|err| {
                tracing::error!(
                    "failed to find codebase paths for {}: {err}",
                    request.workspace_path.display()
                );
                SyncError::Resolve(err)
            })
    }

    /// Load the stored config for `root` if it belongs to `client_id`.
    fn owned_config(&self, root: &CodebaseRoot, client_id: &ClientId) -> Option<CodebaseConfig> {
        let id = self.resolver.codebase_id(&root.name, &root.path);
        let config = match self.store.load(&id) {
            Ok(config) => config,
            Err(err) => {
                tracing::error!("failed to get codebase config {id}: {err}");
                return None;
            }
        };
        if &config.client_id != client_id {
            tracing::warn!("codebase {id} does not belong to client {client_id}");
            return None;
        }
        Some(config)
    }

    // -----------------------------------------------------------------------
    // Register / unregister
    // -----------------------------------------------------------------------

    /// Persist a fresh config for every codebase root, overwriting any
    /// previous registration.
    pub fn register(&self, request: &WorkspaceRequest) -> Result<Vec<CodebaseConfig>, SyncError> {
        tracing::info!(
            "registering codebase for client {}, path: {}",
            request.client_id,
            request.workspace_path.display()
        );
        let mut registered = Vec::new();
        for root in self.resolve(request)? {
            let config = CodebaseConfig {
                client_id: request.client_id.clone(),
                codebase_id: self.resolver.codebase_id(&root.name, &root.path),
                codebase_name: root.name,
                codebase_path: root.path,
                hash_tree: Default::default(),
                last_sync: None,
                register_time: Utc::now(),
            };
            if let Err(err) = self.store.save(&config) {
                tracing::error!(
                    "failed to save codebase config for {}: {err}",
                    config.codebase_path.display()
                );
                continue;
            }
            tracing::info!(
                "registered codebase {} ({}) for client {}",
                config.codebase_name,
                config.codebase_id,
                request.client_id
            );
            registered.push(config);
        }
        Ok(registered)
    }

    pub fn unregister(
        &self,
        request: &WorkspaceRequest,
    ) -> Result<Vec<CodebaseDescriptor>, SyncError> {
        tracing::info!(
            "unregistering codebase for client {}, path: {}",
            request.client_id,
            request.workspace_path.display()
        );
        let mut removed = Vec::new();
        for root in self.resolve(request)? {
            let Some(config) = self.owned_config(&root, &request.client_id) else {
                continue;
            };
            if let Err(err) = self.store.delete(&config.codebase_id) {
                tracing::error!(
                    "failed to delete codebase config {}: {err}",
                    config.codebase_id
                );
                continue;
            }
            tracing::info!(
                "unregistered codebase {} ({}) for client {}",
                config.codebase_name,
                config.codebase_id,
                request.client_id
            );
            removed.push(config.descriptor());
        }
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Sync
    // -----------------------------------------------------------------------

    /// Fetch the server's hash tree for each owned codebase and record it
    /// with a fresh `last_sync`.
    pub fn sync(&self, request: &WorkspaceRequest) -> Result<Vec<CodebaseConfig>, SyncError> {
        tracing::info!(
            "syncing codebase for client {}, path: {}",
            request.client_id,
            request.workspace_path.display()
        );
        let mut synced = Vec::new();
        for root in self.resolve(request)? {
            let Some(mut config) = self.owned_config(&root, &request.client_id) else {
                continue;
            };

            let ready = self
                .client
                .sync_config()
                .map_or(false, |c| !c.server_url.is_empty() && !c.token.is_empty());
            if !ready {
                tracing::warn!(
                    "sync config not properly set for codebase {}",
                    config.codebase_id
                );
                continue;
            }

            let tree = match self.client.fetch_server_hash_tree(&root.path) {
                Ok(tree) => tree,
                Err(err) => {
                    tracing::error!(
                        "failed to fetch server hash tree for {}: {err}",
                        config.codebase_id
                    );
                    continue;
                }
            };

            config.hash_tree = tree;
            config.last_sync = Some(Utc::now());
            if let Err(err) = self.store.save(&config) {
                tracing::error!(
                    "failed to update last sync time for {}: {err}",
                    config.codebase_id
                );
                continue;
            }
            tracing::info!(
                "synced codebase {} ({}) for client {}",
                config.codebase_name,
                config.codebase_id,
                request.client_id
            );
            synced.push(config);
        }
        Ok(synced)
    }

    pub fn update_sync_config(&self, config: SyncConfig) {
        tracing::info!(
            "updated sync config for client {} with server {}",
            config.client_id,
            config.server_url
        );
        self.client.set_sync_config(config);
    }

    // -----------------------------------------------------------------------
    // Check-ignore
    // -----------------------------------------------------------------------

    /// Report the first file in `request.file_paths` that is oversize or
    /// matched by its codebase's ignore rules.
    pub fn check_ignore(&self, request: &WorkspaceRequest) -> Result<CheckIgnoreResult, SyncError> {
        tracing::info!(
            "checking ignore files for client {}, workspace: {}, files: {}",
            request.client_id,
            request.workspace_path.display(),
            request.file_paths.len()
        );
        let roots = self.resolve(request)?;
        if roots.is_empty() {
            tracing::warn!(
                "no codebase found in workspace: {}",
                request.workspace_path.display()
            );
            return Ok(CheckIgnoreResult::nothing(REASON_NO_CODEBASE));
        }

        let max_bytes = self.max_file_size_kb.saturating_mul(1024);
        for root in &roots {
            let rules = match self.ignore_loader.load(&root.path) {
                Ok(Some(rules)) => rules,
                Ok(None) => {
                    tracing::warn!("no ignore file found for codebase: {}", root.path.display());
                    continue;
                }
                Err(err) => {
                    tracing::warn!(
                        "failed to load ignore rules for {}: {err}",
                        root.path.display()
                    );
                    continue;
                }
            };

            for file in &request.file_paths {
                let Ok(rel) = file.strip_prefix(&root.path) else {
                    tracing::debug!(
                        "file path {} is not in codebase {}",
                        file.display(),
                        root.path.display()
                    );
                    continue;
                };
                let info = match self.reader.stat(file) {
                    Ok(info) => info,
                    Err(err) => {
                        tracing::warn!("failed to get file info: {}, {err}", file.display());
                        continue;
                    }
                };

                let mut check_path = rel.to_string_lossy().replace('\\', "/");
                if info.is_dir {
                    check_path.push('/');
                } else if info.size > max_bytes {
                    let size_kb = info.size as f64 / 1024.0;
                    let reason =
                        format!("file size exceeded limit: {} ({size_kb:.2}KB)", file.display());
                    tracing::info!("{reason}");
                    return Ok(CheckIgnoreResult::hit(reason, file));
                }

                if rules.matches_path(&check_path) {
                    tracing::info!(
                        "ignore file found: {check_path} in codebase {}",
                        root.path.display()
                    );
                    return Ok(CheckIgnoreResult::hit(
                        format!("ignore file found:{}", file.display()),
                        file,
                    ));
                }
            }
        }

        tracing::info!(
            "no ignored files found, numFiles: {}",
            request.file_paths.len()
        );
        Ok(CheckIgnoreResult::nothing(REASON_NOTHING_IGNORED))
    }
}
