//! Synchronization client: the single hash-tree fetch against the remote
//! codebase-indexer service, plus the in-memory [`SyncConfig`] it owns.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;

use serde::Deserialize;

use cadence_core::SyncConfig;

use crate::error::SyncError;

/// Relative path → content hash, as reported by the server.
pub type HashTree = BTreeMap<String, String>;

pub const HASH_TREE_ENDPOINT: &str = "/codebase-indexer/api/v1/codebases/hash";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub trait SyncClient: Send + Sync {
    fn fetch_server_hash_tree(&self, codebase_path: &Path) -> Result<HashTree, SyncError>;

    /// Snapshot of the current config; `None` until one is set.
    fn sync_config(&self) -> Option<SyncConfig>;

    /// Replace the config wholesale.
    fn set_sync_config(&self, config: SyncConfig);
}

/// `{code, message, data: {list}}`. Only `data` is read; the HTTP status
/// decides success.
#[derive(Debug, Deserialize)]
struct HashTreeResponse {
    #[serde(default)]
    data: HashTreeData,
}

#[derive(Debug, Default, Deserialize)]
struct HashTreeData {
    #[serde(default)]
    list: Vec<HashItem>,
}

#[derive(Debug, Deserialize)]
struct HashItem {
    path: String,
    hash: String,
}

/// [`SyncClient`] over blocking HTTP.
pub struct HttpSyncClient {
    agent: ureq::Agent,
    config: RwLock<Option<SyncConfig>>,
}

impl Default for HttpSyncClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpSyncClient {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build(),
            config: RwLock::new(None),
        }
    }

    pub fn with_config(config: SyncConfig) -> Self {
        let client = Self::new();
        client.set_sync_config(config);
        client
    }

    fn complete_config(&self) -> Result<SyncConfig, SyncError> {
        self.sync_config()
            .filter(SyncConfig::is_complete)
            .ok_or(SyncError::ConfigIncomplete)
    }
}

/// `{server}/codebase-indexer/api/v1/codebases/hash`, tolerating a trailing
/// slash on the server URL.
pub fn hash_tree_url(server_url: &str) -> String {
    format!("{}{HASH_TREE_ENDPOINT}", server_url.trim_end_matches('/'))
}

impl SyncClient for HttpSyncClient {
    fn fetch_server_hash_tree(&self, codebase_path: &Path) -> Result<HashTree, SyncError> {
        let config = self.complete_config()?;
        let url = hash_tree_url(&config.server_url);
        let codebase_path = codebase_path.to_string_lossy();
        tracing::debug!("fetching hash tree from {url} for {codebase_path}");

        let response = match self
            .agent
            .get(&url)
            .query("clientId", &config.client_id)
            .query("codebasePath", &codebase_path)
            .set("Authorization", &format!("Bearer {}", config.token))
            .call()
        {
            Ok(response) => response,
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                return Err(SyncError::Status { status, body });
            }
            Err(ureq::Error::Transport(source)) => {
                return Err(SyncError::Transport {
                    url,
                    source: Box::new(source),
                })
            }
        };

        if response.status() != 200 {
            let status = response.status();
            let body = response.into_string().unwrap_or_default();
            return Err(SyncError::Status { status, body });
        }

        let parsed: HashTreeResponse = response
            .into_json()
            .map_err(|source| SyncError::Decode { url, source })?;
        Ok(parsed
            .data
            .list
            .into_iter()
            .map(|item| (item.path, item.hash))
            .collect())
    }

    fn sync_config(&self) -> Option<SyncConfig> {
        match self.config.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set_sync_config(&self, config: SyncConfig) {
        let mut guard = match self.config.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(config);
    }
}
