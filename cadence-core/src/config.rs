//! Daemon settings loaded from `~/.cadence/config.yaml`.
//!
//! Every field has a default, so a missing file (or a file that only sets a
//! few keys) is valid.
//!
//! ```yaml
//! dispatch:
//!   batch_size: 10
//!   tick_seconds: 10
//! scanner:
//!   max_file_size_kb: 200
//! indexer:
//!   program: /usr/local/bin/codegraph
//!   args: ["--quiet"]
//! docs:
//!   program: /usr/local/bin/docgen
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, StoreError};
use crate::layout;

/// Folder patterns ignored in every codebase before `.gitignore`/`.coignore`.
pub const DEFAULT_FOLDER_IGNORES: &[&str] = &[
    ".*",
    "logs/",
    "temp/",
    "tmp/",
    "node_modules/",
    "bin/",
    "dist/",
    "build/",
    "out/",
    "__pycache__/",
    "venv/",
    "target/",
    "vendor/",
    "!.costrict/wiki/",
];

pub const DEFAULT_MAX_FILE_SIZE_KB: u64 = 10 * 1024;
pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_TICK_SECONDS: u64 = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub dispatch: DispatchSettings,
    pub scanner: ScannerSettings,
    pub indexer: Option<CommandSettings>,
    pub docs: Option<CommandSettings>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    pub batch_size: usize,
    pub tick_seconds: u64,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            tick_seconds: DEFAULT_TICK_SECONDS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerSettings {
    /// Raw override; read through [`ScannerSettings::max_file_size_kb`].
    #[serde(rename = "max_file_size_kb", skip_serializing_if = "Option::is_none")]
    pub max_file_size_override: Option<u64>,
    pub folder_ignore_patterns: Vec<String>,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            max_file_size_override: None,
            folder_ignore_patterns: DEFAULT_FOLDER_IGNORES
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl ScannerSettings {
    /// Size ceiling in KB. Overrides outside `(10, 500]` fall back to the
    /// default.
    pub fn max_file_size_kb(&self) -> u64 {
        match self.max_file_size_override {
            Some(kb) if kb > 10 && kb <= 500 => kb,
            _ => DEFAULT_MAX_FILE_SIZE_KB,
        }
    }
}

/// An external program adapter: `<program> <args…> <operation> <operands…>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSettings {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Settings {
    /// Load settings from `<home>/.cadence/config.yaml`, or defaults if absent.
    pub fn load_at(home: &Path) -> Result<Self, StoreError> {
        let path = layout::config_path(home);
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&contents).map_err(|source| StoreError::Yaml { path, source })
    }

    /// `load_at` convenience wrapper.
    pub fn load() -> Result<Self, StoreError> {
        Self::load_at(&layout::home()?)
    }
}
