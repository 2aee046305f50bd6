//! Target systems the handlers delegate to. Their internals live elsewhere;
//! the daemon wires in process-backed implementations.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::TargetError;

/// Whole-workspace indexing summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexMetrics {
    pub total_files: u64,
    pub total_succeed: u64,
    pub total_failed: u64,
}

/// The structural code index.
pub trait IndexEngine: Send + Sync {
    fn index_files(&self, workspace: &Path, paths: &[PathBuf]) -> Result<(), TargetError>;
    fn remove_indexes(&self, workspace: &Path, paths: &[PathBuf]) -> Result<(), TargetError>;
    fn rename_indexes(&self, workspace: &Path, source: &Path, target: &Path)
        -> Result<(), TargetError>;
    fn index_workspace(&self, workspace: &Path) -> Result<IndexMetrics, TargetError>;
    fn remove_all_indexes(&self, workspace: &Path) -> Result<(), TargetError>;
}

/// Opaque generated document; the generator keeps its own copy for export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedDoc {
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Markdown,
}

impl ExportFormat {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Markdown => "markdown",
        }
    }
}

/// One output file, or one file per page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportMode {
    Single,
    Multi,
}

impl ExportMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ExportMode::Single => "single",
            ExportMode::Multi => "multi",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    pub out_dir: PathBuf,
    pub format: ExportFormat,
    pub mode: ExportMode,
    /// Required for [`ExportMode::Single`].
    pub filename: Option<String>,
}

/// Documentation generator for rules and wiki artifacts.
pub trait DocGenerator: Send + Sync {
    fn generate_rules(&self, workspace: &Path) -> Result<GeneratedDoc, TargetError>;
    fn generate_wiki(&self, workspace: &Path) -> Result<GeneratedDoc, TargetError>;
    fn export_rules(&self, workspace: &Path, options: &ExportOptions) -> Result<(), TargetError>;
    fn export_wiki(&self, workspace: &Path, options: &ExportOptions) -> Result<(), TargetError>;
}
