//! Documentation handler.
//!
//! On open-workspace, generate and export every configured artifact that is
//! not already on disk. Existing artifacts are never regenerated. Errors are
//! collected per artifact and returned together.
//!
//! Documentation is best-effort: this handler writes no event status. The
//! daemon calls [`DocHandler::process_workspaces`] on every tick, so a failed
//! artifact is retried until it exists.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use cadence_core::reader::WorkspaceReader;
use cadence_core::{Event, EventKind};

use crate::error::HandleError;
use crate::lifecycle::{check_precondition, Expect, Precondition};
use crate::targets::{DocGenerator, ExportFormat, ExportMode, ExportOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Rules,
    Wiki,
}

/// Where an artifact lives and how it is exported. Paths are relative to the
/// workspace root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactSpec {
    pub kind: ArtifactKind,
    /// Presence of this file means the artifact exists.
    pub marker: &'static str,
    pub out_dir: &'static str,
    pub format: ExportFormat,
    pub mode: ExportMode,
    pub filename: Option<&'static str>,
}

pub const RULES_ARTIFACT: ArtifactSpec = ArtifactSpec {
    kind: ArtifactKind::Rules,
    marker: ".roo/rules-code/generated-rules.md",
    out_dir: ".roo/rules-code",
    format: ExportFormat::Markdown,
    mode: ExportMode::Single,
    filename: Some("generated-rules.md"),
};

pub const WIKI_ARTIFACT: ArtifactSpec = ArtifactSpec {
    kind: ArtifactKind::Wiki,
    marker: ".costrict/wiki/index.md",
    out_dir: ".costrict/wiki",
    format: ExportFormat::Markdown,
    mode: ExportMode::Multi,
    filename: None,
};

/// Rules first, then the wiki.
pub const DEFAULT_ARTIFACTS: &[ArtifactSpec] = &[RULES_ARTIFACT, WIKI_ARTIFACT];

/// Tally of a [`DocHandler::process_workspaces`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocReport {
    pub workspaces: usize,
    pub generated: usize,
    pub failed: usize,
}

pub struct DocHandler {
    generator: Arc<dyn DocGenerator>,
    reader: Arc<dyn WorkspaceReader>,
    artifacts: Vec<ArtifactSpec>,
}

impl DocHandler {
    pub fn new(generator: Arc<dyn DocGenerator>, reader: Arc<dyn WorkspaceReader>) -> Self {
        Self {
            generator,
            reader,
            artifacts: DEFAULT_ARTIFACTS.to_vec(),
        }
    }

    pub fn with_artifacts(mut self, artifacts: Vec<ArtifactSpec>) -> Self {
        self.artifacts = artifacts;
        self
    }

    /// Only open-workspace affects documentation.
    pub fn handle(&self, event: &Event) -> Result<(), HandleError> {
        match event.kind {
            EventKind::OpenWorkspace => self.ensure_artifacts(&event.workspace).map(|_| ()),
            EventKind::AddFile { .. }
            | EventKind::ModifyFile { .. }
            | EventKind::DeleteFile { .. }
            | EventKind::RenameFile { .. }
            | EventKind::RebuildWorkspace => Ok(()),
        }
    }

    /// Run the open-workspace flow for every workspace in `workspaces`.
    pub fn process_workspaces(&self, workspaces: &[PathBuf]) -> DocReport {
        let mut report = DocReport::default();
        for workspace in workspaces {
            report.workspaces += 1;
            match self.ensure_artifacts(workspace) {
                Ok(generated) => report.generated += generated,
                Err(err) => {
                    tracing::warn!(
                        workspace = %workspace.display(),
                        error = %err,
                        "documentation generation failed",
                    );
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Generate missing artifacts; returns how many were produced.
    pub fn ensure_artifacts(&self, workspace: &Path) -> Result<usize, HandleError> {
        match check_precondition(self.reader.as_ref(), workspace, Expect::Directory) {
            Precondition::Fail(err) => return Err(err),
            Precondition::Skip => return Ok(0),
            Precondition::Proceed => {}
        }

        let mut generated = 0;
        let mut errors = Vec::new();
        for spec in &self.artifacts {
            match self.ensure_artifact(workspace, spec) {
                Ok(true) => generated += 1,
                Ok(false) => {}
                Err(err) => errors.push(err),
            }
        }

        match errors.len() {
            0 => Ok(generated),
            1 => Err(errors.remove(0)),
            _ => Err(HandleError::Multiple(errors)),
        }
    }

    /// `Ok(true)` when generated, `Ok(false)` when already present.
    fn ensure_artifact(&self, workspace: &Path, spec: &ArtifactSpec) -> Result<bool, HandleError> {
        let marker = workspace.join(spec.marker);
        // An unreadable marker counts as absent.
        let present = match self.reader.exists(&marker) {
            Ok(present) => present,
            Err(err) => {
                tracing::warn!(path = %marker.display(), error = %err, "cannot check artifact, generating");
                false
            }
        };
        if present {
            tracing::debug!(artifact = ?spec.kind, path = %marker.display(), "artifact present, skipping");
            return Ok(false);
        }

        let options = ExportOptions {
            out_dir: workspace.join(spec.out_dir),
            format: spec.format,
            mode: spec.mode,
            filename: spec.filename.map(str::to_string),
        };
        match spec.kind {
            ArtifactKind::Rules => {
                self.generator
                    .generate_rules(workspace)
                    .map_err(HandleError::delegation("generate rules", workspace))?;
                self.generator
                    .export_rules(workspace, &options)
                    .map_err(HandleError::delegation("export rules", workspace))?;
            }
            ArtifactKind::Wiki => {
                self.generator
                    .generate_wiki(workspace)
                    .map_err(HandleError::delegation("generate wiki", workspace))?;
                self.generator
                    .export_wiki(workspace, &options)
                    .map_err(HandleError::delegation("export wiki", workspace))?;
            }
        }
        tracing::info!(artifact = ?spec.kind, workspace = %workspace.display(), "artifact generated");
        Ok(true)
    }
}
