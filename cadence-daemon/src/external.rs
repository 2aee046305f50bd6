//! Target systems backed by external programs.
//!
//! Every call runs `<program> <args…> <operation> <operands…>` and waits for
//! it. A non-zero exit is a [`TargetError`] carrying the program's stderr.

use std::path::{Path, PathBuf};
use std::process::Command;

use cadence_core::config::CommandSettings;
use cadence_dispatch::{
    DocGenerator, ExportOptions, GeneratedDoc, IndexEngine, IndexMetrics, TargetError,
};

#[derive(Debug, Clone)]
struct ProgramRunner {
    program: PathBuf,
    args: Vec<String>,
}

impl ProgramRunner {
    fn new(settings: &CommandSettings) -> Self {
        Self {
            program: settings.program.clone(),
            args: settings.args.clone(),
        }
    }

    /// Run one operation and return its stdout.
    fn run<I, S>(&self, operation: &str, operands: I) -> Result<String, TargetError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(operation)
            .args(operands)
            .output()
            .map_err(|err| {
                TargetError::new(format!(
                    "failed to run {} {operation}: {err}",
                    self.program.display()
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TargetError::new(format!(
                "{} {operation} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn with_workspace<'a>(workspace: &'a Path, paths: &'a [PathBuf]) -> Vec<&'a Path> {
    std::iter::once(workspace)
        .chain(paths.iter().map(PathBuf::as_path))
        .collect()
}

// ---------------------------------------------------------------------------
// Index engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CommandIndexEngine {
    runner: ProgramRunner,
}

impl CommandIndexEngine {
    pub fn new(settings: &CommandSettings) -> Self {
        Self {
            runner: ProgramRunner::new(settings),
        }
    }
}

impl IndexEngine for CommandIndexEngine {
    fn index_files(&self, workspace: &Path, paths: &[PathBuf]) -> Result<(), TargetError> {
        self.runner
            .run("index-files", with_workspace(workspace, paths))
            .map(|_| ())
    }

    fn remove_indexes(&self, workspace: &Path, paths: &[PathBuf]) -> Result<(), TargetError> {
        self.runner
            .run("remove-indexes", with_workspace(workspace, paths))
            .map(|_| ())
    }

    fn rename_indexes(
        &self,
        workspace: &Path,
        source: &Path,
        target: &Path,
    ) -> Result<(), TargetError> {
        self.runner
            .run("rename-indexes", [workspace, source, target])
            .map(|_| ())
    }

    /// Metrics are read from stdout as JSON; anything else counts as zero.
    fn index_workspace(&self, workspace: &Path) -> Result<IndexMetrics, TargetError> {
        let stdout = self.runner.run("index-workspace", [workspace])?;
        match serde_json::from_str(stdout.trim()) {
            Ok(metrics) => Ok(metrics),
            Err(err) => {
                tracing::debug!(error = %err, "index-workspace printed no metrics");
                Ok(IndexMetrics::default())
            }
        }
    }

    fn remove_all_indexes(&self, workspace: &Path) -> Result<(), TargetError> {
        self.runner
            .run("remove-all-indexes", [workspace])
            .map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// Document generator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CommandDocGenerator {
    runner: ProgramRunner,
}

impl CommandDocGenerator {
    pub fn new(settings: &CommandSettings) -> Self {
        Self {
            runner: ProgramRunner::new(settings),
        }
    }

    fn export(
        &self,
        operation: &str,
        workspace: &Path,
        options: &ExportOptions,
    ) -> Result<(), TargetError> {
        let mut operands = vec![
            workspace.as_os_str().to_owned(),
            "--out-dir".into(),
            options.out_dir.as_os_str().to_owned(),
            "--format".into(),
            options.format.as_str().into(),
            "--mode".into(),
            options.mode.as_str().into(),
        ];
        if let Some(filename) = &options.filename {
            operands.push("--filename".into());
            operands.push(filename.into());
        }
        self.runner.run(operation, operands).map(|_| ())
    }
}

impl DocGenerator for CommandDocGenerator {
    fn generate_rules(&self, workspace: &Path) -> Result<GeneratedDoc, TargetError> {
        let content = self.runner.run("generate-rules", [workspace])?;
        Ok(GeneratedDoc { content })
    }

    fn generate_wiki(&self, workspace: &Path) -> Result<GeneratedDoc, TargetError> {
        let content = self.runner.run("generate-wiki", [workspace])?;
        Ok(GeneratedDoc { content })
    }

    fn export_rules(&self, workspace: &Path, options: &ExportOptions) -> Result<(), TargetError> {
        self.export("export-rules", workspace, options)
    }

    fn export_wiki(&self, workspace: &Path, options: &ExportOptions) -> Result<(), TargetError> {
        self.export("export-wiki", workspace, options)
    }
}
