//! `cadence register|unregister|sync|sync-config|check-ignore`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Deserialize;
use serde_json::Value;
use tabled::{settings::Style, Table, Tabled};

use cadence_core::{ClientId, CodebaseConfig, CodebaseDescriptor, SyncConfig};
use cadence_daemon::DaemonRequest;
use cadence_sync::{CheckIgnoreResult, WorkspaceRequest};

use super::{absolute, call_daemon, print_json};

/// Workspace arguments shared by register, unregister and sync.
#[derive(Args, Debug)]
pub struct CodebaseArgs {
    /// Workspace directory.
    pub workspace: PathBuf,

    /// Client the registrations belong to.
    #[arg(long)]
    pub client_id: String,

    /// Workspace name; defaults to the directory name.
    #[arg(long)]
    pub name: Option<String>,

    /// Emit the daemon's JSON response.
    #[arg(long)]
    pub json: bool,
}

#[derive(Deserialize)]
struct Codebases<T> {
    codebases: Vec<T>,
}

#[derive(Tabled)]
struct CodebaseRow {
    #[tabled(rename = "codebase")]
    name: String,
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "path")]
    path: String,
    #[tabled(rename = "last sync")]
    last_sync: String,
}

impl From<&CodebaseConfig> for CodebaseRow {
    fn from(config: &CodebaseConfig) -> Self {
        Self {
            name: config.codebase_name.clone(),
            id: config.codebase_id.to_string(),
            path: config.codebase_path.display().to_string(),
            last_sync: config
                .last_sync
                .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "never".to_string()),
        }
    }
}

impl CodebaseArgs {
    fn request(&self, file_paths: Vec<PathBuf>) -> Result<WorkspaceRequest> {
        let workspace_path = absolute(&self.workspace)?;
        let workspace_name = match &self.name {
            Some(name) => name.clone(),
            None => workspace_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .with_context(|| {
                    format!("cannot derive a name from {}", workspace_path.display())
                })?,
        };
        Ok(WorkspaceRequest {
            client_id: ClientId::from(self.client_id.as_str()),
            workspace_path,
            workspace_name,
            file_paths,
        })
    }

    pub fn register(self) -> Result<()> {
        let data = call_daemon(&DaemonRequest::Register(self.request(vec![])?))?;
        if self.json {
            return print_json(&data);
        }
        let configs = decode::<CodebaseConfig>(data)?;
        if configs.is_empty() {
            println!("{} no codebases registered", "!".yellow());
            return Ok(());
        }
        println!(
            "{} registered {} codebase(s) for client '{}'",
            "✓".green(),
            configs.len(),
            self.client_id
        );
        print_codebases(&configs);
        Ok(())
    }

    pub fn unregister(self) -> Result<()> {
        let data = call_daemon(&DaemonRequest::Unregister(self.request(vec![])?))?;
        if self.json {
            return print_json(&data);
        }
        let removed = decode::<CodebaseDescriptor>(data)?;
        if removed.is_empty() {
            println!(
                "{} nothing unregistered for client '{}'",
                "!".yellow(),
                self.client_id
            );
            return Ok(());
        }
        for codebase in &removed {
            println!(
                "{} unregistered '{}' ({})",
                "✓".green(),
                codebase.name,
                codebase.id
            );
        }
        Ok(())
    }

    pub fn sync(self) -> Result<()> {
        let data = call_daemon(&DaemonRequest::Sync(self.request(vec![])?))?;
        if self.json {
            return print_json(&data);
        }
        let synced = decode::<CodebaseConfig>(data)?;
        if synced.is_empty() {
            println!(
                "{} nothing synced; check the daemon log and `cadence sync-config`",
                "!".yellow()
            );
            return Ok(());
        }
        println!("{} synced {} codebase(s)", "✓".green(), synced.len());
        print_codebases(&synced);
        Ok(())
    }
}

fn decode<T: for<'de> Deserialize<'de>>(data: Value) -> Result<Vec<T>> {
    let parsed: Codebases<T> =
        serde_json::from_value(data).context("unexpected daemon response")?;
    Ok(parsed.codebases)
}

fn print_codebases(configs: &[CodebaseConfig]) {
    let rows: Vec<CodebaseRow> = configs.iter().map(CodebaseRow::from).collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

// ---------------------------------------------------------------------------
// sync-config
// ---------------------------------------------------------------------------

/// Arguments for `cadence sync-config`.
#[derive(Args, Debug)]
pub struct SyncConfigArgs {
    #[arg(long)]
    pub client_id: String,

    /// Base URL of the sync server.
    #[arg(long)]
    pub server_url: String,

    /// Bearer token sent with every request.
    #[arg(long)]
    pub token: String,
}

impl SyncConfigArgs {
    pub fn run(self) -> Result<()> {
        let server_url = self.server_url.clone();
        call_daemon(&DaemonRequest::SyncConfig(SyncConfig {
            client_id: self.client_id,
            server_url: self.server_url,
            token: self.token,
        }))?;
        println!("{} sync config updated ({server_url})", "✓".green());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// check-ignore
// ---------------------------------------------------------------------------

/// Arguments for `cadence check-ignore`.
#[derive(Args, Debug)]
pub struct CheckIgnoreArgs {
    #[command(flatten)]
    pub workspace: CodebaseArgs,

    /// Files to check.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

impl CheckIgnoreArgs {
    pub fn run(self) -> Result<()> {
        let files = self
            .files
            .iter()
            .map(|f| absolute(f))
            .collect::<Result<Vec<_>>>()?;
        let data = call_daemon(&DaemonRequest::CheckIgnore(self.workspace.request(files)?))?;
        if self.workspace.json {
            return print_json(&data);
        }

        let result: CheckIgnoreResult =
            serde_json::from_value(data).context("unexpected daemon response")?;
        if result.ignored_files.is_empty() {
            println!("{} {}", "✓".green(), result.reason);
        } else {
            println!("{} {}", "✗".red(), result.reason);
            for file in &result.ignored_files {
                println!("  {}", file.display().to_string().yellow());
            }
        }
        Ok(())
    }
}
