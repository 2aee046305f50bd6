//! `cadence publish|switch|trigger|index-status|dispatch`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::Value;
use tabled::{settings::Style, Table, Tabled};

use cadence_daemon::DaemonRequest;

use super::{absolute, call_daemon, print_json};
use crate::EventArg;

/// Arguments for `cadence publish`.
#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Workspace the events belong to.
    pub workspace: PathBuf,

    /// `open`, `rebuild`, `add:<path>`, `modify:<path>`, `delete:<path>` or
    /// `rename:<source>=<target>`. Repeatable.
    #[arg(long = "event", short = 'e', required = true)]
    pub events: Vec<EventArg>,
}

impl PublishArgs {
    pub fn run(self) -> Result<()> {
        let workspace = absolute(&self.workspace)?;
        let data = call_daemon(&DaemonRequest::Publish {
            workspace: workspace.clone(),
            events: self.events.into_iter().map(Into::into).collect(),
        })?;

        let accepted = data["accepted"].as_u64().unwrap_or(0);
        let received = data["received"].as_u64().unwrap_or(0);
        if accepted == received {
            println!(
                "{} queued {accepted} event(s) for {}",
                "✓".green(),
                workspace.display()
            );
        } else {
            println!(
                "{} queued {accepted} of {received} event(s) for {}; see the daemon log",
                "!".yellow(),
                workspace.display()
            );
        }
        Ok(())
    }
}

/// Arguments for `cadence switch`.
#[derive(Args, Debug)]
pub struct SwitchArgs {
    /// Tracked workspace.
    pub workspace: PathBuf,

    #[arg(value_parser = ["on", "off"])]
    pub switch: String,
}

impl SwitchArgs {
    pub fn run(self) -> Result<()> {
        let workspace = absolute(&self.workspace)?;
        let data = call_daemon(&DaemonRequest::Switch {
            workspace: workspace.clone(),
            switch: self.switch.clone(),
        })?;
        if data["changed"].as_bool().unwrap_or(false) {
            println!(
                "{} indexing {} for {}",
                "✓".green(),
                self.switch,
                workspace.display()
            );
        } else {
            println!(
                "indexing already {} for {}",
                self.switch,
                workspace.display()
            );
        }
        Ok(())
    }
}

/// Arguments for `cadence trigger`.
#[derive(Args, Debug)]
pub struct TriggerArgs {
    /// Workspace to index; tracked and switched on if needed.
    pub workspace: PathBuf,
}

impl TriggerArgs {
    pub fn run(self) -> Result<()> {
        let workspace = absolute(&self.workspace)?;
        let data = call_daemon(&DaemonRequest::Trigger {
            workspace: workspace.clone(),
        })?;
        println!(
            "{} queued full index of {} (event {})",
            "✓".green(),
            workspace.display(),
            data["event_id"]
        );
        Ok(())
    }
}

/// Arguments for `cadence index-status`.
#[derive(Args, Debug)]
pub struct IndexStatusArgs {
    /// Tracked workspace.
    pub workspace: PathBuf,

    /// Emit the status as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct CountRow {
    #[tabled(rename = "status")]
    status: &'static str,
    #[tabled(rename = "events")]
    events: u64,
}

impl IndexStatusArgs {
    pub fn run(self) -> Result<()> {
        let workspace = absolute(&self.workspace)?;
        let data = call_daemon(&DaemonRequest::IndexStatus { workspace })?;
        if self.json {
            return print_json(&data);
        }
        print_index_status(&data)
    }
}

fn print_index_status(data: &Value) -> Result<()> {
    let state = data["state"].as_str().context("unexpected daemon response")?;
    let label = match state {
        "success" => state.green(),
        "failed" => state.red(),
        "running" => state.yellow(),
        _ => state.normal(),
    };
    println!(
        "{}: {label}, {} file(s) indexed",
        data["workspace"].as_str().unwrap_or_default(),
        data["indexed_files"].as_u64().unwrap_or(0)
    );

    let counts = &data["events"];
    let rows: Vec<CountRow> = ["init", "building", "failed", "success"]
        .into_iter()
        .map(|status| CountRow {
            status,
            events: counts[status].as_u64().unwrap_or(0),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    if let Some(failed) = data["failed_paths"].as_array().filter(|f| !f.is_empty()) {
        println!("failed:");
        for path in failed {
            println!("  {}", path.as_str().unwrap_or_default());
        }
    }
    Ok(())
}

/// Arguments for `cadence dispatch`.
#[derive(Args, Debug)]
pub struct DispatchArgs {
    /// Emit the tick summary as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct TypeRow {
    #[tabled(rename = "event type")]
    event_type: String,
    #[tabled(rename = "handled")]
    handled: u64,
}

impl DispatchArgs {
    pub fn run(self) -> Result<()> {
        let data = call_daemon(&DaemonRequest::Dispatch)?;
        if self.json {
            return print_json(&data);
        }
        print_tick(&data)
    }
}

fn print_tick(data: &Value) -> Result<()> {
    let workspaces = data["workspaces"].as_u64().unwrap_or(0);
    let dispatch = &data["dispatch"];
    if dispatch.is_null() {
        println!(
            "{} no indexer configured; {workspaces} active workspace(s) left pending",
            "!".yellow()
        );
    } else {
        let succeeded = dispatch["succeeded"].as_u64().unwrap_or(0);
        let failed = dispatch["failed"].as_u64().unwrap_or(0);
        let mark = if failed == 0 { "✓".green() } else { "✗".red() };
        println!(
            "{mark} dispatched {} event(s) across {workspaces} workspace(s): {succeeded} succeeded, {failed} failed",
            succeeded + failed
        );

        let by_type = dispatch["by_type"]
            .as_object()
            .context("unexpected daemon response")?;
        if !by_type.is_empty() {
            let rows: Vec<TypeRow> = by_type
                .iter()
                .map(|(event_type, count)| TypeRow {
                    event_type: event_type.clone(),
                    handled: count.as_u64().unwrap_or(0),
                })
                .collect();
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{table}");
        }
    }

    let docs = &data["docs"];
    if !docs.is_null() {
        println!(
            "docs: {} generated, {} failed",
            docs["generated"].as_u64().unwrap_or(0),
            docs["failed"].as_u64().unwrap_or(0)
        );
    }
    Ok(())
}
