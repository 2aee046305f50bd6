//! Cadence: event-driven sync orchestrator CLI.
//!
//! # Usage
//!
//! ```text
//! cadence daemon start [--detach] | stop | status | logs [--lines N] [--stderr-only]
//! cadence register <workspace> --client-id <id> [--name <name>] [--json]
//! cadence unregister <workspace> --client-id <id> [--json]
//! cadence sync <workspace> --client-id <id> [--json]
//! cadence sync-config --client-id <id> --server-url <url> --token <token>
//! cadence check-ignore <workspace> --client-id <id> <file>...
//! cadence publish <workspace> --event open --event add:src/lib.rs --event rename:a.rs=b.rs
//! cadence switch <workspace> on|off
//! cadence trigger <workspace>
//! cadence index-status <workspace> [--json]
//! cadence dispatch
//! ```
//!
//! Everything except `daemon start` and `daemon logs` talks to the running
//! daemon over its Unix socket.

mod commands;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use clap::{Parser, Subcommand};

use cadence_core::EventKind;
use commands::{
    codebase::{CheckIgnoreArgs, CodebaseArgs, SyncConfigArgs},
    daemon::DaemonCommand,
    events::{DispatchArgs, IndexStatusArgs, PublishArgs, SwitchArgs, TriggerArgs},
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "cadence",
    version,
    about = "Drive workspace change events into code indexes and documentation",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register every codebase in a workspace for a client.
    Register(CodebaseArgs),

    /// Remove a client's codebase registrations for a workspace.
    Unregister(CodebaseArgs),

    /// Fetch the server hash tree for each registered codebase.
    Sync(CodebaseArgs),

    /// Replace the daemon's sync endpoint and credentials.
    SyncConfig(SyncConfigArgs),

    /// Report the first file that is oversize or matched by ignore rules.
    CheckIgnore(CheckIgnoreArgs),

    /// Queue change events for a workspace.
    Publish(PublishArgs),

    /// Turn dispatch for a workspace on or off.
    Switch(SwitchArgs),

    /// Switch a workspace on and queue a full index.
    Trigger(TriggerArgs),

    /// Show how far indexing of a workspace has got.
    IndexStatus(IndexStatusArgs),

    /// Run a dispatch tick now.
    Dispatch(DispatchArgs),

    /// Manage the Cadence background daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

// ---------------------------------------------------------------------------
// Event argument `kind[:path[=target]]`
// ---------------------------------------------------------------------------

/// Thin wrapper so clap can parse an [`EventKind`] from one CLI string:
/// `open`, `rebuild`, `add:<path>`, `modify:<path>`, `delete:<path>`,
/// `rename:<source>=<target>`.
#[derive(Debug, Clone, PartialEq)]
pub struct EventArg(pub EventKind);

impl FromStr for EventArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (kind, operand) = match s.split_once(':') {
            Some((kind, operand)) => (kind, Some(operand)),
            None => (s, None),
        };
        let path = |name: &str| -> std::result::Result<PathBuf, String> {
            match operand {
                Some(p) if !p.is_empty() => Ok(PathBuf::from(p)),
                _ => Err(format!("'{name}' needs a path, e.g. {name}:src/lib.rs")),
            }
        };

        let event = match kind.to_ascii_lowercase().as_str() {
            "open" | "open_workspace" => EventKind::OpenWorkspace,
            "rebuild" | "rebuild_workspace" => EventKind::RebuildWorkspace,
            "add" | "add_file" => EventKind::AddFile { path: path("add")? },
            "modify" | "modify_file" => EventKind::ModifyFile {
                path: path("modify")?,
            },
            "delete" | "delete_file" => EventKind::DeleteFile {
                path: path("delete")?,
            },
            "rename" | "rename_file" => {
                let (source, target) = operand
                    .and_then(|o| o.split_once('='))
                    .filter(|(s, t)| !s.is_empty() && !t.is_empty())
                    .ok_or_else(|| "'rename' needs rename:<source>=<target>".to_string())?;
                EventKind::RenameFile {
                    source: PathBuf::from(source),
                    target: PathBuf::from(target),
                }
            }
            other => {
                return Err(format!(
                    "unknown event '{other}'; expected: open, rebuild, add, modify, delete, rename"
                ))
            }
        };
        Ok(Self(event))
    }
}

impl fmt::Display for EventArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            EventKind::OpenWorkspace => f.write_str("open"),
            EventKind::RebuildWorkspace => f.write_str("rebuild"),
            EventKind::AddFile { path } => write!(f, "add:{}", path.display()),
            EventKind::ModifyFile { path } => write!(f, "modify:{}", path.display()),
            EventKind::DeleteFile { path } => write!(f, "delete:{}", path.display()),
            EventKind::RenameFile { source, target } => {
                write!(f, "rename:{}={}", source.display(), target.display())
            }
        }
    }
}

impl From<EventArg> for EventKind {
    fn from(arg: EventArg) -> Self {
        arg.0
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Register(args) => args.register(),
        Commands::Unregister(args) => args.unregister(),
        Commands::Sync(args) => args.sync(),
        Commands::SyncConfig(args) => args.run(),
        Commands::CheckIgnore(args) => args.run(),
        Commands::Publish(args) => args.run(),
        Commands::Switch(args) => args.run(),
        Commands::Trigger(args) => args.run(),
        Commands::IndexStatus(args) => args.run(),
        Commands::Dispatch(args) => args.run(),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_args_parse_every_kind() {
        let cases = [
            ("open", EventKind::OpenWorkspace),
            ("rebuild", EventKind::RebuildWorkspace),
            (
                "add:src/lib.rs",
                EventKind::AddFile {
                    path: "src/lib.rs".into(),
                },
            ),
            (
                "modify_file:/w/a.rs",
                EventKind::ModifyFile {
                    path: "/w/a.rs".into(),
                },
            ),
            (
                "delete:a.rs",
                EventKind::DeleteFile {
                    path: "a.rs".into(),
                },
            ),
            (
                "rename:old.go=new.go",
                EventKind::RenameFile {
                    source: "old.go".into(),
                    target: "new.go".into(),
                },
            ),
        ];
        for (raw, expected) in cases {
            let parsed: EventArg = raw.parse().unwrap();
            assert_eq!(parsed.0, expected, "{raw}");
        }
    }

    #[test]
    fn event_args_reject_missing_operands() {
        assert!("add".parse::<EventArg>().is_err());
        assert!("rename:a.rs".parse::<EventArg>().is_err());
        assert!("rename:=b.rs".parse::<EventArg>().is_err());
        let err = "explode:x".parse::<EventArg>().unwrap_err();
        assert!(err.contains("unknown event 'explode'"));
    }

    #[test]
    fn display_round_trips_through_parse() {
        let arg: EventArg = "rename:a.rs=b.rs".parse().unwrap();
        assert_eq!(arg.to_string(), "rename:a.rs=b.rs");
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
