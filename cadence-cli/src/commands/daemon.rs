//! `cadence daemon`: background dispatcher lifecycle.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use cadence_daemon::paths::{logs_dir, socket_path, stderr_log_path, stdout_log_path};
use cadence_daemon::{request_status, request_stop, start_blocking, DaemonError};

use super::{home_dir, print_json};

const DETACH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run the daemon (dispatch ticks + socket server).
    Start(DaemonStartArgs),
    /// Request graceful daemon shutdown over the Unix socket.
    Stop,
    /// Query daemon runtime status over the Unix socket.
    Status,
    /// Print recent daemon log lines.
    Logs(DaemonLogsArgs),
}

#[derive(Args, Debug)]
pub struct DaemonStartArgs {
    /// Run in the background with output appended to the daemon log files.
    #[arg(long)]
    pub detach: bool,
}

#[derive(Args, Debug)]
pub struct DaemonLogsArgs {
    /// Number of trailing lines to show.
    #[arg(long, default_value_t = 100)]
    pub lines: usize,

    /// Show only stderr log file.
    #[arg(long)]
    pub stderr_only: bool,
}

pub fn run(command: DaemonCommand) -> Result<()> {
    let home = home_dir()?;

    match command {
        DaemonCommand::Start(args) if args.detach => spawn_detached(&home)?,
        DaemonCommand::Start(_) => {
            start_blocking(&home).context("daemon exited with error")?;
        }
        DaemonCommand::Stop => match request_stop(&home) {
            Ok(()) => println!("daemon stop requested"),
            Err(DaemonError::DaemonNotRunning { .. }) => {
                println!("daemon is not running");
            }
            Err(err) => return Err(err).context("failed to stop daemon"),
        },
        DaemonCommand::Status => match request_status(&home) {
            Ok(status) => print_json(&status)?,
            Err(DaemonError::DaemonNotRunning { .. }) => {
                print_json(&serde_json::json!({
                    "running": false,
                    "socket": socket_path(&home).display().to_string(),
                }))?;
            }
            Err(err) => return Err(err).context("failed to query daemon status"),
        },
        DaemonCommand::Logs(args) => {
            if args.stderr_only {
                print_tail(&stderr_log_path(&home), args.lines)
                    .context("failed to read daemon stderr log")?;
            } else {
                print_tail(&stdout_log_path(&home), args.lines)
                    .context("failed to read daemon stdout log")?;
                print_tail(&stderr_log_path(&home), args.lines)
                    .context("failed to read daemon stderr log")?;
            }
        }
    }

    Ok(())
}

/// Re-run this binary as `daemon start` with stdout/stderr appended to the
/// log files, then wait until it answers status.
fn spawn_detached(home: &Path) -> Result<()> {
    if request_status(home).is_ok() {
        println!("daemon is already running");
        return Ok(());
    }

    let logs = logs_dir(home);
    std::fs::create_dir_all(&logs).with_context(|| format!("create {}", logs.display()))?;
    let stdout = append(&stdout_log_path(home))?;
    let stderr = append(&stderr_log_path(home))?;

    let exe = std::env::current_exe().context("could not locate the cadence binary")?;
    let child = Command::new(exe)
        .args(["daemon", "start"])
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .spawn()
        .context("failed to spawn daemon")?;

    let deadline = Instant::now() + DETACH_TIMEOUT;
    while Instant::now() < deadline {
        if request_status(home).is_ok() {
            println!("daemon started (pid {})", child.id());
            return Ok(());
        }
        sleep(Duration::from_millis(100));
    }
    anyhow::bail!(
        "daemon did not come up within {}s; see `cadence daemon logs --stderr-only`",
        DETACH_TIMEOUT.as_secs()
    )
}

fn append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))
}

fn print_tail(path: &Path, lines: usize) -> Result<()> {
    if !path.exists() {
        println!("log file not found: {}", path.display());
        return Ok(());
    }

    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut tail = VecDeque::<String>::new();
    for line in reader.lines() {
        let line = line.with_context(|| format!("read {}", path.display()))?;
        tail.push_back(line);
        if tail.len() > lines {
            tail.pop_front();
        }
    }

    println!("==> {} <==", path.display());
    for line in tail {
        println!("{line}");
    }
    Ok(())
}
