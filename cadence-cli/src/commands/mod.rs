pub mod codebase;
pub mod daemon;
pub mod events;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;

use cadence_daemon::{request, DaemonError, DaemonRequest};

pub(crate) fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

/// Absolute form of a workspace argument; relative paths resolve against the
/// current directory.
pub(crate) fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("could not determine current directory")?;
    Ok(cwd.join(path))
}

/// Send `req` to the daemon, turning "not running" into a hint.
pub(crate) fn call_daemon(req: &DaemonRequest) -> Result<Value> {
    let home = home_dir()?;
    match request(&home, req) {
        Ok(data) => Ok(data),
        Err(DaemonError::DaemonNotRunning { socket }) => Err(anyhow::anyhow!(
            "daemon is not running (no socket at {}); start it with `cadence daemon start`",
            socket.display()
        )),
        Err(err) => Err(err).with_context(|| format!("{} request failed", req.name())),
    }
}

pub(crate) fn print_json(value: &Value) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to render JSON")?
    );
    Ok(())
}
