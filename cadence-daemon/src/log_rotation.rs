//! Size-based rotation of the daemon's stdout/stderr log files.
//!
//! `daemon.log` becomes `daemon.log.1`, older copies shift up by one and the
//! copy past the retention limit is dropped.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::paths::{stderr_log_path, stdout_log_path};

pub const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;
pub const MAX_ROTATED_FILES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    pub max_bytes: u64,
    pub keep: usize,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_bytes: MAX_LOG_BYTES,
            keep: MAX_ROTATED_FILES,
        }
    }
}

impl RotationPolicy {
    /// Rotate `log` when it has reached `max_bytes`. A missing file is not
    /// an error. Returns whether a rotation happened.
    pub fn rotate(&self, log: &Path) -> io::Result<bool> {
        let len = match fs::metadata(log) {
            Ok(meta) => meta.len(),
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(err),
        };
        if len < self.max_bytes || self.keep == 0 {
            return Ok(false);
        }

        match fs::remove_file(copy_path(log, self.keep)) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }
        for n in (1..self.keep).rev() {
            let from = copy_path(log, n);
            if from.exists() {
                fs::rename(&from, copy_path(log, n + 1))?;
            }
        }
        fs::rename(log, copy_path(log, 1))?;
        fs::File::create(log)?;
        Ok(true)
    }
}

/// Apply the default policy to both daemon logs under `home`.
pub fn rotate_logs(home: &Path) -> Vec<PathBuf> {
    let policy = RotationPolicy::default();
    let mut rotated = Vec::new();
    for log in [stdout_log_path(home), stderr_log_path(home)] {
        match policy.rotate(&log) {
            Ok(true) => {
                tracing::info!(path = %log.display(), "log file rotated");
                rotated.push(log);
            }
            Ok(false) => {}
            Err(err) => tracing::warn!(path = %log.display(), error = %err, "log rotation failed"),
        }
    }
    rotated
}

/// `daemon.log` + 2 → `daemon.log.2`.
fn copy_path(log: &Path, n: usize) -> PathBuf {
    let mut name = log.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".{n}"));
    log.with_file_name(name)
}
