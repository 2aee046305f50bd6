//! Newline-delimited JSON over the daemon's Unix socket: one request line,
//! one response line.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use cadence_core::{EventKind, SyncConfig};
use cadence_sync::WorkspaceRequest;

use crate::error::{io_err, DaemonError};
use crate::paths::socket_path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "kebab-case")]
pub enum DaemonRequest {
    Status,
    Stop,
    /// Run a dispatch tick now instead of waiting for the scheduler.
    Dispatch,
    Register(WorkspaceRequest),
    Unregister(WorkspaceRequest),
    Sync(WorkspaceRequest),
    CheckIgnore(WorkspaceRequest),
    SyncConfig(SyncConfig),
    Publish {
        workspace: PathBuf,
        events: Vec<EventKind>,
    },
    Switch {
        workspace: PathBuf,
        switch: String,
    },
    /// Switch the workspace on and queue a full index.
    Trigger {
        workspace: PathBuf,
    },
    IndexStatus {
        workspace: PathBuf,
    },
}

impl DaemonRequest {
    pub fn name(&self) -> &'static str {
        match self {
            DaemonRequest::Status => "status",
            DaemonRequest::Stop => "stop",
            DaemonRequest::Dispatch => "dispatch",
            DaemonRequest::Register(_) => "register",
            DaemonRequest::Unregister(_) => "unregister",
            DaemonRequest::Sync(_) => "sync",
            DaemonRequest::CheckIgnore(_) => "check-ignore",
            DaemonRequest::SyncConfig(_) => "sync-config",
            DaemonRequest::Publish { .. } => "publish",
            DaemonRequest::Switch { .. } => "switch",
            DaemonRequest::Trigger { .. } => "trigger",
            DaemonRequest::IndexStatus { .. } => "index-status",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DaemonResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

impl From<Result<Value, DaemonError>> for DaemonResponse {
    fn from(result: Result<Value, DaemonError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::error(err.to_string()),
        }
    }
}

/// Send one request to the daemon socket and wait for its response.
pub fn send_request(home: &Path, request: &DaemonRequest) -> Result<DaemonResponse, DaemonError> {
    let socket = socket_path(home);
    if !socket.exists() {
        return Err(DaemonError::DaemonNotRunning { socket });
    }

    let mut stream = UnixStream::connect(&socket).map_err(|err| {
        if matches!(
            err.kind(),
            std::io::ErrorKind::NotFound
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionReset
        ) {
            DaemonError::DaemonNotRunning {
                socket: socket.clone(),
            }
        } else {
            io_err(&socket, err)
        }
    })?;

    let mut payload = serde_json::to_vec(request)?;
    payload.push(b'\n');
    stream
        .write_all(&payload)
        .and_then(|()| stream.flush())
        .map_err(|e| io_err(&socket, e))?;

    let mut line = String::new();
    let read = BufReader::new(stream)
        .read_line(&mut line)
        .map_err(|e| io_err(&socket, e))?;
    if read == 0 {
        return Err(DaemonError::Protocol(
            "daemon closed connection before responding".to_string(),
        ));
    }
    Ok(serde_json::from_str(line.trim_end())?)
}

/// Send `request` and unwrap the response payload.
pub fn request(home: &Path, request: &DaemonRequest) -> Result<Value, DaemonError> {
    send_request(home, request).and_then(response_into_data)
}

/// Status, retried briefly so a daemon that is still binding its socket is
/// not reported as down.
pub fn request_status(home: &Path) -> Result<Value, DaemonError> {
    const ATTEMPTS: usize = 5;
    let mut attempt = 1;
    loop {
        match request(home, &DaemonRequest::Status) {
            Err(DaemonError::DaemonNotRunning { .. }) if attempt < ATTEMPTS => {
                attempt += 1;
                sleep(Duration::from_millis(100));
            }
            other => return other,
        }
    }
}

pub fn request_stop(home: &Path) -> Result<(), DaemonError> {
    request(home, &DaemonRequest::Stop).map(|_| ())
}

pub fn response_into_data(response: DaemonResponse) -> Result<Value, DaemonError> {
    if response.ok {
        Ok(response.data.unwrap_or(Value::Null))
    } else {
        Err(DaemonError::Protocol(
            response
                .error
                .unwrap_or_else(|| "unknown daemon error".to_string()),
        ))
    }
}
