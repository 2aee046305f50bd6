use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::time::{Duration, Instant, MissedTickBehavior};

use cadence_core::config::Settings;

use crate::error::{io_err, DaemonError};
use crate::paths::{cadence_root, logs_dir, socket_path};
use crate::protocol::{DaemonRequest, DaemonResponse};
use crate::services::{Services, TickSummary};

const LOG_ROTATION_INTERVAL: Duration = Duration::from_secs(5);

struct TickJob {
    source: &'static str,
    respond_to: oneshot::Sender<Result<TickSummary, String>>,
}

/// Counters reported by `status`.
#[derive(Debug, Default)]
struct TickStats {
    ticks: u64,
    failed_ticks: u64,
    last_tick: Option<TickSummary>,
    last_error: Option<String>,
}

type SharedStats = Arc<RwLock<TickStats>>;

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf()))
}

/// Load settings from `home` and run the daemon.
pub async fn run(home: PathBuf) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&home)?;
    let services = {
        let home = home.clone();
        tokio::task::spawn_blocking(move || -> Result<Services, DaemonError> {
            let settings = Settings::load_at(&home)?;
            Services::from_settings(&home, &settings)
        })
        .await
        .map_err(|err| DaemonError::Protocol(format!("startup join error: {err}")))??
    };
    run_with(Arc::new(services)).await
}

/// Run the daemon over already wired services until stopped.
pub async fn run_with(services: Arc<Services>) -> Result<(), DaemonError> {
    let home = services.home().to_path_buf();
    ensure_runtime_dirs(&home)?;

    let stats: SharedStats = Arc::new(RwLock::new(TickStats::default()));
    let started_at_unix = unix_seconds_now();

    let (tick_tx, tick_rx) = mpsc::channel::<TickJob>(16);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let scheduler_handle = {
        let shutdown = shutdown_tx.clone();
        let tick_tx = tick_tx.clone();
        let every = services.tick_interval();
        tokio::spawn(async move {
            let result = scheduler_task(every, tick_tx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let processor_handle = {
        let shutdown = shutdown_tx.clone();
        let services = services.clone();
        let stats = stats.clone();
        tokio::spawn(async move {
            let result = tick_processor_task(services, stats, tick_rx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let services = services.clone();
        let stats = stats.clone();
        tokio::spawn(async move {
            let result = socket_server_task(
                services,
                stats,
                tick_tx,
                shutdown.clone(),
                shutdown.subscribe(),
                started_at_unix,
            )
            .await;
            let _ = shutdown.send(());
            result
        })
    };

    let rotation_handle = {
        let shutdown = shutdown_tx.clone();
        let home = home.clone();
        tokio::spawn(async move {
            let result = log_rotation_task(home, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    tracing::info!(
        home = %home.display(),
        tick_seconds = services.tick_interval().as_secs(),
        indexer = services.indexer_enabled(),
        docs = services.docs_enabled(),
        "daemon started",
    );

    let (scheduler_result, processor_result, socket_result, rotation_result, signal_result) =
        tokio::join!(
            scheduler_handle,
            processor_handle,
            socket_handle,
            rotation_handle,
            signal_handle
        );

    handle_join("scheduler", scheduler_result)?;
    handle_join("tick_processor", processor_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("log_rotation", rotation_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("daemon stopped");
    Ok(())
}

async fn scheduler_task(
    every: Duration,
    tick_tx: mpsc::Sender<TickJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    // first tick one period after startup
    let mut interval = tokio::time::interval_at(Instant::now() + every, every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                match enqueue_tick(&tick_tx, "scheduler").await {
                    Ok(_) => {}
                    Err(DaemonError::ChannelClosed(_)) => break,
                    Err(err) => tracing::error!(error = %err, "scheduled dispatch tick failed"),
                }
            }
        }
    }
    Ok(())
}

/// Runs ticks one at a time on a blocking worker.
async fn tick_processor_task(
    services: Arc<Services>,
    stats: SharedStats,
    mut tick_rx: mpsc::Receiver<TickJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = tick_rx.recv() => {
                let Some(job) = maybe_job else { break };
                let services = services.clone();
                let source = job.source;
                let tick_result = tokio::task::spawn_blocking(move || services.tick(source))
                    .await
                    .map_err(|err| DaemonError::Protocol(format!("tick task join error: {err}")))?;

                let outcome = {
                    let mut stats = stats.write().await;
                    stats.ticks += 1;
                    match tick_result {
                        Ok(summary) => {
                            stats.last_tick = Some(summary.clone());
                            stats.last_error = None;
                            Ok(summary)
                        }
                        Err(err) => {
                            stats.failed_ticks += 1;
                            stats.last_error = Some(err.to_string());
                            Err(err.to_string())
                        }
                    }
                };

                let _ = job.respond_to.send(outcome);
            }
        }
    }

    Ok(())
}

async fn socket_server_task(
    services: Arc<Services>,
    stats: SharedStats,
    tick_tx: mpsc::Sender<TickJob>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
    started_at_unix: u64,
) -> Result<(), DaemonError> {
    let socket = socket_path(services.home());
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let services = services.clone();
                let stats = stats.clone();
                let tick_tx = tick_tx.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(
                        stream,
                        services,
                        stats,
                        tick_tx,
                        shutdown_tx,
                        started_at_unix,
                    ).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    services: Arc<Services>,
    stats: SharedStats,
    tick_tx: mpsc::Sender<TickJob>,
    shutdown_tx: broadcast::Sender<()>,
    started_at_unix: u64,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request = match serde_json::from_str::<DaemonRequest>(&line) {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error(format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };
        tracing::debug!(cmd = request.name(), "socket request");

        let stop = matches!(request, DaemonRequest::Stop);
        let response = match request {
            DaemonRequest::Status => {
                let payload = build_status_payload(&services, &stats, started_at_unix).await;
                DaemonResponse::ok(payload)
            }
            DaemonRequest::Stop => {
                let _ = shutdown_tx.send(());
                DaemonResponse::ok(json!({ "stopping": true }))
            }
            DaemonRequest::Dispatch => match enqueue_tick(&tick_tx, "socket").await {
                Ok(summary) => DaemonResponse::ok(json!(summary)),
                Err(err) => DaemonResponse::error(err.to_string()),
            },
            request => {
                let services = services.clone();
                let result = tokio::task::spawn_blocking(move || services.handle(&request))
                    .await
                    .map_err(|err| DaemonError::Protocol(format!("request join error: {err}")))
                    .and_then(|result| result);
                DaemonResponse::from(result)
            }
        };

        write_response(&mut writer, &response).await?;
        if stop {
            break;
        }
    }

    Ok(())
}

async fn build_status_payload(
    services: &Services,
    stats: &SharedStats,
    started_at_unix: u64,
) -> Value {
    let stats = stats.read().await;
    json!({
        "running": true,
        "pid": std::process::id(),
        "started_at_unix": started_at_unix,
        "tick_seconds": services.tick_interval().as_secs(),
        "indexer_enabled": services.indexer_enabled(),
        "docs_enabled": services.docs_enabled(),
        "ticks": stats.ticks,
        "failed_ticks": stats.failed_ticks,
        "last_tick": stats.last_tick,
        "last_error": stats.last_error,
        "socket": socket_path(services.home()).display().to_string(),
        "root": cadence_root(services.home()).display().to_string(),
    })
}

async fn enqueue_tick(
    tick_tx: &mpsc::Sender<TickJob>,
    source: &'static str,
) -> Result<TickSummary, DaemonError> {
    let (tx, rx) = oneshot::channel();
    tick_tx
        .send(TickJob {
            source,
            respond_to: tx,
        })
        .await
        .map_err(|_| DaemonError::ChannelClosed("tick queue"))?;

    let outcome = rx
        .await
        .map_err(|_| DaemonError::ChannelClosed("tick response"))?;
    outcome.map_err(DaemonError::Protocol)
}

async fn log_rotation_task(
    home: PathBuf,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut interval = tokio::time::interval(LOG_ROTATION_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // first tick fires immediately; no rotation at startup
    interval.tick().await;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                let home = home.clone();
                // failures are logged inside rotate_logs
                tokio::task::spawn_blocking(move || {
                    crate::log_rotation::rotate_logs(&home);
                })
                .await
                .ok();
            }
        }
    }
    Ok(())
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    for dir in [cadence_root(home), logs_dir(home)] {
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        }
    }
    Ok(())
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let mut payload = serde_json::to_vec(response)?;
    payload.push(b'\n');
    writer
        .write_all(&payload)
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let ansi = std::io::IsTerminal::is_terminal(&std::io::stdout());
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(ansi)
        .try_init();
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}
