use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;

use taski_core::config::{self, TaskiConfig};
use taski_core::paths::{config_path, notes_dir, socket_path, taski_root, CONFIG_FILE, REPO_METADATA_DIR};
use taski_sync::{GitCli, SyncEvent, SyncHandle, SyncSettings, SyncState, VcsClient};

use crate::error::{io_err, DaemonError};
use crate::protocol::{DaemonRequest, DaemonResponse};

/// Lines returned by `log` when the request names no count.
const DEFAULT_LOG_LINES: usize = 50;

/// Timestamps shared between the event task and `status`.
#[derive(Debug, Default)]
struct DaemonClock {
    started_at_unix: u64,
    last_sync_at_unix: AtomicU64,
}

impl DaemonClock {
    fn started_now() -> Self {
        Self {
            started_at_unix: unix_seconds_now(),
            last_sync_at_unix: AtomicU64::new(0),
        }
    }
}

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf()))
}

/// Run the daemon against the notes repository with the `git` binary.
pub async fn run(home: PathBuf) -> Result<(), DaemonError> {
    let vcs: Arc<dyn VcsClient> = Arc::new(GitCli::new(notes_dir(&home)));
    run_with_vcs(home, vcs).await
}

/// Run the daemon with an explicit [`VcsClient`].
pub async fn run_with_vcs(home: PathBuf, vcs: Arc<dyn VcsClient>) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&home)?;
    let config = config::load_at(&home)?;

    let (handle, actor) = taski_sync::spawn(vcs, SyncSettings::from_config(&home, &config));
    let clock = Arc::new(DaemonClock::started_now());
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    // Subscribed before start so the first cycle is observed.
    let events_handle = {
        let shutdown = shutdown_tx.clone();
        let events = handle.subscribe();
        let clock = clock.clone();
        tokio::spawn(async move {
            let result = event_task(events, clock, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let state = handle.start().await?;
    tracing::info!(state = %state, repo = %notes_dir(&home).display(), "sync orchestrator started");

    let watcher_handle = {
        let shutdown = shutdown_tx.clone();
        let home = home.clone();
        let handle = handle.clone();
        tokio::spawn(async move {
            let result = watcher_task(home, handle, config, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let home = home.clone();
        let handle = handle.clone();
        let clock = clock.clone();
        tokio::spawn(async move {
            let result =
                socket_server_task(home, handle, clock, shutdown.clone(), shutdown.subscribe())
                    .await;
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

    let (events_result, watcher_result, socket_result, signal_result) =
        tokio::join!(events_handle, watcher_handle, socket_handle, signal_handle);

    // The actor may already be gone if every task failed early.
    let _ = handle.shutdown();
    if let Err(err) = actor.await {
        tracing::warn!(error = %err, "sync orchestrator task ended abnormally");
    }

    handle_join("events", events_result)?;
    handle_join("watcher", watcher_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Watcher: note saves and config reload
// ---------------------------------------------------------------------------

async fn watcher_task(
    home: PathBuf,
    handle: SyncHandle,
    mut current: TaskiConfig,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let root = taski_root(&home);
    // Canonicalize so that FSEvents paths (which arrive as real paths, e.g.
    // /private/var/... on macOS) match the `starts_with` checks below.
    let root = fs::canonicalize(&root).unwrap_or(root);
    let notes = notes_dir(&home);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher: RecommendedWatcher = recommended_watcher(move |event| {
        let _ = event_tx.send(event);
    })?;

    watcher.watch(&root, RecursiveMode::NonRecursive)?;
    let notes = match fs::canonicalize(&notes) {
        Ok(notes) => {
            watcher.watch(&notes, RecursiveMode::Recursive)?;
            tracing::debug!(path = %notes.display(), "watching notes directory");
            Some(notes)
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tracing::warn!(path = %notes.display(), "notes directory missing; saves are not watched");
            None
        }
        Err(err) => return Err(io_err(&notes, err)),
    };

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(error = %err, "watcher event error");
                        continue;
                    }
                };
                if !is_relevant_event_kind(&event.kind) {
                    continue;
                }

                let mut reload = false;
                for path in &event.paths {
                    if is_config_file(path, &root) {
                        reload = true;
                    } else if let Some(notes) = notes.as_deref() {
                        if !is_note_save(path, notes) {
                            continue;
                        }
                        let state = handle.state();
                        if forwards_saves(state) {
                            tracing::debug!(path = %path.display(), "note saved");
                            handle.notify_saved(path.clone())?;
                        } else {
                            tracing::debug!(path = %path.display(), %state, "ignoring write during sync");
                        }
                    }
                }

                if reload {
                    current = reload_config(&home, &handle, current).await?;
                }
            }
        }
    }

    Ok(())
}

/// Load `config.yaml` again and push changed settings into the orchestrator.
/// A file that fails to parse keeps the previous settings.
async fn reload_config(
    home: &Path,
    handle: &SyncHandle,
    current: TaskiConfig,
) -> Result<TaskiConfig, DaemonError> {
    let home_for_load = home.to_path_buf();
    let loaded = tokio::task::spawn_blocking(move || config::load_at(&home_for_load))
        .await
        .map_err(|err| DaemonError::Protocol(format!("config reload join error: {err}")))?;

    let next = match loaded {
        Ok(next) => next,
        Err(err) => {
            tracing::warn!(error = %err, path = %config_path(home).display(), "ignoring unreadable config");
            return Ok(current);
        }
    };

    let changes = config_changes(&current, &next);
    if let Some(secs) = changes.interval_secs {
        tracing::info!(interval_secs = secs, "sync interval changed");
        handle.set_interval(secs)?;
    }
    if let Some(enabled) = changes.enabled {
        tracing::info!(enabled, "automatic sync toggled");
        handle.set_enabled(enabled)?;
    }
    Ok(next)
}

/// Orchestrator inputs that differ between two configs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ConfigChanges {
    enabled: Option<bool>,
    interval_secs: Option<u64>,
}

fn config_changes(old: &TaskiConfig, new: &TaskiConfig) -> ConfigChanges {
    ConfigChanges {
        enabled: (old.git_auto_sync != new.git_auto_sync).then_some(new.git_auto_sync),
        interval_secs: (old.git_sync_interval != new.git_sync_interval)
            .then_some(new.git_sync_interval),
    }
}

fn is_relevant_event_kind(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}

fn is_config_file(path: &Path, root: &Path) -> bool {
    path.parent() == Some(root)
        && path.file_name().and_then(|name| name.to_str()) == Some(CONFIG_FILE)
}

/// Writes seen while a cycle runs come from `git pull --rebase` rewriting the
/// tree, not from the editor. Events delivered after the cycle ends still
/// count as saves.
fn forwards_saves(state: SyncState) -> bool {
    state != SyncState::Syncing
}

/// A markdown document under the notes dir, outside git metadata.
fn is_note_save(path: &Path, notes: &Path) -> bool {
    let Ok(relative) = path.strip_prefix(notes) else {
        return false;
    };
    if relative
        .components()
        .any(|c| c.as_os_str() == REPO_METADATA_DIR)
    {
        return false;
    }
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("md"))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Orchestrator events
// ---------------------------------------------------------------------------

async fn event_task(
    mut events: broadcast::Receiver<SyncEvent>,
    clock: Arc<DaemonClock>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut previous = SyncState::Disabled;
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            event = events.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "event subscriber lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                match event {
                    SyncEvent::StateChanged { state } => {
                        if previous == SyncState::Syncing && state == SyncState::Idle {
                            clock.last_sync_at_unix.store(unix_seconds_now(), Ordering::Relaxed);
                        }
                        previous = state;
                    }
                    SyncEvent::ConflictDetected { repo, diagnostics, .. } => {
                        tracing::warn!(
                            repo = %repo.display(),
                            diagnostics = %diagnostics,
                            "sync stopped on a conflict; resolve it with `taski shell`, then run `taski daemon retry`",
                        );
                    }
                    // Already written through the log facade by the orchestrator.
                    SyncEvent::Log { .. } => {}
                }
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Socket server
// ---------------------------------------------------------------------------

async fn socket_server_task(
    home: PathBuf,
    handle: SyncHandle,
    clock: Arc<DaemonClock>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let socket = socket_path(&home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;
    tracing::info!(socket = %socket.display(), "daemon socket listening");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let home = home.clone();
                let handle = handle.clone();
                let clock = clock.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(stream, home, handle, clock, shutdown_tx).await {
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
    home: PathBuf,
    handle: SyncHandle,
    clock: Arc<DaemonClock>,
    shutdown_tx: broadcast::Sender<()>,
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

        let request: DaemonRequest = match serde_json::from_str(&line) {
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

        let response = dispatch(&request, &home, &handle, &clock, &shutdown_tx).await;
        write_response(&mut writer, &response).await?;
        if request.cmd == "shutdown" {
            break;
        }
    }

    Ok(())
}

async fn dispatch(
    request: &DaemonRequest,
    home: &Path,
    handle: &SyncHandle,
    clock: &DaemonClock,
    shutdown_tx: &broadcast::Sender<()>,
) -> DaemonResponse {
    match request.cmd.as_str() {
        "status" => DaemonResponse::ok(build_status_payload(home, handle.state(), clock)),
        "sync" => match handle.sync_now().await {
            Ok(outcome) => match serde_json::to_value(&outcome) {
                Ok(value) => DaemonResponse::ok(value),
                Err(err) => DaemonResponse::error(err.to_string()),
            },
            Err(err) => DaemonResponse::error(err.to_string()),
        },
        "start" => match handle.start().await {
            Ok(state) => DaemonResponse::ok(json!({ "state": state })),
            Err(err) => DaemonResponse::error(err.to_string()),
        },
        "stop" => match handle.stop() {
            Ok(()) => DaemonResponse::ok(json!({ "paused": true })),
            Err(err) => DaemonResponse::error(err.to_string()),
        },
        "log" => {
            let lines = handle.diagnostics_tail(request.lines.unwrap_or(DEFAULT_LOG_LINES));
            DaemonResponse::ok(json!({ "lines": lines }))
        }
        "shutdown" => {
            let _ = shutdown_tx.send(());
            DaemonResponse::ok(json!({ "stopping": true }))
        }
        other => DaemonResponse::error(format!("unknown command '{other}'")),
    }
}

fn build_status_payload(home: &Path, state: SyncState, clock: &DaemonClock) -> Value {
    json!({
        "running": true,
        "state": state,
        "started_at_unix": clock.started_at_unix,
        "last_sync_at_unix": clock.last_sync_at_unix.load(Ordering::Relaxed),
        "notes_dir": notes_dir(home).display().to_string(),
        "socket": socket_path(home).display().to_string(),
    })
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
    let root = taski_root(home);
    if !root.exists() {
        fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
        set_private_dir_permissions(&root)?;
    }
    Ok(())
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
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

/// Install the fmt subscriber; `TASKI_LOG_JSON=1` switches to JSON lines.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("TASKI_LOG_JSON").map(|v| v == "1").unwrap_or(false);
    let _ = if json {
        fmt().with_env_filter(filter).json().try_init()
    } else {
        fmt().with_env_filter(filter).with_target(false).try_init()
    };
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

#[cfg(unix)]
fn set_private_dir_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_private_dir_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind};
    use tempfile::TempDir;

    #[test]
    fn config_changes_reports_only_differences() {
        let old = TaskiConfig::default();
        assert_eq!(config_changes(&old, &old.clone()), ConfigChanges::default());

        let new = TaskiConfig {
            git_auto_sync: false,
            git_sync_interval: 120,
            ..TaskiConfig::default()
        };
        assert_eq!(
            config_changes(&old, &new),
            ConfigChanges {
                enabled: Some(false),
                interval_secs: Some(120),
            }
        );

        let only_dirs = TaskiConfig {
            exclude_directories: vec!["**/archive/**".to_string()],
            ..TaskiConfig::default()
        };
        assert_eq!(config_changes(&old, &only_dirs), ConfigChanges::default());
    }

    #[test]
    fn note_saves_exclude_git_metadata_and_other_files() {
        let notes = Path::new("/home/u/taski");
        assert!(is_note_save(Path::new("/home/u/taski/2026/daily.md"), notes));
        assert!(is_note_save(Path::new("/home/u/taski/README.MD"), notes));
        assert!(!is_note_save(Path::new("/home/u/taski/.git/COMMIT_EDITMSG"), notes));
        assert!(!is_note_save(Path::new("/home/u/taski/.git/rebase-merge/x.md"), notes));
        assert!(!is_note_save(Path::new("/home/u/taski/image.png"), notes));
        assert!(!is_note_save(Path::new("/home/u/elsewhere/note.md"), notes));
    }

    #[test]
    fn saves_during_a_cycle_are_not_forwarded() {
        assert!(!forwards_saves(SyncState::Syncing));
        assert!(forwards_saves(SyncState::Idle));
        assert!(forwards_saves(SyncState::Disabled));
        assert!(forwards_saves(SyncState::Conflict));
    }

    #[test]
    fn config_file_detection_requires_taski_root() {
        let root = Path::new("/home/u/.taski");
        assert!(is_config_file(Path::new("/home/u/.taski/config.yaml"), root));
        assert!(!is_config_file(Path::new("/home/u/.taski/config.yaml.tmp"), root));
        assert!(!is_config_file(Path::new("/home/u/taski/config.yaml"), root));
    }

    #[test]
    fn only_create_and_modify_events_matter() {
        assert!(is_relevant_event_kind(&EventKind::Create(CreateKind::File)));
        assert!(is_relevant_event_kind(&EventKind::Modify(ModifyKind::Any)));
        assert!(!is_relevant_event_kind(&EventKind::Access(AccessKind::Any)));
    }

    #[test]
    fn stale_socket_file_is_removed() {
        let dir = TempDir::new().expect("dir");
        let socket = dir.path().join("daemon.sock");
        fs::write(&socket, b"").expect("write stale socket");
        tokio_test::assert_ok!(prepare_socket_for_bind(&socket));
        assert!(!socket.exists());
    }

    #[tokio::test]
    async fn live_socket_is_refused() {
        let dir = TempDir::new().expect("dir");
        let socket = dir.path().join("daemon.sock");
        let _listener = UnixListener::bind(&socket).expect("bind");
        let err = prepare_socket_for_bind(&socket).unwrap_err();
        assert!(err.to_string().contains("already in use"), "got: {err}");
        assert!(socket.exists());
    }

    #[test]
    fn status_payload_reports_state_and_timestamps() {
        let home = TempDir::new().expect("home");
        let clock = DaemonClock {
            started_at_unix: 1_000_000,
            last_sync_at_unix: AtomicU64::new(1_000_060),
        };
        let payload = build_status_payload(home.path(), SyncState::Conflict, &clock);
        assert_eq!(payload["running"], json!(true));
        assert_eq!(payload["state"], json!("conflict"));
        assert_eq!(payload["started_at_unix"], json!(1_000_000u64));
        assert_eq!(payload["last_sync_at_unix"], json!(1_000_060u64));
        assert!(payload["socket"].as_str().expect("socket").ends_with(".taski/daemon.sock"));
    }

    #[tokio::test]
    async fn event_task_records_finished_cycles() {
        let (events_tx, events_rx) = broadcast::channel(16);
        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let clock = Arc::new(DaemonClock::default());
        let task = tokio::spawn(event_task(events_rx, clock.clone(), shutdown_tx.subscribe()));

        events_tx
            .send(SyncEvent::StateChanged { state: SyncState::Idle })
            .expect("send");
        events_tx
            .send(SyncEvent::StateChanged { state: SyncState::Syncing })
            .expect("send");
        events_tx
            .send(SyncEvent::StateChanged { state: SyncState::Idle })
            .expect("send");
        drop(events_tx);

        task.await.expect("join").expect("event task");
        assert!(clock.last_sync_at_unix.load(Ordering::Relaxed) > 0);
    }
}
