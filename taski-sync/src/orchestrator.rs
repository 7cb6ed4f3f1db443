//! Sync orchestrator.
//!
//! A single actor task owns the state machine, the in-flight flag and both
//! timers. Callers hold a cloneable [`SyncHandle`] and talk to the actor over
//! an unbounded command channel. Cycles run on the blocking pool and report
//! back as a `Finished` command, tagged with the generation they started
//! under so that a result arriving after `stop()` is ignored.
//!
//! ```text
//!            start() ok                 success / network / other
//! disabled ─────────────► idle ◄──────────────────────────┐
//!    ▲                     │ trigger                      │
//!    │ stop / tool missing ▼                              │
//!    └──────────────── syncing ───────────────────────────┘
//!                          │ conflict
//!                          ▼
//!                      conflict ── start() / retry ──► idle
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender};
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;

use taski_core::config::{clamp_interval, TaskiConfig};
use taski_core::paths::{notes_dir, REPO_METADATA_DIR};

use crate::classify::FailureClass;
use crate::cycle::{sync_once, CycleOutcome};
use crate::error::{SyncError, VcsError};
use crate::event::{DiagnosticLog, EventSink, RecoveryAction, SyncEvent};
use crate::state::SyncState;
use crate::timer::{schedule_every, schedule_once, TimerHandle};
use crate::vcs::VcsClient;

/// Quiet period after the last save before a save-triggered sync runs.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_secs(10);

const EVENT_CAPACITY: usize = 256;

/// Inputs the orchestrator is started with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Repository that is synchronized; also the working dir for `git`.
    pub repo: PathBuf,
    pub enabled: bool,
    /// Requested periodic interval; the floor is applied on use.
    pub interval_secs: u64,
}

impl SyncSettings {
    /// `~/taski` with the enable flag and interval from `config`.
    pub fn from_config(home: &Path, config: &TaskiConfig) -> Self {
        Self {
            repo: notes_dir(home),
            enabled: config.git_auto_sync,
            interval_secs: config.git_sync_interval,
        }
    }
}

/// Reply to [`SyncHandle::sync_now`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SyncNowOutcome {
    /// A cycle ran; `state` is the state it left behind.
    Finished {
        state: SyncState,
        outcome: CycleOutcome,
    },
    /// Another cycle was in flight; nothing ran.
    Dropped,
    /// Nothing ran; the diagnostic log is returned for the user to inspect.
    Conflict { diagnostics: Vec<String> },
    Disabled,
}

#[derive(Debug, Clone, Copy)]
enum Trigger {
    Startup,
    Periodic,
    Save,
    Manual,
}

impl Trigger {
    fn label(self) -> &'static str {
        match self {
            Trigger::Startup => "startup",
            Trigger::Periodic => "periodic",
            Trigger::Save => "save",
            Trigger::Manual => "manual",
        }
    }
}

enum Command {
    Start {
        respond: oneshot::Sender<SyncState>,
    },
    Stop,
    SyncNow {
        respond: oneshot::Sender<SyncNowOutcome>,
    },
    Saved(PathBuf),
    SetInterval(u64),
    SetEnabled(bool),
    Tick(u64),
    DebounceElapsed(u64),
    Finished {
        generation: u64,
        outcome: CycleOutcome,
    },
    Shutdown,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Command::Start { .. } => "Start",
            Command::Stop => "Stop",
            Command::SyncNow { .. } => "SyncNow",
            Command::Saved(_) => "Saved",
            Command::SetInterval(_) => "SetInterval",
            Command::SetEnabled(_) => "SetEnabled",
            Command::Tick(_) => "Tick",
            Command::DebounceElapsed(_) => "DebounceElapsed",
            Command::Finished { .. } => "Finished",
            Command::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cloneable front end to a running orchestrator.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    commands: UnboundedSender<Command>,
    state: watch::Receiver<SyncState>,
    events: broadcast::Sender<SyncEvent>,
    log: DiagnosticLog,
}

/// Spawn the orchestrator actor on the current tokio runtime.
///
/// The orchestrator starts `disabled`; call [`SyncHandle::start`] to check
/// preconditions and begin syncing. The actor exits on
/// [`SyncHandle::shutdown`] or when every handle is dropped.
pub fn spawn(vcs: Arc<dyn VcsClient>, settings: SyncSettings) -> (SyncHandle, JoinHandle<()>) {
    let (commands, rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(SyncState::Disabled);
    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    let log = DiagnosticLog::default();

    let actor = Orchestrator {
        vcs,
        repo: settings.repo,
        enabled: settings.enabled,
        interval: clamp_interval(settings.interval_secs),
        state: SyncState::Disabled,
        in_flight: false,
        generation: 0,
        timer: None,
        timer_epoch: 0,
        debounce: None,
        debounce_epoch: 0,
        waiter: None,
        commands: commands.downgrade(),
        state_tx,
        sink: EventSink::new(events.clone(), log.clone()),
    };
    let task = tokio::spawn(actor.run(rx));

    let handle = SyncHandle {
        commands,
        state: state_rx,
        events,
        log,
    };
    (handle, task)
}

impl SyncHandle {
    /// Check preconditions; on success arm the timer and sync immediately.
    /// Returns the state right after the check.
    pub async fn start(&self) -> Result<SyncState, SyncError> {
        let (respond, rx) = oneshot::channel();
        self.send(Command::Start { respond })?;
        rx.await.map_err(|_| SyncError::ChannelClosed("start response"))
    }

    /// Cancel both timers and go `disabled`. A cycle in flight keeps running
    /// but its result is discarded.
    pub fn stop(&self) -> Result<(), SyncError> {
        self.send(Command::Stop)
    }

    /// Manual trigger; waits for the cycle it starts.
    pub async fn sync_now(&self) -> Result<SyncNowOutcome, SyncError> {
        let (respond, rx) = oneshot::channel();
        self.send(Command::SyncNow { respond })?;
        rx.await.map_err(|_| SyncError::ChannelClosed("sync response"))
    }

    /// A document under the repository was saved; (re)starts the debounce.
    pub fn notify_saved(&self, path: impl Into<PathBuf>) -> Result<(), SyncError> {
        self.send(Command::Saved(path.into()))
    }

    /// Change the periodic interval; rearms a running timer.
    pub fn set_interval(&self, secs: u64) -> Result<(), SyncError> {
        self.send(Command::SetInterval(secs))
    }

    /// Config toggle: `true` runs `start()`, `false` runs `stop()`.
    pub fn set_enabled(&self, enabled: bool) -> Result<(), SyncError> {
        self.send(Command::SetEnabled(enabled))
    }

    pub fn shutdown(&self) -> Result<(), SyncError> {
        self.send(Command::Shutdown)
    }

    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SyncState> {
        self.state.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn diagnostics(&self) -> Vec<String> {
        self.log.snapshot()
    }

    pub fn diagnostics_tail(&self, lines: usize) -> Vec<String> {
        self.log.tail(lines)
    }

    fn send(&self, command: Command) -> Result<(), SyncError> {
        self.commands.send(command).map_err(|_| SyncError::Stopped)
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct Orchestrator {
    vcs: Arc<dyn VcsClient>,
    repo: PathBuf,
    enabled: bool,
    interval: Duration,
    state: SyncState,
    in_flight: bool,
    /// Bumped per dispatched cycle and on stop.
    generation: u64,
    timer: Option<TimerHandle>,
    timer_epoch: u64,
    debounce: Option<TimerHandle>,
    debounce_epoch: u64,
    /// Manual caller waiting on the current cycle.
    waiter: Option<oneshot::Sender<SyncNowOutcome>>,
    commands: WeakUnboundedSender<Command>,
    state_tx: watch::Sender<SyncState>,
    sink: EventSink,
}

impl Orchestrator {
    async fn run(mut self, mut rx: UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            tracing::trace!("orchestrator command: {:?}", command);
            match command {
                Command::Start { respond } => {
                    let state = self.start();
                    let _ = respond.send(state);
                }
                Command::Stop => {
                    self.sink.info("automatic sync stopped");
                    self.halt();
                }
                Command::SyncNow { respond } => self.sync_now(respond),
                Command::Saved(path) => self.saved(&path),
                Command::SetInterval(secs) => self.set_interval(secs),
                Command::SetEnabled(enabled) => {
                    self.enabled = enabled;
                    if enabled {
                        self.start();
                    } else {
                        self.sink.info("automatic sync turned off in config");
                        self.halt();
                    }
                }
                Command::Tick(epoch) => self.tick(epoch),
                Command::DebounceElapsed(epoch) => self.debounce_elapsed(epoch),
                Command::Finished {
                    generation,
                    outcome,
                } => self.finished(generation, outcome),
                Command::Shutdown => {
                    self.cancel_timers();
                    break;
                }
            }
        }
        tracing::debug!("sync orchestrator exited");
    }

    fn start(&mut self) -> SyncState {
        if let Err(reason) = self.check_preconditions() {
            self.sink.info(reason);
            self.halt();
            return self.state;
        }

        self.sink
            .info(format!("starting automatic sync of {}", self.repo.display()));
        self.arm_timer();
        if !self.trigger(Trigger::Startup) && self.state != SyncState::Syncing {
            self.set_state(SyncState::Idle);
        }
        self.state
    }

    fn check_preconditions(&self) -> Result<(), String> {
        if !self.enabled {
            return Err("automatic sync is turned off (git_auto_sync: false)".to_string());
        }
        if !self.repo.is_dir() {
            return Err(format!(
                "notes directory does not exist: {}",
                self.repo.display()
            ));
        }
        if !self.repo.join(REPO_METADATA_DIR).exists() {
            return Err(format!(
                "{} is not a git repository; automatic sync skipped",
                self.repo.display()
            ));
        }
        Ok(())
    }

    /// Cancel timers, orphan any in-flight cycle, go `disabled`.
    fn halt(&mut self) {
        self.cancel_timers();
        self.generation += 1;
        self.set_state(SyncState::Disabled);
        if let Some(waiter) = self.waiter.take() {
            let _ = waiter.send(SyncNowOutcome::Disabled);
        }
    }

    fn sync_now(&mut self, respond: oneshot::Sender<SyncNowOutcome>) {
        match self.state {
            SyncState::Conflict => {
                self.sink
                    .info("manual sync skipped: resolve the conflict, then retry");
                let _ = respond.send(SyncNowOutcome::Conflict {
                    diagnostics: self.sink.snapshot(),
                });
            }
            SyncState::Disabled => {
                let _ = respond.send(SyncNowOutcome::Disabled);
            }
            SyncState::Idle | SyncState::Syncing => {
                if self.trigger(Trigger::Manual) {
                    self.waiter = Some(respond);
                } else {
                    let _ = respond.send(SyncNowOutcome::Dropped);
                }
            }
        }
    }

    fn saved(&mut self, path: &Path) {
        if !self.state.is_active() {
            tracing::debug!("ignoring save while {}: {}", self.state, path.display());
            return;
        }
        self.debounce_epoch += 1;
        let epoch = self.debounce_epoch;
        let commands = self.commands.clone();
        // Replacing the handle aborts the previous countdown.
        self.debounce = Some(schedule_once(DEBOUNCE_WINDOW, move || {
            if let Some(tx) = commands.upgrade() {
                let _ = tx.send(Command::DebounceElapsed(epoch));
            }
        }));
    }

    fn debounce_elapsed(&mut self, epoch: u64) {
        if epoch != self.debounce_epoch || self.debounce.take().is_none() {
            return;
        }
        if self.state.is_active() {
            self.trigger(Trigger::Save);
        }
    }

    fn tick(&mut self, epoch: u64) {
        if epoch != self.timer_epoch || self.timer.is_none() || !self.state.is_active() {
            return;
        }
        self.trigger(Trigger::Periodic);
    }

    fn set_interval(&mut self, secs: u64) {
        self.interval = clamp_interval(secs);
        if self.timer.is_some() {
            self.arm_timer();
        }
    }

    fn arm_timer(&mut self) {
        self.timer_epoch += 1;
        let epoch = self.timer_epoch;
        let commands = self.commands.clone();
        self.timer = Some(schedule_every(self.interval, move || match commands.upgrade() {
            Some(tx) => tx.send(Command::Tick(epoch)).is_ok(),
            None => false,
        }));
        self.sink.info(format!(
            "sync timer armed (interval: {}s)",
            self.interval.as_secs()
        ));
    }

    fn cancel_timers(&mut self) {
        self.timer = None;
        self.debounce = None;
    }

    /// Dispatch a cycle unless one is already in flight.
    fn trigger(&mut self, trigger: Trigger) -> bool {
        if self.in_flight {
            self.sink.info(format!(
                "{} sync dropped: another sync is still running",
                trigger.label()
            ));
            return false;
        }
        let Some(commands) = self.commands.upgrade() else {
            return false;
        };

        self.in_flight = true;
        self.generation += 1;
        let generation = self.generation;
        self.set_state(SyncState::Syncing);
        self.sink.info(format!("{} sync started", trigger.label()));

        let vcs = Arc::clone(&self.vcs);
        tokio::spawn(async move {
            let outcome = tokio::task::spawn_blocking(move || sync_once(&*vcs, Local::now()))
                .await
                .unwrap_or_else(|err| CycleOutcome::Failed {
                    class: FailureClass::Other,
                    diagnostics: VcsError::Join(err.to_string()).to_string(),
                    rebase_aborted: false,
                });
            let _ = commands.send(Command::Finished {
                generation,
                outcome,
            });
        });
        true
    }

    fn finished(&mut self, generation: u64, outcome: CycleOutcome) {
        self.in_flight = false;
        if generation != self.generation {
            self.sink.info("discarded the result of a sync that was stopped");
            return;
        }

        match &outcome {
            CycleOutcome::Synced(report) => {
                if let Some(message) = &report.committed {
                    self.sink.info(format!("committed: {message}"));
                }
                self.sink.info("pull and push complete");
                self.set_state(SyncState::Idle);
            }
            CycleOutcome::Failed {
                class,
                diagnostics,
                rebase_aborted,
            } => self.failed(*class, diagnostics, *rebase_aborted),
        }

        if let Some(waiter) = self.waiter.take() {
            let _ = waiter.send(SyncNowOutcome::Finished {
                state: self.state,
                outcome,
            });
        }
    }

    fn failed(&mut self, class: FailureClass, diagnostics: &str, rebase_aborted: bool) {
        match class {
            FailureClass::Conflict => {
                self.sink
                    .warn("conflict detected; resolve it by hand, then retry");
                self.sink.warn(diagnostics);
                if rebase_aborted {
                    self.sink.info("rebase aborted; working tree restored");
                }
                self.cancel_timers();
                self.set_state(SyncState::Conflict);
                self.sink.emit(SyncEvent::ConflictDetected {
                    repo: self.repo.clone(),
                    diagnostics: diagnostics.to_string(),
                    actions: vec![RecoveryAction::OpenTerminal, RecoveryAction::Retry],
                });
            }
            FailureClass::Network => {
                self.sink
                    .warn("network error; will retry on the next trigger");
                self.sink.warn(diagnostics);
                self.set_state(SyncState::Idle);
            }
            FailureClass::ToolMissing => {
                self.sink.warn("git not found; automatic sync disabled");
                self.sink.warn(diagnostics);
                self.cancel_timers();
                self.set_state(SyncState::Disabled);
            }
            FailureClass::Other => {
                self.sink.warn("sync error:");
                self.sink.warn(diagnostics);
                self.set_state(SyncState::Idle);
            }
        }
    }

    fn set_state(&mut self, state: SyncState) {
        if self.state == state {
            return;
        }
        self.state = state;
        self.state_tx.send_replace(state);
        self.sink.emit(SyncEvent::StateChanged { state });
    }
}
