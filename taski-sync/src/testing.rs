//! Scriptable [`VcsClient`] double for exercising the orchestrator without
//! a real repository.

use std::collections::{HashMap, VecDeque};
use std::sync::{mpsc as std_mpsc, Mutex};

use tokio::sync::mpsc;

use crate::error::VcsError;
use crate::vcs::VcsClient;

/// A [`VcsClient`] operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Status,
    StageAll,
    Commit,
    PullRebase,
    Push,
    AbortRebase,
}

#[derive(Default)]
struct Script {
    queued: HashMap<Op, VecDeque<Result<String, VcsError>>>,
    calls: HashMap<Op, usize>,
    messages: Vec<String>,
}

struct Gate {
    entered: mpsc::UnboundedSender<()>,
    release: std_mpsc::Receiver<()>,
}

/// Returns queued results per operation (success with empty output once the
/// queue is drained) and counts every call.
#[derive(Default)]
pub struct ScriptedVcs {
    script: Mutex<Script>,
    gate: Mutex<Option<Gate>>,
}

/// Test-side control of a held cycle; see [`ScriptedVcs::hold`].
pub struct GateControl {
    entered: mpsc::UnboundedReceiver<()>,
    release: std_mpsc::Sender<()>,
}

impl GateControl {
    /// Wait until a cycle is blocked at its status step.
    pub async fn wait_entered(&mut self) {
        let _ = self.entered.recv().await;
    }

    /// Let one held cycle continue.
    pub fn release(&self) {
        let _ = self.release.send(());
    }
}

impl ScriptedVcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next result for `op`.
    pub fn script(&self, op: Op, result: Result<String, VcsError>) {
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        script.queued.entry(op).or_default().push_back(result);
    }

    pub fn calls(&self, op: Op) -> usize {
        let script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        script.calls.get(&op).copied().unwrap_or(0)
    }

    pub fn commit_messages(&self) -> Vec<String> {
        let script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        script.messages.clone()
    }

    /// Block every subsequent cycle at its status step until released.
    /// Dropping the returned control releases all held and future cycles.
    pub fn hold(&self) -> GateControl {
        let (entered_tx, entered_rx) = mpsc::unbounded_channel();
        let (release_tx, release_rx) = std_mpsc::channel();
        *self.gate.lock().unwrap_or_else(|e| e.into_inner()) = Some(Gate {
            entered: entered_tx,
            release: release_rx,
        });
        GateControl {
            entered: entered_rx,
            release: release_tx,
        }
    }

    fn next(&self, op: Op) -> Result<String, VcsError> {
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        *script.calls.entry(op).or_default() += 1;
        script
            .queued
            .get_mut(&op)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(String::new()))
    }

    fn wait_at_gate(&self) {
        let gate = self.gate.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(gate) = gate.as_ref() {
            let _ = gate.entered.send(());
            let _ = gate.release.recv();
        }
    }
}

impl VcsClient for ScriptedVcs {
    fn status(&self) -> Result<String, VcsError> {
        self.wait_at_gate();
        self.next(Op::Status)
    }

    fn stage_all(&self) -> Result<(), VcsError> {
        self.next(Op::StageAll).map(drop)
    }

    fn commit(&self, message: &str) -> Result<(), VcsError> {
        self.next(Op::Commit)?;
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        script.messages.push(message.to_string());
        Ok(())
    }

    fn pull_rebase(&self) -> Result<(), VcsError> {
        self.next(Op::PullRebase).map(drop)
    }

    fn push(&self) -> Result<(), VcsError> {
        self.next(Op::Push).map(drop)
    }

    fn abort_rebase(&self) -> Result<(), VcsError> {
        self.next(Op::AbortRebase).map(drop)
    }
}
