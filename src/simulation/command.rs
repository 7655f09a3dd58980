//! Commands: units of work queued on a controllable agent
//!
//! A command runs once and reports completion exactly once through a
//! `CommandCompletion`. Failures are the command's own business: they are
//! logged and the command still completes.

use log::{info, warn};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::types::Position;

/// Something an agent can be told to do
pub trait Command {
    /// Short label used in logs
    fn name(&self) -> &'static str;

    /// Start the command. `done` must be signalled exactly once, now or on a later tick.
    fn execute(self: Box<Self>, done: CommandCompletion);
}

#[derive(Default)]
struct CompletionState {
    signalled: bool,
    subscribers: Vec<Box<dyn FnOnce()>>,
    /// Runs after every subscriber; reserved for the owning agent's queue
    scheduler: Option<Box<dyn FnOnce()>>,
}

/// One-shot, multi-subscriber completion notification
///
/// Unlike a `Promise` there is no error channel; a command that failed
/// still signals here.
#[derive(Clone, Default)]
pub struct CommandCompletion {
    state: Rc<RefCell<CompletionState>>,
}

impl CommandCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `callback` once the command completes (immediately if it already has)
    pub fn subscribe(&self, callback: impl FnOnce() + 'static) {
        if self.is_signalled() {
            callback();
        } else {
            self.state.borrow_mut().subscribers.push(Box::new(callback));
        }
    }

    /// Hook the agent's queue in behind all subscribers, so callers observe
    /// this completion before the next command starts.
    pub(crate) fn on_signalled_last(&self, callback: impl FnOnce() + 'static) {
        if self.is_signalled() {
            callback();
            return;
        }
        let mut state = self.state.borrow_mut();
        if state.scheduler.replace(Box::new(callback)).is_some() {
            warn!("command completion already had a scheduler hook, replacing it");
        }
    }

    /// Fire the notification. Only the first call has any effect.
    pub fn signal(&self) -> bool {
        let (subscribers, scheduler) = {
            let mut state = self.state.borrow_mut();
            if state.signalled {
                warn!("command completion signalled more than once, ignoring");
                return false;
            }
            state.signalled = true;
            (std::mem::take(&mut state.subscribers), state.scheduler.take())
        };

        for subscriber in subscribers {
            subscriber();
        }
        if let Some(scheduler) = scheduler {
            scheduler();
        }
        true
    }

    pub fn is_signalled(&self) -> bool {
        self.state.borrow().signalled
    }
}

/// Logs a line of dialogue
#[derive(Debug, Clone)]
pub struct TalkCommand {
    speaker: String,
    message: String,
}

impl TalkCommand {
    pub fn new(speaker: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            message: message.into(),
        }
    }
}

impl Command for TalkCommand {
    fn name(&self) -> &'static str {
        "talk"
    }

    fn execute(self: Box<Self>, done: CommandCompletion) {
        info!("{}: {}", self.speaker, self.message);
        done.signal();
    }
}

/// A position shared between an entity and the commands that move it
pub type SharedPosition = Rc<Cell<Position>>;

/// Instantly moves an entity
#[derive(Debug, Clone)]
pub struct TeleportCommand {
    target: SharedPosition,
    position: Position,
}

impl TeleportCommand {
    pub fn new(target: SharedPosition, position: Position) -> Self {
        Self { target, position }
    }
}

impl Command for TeleportCommand {
    fn name(&self) -> &'static str {
        "teleport"
    }

    fn execute(self: Box<Self>, done: CommandCompletion) {
        self.target.set(self.position);
        done.signal();
    }
}
