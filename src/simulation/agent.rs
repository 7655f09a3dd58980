//! Per-agent command queue
//!
//! Commands run strictly in the order they were added, one at a time. The
//! next command starts from inside the previous one's completion signal,
//! after the caller's own subscribers, so a command that never completes
//! stalls its agent for good. Runs of synchronously completing commands are
//! drained by a loop rather than by recursion.

use log::debug;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use super::command::{Command, CommandCompletion};
use super::types::AgentId;

struct AgentQueue {
    id: AgentId,
    pending: VecDeque<(Box<dyn Command>, CommandCompletion)>,
    executing: bool,
    /// Set while `execute_next` is looping over the queue
    draining: bool,
    completed: usize,
}

/// Cheap-to-clone handle to one agent's command queue
#[derive(Clone)]
pub struct ControllableAgent {
    queue: Rc<RefCell<AgentQueue>>,
}

impl ControllableAgent {
    pub fn new(id: AgentId) -> Self {
        Self {
            queue: Rc::new(RefCell::new(AgentQueue {
                id,
                pending: VecDeque::new(),
                executing: false,
                draining: false,
                completed: 0,
            })),
        }
    }

    pub fn id(&self) -> AgentId {
        self.queue.borrow().id
    }

    /// Queue a command, starting it right away if the agent is idle.
    /// The returned completion can be subscribed to by the caller.
    pub fn add_command<C: Command + 'static>(&self, command: C) -> CommandCompletion {
        self.add_boxed_command(Box::new(command))
    }

    pub fn add_boxed_command(&self, command: Box<dyn Command>) -> CommandCompletion {
        let completion = CommandCompletion::new();
        let executing = {
            let mut queue = self.queue.borrow_mut();
            debug!("{}: queued {} command", queue.id, command.name());
            queue.pending.push_back((command, completion.clone()));
            queue.executing
        };

        if !executing {
            self.execute_next();
        }
        completion
    }

    pub fn is_executing(&self) -> bool {
        self.queue.borrow().executing
    }

    /// Commands waiting behind the active one
    pub fn pending_count(&self) -> usize {
        self.queue.borrow().pending.len()
    }

    pub fn completed_count(&self) -> usize {
        self.queue.borrow().completed
    }

    fn execute_next(&self) {
        {
            let mut queue = self.queue.borrow_mut();
            if queue.draining {
                // the loop further up the stack picks the next command
                return;
            }
            queue.draining = true;
        }

        loop {
            let next = {
                let mut queue = self.queue.borrow_mut();
                let next = if queue.executing {
                    None
                } else {
                    queue.pending.pop_front()
                };
                let Some(next) = next else {
                    queue.draining = false;
                    return;
                };
                queue.executing = true;
                debug!("{}: executing {} command", queue.id, next.0.name());
                next
            };

            let (command, completion) = next;
            let agent = Rc::downgrade(&self.queue);
            completion.on_signalled_last(move || Self::on_command_completed(&agent));

            // executed with no borrow held: the command may complete synchronously
            command.execute(completion);
        }
    }

    fn on_command_completed(queue: &Weak<RefCell<AgentQueue>>) {
        let Some(queue) = queue.upgrade() else {
            return;
        };
        {
            let mut state = queue.borrow_mut();
            state.executing = false;
            state.completed += 1;
        }
        ControllableAgent { queue }.execute_next();
    }
}
