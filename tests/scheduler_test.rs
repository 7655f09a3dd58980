//! Command queue ordering and completion

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use road_director::simulation::{
    AgentId, Command, CommandCompletion, ControllableAgent, Position, SimId, TalkCommand,
    TeleportCommand,
};

/// Records when it starts and hands its completion to the test to signal later
struct DeferredCommand {
    label: usize,
    log: Rc<RefCell<Vec<String>>>,
    parked: Rc<RefCell<Vec<CommandCompletion>>>,
}

impl Command for DeferredCommand {
    fn name(&self) -> &'static str {
        "deferred"
    }

    fn execute(self: Box<Self>, done: CommandCompletion) {
        self.log.borrow_mut().push(format!("start {}", self.label));
        self.parked.borrow_mut().push(done);
    }
}

fn agent() -> ControllableAgent {
    ControllableAgent::new(AgentId(SimId(0)))
}

#[test]
fn test_commands_execute_in_enqueue_order_one_at_a_time() {
    let agent = agent();
    let log = Rc::new(RefCell::new(Vec::new()));
    let parked = Rc::new(RefCell::new(Vec::new()));

    for label in 0..3 {
        agent.add_command(DeferredCommand {
            label,
            log: log.clone(),
            parked: parked.clone(),
        });
    }

    assert_eq!(*log.borrow(), vec!["start 0"]);
    assert!(agent.is_executing());
    assert_eq!(agent.pending_count(), 2);

    for label in 0..3 {
        let done = parked.borrow_mut().remove(0);
        log.borrow_mut().push(format!("done {label}"));
        done.signal();
    }

    assert_eq!(
        *log.borrow(),
        vec!["start 0", "done 0", "start 1", "done 1", "start 2", "done 2"]
    );
    assert!(!agent.is_executing());
    assert_eq!(agent.completed_count(), 3);
}

#[test]
fn test_synchronous_commands_drain_immediately() {
    let agent = agent();
    let target = Rc::new(Cell::new(Position::default()));

    agent.add_command(TalkCommand::new("driver", "on my way"));
    agent.add_command(TeleportCommand::new(
        target.clone(),
        Position::new(3.0, 0.0, 4.0),
    ));

    assert!(!agent.is_executing());
    assert_eq!(agent.pending_count(), 0);
    assert_eq!(agent.completed_count(), 2);
    assert_eq!(target.get(), Position::new(3.0, 0.0, 4.0));
}

#[test]
fn test_command_that_never_completes_stalls_the_queue() {
    let agent = agent();
    let log = Rc::new(RefCell::new(Vec::new()));
    let parked = Rc::new(RefCell::new(Vec::new()));

    agent.add_command(DeferredCommand {
        label: 0,
        log: log.clone(),
        parked: parked.clone(),
    });
    let talk_done = agent.add_command(TalkCommand::new("driver", "never said"));

    assert!(!talk_done.is_signalled());
    assert_eq!(agent.pending_count(), 1);
    assert_eq!(*log.borrow(), vec!["start 0"]);
}

#[test]
fn test_completion_subscribers_all_fire_once() {
    let agent = agent();
    let log = Rc::new(RefCell::new(Vec::new()));
    let parked = Rc::new(RefCell::new(Vec::new()));
    let hits = Rc::new(Cell::new(0));

    let completion = agent.add_command(DeferredCommand {
        label: 0,
        log,
        parked: parked.clone(),
    });
    for _ in 0..2 {
        let hits = hits.clone();
        completion.subscribe(move || hits.set(hits.get() + 1));
    }

    let done = parked.borrow_mut().remove(0);
    assert!(done.signal());
    assert!(!done.signal(), "second signal must be ignored");

    assert_eq!(hits.get(), 2);
    assert_eq!(agent.completed_count(), 1);
}

#[test]
fn test_subscribing_after_completion_runs_immediately() {
    let completion = CommandCompletion::new();
    completion.signal();

    let ran = Rc::new(Cell::new(false));
    let ran_clone = ran.clone();
    completion.subscribe(move || ran_clone.set(true));
    assert!(ran.get());
}

#[test]
fn test_command_queued_from_completion_runs_next() {
    let agent = agent();
    let target = Rc::new(Cell::new(Position::default()));
    let log = Rc::new(RefCell::new(Vec::new()));
    let parked = Rc::new(RefCell::new(Vec::new()));

    let first = agent.add_command(DeferredCommand {
        label: 0,
        log,
        parked: parked.clone(),
    });
    let follow_up_agent = agent.clone();
    let follow_up_target = target.clone();
    first.subscribe(move || {
        follow_up_agent.add_command(TeleportCommand::new(
            follow_up_target,
            Position::new(1.0, 2.0, 3.0),
        ));
    });

    let done = parked.borrow_mut().remove(0);
    done.signal();

    assert_eq!(target.get(), Position::new(1.0, 2.0, 3.0));
    assert_eq!(agent.completed_count(), 2);
}

#[test]
fn test_callers_see_completions_in_queue_order() {
    let agent = agent();
    let log = Rc::new(RefCell::new(Vec::new()));
    let parked = Rc::new(RefCell::new(Vec::new()));
    let finished = Rc::new(RefCell::new(Vec::new()));

    let first = agent.add_command(DeferredCommand {
        label: 1,
        log,
        parked: parked.clone(),
    });
    // completes synchronously as soon as it starts
    let second = agent.add_command(TalkCommand::new("driver", "right behind you"));
    for (label, done) in [(1, &first), (2, &second)] {
        let finished = finished.clone();
        done.subscribe(move || finished.borrow_mut().push(label));
    }

    let done = parked.borrow_mut().remove(0);
    done.signal();

    assert_eq!(*finished.borrow(), vec![1, 2]);
    assert_eq!(agent.completed_count(), 2);
}

#[test]
fn test_next_command_starts_after_subscribers_run() {
    let agent = agent();
    let log = Rc::new(RefCell::new(Vec::new()));
    let parked = Rc::new(RefCell::new(Vec::new()));

    let first = agent.add_command(DeferredCommand {
        label: 0,
        log: log.clone(),
        parked: parked.clone(),
    });
    agent.add_command(DeferredCommand {
        label: 1,
        log: log.clone(),
        parked: parked.clone(),
    });
    let observer = log.clone();
    first.subscribe(move || observer.borrow_mut().push("done 0".to_string()));

    let done = parked.borrow_mut().remove(0);
    done.signal();

    assert_eq!(*log.borrow(), vec!["start 0", "done 0", "start 1"]);
}

#[test]
fn test_long_run_of_synchronous_commands_drains_without_recursion() {
    const QUEUED: usize = 10_000;
    let agent = agent();
    let parked = Rc::new(RefCell::new(Vec::new()));

    agent.add_command(DeferredCommand {
        label: 0,
        log: Rc::default(),
        parked: parked.clone(),
    });
    let target = Rc::new(Cell::new(Position::default()));
    let mut last = None;
    for i in 0..QUEUED {
        last = Some(agent.add_command(TeleportCommand::new(
            target.clone(),
            Position::new(i as f32, 0.0, 0.0),
        )));
    }
    assert_eq!(agent.pending_count(), QUEUED);

    let done = parked.borrow_mut().remove(0);
    done.signal();

    assert!(last.unwrap().is_signalled());
    assert!(!agent.is_executing());
    assert_eq!(agent.pending_count(), 0);
    assert_eq!(agent.completed_count(), QUEUED + 1);
    assert_eq!(target.get(), Position::new((QUEUED - 1) as f32, 0.0, 0.0));
}
