// Two-context cooperative scheduler
// NOTE: no preemption, no ready queue. Exactly two tasks exist and
// control moves between them only at two points:
//   event -> interpreter: switch_to(Task::Interpreter), from dispatch
//   interpreter -> event: a Wait returning Pending
//
// The interpreter context is a pinned future polled once per switch.
// Its only legal suspension point is a wait, so every Pending it
// returns must leave exactly one source armed in the event state.

use alloc::boxed::Box;
use core::fmt;
use core::future::Future;
use core::pin::Pin;
use core::task::Poll;

use embassy_futures::poll_once;
use log::{debug, info};

use crate::kernel::events::EventState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Event,
    Interpreter,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Event => write!(f, "event"),
            Task::Interpreter => write!(f, "interpreter"),
        }
    }
}

/// Result of a switch, seen from the event context once it runs again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Switch {
    /// Target was the running task already
    Unchanged,
    /// Interpreter ran up to its next wait and yielded back
    Yielded,
    /// Interpreter entry returned; it will never run again
    Exited,
}

type Context = Pin<Box<dyn Future<Output = ()>>>;

pub struct Scheduler {
    events: &'static EventState,
    current: Task,
    interpreter: Option<Context>,
    switches: u32,
}

impl Scheduler {
    // the caller's context becomes the event context
    pub fn new(events: &'static EventState) -> Self {
        Self {
            events,
            current: Task::Event,
            interpreter: None,
            switches: 0,
        }
    }

    /// Install the interpreter context with `entry` as its routine.
    pub fn derive(&mut self, entry: impl Future<Output = ()> + 'static) {
        assert!(
            self.interpreter.is_none(),
            "interpreter context already derived"
        );
        self.interpreter = Some(Box::pin(entry));
        debug!("sched: interpreter context derived");
    }

    pub fn current(&self) -> Task {
        self.current
    }

    pub fn has_interpreter(&self) -> bool {
        self.interpreter.is_some()
    }

    // switches into the interpreter so far
    pub fn switches(&self) -> u32 {
        self.switches
    }

    pub fn switch_to(&mut self, target: Task) -> Switch {
        if target == self.current {
            return Switch::Unchanged;
        }
        // the interpreter reaches the event context by returning Pending
        // from a wait, never through this call
        assert_eq!(
            target,
            Task::Interpreter,
            "switch_to(event) issued outside the event context"
        );

        let Some(ctx) = self.interpreter.as_mut() else {
            panic!("switch to interpreter with no interpreter context");
        };

        self.switches = self.switches.wrapping_add(1);
        self.current = Task::Interpreter;
        let poll = poll_once(ctx.as_mut());
        self.current = Task::Event;

        match poll {
            Poll::Pending => {
                assert!(
                    self.events.awaited().is_some(),
                    "interpreter suspended outside of a wait"
                );
                Switch::Yielded
            }
            Poll::Ready(()) => {
                self.interpreter = None;
                info!("sched: interpreter context finished");
                Switch::Exited
            }
        }
    }
}
