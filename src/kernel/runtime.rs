// Runtime bootstrap and interpreter lifecycle
//
// Boot: capture event context -> derive interpreter context -> switch
// into it once. From then on the interpreter only runs when dispatch
// resumes it.
//
// Interpreter lifecycle, driven from inside the interpreter context:
//
//   Initializing --> Running --> Restarting --> Initializing ...
//                        \
//                         +----> Halted   (ExitPolicy::Halt)

use core::cell::Cell;
use core::fmt;
use core::future::Future;

use log::{error, info};

use crate::config::{Channel, ChannelMap, ExitPolicy};
use crate::kernel::dispatch::{Cycle, Dispatcher, Transport};
use crate::kernel::events::EventState;
use crate::kernel::scheduler::{Scheduler, Switch, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Running,
    Restarting,
    Halted,
}

impl Phase {
    pub const fn allows(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Initializing, Phase::Running)
                | (Phase::Running, Phase::Restarting)
                | (Phase::Running, Phase::Halted)
                | (Phase::Restarting, Phase::Initializing)
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Initializing => write!(f, "initializing"),
            Phase::Running => write!(f, "running"),
            Phase::Restarting => write!(f, "restarting"),
            Phase::Halted => write!(f, "halted"),
        }
    }
}

/// Process-wide state shared by both contexts.
pub struct RuntimeState {
    pub events: EventState,
    phase: Cell<Phase>,
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeState {
    pub const fn new() -> Self {
        Self {
            events: EventState::new(),
            phase: Cell::new(Phase::Initializing),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase.get()
    }

    fn enter(&self, next: Phase) {
        let current = self.phase.get();
        assert!(
            current.allows(next),
            "illegal lifecycle transition {} -> {}",
            current,
            next
        );
        self.phase.set(next);
    }
}

/// The interpreter runtime, seen from the bridge.
///
/// Implementations call back into the bridge only through waits on the
/// shared [`EventState`] and through the queue-backed drivers.
pub trait Interpreter {
    type Error: fmt::Display;

    fn initialize(&mut self);

    /// Mount the filesystem collaborator as the interpreter's root.
    fn mount_root(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn init_networking(&mut self) {}

    /// Run the REPL or main module until end of input or an uncaught error.
    fn run_main_unit(&mut self) -> impl Future<Output = Result<(), Self::Error>>;

    fn collect_garbage(&mut self);

    fn deinitialize(&mut self);
}

// interpreter context entry routine
async fn interpreter_main<I: Interpreter>(state: &'static RuntimeState, mut interp: I, policy: ExitPolicy) {
    info!("interp: initialising");
    loop {
        interp.initialize();
        if let Err(e) = interp.mount_root() {
            error!("interp: mounting root failed: {}", e);
        }
        interp.init_networking();

        state.enter(Phase::Running);
        if let Err(e) = interp.run_main_unit().await {
            error!("interp: uncaught: {}", e);
        }

        interp.collect_garbage();
        interp.deinitialize();
        info!("interp: exited");

        match policy {
            ExitPolicy::Restart => {
                state.enter(Phase::Restarting);
                state.enter(Phase::Initializing);
            }
            ExitPolicy::Halt => {
                state.enter(Phase::Halted);
                return;
            }
        }
    }
}

pub struct Runtime {
    state: &'static RuntimeState,
    scheduler: Scheduler,
    dispatcher: Dispatcher,
}

impl Runtime {
    // must be called from what becomes the event context
    pub fn new(state: &'static RuntimeState, channels: ChannelMap) -> Self {
        Self {
            state,
            scheduler: Scheduler::new(&state.events),
            dispatcher: Dispatcher::new(channels),
        }
    }

    pub fn register(&mut self, transport: impl Transport + 'static) {
        self.dispatcher.register(transport);
    }

    /// Derive the interpreter context and run it up to its first wait.
    pub fn start<I: Interpreter + 'static>(&mut self, interp: I, policy: ExitPolicy) -> Switch {
        self.scheduler
            .derive(interpreter_main(self.state, interp, policy));
        self.scheduler.switch_to(Task::Interpreter)
    }

    /// Entry point for every incoming notification. Never blocks.
    pub fn notified(&mut self, channel: Channel) -> Cycle {
        self.dispatcher
            .notified(channel, &self.state.events, &mut self.scheduler)
    }

    pub fn state(&self) -> &'static RuntimeState {
        self.state
    }

    pub fn events(&self) -> &'static EventState {
        &self.state.events
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn channels(&self) -> &ChannelMap {
        self.dispatcher.channels()
    }
}
