// Shared fixtures for the bridge scenario tests.
#![allow(dead_code)]

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use cobridge::config::Channel;
use cobridge::kernel::{Interpreter, Notify, RuntimeState, Transport};

pub fn leak<T>(v: T) -> &'static T {
    Box::leak(Box::new(v))
}

pub fn state() -> &'static RuntimeState {
    leak(RuntimeState::new())
}

pub type Log = Rc<RefCell<Vec<String>>>;

pub fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn push(log: &Log, entry: impl Into<String>) {
    log.borrow_mut().push(entry.into());
}

/// Interpreter whose main unit is whatever future `body` returns.
pub struct Script<F> {
    body: F,
    log: Log,
}

impl<F> Script<F> {
    pub fn new(log: &Log, body: F) -> Self {
        Self {
            body,
            log: log.clone(),
        }
    }
}

impl<F, Fut> Interpreter for Script<F>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), &'static str>>,
{
    type Error = &'static str;

    fn initialize(&mut self) {
        push(&self.log, "init");
    }

    fn run_main_unit(&mut self) -> impl Future<Output = Result<(), &'static str>> {
        (self.body)()
    }

    fn collect_garbage(&mut self) {
        push(&self.log, "gc");
    }

    fn deinitialize(&mut self) {
        push(&self.log, "deinit");
    }
}

/// Transport that only records when it is pumped.
pub struct Probe {
    pub log: Log,
}

impl Transport for Probe {
    fn process_pending(&mut self) {
        push(&self.log, "pump");
    }

    fn end_of_cycle(&mut self) {
        push(&self.log, "end");
    }
}

#[derive(Default)]
pub struct Outbox(pub RefCell<Vec<Channel>>);

impl Notify for Outbox {
    fn notify(&self, channel: Channel) {
        self.0.borrow_mut().push(channel);
    }
}
