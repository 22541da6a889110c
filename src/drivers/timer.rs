// Timer client: the timer driver is a separate component reached
// through the Clock trait; expiry arrives as a timer notification.

use crate::kernel::events::{EventSource, EventState};

pub const NS_PER_MS: u64 = 1_000_000;

pub trait Clock {
    fn now_ns(&self) -> u64;

    /// Request a single timer notification `ns` from now, replacing any
    /// earlier request.
    fn set_timeout(&self, ns: u64);
}

pub struct Timer {
    clock: &'static dyn Clock,
    events: &'static EventState,
}

impl Timer {
    pub fn new(clock: &'static dyn Clock, events: &'static EventState) -> Self {
        Self { clock, events }
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ns() / NS_PER_MS
    }

    /// Suspend the interpreter for at least `ms`.
    // a timer bit left over from an earlier timeout can end a wait
    // early, so re-arm until the deadline has really passed
    pub async fn sleep_ms(&self, ms: u64) {
        let deadline = self.clock.now_ns().saturating_add(ms.saturating_mul(NS_PER_MS));
        loop {
            let now = self.clock.now_ns();
            if now >= deadline {
                return;
            }
            self.clock.set_timeout(deadline - now);
            self.events.wait(EventSource::Timer).await;
        }
    }
}
