// Notification dispatch
//
// Called once per incoming signal. Order matters:
//   1. pump every transport, whatever the channel (one signal may
//      stand for several coalesced completions)
//   2. route channel -> event source, set the pending bit
//   3. resume the interpreter if it is parked on a pending source
//   4. per-cycle deferred work, after control is back with us

use alloc::boxed::Box;
use alloc::vec::Vec;

use log::{error, trace};

use crate::config::{Channel, ChannelMap};
use crate::kernel::events::{EventSource, EventState};
use crate::kernel::scheduler::{Scheduler, Switch, Task};

/// Outgoing signal to a peer component.
pub trait Notify {
    fn notify(&self, channel: Channel);
}

/// A transport pumped on every notification.
pub trait Transport {
    /// Drain completions into consumer-visible state. Must be a no-op
    /// when nothing new arrived.
    fn process_pending(&mut self);

    /// Deferred bookkeeping, once per dispatch cycle.
    fn end_of_cycle(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Event(EventSource),
    /// Expected channel that carries no event (ethernet rx/tx)
    Quiet,
    Unknown,
}

impl ChannelMap {
    pub fn route(&self, channel: Channel) -> Route {
        let table = [
            (self.serial_rx, EventSource::Serial),
            (self.timer, EventSource::Timer),
            #[cfg(feature = "framebuffer")]
            (self.framebuffer, EventSource::Framebuffer),
            (self.fs, EventSource::Fs),
            #[cfg(feature = "i2c")]
            (self.i2c, EventSource::I2c),
        ];
        if let Some(&(_, source)) = table.iter().find(|(ch, _)| *ch == channel) {
            return Route::Event(source);
        }
        if channel == self.eth_rx || channel == self.eth_tx {
            return Route::Quiet;
        }
        Route::Unknown
    }
}

/// What one dispatch cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cycle {
    pub route: Route,
    pub switch: Switch,
}

pub struct Dispatcher {
    channels: ChannelMap,
    transports: Vec<Box<dyn Transport>>,
}

impl Dispatcher {
    pub fn new(channels: ChannelMap) -> Self {
        Self {
            channels,
            transports: Vec::new(),
        }
    }

    pub fn channels(&self) -> &ChannelMap {
        &self.channels
    }

    // pumped in registration order
    pub fn register(&mut self, transport: impl Transport + 'static) {
        self.transports.push(Box::new(transport));
    }

    pub fn transports(&self) -> usize {
        self.transports.len()
    }

    pub fn notified(&mut self, channel: Channel, events: &EventState, sched: &mut Scheduler) -> Cycle {
        for t in self.transports.iter_mut() {
            t.process_pending();
        }

        let route = self.channels.route(channel);
        match route {
            Route::Event(source) => {
                trace!("dispatch: ch {} -> {}", channel, source);
                events.raise(source);
            }
            Route::Quiet => {}
            Route::Unknown => {
                error!("dispatch: unexpected notification from channel {:#x}", channel);
            }
        }

        let switch = if events.wait_satisfied() {
            sched.switch_to(Task::Interpreter)
        } else {
            Switch::Unchanged
        };

        for t in self.transports.iter_mut() {
            t.end_of_cycle();
        }

        Cycle { route, switch }
    }
}
