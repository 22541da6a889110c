// Event state and the blocking wait
//
// `pending` is a set, one bit per source: notifications for a source
// that arrive before anyone waits collapse into a single bit. Only
// presence survives, never count or order. Bits stay set until a wait
// for that source consumes them.
//
// `awaited` names at most one source. It is armed only while the
// interpreter context is parked inside `Wait`, and the dispatcher
// resumes the interpreter only when that exact source is pending.

use core::cell::Cell;
use core::fmt;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};

use log::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventSource {
    Serial,
    Timer,
    #[cfg(feature = "framebuffer")]
    Framebuffer,
    Fs,
    #[cfg(feature = "i2c")]
    I2c,
}

impl EventSource {
    pub const ALL: &'static [EventSource] = &[
        EventSource::Serial,
        EventSource::Timer,
        #[cfg(feature = "framebuffer")]
        EventSource::Framebuffer,
        EventSource::Fs,
        #[cfg(feature = "i2c")]
        EventSource::I2c,
    ];

    const fn bit(self) -> u8 {
        match self {
            EventSource::Serial => 1 << 0,
            EventSource::Timer => 1 << 1,
            #[cfg(feature = "framebuffer")]
            EventSource::Framebuffer => 1 << 2,
            EventSource::Fs => 1 << 3,
            #[cfg(feature = "i2c")]
            EventSource::I2c => 1 << 4,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            EventSource::Serial => "serial",
            EventSource::Timer => "timer",
            #[cfg(feature = "framebuffer")]
            EventSource::Framebuffer => "framebuffer",
            EventSource::Fs => "fs",
            #[cfg(feature = "i2c")]
            EventSource::I2c => "i2c",
        }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct EventSet(u8);

impl EventSet {
    pub const EMPTY: Self = Self(0);

    pub const fn with(self, source: EventSource) -> Self {
        Self(self.0 | source.bit())
    }

    pub const fn contains(self, source: EventSource) -> bool {
        self.0 & source.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, source: EventSource) {
        self.0 |= source.bit();
    }

    pub fn remove(&mut self, source: EventSource) {
        self.0 &= !source.bit();
    }

    pub fn iter(self) -> impl Iterator<Item = EventSource> {
        EventSource::ALL
            .iter()
            .copied()
            .filter(move |s| self.contains(*s))
    }
}

impl fmt::Debug for EventSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<EventSource> for EventSet {
    fn from_iter<I: IntoIterator<Item = EventSource>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}

pub struct EventState {
    pending: Cell<EventSet>,
    awaited: Cell<Option<EventSource>>,
}

impl Default for EventState {
    fn default() -> Self {
        Self::new()
    }
}

impl EventState {
    pub const fn new() -> Self {
        Self {
            pending: Cell::new(EventSet::EMPTY),
            awaited: Cell::new(None),
        }
    }

    /// Record that `source` fired. Dispatcher only.
    pub fn raise(&self, source: EventSource) {
        let mut pending = self.pending.get();
        pending.insert(source);
        self.pending.set(pending);
    }

    pub fn pending(&self) -> EventSet {
        self.pending.get()
    }

    pub fn is_pending(&self, source: EventSource) -> bool {
        self.pending.get().contains(source)
    }

    pub fn awaited(&self) -> Option<EventSource> {
        self.awaited.get()
    }

    /// The interpreter is parked on a source that is now pending.
    pub fn wait_satisfied(&self) -> bool {
        self.awaited.get().is_some_and(|s| self.is_pending(s))
    }

    /// Suspend the interpreter context until `source` fires.
    ///
    /// Completes on the first poll, without leaving the interpreter
    /// context, if `source` is already pending. Only one wait may be
    /// outstanding; arming a second is fatal.
    pub fn wait(&self, source: EventSource) -> Wait<'_> {
        Wait {
            state: self,
            source,
            armed: false,
        }
    }

    fn take(&self, source: EventSource) -> bool {
        let mut pending = self.pending.get();
        if !pending.contains(source) {
            return false;
        }
        pending.remove(source);
        self.pending.set(pending);
        true
    }

    fn arm(&self, source: EventSource) {
        if let Some(current) = self.awaited.get() {
            panic!("wait on {} while already waiting on {}", source, current);
        }
        self.awaited.set(Some(source));
    }

    fn finish(&self, source: EventSource) {
        assert_eq!(
            self.awaited.get(),
            Some(source),
            "resumed a wait that was not armed"
        );
        assert!(self.take(source), "resumed before {} fired", source);
        self.awaited.set(None);
    }
}

#[must_use = "a wait does nothing unless awaited"]
pub struct Wait<'a> {
    state: &'a EventState,
    source: EventSource,
    armed: bool,
}

impl Future for Wait<'_> {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        if self.armed {
            // only the dispatcher resumes us, and only once our bit is set
            self.state.finish(self.source);
            self.armed = false;
            return Poll::Ready(());
        }
        if self.state.take(self.source) {
            return Poll::Ready(());
        }
        self.state.arm(self.source);
        self.armed = true;
        // Pending hands control back to the event context
        Poll::Pending
    }
}

impl Drop for Wait<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!("events: wait on {} dropped while armed", self.source);
            self.state.awaited.set(None);
        }
    }
}
