mod common;

use std::cell::Cell;
use std::rc::Rc;

use proptest::prelude::*;

use cobridge::config::{ChannelMap, ExitPolicy, channels};
use cobridge::kernel::{EventSet, EventSource, Phase, Route, Runtime, Switch};

use common::{Probe, Script, leak, log, push, state};

#[test]
fn timer_notification_resumes_the_waiting_interpreter() {
    let st = state();
    let events = &st.events;
    let mut rt = Runtime::new(st, ChannelMap::DEFAULT);
    let woke = Rc::new(Cell::new(0));
    let w = woke.clone();
    let l = log();

    rt.start(
        Script::new(&l, move || {
            let w = w.clone();
            async move {
                events.wait(EventSource::Timer).await;
                w.set(w.get() + 1);
                events.wait(EventSource::Serial).await;
                Ok(())
            }
        }),
        ExitPolicy::Halt,
    );
    assert!(events.pending().is_empty());
    assert_eq!(events.awaited(), Some(EventSource::Timer));
    assert_eq!(woke.get(), 0);

    let cycle = rt.notified(channels::TIMER);
    assert_eq!(cycle.route, Route::Event(EventSource::Timer));
    assert_eq!(cycle.switch, Switch::Yielded);
    assert_eq!(woke.get(), 1);
    assert!(events.pending().is_empty());
    assert_eq!(events.awaited(), Some(EventSource::Serial));
}

#[test]
fn event_that_arrived_first_is_consumed_without_a_switch() {
    let st = state();
    let events = &st.events;
    let mut rt = Runtime::new(st, ChannelMap::DEFAULT);
    let l = log();
    let l2 = l.clone();

    // no interpreter yet: bit is recorded, nothing to resume
    let cycle = rt.notified(channels::SERIAL_RX);
    assert_eq!(cycle.switch, Switch::Unchanged);
    assert!(events.is_pending(EventSource::Serial));

    rt.start(
        Script::new(&l, move || {
            let l = l2.clone();
            async move {
                events.wait(EventSource::Serial).await;
                push(&l, "serial");
                events.wait(EventSource::Timer).await;
                Ok(())
            }
        }),
        ExitPolicy::Halt,
    );

    // the one switch is the boot switch; the serial wait never left
    assert_eq!(rt.scheduler().switches(), 1);
    assert_eq!(l.borrow().as_slice(), ["init", "serial"]);
    assert!(events.pending().is_empty());
    assert_eq!(events.awaited(), Some(EventSource::Timer));
}

#[test]
fn unknown_channel_is_ignored() {
    let st = state();
    let events = &st.events;
    let mut rt = Runtime::new(st, ChannelMap::DEFAULT);
    let l = log();
    rt.register(Probe { log: l.clone() });
    rt.notified(channels::FS);
    let before = events.pending();

    let cycle = rt.notified(0x3f);
    assert_eq!(cycle.route, Route::Unknown);
    assert_eq!(cycle.switch, Switch::Unchanged);
    assert_eq!(events.pending(), before);
    // transports are still pumped for the stray signal
    assert_eq!(l.borrow().len(), 4);
}

#[test]
fn ethernet_channels_pump_without_raising() {
    let st = state();
    let mut rt = Runtime::new(st, ChannelMap::DEFAULT);
    assert_eq!(rt.notified(channels::ETH_RX).route, Route::Quiet);
    assert_eq!(rt.notified(channels::ETH_TX).route, Route::Quiet);
    assert!(st.events.pending().is_empty());
}

#[test]
fn transports_pump_before_resume_and_finish_after() {
    let st = state();
    let events = &st.events;
    let mut rt = Runtime::new(st, ChannelMap::DEFAULT);
    let l = log();
    rt.register(Probe { log: l.clone() });

    let l2 = l.clone();
    rt.start(
        Script::new(&l, move || {
            let l = l2.clone();
            async move {
                for _ in 0..2 {
                    events.wait(EventSource::Fs).await;
                    push(&l, "resumed");
                }
                Ok(())
            }
        }),
        ExitPolicy::Halt,
    );
    l.borrow_mut().clear();

    rt.notified(channels::FS);
    assert_eq!(l.borrow().as_slice(), ["pump", "resumed", "end"]);

    l.borrow_mut().clear();
    rt.notified(channels::TIMER);
    assert_eq!(l.borrow().as_slice(), ["pump", "end"]);
    // not awaited, so the timer bit just sits there
    assert!(events.is_pending(EventSource::Timer));
}

#[test]
fn uncaught_error_restarts_the_interpreter() {
    let st = state();
    let events = &st.events;
    let mut rt = Runtime::new(st, ChannelMap::DEFAULT);
    let l = log();

    rt.start(
        Script::new(&l, move || async move {
            events.wait(EventSource::Serial).await;
            Err("boom")
        }),
        ExitPolicy::Restart,
    );
    assert_eq!(rt.phase(), Phase::Running);
    assert_eq!(l.borrow().as_slice(), ["init"]);

    let cycle = rt.notified(channels::SERIAL_RX);
    assert_eq!(cycle.switch, Switch::Yielded);
    assert_eq!(l.borrow().as_slice(), ["init", "gc", "deinit", "init"]);
    assert_eq!(rt.phase(), Phase::Running);
    assert_eq!(events.awaited(), Some(EventSource::Serial));
}

#[test]
fn halted_interpreter_never_runs_again() {
    let st = state();
    let events = &st.events;
    let mut rt = Runtime::new(st, ChannelMap::DEFAULT);
    let l = log();

    rt.start(
        Script::new(&l, move || async move {
            events.wait(EventSource::Timer).await;
            Ok(())
        }),
        ExitPolicy::Halt,
    );

    let cycle = rt.notified(channels::TIMER);
    assert_eq!(cycle.switch, Switch::Exited);
    assert_eq!(rt.phase(), Phase::Halted);
    assert!(!rt.scheduler().has_interpreter());
    assert_eq!(l.borrow().as_slice(), ["init", "gc", "deinit"]);

    // later signals are still recorded, just never consumed
    let cycle = rt.notified(channels::TIMER);
    assert_eq!(cycle.switch, Switch::Unchanged);
    assert!(events.is_pending(EventSource::Timer));
}

#[test]
fn main_unit_that_returns_before_waiting_halts_during_boot() {
    let st = state();
    let mut rt = Runtime::new(st, ChannelMap::DEFAULT);
    let l = log();
    let switch = rt.start(Script::new(&l, || async { Ok(()) }), ExitPolicy::Halt);
    assert_eq!(switch, Switch::Exited);
    assert_eq!(rt.phase(), Phase::Halted);
}

const CHANNELS: &[u32] = &[
    channels::SERIAL_RX,
    channels::TIMER,
    channels::FS,
    channels::ETH_RX,
    channels::I2C,
    channels::FRAMEBUFFER_VMM,
    0x3f,
];

proptest! {
    // One wait for `s`, issued after `split` notifications: it returns
    // exactly once iff some notification for `s` arrives, clears only
    // the bit it consumed, and leaves every other bit as raised.
    #[test]
    fn single_wait_is_satisfied_exactly_once(
        seq in proptest::collection::vec(proptest::sample::select(CHANNELS), 0..24),
        source_idx in 0..EventSource::ALL.len(),
        split in 0usize..24,
    ) {
        let s = EventSource::ALL[source_idx];
        let split = split.min(seq.len());
        let map = ChannelMap::DEFAULT;

        let st = state();
        let events = &st.events;
        let mut rt = Runtime::new(st, map);
        let hits = leak(Cell::new(0u32));
        let l = log();

        for &ch in &seq[..split] {
            rt.notified(ch);
        }
        rt.start(
            Script::new(&l, move || async move {
                events.wait(s).await;
                hits.set(hits.get() + 1);
                Ok(())
            }),
            ExitPolicy::Halt,
        );
        for &ch in &seq[split..] {
            rt.notified(ch);
        }

        // model
        let routed: Vec<EventSource> = seq
            .iter()
            .filter_map(|&ch| match map.route(ch) {
                Route::Event(src) => Some(src),
                _ => None,
            })
            .collect();
        let before: Vec<EventSource> = seq[..split]
            .iter()
            .filter_map(|&ch| match map.route(ch) { Route::Event(src) => Some(src), _ => None })
            .collect();
        let after: Vec<EventSource> = seq[split..]
            .iter()
            .filter_map(|&ch| match map.route(ch) { Route::Event(src) => Some(src), _ => None })
            .collect();

        let satisfied = routed.contains(&s);
        prop_assert_eq!(hits.get(), u32::from(satisfied));

        let s_left = if before.contains(&s) {
            after.contains(&s)
        } else {
            after.iter().filter(|&&x| x == s).count() >= 2
        };
        let mut expected: EventSet = routed.iter().copied().filter(|&x| x != s).collect();
        if s_left {
            expected.insert(s);
        }
        prop_assert_eq!(events.pending(), expected);
        prop_assert_eq!(rt.phase(), if satisfied { Phase::Halted } else { Phase::Running });
    }
}
