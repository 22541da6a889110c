// cobridge host simulation
//
// Boot: seed queues -> build console + timer -> derive interpreter
// context -> run it to its first wait.
// Loop: wait for stdin or the armed timeout -> play the serial/timer
// driver -> notified(channel) -> drain tx ring to stdout -> repeat.
//
// The interpreter is a tiny line shell (echo, sleep, events, raise,
// exit). `--halt` runs one session and stops instead of restarting.

use std::cell::Cell;
use std::fmt;
use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use log::{error, info, trace, warn};
use static_cell::StaticCell;

use cobridge::config::{Channel, ChannelMap, ExitPolicy};
use cobridge::drivers::serial::SerialConsole;
use cobridge::drivers::timer::{Clock, Timer};
use cobridge::kernel::{EventState, Interpreter, Notify, Phase, Runtime, RuntimeState};
use cobridge::queue::bootstrap::data_region_len;
use cobridge::queue::{BufferDesc, DataRegion, RingBuffer, SerialQueue, SerialQueues};

// host sized; the target uses config::SERIAL_ENTRIES / SERIAL_BUFFER_SIZE
const ENTRIES: usize = 16;
const SLOT: u32 = 256;
const DATA_LEN: usize = data_region_len(ENTRIES, SLOT);

static RX_FREE: RingBuffer<BufferDesc, ENTRIES> = RingBuffer::new();
static RX_ACTIVE: RingBuffer<BufferDesc, ENTRIES> = RingBuffer::new();
static TX_FREE: RingBuffer<BufferDesc, ENTRIES> = RingBuffer::new();
static TX_ACTIVE: RingBuffer<BufferDesc, ENTRIES> = RingBuffer::new();

static RX_DATA: StaticCell<[u8; DATA_LEN]> = StaticCell::new();
static TX_DATA: StaticCell<[u8; DATA_LEN]> = StaticCell::new();
static STATE: StaticCell<RuntimeState> = StaticCell::new();

type Console = SerialConsole<ENTRIES>;

// ── Simulated peers ─────────────────────────────────────────────────

struct SimBus {
    tx_kicked: Cell<bool>,
    tx_channel: Channel,
}

impl Notify for SimBus {
    fn notify(&self, channel: Channel) {
        trace!("sim: notify ch {}", channel);
        if channel == self.tx_channel {
            self.tx_kicked.set(true);
        }
    }
}

struct SimClock {
    start: Instant,
    deadline: Cell<Option<Instant>>,
}

impl Clock for SimClock {
    fn now_ns(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }

    fn set_timeout(&self, ns: u64) {
        self.deadline
            .set(Some(Instant::now() + Duration::from_nanos(ns)));
    }
}

// driver side of the serial queues
struct SerialDriver {
    rx: SerialQueue<'static, ENTRIES>,
    tx: SerialQueue<'static, ENTRIES>,
    rx_data: DataRegion,
    tx_data: DataRegion,
}

impl SerialDriver {
    fn deliver(&self, bytes: &[u8]) {
        for piece in bytes.chunks(SLOT as usize) {
            let Ok(desc) = self.rx.dequeue_free() else {
                warn!("sim: rx ring exhausted, dropping input");
                return;
            };
            if self.rx_data.write(desc.offset, piece).is_none() {
                warn!("sim: rx descriptor {:#x} outside data region", desc.offset);
                continue;
            }
            if let Err(e) = self
                .rx
                .enqueue_active(BufferDesc::new(desc.offset, piece.len() as u32))
            {
                warn!("sim: rx active ring: {}", e);
            }
        }
    }

    fn drain_tx(&self, out: &mut impl Write) -> io::Result<()> {
        let mut buf = [0u8; SLOT as usize];
        while let Ok(desc) = self.tx.dequeue_active() {
            let n = desc.len as usize;
            if self.tx_data.read(desc.offset, &mut buf[..n]).is_some() {
                out.write_all(&buf[..n])?;
            }
            if let Err(e) = self.tx.enqueue_free(BufferDesc::new(desc.offset, SLOT)) {
                warn!("sim: tx free ring: {}", e);
            }
        }
        out.flush()
    }
}

// two views of one static buffer: ours and the simulated driver's
fn shared_region(mem: &'static mut [u8; DATA_LEN]) -> (DataRegion, DataRegion) {
    let base = mem.as_mut_ptr() as usize;
    // SAFETY: static buffer, never referenced again outside these views
    unsafe {
        (
            DataRegion::from_raw(base, DATA_LEN),
            DataRegion::from_raw(base, DATA_LEN),
        )
    }
}

// ── Demo interpreter ────────────────────────────────────────────────

#[derive(Debug)]
enum ShellError {
    Raised(String),
    BadArgument(String),
}

impl fmt::Display for ShellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShellError::Raised(msg) => write!(f, "raised: {}", msg),
            ShellError::BadArgument(arg) => write!(f, "bad argument {:?}", arg),
        }
    }
}

struct Shell {
    console: &'static Console,
    timer: &'static Timer,
    events: &'static EventState,
    sessions: u32,
}

impl Shell {
    fn print(&self, s: &str) {
        if let Err(e) = self.console.write(s.as_bytes()) {
            warn!("shell: output dropped: {}", e);
        }
    }

    async fn command(&self, line: &str) -> Result<bool, ShellError> {
        let mut words = line.split_whitespace();
        match words.next() {
            None => {}
            Some("echo") => {
                let rest: Vec<&str> = words.collect();
                self.print(&format!("{}\n", rest.join(" ")));
            }
            Some("sleep") => {
                let arg = words.next().unwrap_or("");
                let ms = arg
                    .parse::<u64>()
                    .map_err(|_| ShellError::BadArgument(arg.to_string()))?;
                let t0 = self.timer.now_ms();
                self.timer.sleep_ms(ms).await;
                self.print(&format!("slept {} ms\n", self.timer.now_ms() - t0));
            }
            Some("events") => {
                self.print(&format!("pending: {:?}\n", self.events.pending()));
            }
            Some("raise") => {
                let rest: Vec<&str> = words.collect();
                return Err(ShellError::Raised(rest.join(" ")));
            }
            Some("exit") => return Ok(false),
            Some(other) => self.print(&format!("unknown command: {}\n", other)),
        }
        Ok(true)
    }
}

impl Interpreter for Shell {
    type Error = ShellError;

    fn initialize(&mut self) {
        self.sessions += 1;
        info!("shell: session {}", self.sessions);
    }

    async fn run_main_unit(&mut self) -> Result<(), ShellError> {
        let mut line = [0u8; 256];
        loop {
            self.print("> ");
            let n = self.console.read_line(&mut line).await;
            let text = String::from_utf8_lossy(&line[..n]).into_owned();
            if !self.command(&text).await? {
                return Ok(());
            }
        }
    }

    fn collect_garbage(&mut self) {}

    fn deinitialize(&mut self) {
        info!("shell: session {} closed", self.sessions);
    }
}

// ── Entry ───────────────────────────────────────────────────────────

enum Input {
    Line(String),
    Eof,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let policy = if std::env::args().any(|a| a == "--halt") {
        ExitPolicy::Halt
    } else {
        ExitPolicy::Restart
    };
    let channels = ChannelMap::DEFAULT;

    let state: &'static RuntimeState = STATE.init(RuntimeState::new());
    let bus: &'static SimBus = Box::leak(Box::new(SimBus {
        tx_kicked: Cell::new(false),
        tx_channel: channels.serial_tx,
    }));
    let clock: &'static SimClock = Box::leak(Box::new(SimClock {
        start: Instant::now(),
        deadline: Cell::new(None),
    }));

    let queues = SerialQueues {
        rx: SerialQueue::new(&RX_FREE, &RX_ACTIVE, SLOT),
        tx: SerialQueue::new(&TX_FREE, &TX_ACTIVE, SLOT),
    };
    if let Err(e) = queues.seed() {
        error!("boot: seeding serial queues failed: {}", e);
        return;
    }
    let (rx_data, rx_peer) = shared_region(RX_DATA.init([0; DATA_LEN]));
    let (tx_data, tx_peer) = shared_region(TX_DATA.init([0; DATA_LEN]));
    let driver = SerialDriver {
        rx: SerialQueue::new(&RX_FREE, &RX_ACTIVE, SLOT),
        tx: SerialQueue::new(&TX_FREE, &TX_ACTIVE, SLOT),
        rx_data: rx_peer,
        tx_data: tx_peer,
    };

    let console: &'static Console = Box::leak(Box::new(SerialConsole::new(
        queues,
        rx_data,
        tx_data,
        &state.events,
        bus,
        channels.serial_rx,
        channels.serial_tx,
    )));
    let timer: &'static Timer = Box::leak(Box::new(Timer::new(clock, &state.events)));

    let mut rt = Runtime::new(state, channels);
    rt.register(console);
    rt.start(
        Shell {
            console,
            timer,
            events: &state.events,
            sessions: 0,
        },
        policy,
    );
    info!("boot: ready ({:?})", policy);

    let (lines_tx, lines_rx) = mpsc::channel();
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if lines_tx.send(Input::Line(line)).is_err() {
                return;
            }
        }
        let _ = lines_tx.send(Input::Eof);
    });

    let mut stdout = io::stdout();
    let _ = driver.drain_tx(&mut stdout);

    while rt.phase() != Phase::Halted {
        let input = match clock.deadline.get() {
            Some(at) => lines_rx.recv_timeout(at.saturating_duration_since(Instant::now())),
            None => lines_rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match input {
            Ok(Input::Line(mut line)) => {
                line.push('\n');
                driver.deliver(line.as_bytes());
                rt.notified(channels.serial_rx);
            }
            Ok(Input::Eof) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                clock.deadline.set(None);
                rt.notified(channels.timer);
            }
        }

        if bus.tx_kicked.replace(false) {
            if let Err(e) = driver.drain_tx(&mut stdout) {
                error!("sim: stdout: {}", e);
                break;
            }
        }
    }

    info!("sim: stopped in phase {}", rt.phase());
}
