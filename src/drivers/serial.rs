// Serial console over the rx/tx queue pairs
//
// RX (event context): process_rx drains the active ring into a byte
// pipe and hands every descriptor straight back to the free ring.
// RX (interpreter):   read_byte loops on "pipe empty -> wait(Serial)",
//                     so stale serial bits only cost one extra loop.
// TX (interpreter):   take free buffer, copy, publish active, notify.
//
// Bytes that do not fit the pipe are dropped; the rings never stall.

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::pipe::Pipe;
use log::{debug, warn};

use crate::config::{CONSOLE_RX_BUF, Channel, SERIAL_ENTRIES};
use crate::kernel::dispatch::{Notify, Transport};
use crate::kernel::events::{EventSource, EventState};
use crate::queue::{BufferDesc, DataRegion, QueueError, SerialQueues};

pub struct SerialConsole<const N: usize = SERIAL_ENTRIES> {
    queues: SerialQueues<'static, N>,
    rx_data: DataRegion,
    tx_data: DataRegion,
    rx_buf: Pipe<NoopRawMutex, CONSOLE_RX_BUF>,
    events: &'static EventState,
    notifier: &'static dyn Notify,
    rx_channel: Channel,
    tx_channel: Channel,
}

impl<const N: usize> SerialConsole<N> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queues: SerialQueues<'static, N>,
        rx_data: DataRegion,
        tx_data: DataRegion,
        events: &'static EventState,
        notifier: &'static dyn Notify,
        rx_channel: Channel,
        tx_channel: Channel,
    ) -> Self {
        Self {
            queues,
            rx_data,
            tx_data,
            rx_buf: Pipe::new(),
            events,
            notifier,
            rx_channel,
            tx_channel,
        }
    }

    /// Drain received buffers into the console. Returns bytes accepted.
    pub fn process_rx(&self) -> usize {
        let mut accepted = 0;
        let mut returned = false;
        let mut chunk = [0u8; 64];

        while let Ok(desc) = self.queues.rx.dequeue_active() {
            let mut offset = desc.offset;
            let mut left = desc.len as usize;
            while left > 0 {
                let n = left.min(chunk.len());
                if self.rx_data.read(offset, &mut chunk[..n]).is_none() {
                    warn!("serial: rx descriptor {:#x}+{} outside data region", desc.offset, desc.len);
                    break;
                }
                // try_write stops at the pipe's wrap point; keep going
                // until the rest is in or the pipe is really full
                let mut rest = &chunk[..n];
                while !rest.is_empty() {
                    match self.rx_buf.try_write(rest) {
                        Ok(k) if k > 0 => rest = &rest[k..],
                        _ => break,
                    }
                }
                let taken = n - rest.len();
                if taken < n {
                    warn!("serial: rx overflow, dropped {} bytes", n - taken);
                }
                accepted += taken;
                offset += n as u64;
                left -= n;
            }

            let slot = BufferDesc::new(desc.offset, self.queues.rx.slot_size());
            if self.queues.rx.enqueue_free(slot).is_err() {
                // can only happen if the peer duplicated a descriptor
                warn!("serial: rx free ring full, leaking {:#x}", desc.offset);
            }
            returned = true;
        }

        if returned {
            self.notifier.notify(self.rx_channel);
        }
        accepted
    }

    pub fn buffered(&self) -> usize {
        self.rx_buf.len()
    }

    pub fn try_read_byte(&self) -> Option<u8> {
        let mut b = [0u8; 1];
        match self.rx_buf.try_read(&mut b) {
            Ok(1) => Some(b[0]),
            _ => None,
        }
    }

    /// Interpreter context only.
    pub async fn read_byte(&self) -> u8 {
        loop {
            if let Some(b) = self.try_read_byte() {
                return b;
            }
            self.events.wait(EventSource::Serial).await;
        }
    }

    /// Read up to a newline (not stored) or until `buf` is full.
    pub async fn read_line(&self, buf: &mut [u8]) -> usize {
        let mut n = 0;
        while n < buf.len() {
            match self.read_byte().await {
                b'\n' => break,
                b'\r' => {}
                b => {
                    buf[n] = b;
                    n += 1;
                }
            }
        }
        n
    }

    /// Queue `bytes` for transmission and signal the driver.
    ///
    /// Fails with `QueueError::Empty` once no transmit buffer is free;
    /// whatever was queued before that point is still sent.
    pub fn write(&self, bytes: &[u8]) -> Result<(), QueueError> {
        let mut sent = false;
        let mut result = Ok(());

        for piece in bytes.chunks(self.queues.tx.slot_size() as usize) {
            let desc = match self.queues.tx.dequeue_free() {
                Ok(desc) => desc,
                Err(e) => {
                    result = Err(e);
                    break;
                }
            };
            if self.tx_data.write(desc.offset, piece).is_none() {
                warn!("serial: tx descriptor {:#x} outside data region", desc.offset);
                self.give_back_tx(desc);
                result = Err(QueueError::Empty);
                break;
            }
            // tx active has room for everything the free ring handed out
            if let Err(e) = self.queues.tx.enqueue_active(BufferDesc::new(desc.offset, piece.len() as u32)) {
                self.give_back_tx(desc);
                result = Err(e);
                break;
            }
            sent = true;
        }

        if sent {
            self.notifier.notify(self.tx_channel);
        } else if result.is_err() {
            debug!("serial: no tx buffers");
        }
        result
    }

    // undo a dequeue_free; the free ring had room for it a moment ago
    fn give_back_tx(&self, desc: BufferDesc) {
        if self.queues.tx.enqueue_free(desc).is_err() {
            warn!("serial: tx free ring full, leaking {:#x}", desc.offset);
        }
    }

    pub fn queues(&self) -> &SerialQueues<'static, N> {
        &self.queues
    }
}

// pumped from dispatch through a shared reference
impl<const N: usize> Transport for &'static SerialConsole<N> {
    fn process_pending(&mut self) {
        self.process_rx();
    }
}
