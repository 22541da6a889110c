// I2C client over a request/response ring pair
//
// The data region is cut into equal slots. A request and its response
// share one slot, and a slot stays reserved until its response is back,
// so a transfer abandoned mid-wait cannot have its late answer read as
// someone else's. Responses are matched to the transfer by slot offset.
//
//   request slot:  [read_len: u16 LE][write bytes ...]
//   response slot: [status: u8][read bytes ...]     status 0 = ok

use core::cell::Cell;
use core::fmt;

use embedded_hal::i2c::{Error, ErrorKind, NoAcknowledgeSource};
use log::warn;

use crate::config::Channel;
use crate::kernel::dispatch::Notify;
use crate::kernel::events::{EventSource, EventState};
use crate::queue::{DataRegion, Descriptor, QueueError, RingBuffer};

pub const I2C_ENTRIES: usize = 128;

const REQUEST_HEADER: usize = 2;
const RESPONSE_HEADER: usize = 1;

// one bit per slot in `outstanding`
const MAX_SLOTS: usize = u32::BITS as usize;

// response status values
const STATUS_NACK_ADDRESS: u8 = 1;
const STATUS_NACK_DATA: u8 = 2;
const STATUS_ARBITRATION: u8 = 3;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct I2cDesc {
    pub offset: u64,
    pub len: u32,
    pub bus_address: u16,
}

impl Descriptor for I2cDesc {
    const EMPTY: Self = Self {
        offset: 0,
        len: 0,
        bus_address: 0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum I2cError {
    Queue(QueueError),
    /// Transfer does not fit a data slot
    TooLong,
    /// Every slot still waits for a late response
    Busy,
    /// Nonzero status from the bus driver
    Status(u8),
    /// Response does not describe this transfer's slot
    BadResponse,
}

impl fmt::Display for I2cError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            I2cError::Queue(e) => write!(f, "i2c request {}", e),
            I2cError::TooLong => write!(f, "i2c transfer too long"),
            I2cError::Busy => write!(f, "i2c slots all awaiting responses"),
            I2cError::Status(s) => write!(f, "i2c bus status {}", s),
            I2cError::BadResponse => write!(f, "i2c response malformed"),
        }
    }
}

impl Error for I2cError {
    fn kind(&self) -> ErrorKind {
        match *self {
            I2cError::Status(STATUS_NACK_ADDRESS) => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            I2cError::Status(STATUS_NACK_DATA) => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
            I2cError::Status(STATUS_ARBITRATION) => ErrorKind::ArbitrationLoss,
            I2cError::Status(_) => ErrorKind::Bus,
            I2cError::Queue(_) | I2cError::TooLong | I2cError::Busy | I2cError::BadResponse => ErrorKind::Other,
        }
    }
}

impl From<QueueError> for I2cError {
    fn from(e: QueueError) -> Self {
        I2cError::Queue(e)
    }
}

pub struct I2cBus<const N: usize = I2C_ENTRIES> {
    request: &'static RingBuffer<I2cDesc, N>,
    response: &'static RingBuffer<I2cDesc, N>,
    data: DataRegion,
    slot_size: usize,
    slots: usize,
    // slots whose response has not come back yet
    outstanding: Cell<u32>,
    events: &'static EventState,
    notifier: &'static dyn Notify,
    channel: Channel,
}

impl<const N: usize> I2cBus<N> {
    pub fn new(
        request: &'static RingBuffer<I2cDesc, N>,
        response: &'static RingBuffer<I2cDesc, N>,
        data: DataRegion,
        slot_size: usize,
        events: &'static EventState,
        notifier: &'static dyn Notify,
        channel: Channel,
    ) -> Self {
        assert!(
            slot_size > 0 && data.len() >= slot_size,
            "i2c data region smaller than one slot"
        );
        let slots = (data.len() / slot_size).min(MAX_SLOTS);
        Self {
            request,
            response,
            data,
            slot_size,
            slots,
            outstanding: Cell::new(0),
            events,
            notifier,
            channel,
        }
    }

    fn slot_of(&self, offset: u64) -> Option<usize> {
        let offset = usize::try_from(offset).ok()?;
        let slot = offset / self.slot_size;
        (offset % self.slot_size == 0 && slot < self.slots).then_some(slot)
    }

    fn claim(&self) -> Option<usize> {
        let busy = self.outstanding.get();
        (0..self.slots).find(|&i| busy & (1 << i) == 0)
    }

    fn release(&self, slot: usize) {
        self.outstanding.set(self.outstanding.get() & !(1 << slot));
    }

    // late answer to a transfer nobody waits for any more
    fn discard(&self, resp: I2cDesc) {
        warn!("i2c: discarding stale response for {:#x}", resp.bus_address);
        if let Some(slot) = self.slot_of(resp.offset) {
            self.release(slot);
        }
    }

    pub async fn write_read(&self, address: u16, write: &[u8], read: &mut [u8]) -> Result<(), I2cError> {
        if REQUEST_HEADER + write.len() > self.slot_size
            || RESPONSE_HEADER + read.len() > self.slot_size
            || read.len() > u16::MAX as usize
        {
            return Err(I2cError::TooLong);
        }

        // no transfer is in flight, so anything queued is stale
        while let Ok(resp) = self.response.dequeue() {
            self.discard(resp);
        }
        let slot = self.claim().ok_or(I2cError::Busy)?;
        let offset = (slot * self.slot_size) as u64;

        let header = (read.len() as u16).to_le_bytes();
        self.data.write(offset, &header).ok_or(I2cError::TooLong)?;
        self.data
            .write(offset + REQUEST_HEADER as u64, write)
            .ok_or(I2cError::TooLong)?;
        self.request.enqueue(I2cDesc {
            offset,
            len: (REQUEST_HEADER + write.len()) as u32,
            bus_address: address,
        })?;
        self.outstanding.set(self.outstanding.get() | 1 << slot);
        self.notifier.notify(self.channel);

        let resp = loop {
            match self.response.dequeue() {
                Ok(desc) if desc.offset == offset => break desc,
                Ok(stale) => self.discard(stale),
                Err(_) => self.events.wait(EventSource::I2c).await,
            }
        };
        self.release(slot);

        if resp.bus_address != address || resp.len as usize > self.slot_size {
            warn!("i2c: bad response {:?} for {:#x}", resp, address);
            return Err(I2cError::BadResponse);
        }

        let mut status = [0u8; 1];
        self.data
            .read(resp.offset, &mut status)
            .ok_or(I2cError::BadResponse)?;
        if status[0] != 0 {
            return Err(I2cError::Status(status[0]));
        }

        let got = (resp.len as usize).saturating_sub(RESPONSE_HEADER);
        if got < read.len() {
            return Err(I2cError::BadResponse);
        }
        self.data
            .read(resp.offset + RESPONSE_HEADER as u64, read)
            .ok_or(I2cError::BadResponse)
    }

    pub async fn write(&self, address: u16, bytes: &[u8]) -> Result<(), I2cError> {
        self.write_read(address, bytes, &mut []).await
    }

    pub async fn read(&self, address: u16, buf: &mut [u8]) -> Result<(), I2cError> {
        self.write_read(address, &[], buf).await
    }

    // slots held by transfers that were abandoned before their answer
    pub fn outstanding(&self) -> u32 {
        self.outstanding.get().count_ones()
    }
}
