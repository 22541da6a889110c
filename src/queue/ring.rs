// Single-producer/single-consumer descriptor rings in shared memory
//
// One ring = tail (producer), head (consumer), N descriptor slots.
// Full when advancing tail would land on head, so a ring holds at most
// N - 1 descriptors and the two indices never alias.
// Producer publishes with Release after writing the slot; consumer
// reads the producer's index with Acquire before reading the slot.

use core::cell::UnsafeCell;
use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

/// A fixed-layout record that can sit in a ring slot.
pub trait Descriptor: Copy {
    const EMPTY: Self;
}

/// (offset into the data region, length) for a single buffer slot.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferDesc {
    pub offset: u64,
    pub len: u32,
}

impl BufferDesc {
    pub const fn new(offset: u64, len: u32) -> Self {
        Self { offset, len }
    }
}

impl Descriptor for BufferDesc {
    const EMPTY: Self = Self::new(0, 0);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// Ring already holds capacity - 1 descriptors
    Full,
    /// Nothing to dequeue
    Empty,
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::Full => write!(f, "queue full"),
            QueueError::Empty => write!(f, "queue empty"),
        }
    }
}

#[repr(C)]
pub struct RingBuffer<D, const N: usize> {
    tail: AtomicU32, // next slot to write
    head: AtomicU32, // next slot to read
    buffers: [UnsafeCell<D>; N],
}

// slots are only written by the side that owns them (see module header)
unsafe impl<D: Send, const N: usize> Sync for RingBuffer<D, N> {}

impl<D: Descriptor, const N: usize> RingBuffer<D, N> {
    const VALID: () = assert!(N >= 2 && N <= u32::MAX as usize, "ring needs 2..=u32::MAX slots");

    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID;
        Self {
            tail: AtomicU32::new(0),
            head: AtomicU32::new(0),
            buffers: [const { UnsafeCell::new(D::EMPTY) }; N],
        }
    }

    /// Most descriptors the ring can hold at once.
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire) as usize;
        let head = self.head.load(Ordering::Acquire) as usize;
        (tail + N - head) % N
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == N - 1
    }

    pub fn enqueue(&self, desc: D) -> Result<(), QueueError> {
        // we are the only writer of tail
        let tail = self.tail.load(Ordering::Relaxed) as usize;
        let head = self.head.load(Ordering::Acquire) as usize;
        let next = (tail + 1) % N;
        if next == head {
            return Err(QueueError::Full);
        }
        // SAFETY: slot `tail` is not visible to the consumer until the
        // Release store below
        unsafe { *self.buffers[tail].get() = desc };
        self.tail.store(next as u32, Ordering::Release);
        Ok(())
    }

    pub fn dequeue(&self) -> Result<D, QueueError> {
        let head = self.head.load(Ordering::Relaxed) as usize;
        let tail = self.tail.load(Ordering::Acquire) as usize;
        if head == tail {
            return Err(QueueError::Empty);
        }
        // SAFETY: the producer published slot `head` before moving tail
        let desc = unsafe { *self.buffers[head].get() };
        self.head.store(((head + 1) % N) as u32, Ordering::Release);
        Ok(desc)
    }
}

impl<D: Descriptor, const N: usize> Default for RingBuffer<D, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Free + active ring pair for one transport direction.
///
/// Descriptors move between the two rings and the peer; a descriptor is
/// owned by exactly one ring (or one side) at a time.
pub struct QueueHandle<'a, D, const N: usize> {
    free: &'a RingBuffer<D, N>,
    active: &'a RingBuffer<D, N>,
    slot_size: u32,
}

impl<'a, D: Descriptor, const N: usize> QueueHandle<'a, D, N> {
    pub const fn new(free: &'a RingBuffer<D, N>, active: &'a RingBuffer<D, N>, slot_size: u32) -> Self {
        Self {
            free,
            active,
            slot_size,
        }
    }

    pub fn enqueue_free(&self, desc: D) -> Result<(), QueueError> {
        self.free.enqueue(desc)
    }

    pub fn dequeue_free(&self) -> Result<D, QueueError> {
        self.free.dequeue()
    }

    pub fn enqueue_active(&self, desc: D) -> Result<(), QueueError> {
        self.active.enqueue(desc)
    }

    pub fn dequeue_active(&self) -> Result<D, QueueError> {
        self.active.dequeue()
    }

    pub fn free_len(&self) -> usize {
        self.free.len()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    // descriptors currently sitting in either ring
    pub fn queued(&self) -> usize {
        self.free.len() + self.active.len()
    }

    // descriptor slots per ring; each ring holds at most `slots() - 1`
    pub const fn slots(&self) -> usize {
        N
    }

    pub const fn slot_size(&self) -> u32 {
        self.slot_size
    }
}

pub type SerialQueue<'a, const N: usize> = QueueHandle<'a, BufferDesc, N>;
