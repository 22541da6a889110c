// Queue bootstrap: raw regions -> typed handles, then seed free rings
//
// Each serial direction owns a data region of 2 * N slots. The peer
// driver seeds from the first half; this component seeds its free ring
// from the second half, N - 1 slots so tail never catches head.

use log::info;

use crate::queue::ring::{BufferDesc, Descriptor, QueueError, RingBuffer, SerialQueue};

/// Ring/data addresses patched in by the system description.
#[derive(Debug, Clone, Copy)]
pub struct SerialRegions {
    pub rx_free: usize,
    pub rx_active: usize,
    pub tx_free: usize,
    pub tx_active: usize,
    pub rx_data: usize,
    pub tx_data: usize,
}

/// Bytes of data region one seeded direction needs.
pub const fn data_region_len(entries: usize, slot_size: u32) -> usize {
    2 * entries * slot_size as usize
}

/// View a mapped shared-memory region as a ring.
///
/// # Safety
/// `addr` must point to memory mapped for the lifetime of the process,
/// aligned for `RingBuffer<D, N>` and at least that large.
pub unsafe fn ring_at<D: Descriptor, const N: usize>(addr: usize) -> &'static RingBuffer<D, N> {
    debug_assert_eq!(addr % core::mem::align_of::<RingBuffer<D, N>>(), 0);
    // SAFETY: upheld by caller
    unsafe { &*(addr as *const RingBuffer<D, N>) }
}

// hand every client-half slot but one to the free ring
pub fn seed_free<const N: usize>(queue: &SerialQueue<'_, N>) -> Result<usize, QueueError> {
    let size = queue.slot_size();
    for i in 0..N - 1 {
        let offset = (i + N) as u64 * size as u64;
        queue.enqueue_free(BufferDesc::new(offset, size))?;
    }
    Ok(N - 1)
}

pub struct SerialQueues<'a, const N: usize> {
    pub rx: SerialQueue<'a, N>,
    pub tx: SerialQueue<'a, N>,
}

impl<const N: usize> SerialQueues<'static, N> {
    /// # Safety
    /// Every ring address in `regions` must satisfy [`ring_at`].
    pub unsafe fn from_regions(regions: &SerialRegions, slot_size: u32) -> Self {
        // SAFETY: forwarded to caller
        unsafe {
            Self {
                rx: SerialQueue::new(ring_at(regions.rx_free), ring_at(regions.rx_active), slot_size),
                tx: SerialQueue::new(ring_at(regions.tx_free), ring_at(regions.tx_active), slot_size),
            }
        }
    }
}

impl<'a, const N: usize> SerialQueues<'a, N> {
    pub fn seed(&self) -> Result<(), QueueError> {
        let rx = seed_free(&self.rx)?;
        let tx = seed_free(&self.tx)?;
        info!("queues: seeded {} rx / {} tx free buffers", rx, tx);
        Ok(())
    }
}
