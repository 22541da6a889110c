// Framebuffer hand-off to the display VMM
//
// The VMM signals when it is ready for a frame; we copy the frame into
// the shared region behind an 8-byte header and signal back.
//
//   [width: u32 LE][height: u32 LE][pixels ...]

use core::fmt;

use log::{debug, warn};

use crate::config::Channel;
use crate::kernel::dispatch::Notify;
use crate::kernel::events::{EventSource, EventState};
use crate::queue::DataRegion;

const HEADER: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramebufferError {
    /// Frame plus header exceeds the shared region
    TooLarge { needed: usize, available: usize },
}

impl fmt::Display for FramebufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramebufferError::TooLarge { needed, available } => {
                write!(f, "frame needs {} bytes, region has {}", needed, available)
            }
        }
    }
}

pub struct Framebuffer {
    region: DataRegion,
    events: &'static EventState,
    notifier: &'static dyn Notify,
    channel: Channel,
}

impl Framebuffer {
    pub fn new(
        region: DataRegion,
        events: &'static EventState,
        notifier: &'static dyn Notify,
        channel: Channel,
    ) -> Self {
        Self {
            region,
            events,
            notifier,
            channel,
        }
    }

    /// Wait for the VMM, then publish one frame. Interpreter context only.
    pub async fn send(&self, pixels: &[u8], width: u32, height: u32) -> Result<(), FramebufferError> {
        let needed = HEADER + pixels.len();
        if needed > self.region.len() {
            return Err(FramebufferError::TooLarge {
                needed,
                available: self.region.len(),
            });
        }

        self.events.wait(EventSource::Framebuffer).await;

        let mut header = [0u8; HEADER];
        header[..4].copy_from_slice(&width.to_le_bytes());
        header[4..].copy_from_slice(&height.to_le_bytes());
        let written = self
            .region
            .write(0, &header)
            .and_then(|()| self.region.write(HEADER as u64, pixels));
        if written.is_none() {
            // size was checked above, so this is a bad mapping
            warn!("fb: frame write outside region ({} bytes)", needed);
            return Err(FramebufferError::TooLarge {
                needed,
                available: self.region.len(),
            });
        }
        self.notifier.notify(self.channel);
        debug!("fb: sent {}x{} ({} bytes)", width, height, pixels.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::boxed::Box;
    use alloc::vec;
    use core::cell::Cell;
    use core::pin::pin;
    use core::task::Poll;
    use embassy_futures::poll_once;

    #[derive(Default)]
    struct Last(Cell<Option<Channel>>);

    impl Notify for Last {
        fn notify(&self, channel: Channel) {
            self.0.set(Some(channel));
        }
    }

    fn setup(len: usize) -> (Framebuffer, DataRegion, &'static EventState, &'static Last) {
        let mem = Box::leak(vec![0u8; len].into_boxed_slice());
        let (base, len) = (mem.as_mut_ptr() as usize, mem.len());
        // SAFETY: leaked buffer; second view plays the VMM
        let (region, vmm) = unsafe { (DataRegion::from_raw(base, len), DataRegion::from_raw(base, len)) };
        let events: &'static EventState = Box::leak(Box::new(EventState::new()));
        let last: &'static Last = Box::leak(Box::default());
        (Framebuffer::new(region, events, last, 8), vmm, events, last)
    }

    #[test]
    fn frame_waits_for_ready_then_lands_in_region() {
        let (fb, vmm, events, last) = setup(16);
        let mut send = pin!(fb.send(&[1, 2, 3, 4], 2, 1));

        assert_eq!(poll_once(send.as_mut()), Poll::Pending);
        assert_eq!(last.0.get(), None);

        events.raise(EventSource::Framebuffer);
        assert_eq!(poll_once(send.as_mut()), Poll::Ready(Ok(())));
        assert_eq!(last.0.get(), Some(8));

        let mut out = [0u8; 12];
        vmm.read(0, &mut out).unwrap();
        assert_eq!(out, [2, 0, 0, 0, 1, 0, 0, 0, 1, 2, 3, 4]);
    }

    #[test]
    fn oversized_frame_fails_without_waiting() {
        let (fb, _vmm, events, _last) = setup(10);
        let r = poll_once(pin!(fb.send(&[0; 4], 2, 1)));
        assert_eq!(
            r,
            Poll::Ready(Err(FramebufferError::TooLarge {
                needed: 12,
                available: 10
            }))
        );
        assert_eq!(events.awaited(), None);
    }
}
