// Shared-memory data regions
//
// Descriptors only carry (offset, len); the bytes live in a data region
// mapped into both this component and the peer. Every access is bounds
// checked against the region length before touching memory.

use core::ptr;

pub struct DataRegion {
    base: *mut u8,
    len: usize,
}

// the region is owned by this component for its whole lifetime; the
// peer only touches slots whose descriptors it currently owns
unsafe impl Send for DataRegion {}

impl DataRegion {
    /// Wrap a region mapped by the system description.
    ///
    /// # Safety
    /// `base..base + len` must be mapped read/write for the lifetime of
    /// the process and not aliased by any Rust reference.
    pub const unsafe fn from_raw(base: usize, len: usize) -> Self {
        Self {
            base: base as *mut u8,
            len,
        }
    }

    pub fn from_static(mem: &'static mut [u8]) -> Self {
        Self {
            base: mem.as_mut_ptr(),
            len: mem.len(),
        }
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn in_bounds(&self, offset: u64, len: usize) -> bool {
        usize::try_from(offset)
            .ok()
            .and_then(|o| o.checked_add(len))
            .is_some_and(|end| end <= self.len)
    }

    // copy out of the region; None if the span leaves the region
    pub fn read(&self, offset: u64, out: &mut [u8]) -> Option<()> {
        if !self.in_bounds(offset, out.len()) {
            return None;
        }
        // SAFETY: span checked above, `out` cannot overlap shared memory
        unsafe {
            ptr::copy_nonoverlapping(self.base.add(offset as usize), out.as_mut_ptr(), out.len());
        }
        Some(())
    }

    pub fn write(&self, offset: u64, data: &[u8]) -> Option<()> {
        if !self.in_bounds(offset, data.len()) {
            return None;
        }
        // SAFETY: span checked above
        unsafe {
            ptr::copy_nonoverlapping(data.as_ptr(), self.base.add(offset as usize), data.len());
        }
        Some(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::boxed::Box;
    use alloc::vec;

    fn region(len: usize) -> DataRegion {
        DataRegion::from_static(Box::leak(vec![0u8; len].into_boxed_slice()))
    }

    #[test]
    fn copies_within_bounds() {
        let r = region(16);
        r.write(4, b"abcd").unwrap();
        let mut out = [0u8; 4];
        r.read(4, &mut out).unwrap();
        assert_eq!(&out, b"abcd");
    }

    #[test]
    fn rejects_spans_past_the_end() {
        let r = region(8);
        assert!(r.write(6, b"abc").is_none());
        assert!(r.read(u64::MAX, &mut [0u8; 1]).is_none());
        assert!(r.write(8, b"").is_some());
    }
}
