//! Raw heap regions obtained from the system allocator.
//!
//! A [`RawRegion`] uniquely owns one block. Every byte of the block is
//! initialized (zeroed or junk-filled) before the region is handed out, so
//! the slice accessors are sound.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::ptr::NonNull;

/// Alignment of every region.
pub const REGION_ALIGN: usize = 16;

/// Byte written into memory the caller did not ask to have zeroed.
pub const JUNK_BYTE: u8 = 0xA5;

/// An owned heap block of `len` user bytes.
#[derive(Debug)]
pub struct RawRegion {
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: the region is uniquely owned and carries no thread affinity.
unsafe impl Send for RawRegion {}

fn layout_for(len: usize) -> Option<Layout> {
    // Zero-sized requests still reserve one byte so every live region has a
    // distinct, freeable address.
    Layout::from_size_align(len.max(1), REGION_ALIGN).ok()
}

impl RawRegion {
    /// Allocate `len` bytes, zeroed or junk-filled.
    ///
    /// Returns `None` when the system allocator cannot satisfy the request.
    #[must_use]
    pub fn allocate(len: usize, zeroed: bool) -> Option<Self> {
        let layout = layout_for(len)?;
        // SAFETY: layout has non-zero size.
        let raw = unsafe {
            if zeroed {
                std::alloc::alloc_zeroed(layout)
            } else {
                std::alloc::alloc(layout)
            }
        };
        let ptr = NonNull::new(raw)?;
        if !zeroed {
            // SAFETY: ptr is valid for layout.size() writes.
            unsafe { std::ptr::write_bytes(ptr.as_ptr(), JUNK_BYTE, layout.size()) };
        }
        Some(Self { ptr, len })
    }

    /// Resize to `new_len` bytes, keeping the common prefix.
    ///
    /// On failure the original region comes back untouched in `Err`.
    pub fn resize(self, new_len: usize) -> Result<Self, Self> {
        let (Some(old_layout), Some(new_layout)) = (layout_for(self.len), layout_for(new_len))
        else {
            return Err(self);
        };
        // SAFETY: ptr was allocated with old_layout; new size is non-zero and
        // does not overflow isize when rounded to the alignment (checked by Layout).
        let raw = unsafe {
            std::alloc::realloc(self.ptr.as_ptr(), old_layout, new_layout.size())
        };
        let Some(ptr) = NonNull::new(raw) else {
            return Err(self);
        };
        // Ownership of the block moved to `ptr`; the old handle must not free it.
        std::mem::forget(self);

        let old_size = old_layout.size();
        if new_layout.size() > old_size {
            // SAFETY: the grown tail [old_size, new_size) lies inside the new block.
            unsafe {
                std::ptr::write_bytes(
                    ptr.as_ptr().add(old_size),
                    JUNK_BYTE,
                    new_layout.size() - old_size,
                );
            }
        }
        Ok(Self { ptr, len: new_len })
    }

    #[must_use]
    pub fn addr(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    #[must_use]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr is valid and initialized for len bytes while self lives.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and &mut self guarantees exclusivity.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for RawRegion {
    fn drop(&mut self) {
        if let Some(layout) = layout_for(self.len) {
            // SAFETY: ptr was allocated with exactly this layout.
            unsafe { std::alloc::dealloc(self.ptr.as_ptr(), layout) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_region_reads_zero() {
        let region = RawRegion::allocate(64, true).unwrap();
        assert_eq!(region.len(), 64);
        assert!(region.as_slice().iter().all(|&b| b == 0));
        assert_eq!(region.addr() % REGION_ALIGN, 0);
    }

    #[test]
    fn unzeroed_region_is_junk_filled() {
        let region = RawRegion::allocate(32, false).unwrap();
        assert!(region.as_slice().iter().all(|&b| b == JUNK_BYTE));
    }

    #[test]
    fn zero_length_region_has_address() {
        let region = RawRegion::allocate(0, true).unwrap();
        assert!(region.is_empty());
        assert_ne!(region.addr(), 0);
        assert!(region.as_slice().is_empty());
    }

    #[test]
    fn resize_keeps_prefix_and_junks_tail() {
        let mut region = RawRegion::allocate(4, true).unwrap();
        region.as_mut_slice().copy_from_slice(&[1, 2, 3, 4]);
        let region = region.resize(4096).unwrap();
        assert_eq!(&region.as_slice()[..4], &[1, 2, 3, 4]);
        assert!(region.as_slice()[4..].iter().all(|&b| b == JUNK_BYTE));

        let region = region.resize(2).unwrap();
        assert_eq!(region.as_slice(), &[1, 2]);
    }

    #[test]
    fn impossible_request_fails() {
        assert!(RawRegion::allocate(usize::MAX, false).is_none());
        let region = RawRegion::allocate(8, true).unwrap();
        let back = region.resize(usize::MAX).unwrap_err();
        assert_eq!(back.len(), 8);
    }
}
