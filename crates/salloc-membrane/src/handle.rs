//! Owned allocation handles.

use crate::region::RawRegion;

/// Ownership token for one heap region, or the empty sentinel.
///
/// A handle is the only reference to its region. Releasing it through the
/// allocator leaves the sentinel behind, so a second release is a no-op.
/// Dropping a live handle returns the memory without an audit record.
#[derive(Debug, Default)]
pub struct AllocationHandle {
    region: Option<RawRegion>,
}

impl AllocationHandle {
    /// The sentinel "no resource" handle.
    #[must_use]
    pub const fn empty() -> Self {
        Self { region: None }
    }

    pub(crate) const fn from_region(region: RawRegion) -> Self {
        Self {
            region: Some(region),
        }
    }

    pub(crate) fn take(&mut self) -> Option<RawRegion> {
        self.region.take()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.region.is_none()
    }

    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.region.is_some()
    }

    /// Region address, or 0 for the sentinel.
    #[must_use]
    pub fn addr(&self) -> usize {
        self.region.as_ref().map_or(0, RawRegion::addr)
    }

    /// Usable size in bytes (0 for the sentinel).
    #[must_use]
    pub fn len(&self) -> usize {
        self.region.as_ref().map_or(0, RawRegion::len)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        self.region.as_ref().map_or(&[][..], RawRegion::as_slice)
    }

    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match self.region.as_mut() {
            Some(region) => region.as_mut_slice(),
            None => &mut [],
        }
    }

    /// Raw pointer to the region, null for the sentinel.
    #[must_use]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.region
            .as_mut()
            .map_or(std::ptr::null_mut(), RawRegion::as_mut_ptr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_handle_is_sentinel() {
        let mut handle = AllocationHandle::empty();
        assert!(handle.is_empty());
        assert!(!handle.is_live());
        assert_eq!(handle.addr(), 0);
        assert_eq!(handle.len(), 0);
        assert!(handle.as_slice().is_empty());
        assert!(handle.as_mut_slice().is_empty());
        assert!(handle.as_mut_ptr().is_null());
    }

    #[test]
    fn take_leaves_sentinel() {
        let mut handle = AllocationHandle::from_region(RawRegion::allocate(8, true).unwrap());
        assert!(handle.is_live());
        let addr = handle.addr();
        let region = handle.take().unwrap();
        assert_eq!(region.addr(), addr);
        assert!(handle.is_empty());
        assert!(handle.take().is_none());
    }
}
