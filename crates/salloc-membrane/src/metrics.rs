//! Atomic counters for allocator observability.
//!
//! All counters use relaxed ordering; they are diagnostic, never used for
//! synchronization.

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-allocator operation counters.
#[derive(Debug)]
pub struct AllocMetrics {
    /// Successful allocations.
    pub allocations: AtomicU64,
    /// Successful reallocations.
    pub reallocations: AtomicU64,
    /// Releases that returned a live region.
    pub releases: AtomicU64,
    /// Releases of an already-empty handle.
    pub noop_releases: AtomicU64,
    /// Calls refused by the failure policy.
    pub policy_denials: AtomicU64,
    /// Calls refused by the system allocator.
    pub exhaustion_failures: AtomicU64,
    /// Audit records that could not be written.
    pub audit_failures: AtomicU64,
}

impl AllocMetrics {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            allocations: AtomicU64::new(0),
            reallocations: AtomicU64::new(0),
            releases: AtomicU64::new(0),
            noop_releases: AtomicU64::new(0),
            policy_denials: AtomicU64::new(0),
            exhaustion_failures: AtomicU64::new(0),
            audit_failures: AtomicU64::new(0),
        }
    }

    /// Increment a counter by 1.
    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Read a counter value.
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            allocations: Self::get(&self.allocations),
            reallocations: Self::get(&self.reallocations),
            releases: Self::get(&self.releases),
            noop_releases: Self::get(&self.noop_releases),
            policy_denials: Self::get(&self.policy_denials),
            exhaustion_failures: Self::get(&self.exhaustion_failures),
            audit_failures: Self::get(&self.audit_failures),
        }
    }
}

impl Default for AllocMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`AllocMetrics`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub allocations: u64,
    pub reallocations: u64,
    pub releases: u64,
    pub noop_releases: u64,
    pub policy_denials: u64,
    pub exhaustion_failures: u64,
    pub audit_failures: u64,
}

impl MetricsSnapshot {
    /// Allocation-side calls that failed for any reason.
    #[must_use]
    pub const fn failures(&self) -> u64 {
        self.policy_denials + self.exhaustion_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let m = AllocMetrics::new();
        assert_eq!(m.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn increment_works() {
        let m = AllocMetrics::new();
        AllocMetrics::inc(&m.allocations);
        AllocMetrics::inc(&m.allocations);
        AllocMetrics::inc(&m.policy_denials);
        AllocMetrics::inc(&m.exhaustion_failures);
        let snap = m.snapshot();
        assert_eq!(snap.allocations, 2);
        assert_eq!(snap.failures(), 2);
    }
}
