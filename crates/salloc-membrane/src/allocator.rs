//! Fault-injecting allocator facade.
//!
//! Every allocate/reallocate consults the [`FaultInjector`] first. A denied
//! call fails without touching the heap and is indistinguishable, to the
//! caller, from the system allocator running out of memory. Successful calls
//! and every release append an audit record when a sink is configured.

use salloc_core::audit::{AuditRecord, AuditSink};
use salloc_core::callsite::CallSite;
use salloc_core::policy::{Admission, FailurePolicy, FaultInjector};
use thiserror::Error;

use crate::config::AllocConfig;
use crate::handle::AllocationHandle;
use crate::metrics::{AllocMetrics, MetricsSnapshot};
use crate::region::RawRegion;

/// Allocation or reallocation could not be satisfied.
///
/// Injected and genuine failures produce the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot allocate {size} bytes (call id {id})")]
pub struct AllocationFailure {
    pub id: i64,
    pub size: usize,
}

/// Allocator context: failure policy, audit sink and counters.
///
/// Not synchronized. Share it across threads only behind a lock.
#[derive(Debug, Default)]
pub struct FaultAllocator {
    injector: FaultInjector,
    sink: AuditSink,
    metrics: AllocMetrics,
}

impl FaultAllocator {
    /// Disarmed allocator with auditing disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_config(config: &AllocConfig) -> Self {
        Self {
            injector: FaultInjector::new(config.policy()),
            sink: config.sink(),
            metrics: AllocMetrics::new(),
        }
    }

    /// Arm `armed_id` (negative disarms) to fail after `success_budget`
    /// successful calls. Replaces the previous policy and resets the count.
    pub fn configure(&mut self, armed_id: i64, success_budget: i64) {
        self.injector
            .configure(FailurePolicy::new(armed_id, success_budget));
    }

    /// Replace policy and sink together.
    pub fn reconfigure(&mut self, config: &AllocConfig) {
        self.injector.configure(config.policy());
        self.sink = config.sink();
    }

    pub fn set_sink(&mut self, sink: AuditSink) {
        self.sink = sink;
    }

    #[must_use]
    pub const fn policy(&self) -> FailurePolicy {
        self.injector.policy()
    }

    /// Successful armed calls since the last configuration.
    #[must_use]
    pub const fn successes(&self) -> i64 {
        self.injector.successes()
    }

    #[must_use]
    pub const fn sink(&self) -> &AuditSink {
        &self.sink
    }

    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Allocate `size` bytes for the call identified by `id`.
    pub fn allocate(
        &mut self,
        id: i64,
        size: usize,
        zero_fill: bool,
        site: &CallSite<'_>,
    ) -> Result<AllocationHandle, AllocationFailure> {
        self.admit(id, size)?;
        let Some(region) = RawRegion::allocate(size, zero_fill) else {
            AllocMetrics::inc(&self.metrics.exhaustion_failures);
            return Err(AllocationFailure { id, size });
        };
        AllocMetrics::inc(&self.metrics.allocations);
        self.audit(&AuditRecord::allocate(site.clone(), region.addr(), size, id));
        Ok(AllocationHandle::from_region(region))
    }

    /// Resize the region behind `handle` to `new_size` bytes.
    ///
    /// On success `handle` is left empty and the returned handle owns the
    /// region. On failure `handle` still owns its original, unchanged region.
    /// An empty `handle` is allocated afresh.
    pub fn reallocate(
        &mut self,
        handle: &mut AllocationHandle,
        id: i64,
        new_size: usize,
        site: &CallSite<'_>,
    ) -> Result<AllocationHandle, AllocationFailure> {
        self.admit(id, new_size)?;
        let previous = handle.addr();
        let resized = match handle.take() {
            Some(region) => region.resize(new_size).map_err(|original| {
                *handle = AllocationHandle::from_region(original);
            }),
            None => RawRegion::allocate(new_size, false).ok_or(()),
        };
        let Ok(region) = resized else {
            AllocMetrics::inc(&self.metrics.exhaustion_failures);
            return Err(AllocationFailure { id, size: new_size });
        };
        AllocMetrics::inc(&self.metrics.reallocations);
        self.audit(&AuditRecord::reallocate(
            site.clone(),
            previous,
            region.addr(),
            new_size,
            id,
        ));
        Ok(AllocationHandle::from_region(region))
    }

    /// Release `handle`, leaving the sentinel behind.
    ///
    /// Releasing the sentinel is a no-op apart from its audit record.
    pub fn release(&mut self, handle: &mut AllocationHandle, site: &CallSite<'_>) {
        self.audit(&AuditRecord::free(site.clone(), handle.addr()));
        match handle.take() {
            Some(region) => {
                drop(region);
                AllocMetrics::inc(&self.metrics.releases);
            }
            None => AllocMetrics::inc(&self.metrics.noop_releases),
        }
    }

    fn admit(&mut self, id: i64, size: usize) -> Result<(), AllocationFailure> {
        match self.injector.admit(id) {
            Admission::Denied => {
                AllocMetrics::inc(&self.metrics.policy_denials);
                Err(AllocationFailure { id, size })
            }
            Admission::Exempt | Admission::Granted { .. } => Ok(()),
        }
    }

    fn audit(&self, record: &AuditRecord<'_>) {
        if self.sink.record(record).is_err() {
            AllocMetrics::inc(&self.metrics.audit_failures);
        }
    }
}
