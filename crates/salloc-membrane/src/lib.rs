//! Fault-injecting allocation membrane for salloc.
//!
//! Sits between application code and the system allocator. Each operation
//! passes a failure-policy check, performs (or declines) the real heap work,
//! and appends an audit record.
//!
//! # Architecture
//!
//! - **Allocator** (`allocator`): the [`FaultAllocator`] context object
//! - **Handles** (`handle`): owned, idempotently releasable region tokens
//! - **Regions** (`region`): raw system-allocator blocks (the only unsafe code)
//! - **Configuration** (`config`): code or `SALLOC_*` environment settings
//! - **Metrics** (`metrics`): atomic counters for observability

pub mod allocator;
pub mod config;
pub mod handle;
pub mod metrics;
pub mod region;

pub use allocator::{AllocationFailure, FaultAllocator};
pub use config::{AllocConfig, ConfigError};
pub use handle::AllocationHandle;
pub use metrics::{AllocMetrics, MetricsSnapshot};
