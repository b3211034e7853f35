// Exported functions take raw pointers from C callers; each entry point
// documents its own contract.
#![allow(clippy::missing_safety_doc)]
//! # salloc-abi
//!
//! `extern "C"` boundary for salloc.
//!
//! Produces a `cdylib` exposing the allocation façade (`s_alloc_init`,
//! `s_malloc`, `s_realloc`, `s_free`) and the last-error recorder
//! (`last_error_*`) to C programs.
//!
//! ```text
//! C caller -> ABI entry (this crate) -> FaultAllocator / LastError -> system allocator
//! ```
//!
//! Both facilities live in process-global state behind a lock. Pointers
//! handed out by `s_malloc` are owned by that state until `s_free`.

mod state;
mod util;

pub mod alloc_abi;
pub mod last_error_abi;

pub use state::{live_region_count, metrics_snapshot};

/// Status returned by `s_malloc` / `s_realloc` / `last_error_set_message` on success.
pub const STATUS_SUCCESS: std::ffi::c_int = 1;
/// Status returned on failure.
pub const STATUS_FAILURE: std::ffi::c_int = 0;
