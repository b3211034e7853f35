//! Process-global state shared by the ABI entry points.

use std::collections::HashMap;
use std::ffi::CString;
use std::sync::OnceLock;

use parking_lot::{Mutex, MutexGuard};
use salloc_core::last_error::LastError;
use salloc_membrane::{AllocConfig, AllocationHandle, FaultAllocator, MetricsSnapshot};

/// Allocator context plus the regions currently lent out to C.
pub(crate) struct AllocState {
    /// Base configuration read from `SALLOC_*` at first use; `s_alloc_init`
    /// overrides the policy and audit target but keeps the exit code.
    pub(crate) config: AllocConfig,
    pub(crate) allocator: FaultAllocator,
    /// Live regions keyed by address.
    pub(crate) live: HashMap<usize, AllocationHandle>,
}

impl AllocState {
    fn from_env() -> Self {
        let config = AllocConfig::from_env().unwrap_or_else(|err| {
            eprintln!("WARNING: ignoring salloc environment configuration: {err}!");
            AllocConfig::default()
        });
        Self {
            allocator: FaultAllocator::from_config(&warn_only(&config)),
            config,
            live: HashMap::new(),
        }
    }

    /// Push the current `config` into the allocator.
    pub(crate) fn apply_config(&mut self) {
        let config = warn_only(&self.config);
        self.allocator.reconfigure(&config);
    }
}

/// The allocator's sink never exits on its own; [`with_alloc_state`] does it
/// once the lock is gone.
fn warn_only(config: &AllocConfig) -> AllocConfig {
    AllocConfig {
        audit_fatal: false,
        ..config.clone()
    }
}

/// Last-error slot with NUL-terminated mirrors for C readers.
///
/// The mirrors are rebuilt on every update; pointers returned to C stay
/// valid until the next `last_error_init` / `last_error_set_message`.
pub(crate) struct ErrorState {
    pub(crate) slot: LastError,
    message: CString,
    file: CString,
}

impl ErrorState {
    fn new() -> Self {
        Self {
            slot: LastError::new(),
            message: CString::default(),
            file: CString::default(),
        }
    }

    pub(crate) fn sync(&mut self) {
        self.message = CString::new(self.slot.message()).unwrap_or_default();
        self.file = CString::new(self.slot.file()).unwrap_or_default();
    }

    pub(crate) fn message_c(&self) -> &CString {
        &self.message
    }

    pub(crate) fn file_c(&self) -> &CString {
        &self.file
    }
}

pub(crate) fn alloc_state() -> MutexGuard<'static, AllocState> {
    static STATE: OnceLock<Mutex<AllocState>> = OnceLock::new();
    STATE.get_or_init(|| Mutex::new(AllocState::from_env())).lock()
}

/// Run `f` under the allocator lock.
///
/// When `f` produced a dump-file failure and `exit_on_error` is set, the
/// process exits after the lock is released, so `atexit` handlers can still
/// call the `s_*` functions.
pub(crate) fn with_alloc_state<R>(f: impl FnOnce(&mut AllocState) -> R) -> R {
    let mut state = alloc_state();
    let failures_before = state.allocator.metrics().audit_failures;
    let result = f(&mut *state);
    let fatal = state.config.audit_fatal
        && state.allocator.metrics().audit_failures > failures_before;
    let exit_code = state.config.audit_exit_code;
    drop(state);
    if fatal {
        std::process::exit(exit_code);
    }
    result
}

pub(crate) fn error_state() -> MutexGuard<'static, ErrorState> {
    static STATE: OnceLock<Mutex<ErrorState>> = OnceLock::new();
    STATE.get_or_init(|| Mutex::new(ErrorState::new())).lock()
}

/// Number of regions handed out through `s_malloc` / `s_realloc` and not yet freed.
#[must_use]
pub fn live_region_count() -> usize {
    alloc_state().live.len()
}

/// Counters of the global allocator.
#[must_use]
pub fn metrics_snapshot() -> MetricsSnapshot {
    alloc_state().allocator.metrics()
}
