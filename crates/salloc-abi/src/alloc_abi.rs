//! ABI layer for the allocation façade (`s_alloc_init`, `s_malloc`, `s_realloc`, `s_free`).
//!
//! Every call goes through the global [`FaultAllocator`](salloc_membrane::FaultAllocator):
//! the failure policy is consulted, the system allocator does the work, and
//! an audit line is appended when a dump file is configured. Regions stay
//! owned by the global state while C holds their address.

use libc::{c_char, c_int, c_long, c_ulong, c_void, size_t};
use salloc_membrane::AllocationHandle;

use crate::state::{alloc_state, with_alloc_state};
use crate::util::{call_site, opt_c_path, opt_c_str};
use crate::{STATUS_FAILURE, STATUS_SUCCESS};

/// Arm call `id_failure` to fail after `count_success` successes and set the dump file.
///
/// A negative `id_failure` disarms injection; `count_success <= 0` fails the
/// first armed call. `dump_path` may be `NULL` (no audit trail). A non-zero
/// `exit_on_error` terminates the process when a dump line cannot be written.
/// The exit happens once the failing call has released its internal lock, so
/// `atexit` handlers may still call into this library. May be called any
/// number of times; each call resets the success count.
///
/// # Safety
///
/// `dump_path` must be `NULL` or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn s_alloc_init(
    id_failure: c_long,
    count_success: c_long,
    dump_path: *const c_char,
    exit_on_error: c_int,
) {
    // SAFETY: caller contract.
    let path = unsafe { opt_c_path(dump_path) };
    let mut state = alloc_state();
    state.config.armed_id = i64::from(id_failure);
    state.config.success_budget = i64::from(count_success);
    state.config.audit_path = path;
    state.config.audit_fatal = exit_on_error != 0;
    state.apply_config();
}

/// Allocate `size` bytes into `*ptr`.
///
/// Returns `1` on success. On failure (injected or genuine) returns `0` and
/// leaves `*ptr` untouched. A non-zero `initialize` zero-fills the region.
/// `file` and `function` may be `NULL`, `line` may be `0`.
///
/// # Safety
///
/// `ptr` must be `NULL` or valid for writes. `file` and `function` must be
/// `NULL` or valid NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn s_malloc(
    ptr: *mut *mut c_void,
    id: c_long,
    size: size_t,
    initialize: c_int,
    file: *const c_char,
    line: c_ulong,
    function: *const c_char,
) -> c_int {
    if ptr.is_null() {
        return STATUS_FAILURE;
    }
    // SAFETY: caller contract.
    let (file, function) = unsafe { (opt_c_str(file), opt_c_str(function)) };
    let site = call_site(&file, line, &function);

    let allocated = with_alloc_state(|state| {
        let mut handle = state
            .allocator
            .allocate(i64::from(id), size, initialize != 0, &site)
            .ok()?;
        let raw = handle.as_mut_ptr();
        state.live.insert(handle.addr(), handle);
        Some(raw)
    });
    match allocated {
        Some(raw) => {
            // SAFETY: `ptr` is non-null and writable per the caller contract.
            unsafe { *ptr = raw.cast() };
            STATUS_SUCCESS
        }
        None => STATUS_FAILURE,
    }
}

/// Resize the region at `*ptr` to `new_size` bytes.
///
/// On success `*ptr` receives the (possibly moved) address and the old one
/// is dead. On failure returns `0`, `*ptr` is untouched and its region is
/// still valid. `*ptr == NULL` allocates afresh. An address that did not
/// come from this library fails without consulting the policy.
///
/// # Safety
///
/// `ptr` must be `NULL` or valid for reads and writes. `file` and `function`
/// must be `NULL` or valid NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn s_realloc(
    ptr: *mut *mut c_void,
    id: c_long,
    new_size: size_t,
    file: *const c_char,
    line: c_ulong,
    function: *const c_char,
) -> c_int {
    if ptr.is_null() {
        return STATUS_FAILURE;
    }
    // SAFETY: non-null and readable per the caller contract.
    let old = unsafe { *ptr } as usize;
    // SAFETY: caller contract.
    let (file, function) = unsafe { (opt_c_str(file), opt_c_str(function)) };
    let site = call_site(&file, line, &function);

    let resized = with_alloc_state(|state| {
        let mut handle = if old == 0 {
            AllocationHandle::empty()
        } else {
            state.live.remove(&old)?
        };
        match state
            .allocator
            .reallocate(&mut handle, i64::from(id), new_size, &site)
        {
            Ok(mut resized) => {
                let raw = resized.as_mut_ptr();
                state.live.insert(resized.addr(), resized);
                Some(raw)
            }
            Err(_) => {
                if handle.is_live() {
                    state.live.insert(old, handle);
                }
                None
            }
        }
    });
    match resized {
        Some(raw) => {
            // SAFETY: `ptr` is non-null and writable per the caller contract.
            unsafe { *ptr = raw.cast() };
            STATUS_SUCCESS
        }
        None => STATUS_FAILURE,
    }
}

/// Free the region at `*ptr` and set `*ptr` to `NULL`.
///
/// Freeing `NULL` is a no-op apart from its dump line, so calling `s_free`
/// twice on the same variable is harmless. An address that did not come
/// from this library is ignored and `*ptr` is left as is.
///
/// # Safety
///
/// `ptr` must be `NULL` or valid for reads and writes. `file` and `function`
/// must be `NULL` or valid NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn s_free(
    ptr: *mut *mut c_void,
    file: *const c_char,
    line: c_ulong,
    function: *const c_char,
) {
    if ptr.is_null() {
        return;
    }
    // SAFETY: non-null and readable per the caller contract.
    let addr = unsafe { *ptr } as usize;
    // SAFETY: caller contract.
    let (file, function) = unsafe { (opt_c_str(file), opt_c_str(function)) };
    let site = call_site(&file, line, &function);

    let released = with_alloc_state(|state| {
        let mut handle = if addr == 0 {
            AllocationHandle::empty()
        } else {
            state.live.remove(&addr)?
        };
        state.allocator.release(&mut handle, &site);
        Some(())
    });
    if released.is_some() {
        // SAFETY: `ptr` is non-null and writable per the caller contract.
        unsafe { *ptr = std::ptr::null_mut() };
    }
}
