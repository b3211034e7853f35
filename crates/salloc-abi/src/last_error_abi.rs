//! ABI layer for the last-error recorder.
//!
//! One process-wide slot. Strings returned by the getters point into
//! library-owned buffers and stay valid until the next `last_error_init`
//! or `last_error_set_message`.

use std::ffi::{c_char, c_int};

use crate::state::error_state;
use crate::util::opt_c_str;
use crate::{STATUS_FAILURE, STATUS_SUCCESS};

/// Reset the slot: id `-1`, empty message.
#[unsafe(no_mangle)]
pub extern "C" fn last_error_init() {
    let mut state = error_state();
    state.slot.init();
    state.sync();
}

/// Record error `code` raised at `file:line` in `function`.
///
/// `message` is stored as-is: `%` directives are not expanded, so C callers
/// render it with `snprintf` first. Returns `1` when
/// the full message fits. Returns `0` when it had to be discarded, in which
/// case the code, file and line are still recorded and the message is empty.
///
/// # Safety
///
/// `file`, `function` and `message` must be `NULL` or valid NUL-terminated
/// strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn last_error_set_message(
    code: c_int,
    file: *const c_char,
    line: c_int,
    function: *const c_char,
    message: *const c_char,
) -> c_int {
    // SAFETY: caller contract.
    let (file, function, message) =
        unsafe { (opt_c_str(file), opt_c_str(function), opt_c_str(message)) };
    let mut state = error_state();
    let status = state.slot.set(
        code,
        file.as_deref().unwrap_or_default(),
        u32::try_from(line).unwrap_or(0),
        function.as_deref().unwrap_or_default(),
        format_args!("{}", message.as_deref().unwrap_or_default()),
    );
    state.sync();
    match status {
        Ok(()) => STATUS_SUCCESS,
        Err(_) => STATUS_FAILURE,
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn last_error_get_id() -> c_int {
    error_state().slot.code()
}

/// Formatted message of the last error (empty when none or discarded).
#[unsafe(no_mangle)]
pub extern "C" fn last_error_get_message() -> *const c_char {
    error_state().message_c().as_ptr()
}

#[unsafe(no_mangle)]
pub extern "C" fn last_error_file() -> *const c_char {
    error_state().file_c().as_ptr()
}

#[unsafe(no_mangle)]
pub extern "C" fn last_error_line() -> c_int {
    c_int::try_from(error_state().slot.line()).unwrap_or(c_int::MAX)
}
