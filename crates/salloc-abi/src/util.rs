//! Shared internal utilities for ABI adapters.

use std::borrow::Cow;
use std::ffi::{CStr, c_char, c_ulong};
use std::path::PathBuf;

use salloc_core::callsite::CallSite;

/// Borrow a C string, `None` for `NULL`. Invalid UTF-8 is replaced lossily.
///
/// # Safety
///
/// `ptr` must be `NULL` or point to a NUL-terminated string that outlives `'a`.
pub(crate) unsafe fn opt_c_str<'a>(ptr: *const c_char) -> Option<Cow<'a, str>> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: non-null and NUL-terminated per the caller contract.
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy())
}

/// Path from a C string, byte-exact on Unix.
///
/// # Safety
///
/// Same contract as [`opt_c_str`].
pub(crate) unsafe fn opt_c_path(ptr: *const c_char) -> Option<PathBuf> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: non-null and NUL-terminated per the caller contract.
    let bytes = unsafe { CStr::from_ptr(ptr) }.to_bytes();
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        Some(PathBuf::from(std::ffi::OsStr::from_bytes(bytes)))
    }
    #[cfg(not(unix))]
    {
        Some(PathBuf::from(String::from_utf8_lossy(bytes).into_owned()))
    }
}

/// Clamp a C line number into the recorder's range.
pub(crate) fn clamp_line(line: c_ulong) -> u32 {
    u32::try_from(line).unwrap_or(u32::MAX)
}

pub(crate) fn call_site<'a>(
    file: &'a Option<Cow<'a, str>>,
    line: c_ulong,
    function: &'a Option<Cow<'a, str>>,
) -> CallSite<'a> {
    CallSite {
        file: file.as_deref().map(Cow::Borrowed),
        line: clamp_line(line),
        function: function.as_deref().map(Cow::Borrowed),
    }
}
