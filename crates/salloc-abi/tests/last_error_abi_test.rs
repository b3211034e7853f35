//! Integration tests for the last-error ABI entry points.

use std::ffi::{CStr, c_char};
use std::ptr;
use std::sync::Mutex;

use salloc_abi::last_error_abi::{
    last_error_file, last_error_get_id, last_error_get_message, last_error_init,
    last_error_line, last_error_set_message,
};
use salloc_abi::{STATUS_FAILURE, STATUS_SUCCESS};

static TEST_LOCK: Mutex<()> = Mutex::new(());

fn lock() -> std::sync::MutexGuard<'static, ()> {
    TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

fn read(ptr: *const c_char) -> String {
    assert!(!ptr.is_null());
    // SAFETY: the getters return NUL-terminated library-owned strings.
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

#[test]
fn init_clears_the_slot() {
    let _guard = lock();
    last_error_init();
    assert_eq!(last_error_get_id(), -1);
    assert_eq!(read(last_error_get_message()), "");
}

#[test]
fn set_formats_prefix_and_message() {
    let _guard = lock();
    last_error_init();
    // SAFETY: all strings are static C literals.
    let status = unsafe {
        last_error_set_message(
            10,
            c"/src/main.c".as_ptr(),
            69,
            c"main".as_ptr(),
            c"the value is 10".as_ptr(),
        )
    };
    assert_eq!(status, STATUS_SUCCESS);
    assert_eq!(last_error_get_id(), 10);
    assert_eq!(last_error_line(), 69);
    assert_eq!(read(last_error_file()), "/src/main.c");
    assert_eq!(
        read(last_error_get_message()),
        "#0000000010 [/src/main.c:69 main()] the value is 10"
    );
}

#[test]
fn percent_directives_are_kept_literally() {
    let _guard = lock();
    last_error_init();
    // SAFETY: static C literals.
    let status = unsafe {
        last_error_set_message(1, c"f.c".as_ptr(), 10, c"g".as_ptr(), c"msg %d %s %%".as_ptr())
    };
    assert_eq!(status, STATUS_SUCCESS);
    assert_eq!(read(last_error_get_message()), "#0000000001 [f.c:10 g()] msg %d %s %%");

    let rendered = std::ffi::CString::new(format!("msg {}", 42)).unwrap();
    // SAFETY: valid C strings.
    let status = unsafe {
        last_error_set_message(1, c"f.c".as_ptr(), 10, c"g".as_ptr(), rendered.as_ptr())
    };
    assert_eq!(status, STATUS_SUCCESS);
    assert_eq!(read(last_error_get_message()), "#0000000001 [f.c:10 g()] msg 42");
}

#[test]
fn oversized_message_is_discarded() {
    let _guard = lock();
    last_error_init();
    let long = std::ffi::CString::new("x".repeat(200)).unwrap();
    // SAFETY: valid C strings.
    let status = unsafe {
        last_error_set_message(3, c"a.c".as_ptr(), 1, c"f".as_ptr(), long.as_ptr())
    };
    assert_eq!(status, STATUS_FAILURE);
    assert_eq!(last_error_get_id(), 3);
    assert_eq!(read(last_error_file()), "a.c");
    assert_eq!(read(last_error_get_message()), "");
}

#[test]
fn null_arguments_read_as_empty() {
    let _guard = lock();
    // SAFETY: NULL strings are accepted.
    let status = unsafe { last_error_set_message(1, ptr::null(), -5, ptr::null(), ptr::null()) };
    assert_eq!(status, STATUS_SUCCESS);
    assert_eq!(last_error_line(), 0);
    assert_eq!(read(last_error_get_message()), "#0000000001 [:0 ()] ");
}
