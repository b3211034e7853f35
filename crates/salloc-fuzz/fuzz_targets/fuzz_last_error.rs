#![no_main]
use libfuzzer_sys::fuzz_target;
use salloc_core::last_error::LastError;

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }
    let capacity = usize::from(data[0]);
    let file_capacity = usize::from(data[1]);
    let split = 2 + usize::from(data[2]) % (data.len() - 2).max(1);
    let file = String::from_utf8_lossy(&data[2..split.min(data.len())]);
    let message = String::from_utf8_lossy(&data[split.min(data.len())..]);

    let mut slot = LastError::with_capacity(capacity, file_capacity);
    let result = slot.set(7, &file, 12, "f", format_args!("{message}"));

    assert_eq!(slot.code(), 7);
    assert!(slot.file().len() < file_capacity.max(1));
    assert!(file.starts_with(slot.file()));
    match result {
        Ok(()) => {
            assert!(slot.message().len() < capacity);
            assert!(slot.message().ends_with(message.as_ref()));
        }
        Err(_) => assert!(slot.message().is_empty()),
    }
});
