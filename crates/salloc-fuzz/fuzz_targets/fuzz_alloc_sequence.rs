#![no_main]
use libfuzzer_sys::fuzz_target;
use salloc_core::callsite::CallSite;
use salloc_membrane::{AllocationHandle, FaultAllocator};

// Each 4-byte chunk is one operation: [op, id, size_lo, size_hi].
fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let mut alloc = FaultAllocator::new();
    alloc.configure(i64::from(data[0] % 8), i64::from(data[1] % 8));
    let mut handles: Vec<AllocationHandle> = Vec::new();

    for chunk in data[2..].chunks_exact(4) {
        let id = i64::from(chunk[1] % 8) - 1;
        let size = usize::from(u16::from_le_bytes([chunk[2], chunk[3]]));

        match chunk[0] % 4 {
            0 => {
                if let Ok(h) = alloc.allocate(id, size, chunk[0] & 0x80 != 0, &CallSite::UNKNOWN) {
                    assert_eq!(h.len(), size);
                    handles.push(h);
                }
            }
            1 => {
                if handles.is_empty() {
                    continue;
                }
                let idx = usize::from(chunk[1]) % handles.len();
                let before = (handles[idx].addr(), handles[idx].len());
                match alloc.reallocate(&mut handles[idx], id, size, &CallSite::UNKNOWN) {
                    Ok(resized) => {
                        assert!(handles[idx].is_empty());
                        assert_eq!(resized.len(), size);
                        handles[idx] = resized;
                    }
                    Err(_) => assert_eq!((handles[idx].addr(), handles[idx].len()), before),
                }
            }
            2 => {
                if let Some(mut h) = handles.pop() {
                    alloc.release(&mut h, &CallSite::UNKNOWN);
                    assert!(h.is_empty());
                    alloc.release(&mut h, &CallSite::UNKNOWN);
                }
            }
            _ => {
                if let Some(h) = handles.last_mut() {
                    h.as_mut_slice().fill(chunk[1]);
                }
            }
        }
    }

    let m = alloc.metrics();
    assert!(m.releases <= m.allocations + m.reallocations);
    for mut h in handles {
        alloc.release(&mut h, &CallSite::UNKNOWN);
    }
});
