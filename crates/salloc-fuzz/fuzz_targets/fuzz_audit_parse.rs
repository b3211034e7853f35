#![no_main]
use libfuzzer_sys::fuzz_target;
use salloc_core::audit::AuditRecord;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    for line in text.lines() {
        if let Ok(record) = AuditRecord::parse(line) {
            let rendered = record.to_string();
            let reparsed = AuditRecord::parse(&rendered).expect("rendered record must parse");
            assert_eq!(reparsed, record);
        }
    }
});
