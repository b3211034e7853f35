use std::path::PathBuf;
use std::process::Command;

use salloc_core::audit::{AuditOp, AuditRecord, AuditSink};
use salloc_core::call_site;
use salloc_core::callsite::CallSite;
use salloc_membrane::{AllocConfig, AllocationHandle, FaultAllocator};

const CHILD_MARKER: &str = "SALLOC_AUDIT_FATAL_CHILD";

fn temp_audit_path(tag: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "salloc-audit-{tag}-{}.log",
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);
    path
}

fn unwritable_path() -> PathBuf {
    std::env::temp_dir()
        .join(format!("salloc-missing-{}", std::process::id()))
        .join("nested")
        .join("audit.log")
}

fn read_records(path: &PathBuf) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn records_follow_operation_order() {
    let path = temp_audit_path("order");
    let mut alloc =
        FaultAllocator::from_config(&AllocConfig::failing(100, 1).with_audit(&path, false));

    let site = CallSite::new("src/app.rs", 10, Some("load"));
    let mut a = alloc.allocate(100, 64, true, &site).unwrap();
    let a_addr = a.addr();
    assert!(alloc.allocate(100, 64, true, &site).is_err());
    let mut b = alloc.reallocate(&mut a, 5, 256, &site).unwrap();
    alloc.release(&mut b, &site);
    alloc.release(&mut b, &site);

    let lines = read_records(&path);
    let records: Vec<AuditRecord<'_>> = lines
        .iter()
        .map(|l| AuditRecord::parse(l).unwrap())
        .collect();
    let ops: Vec<AuditOp> = records.iter().map(|r| r.op).collect();
    assert_eq!(
        ops,
        [AuditOp::Allocate, AuditOp::Reallocate, AuditOp::Free, AuditOp::Free]
    );

    assert_eq!(records[0].address, a_addr);
    assert_eq!(records[0].size, Some(64));
    assert_eq!(records[0].id, Some(100));
    assert_eq!(records[0].site, site);

    assert_eq!(records[1].previous, Some(a_addr));
    assert_eq!(records[1].size, Some(256));
    assert_eq!(records[1].id, Some(5));

    assert_eq!(records[2].address, records[1].address);
    assert_eq!(records[3].address, 0);
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn sink_appends_across_allocators() {
    let path = temp_audit_path("append");
    std::fs::write(&path, "existing line\n").unwrap();
    let mut alloc = FaultAllocator::new();
    alloc.set_sink(AuditSink::to_file(&path, Default::default()));
    let mut h = alloc.allocate(-1, 1, false, &call_site!()).unwrap();
    alloc.release(&mut h, &call_site!());

    let lines = read_records(&path);
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "existing line");
    assert!(lines[1].starts_with("A +[sink_appends_across_allocators] +["));
    assert!(lines[2].starts_with("F +[sink_appends_across_allocators] +["));
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn no_sink_means_no_writes_even_in_fatal_mode() {
    let config = AllocConfig {
        audit_fatal: true,
        ..AllocConfig::default()
    };
    let mut alloc = FaultAllocator::from_config(&config);
    for _ in 0..100 {
        let mut h = alloc.allocate(1, 16, false, &CallSite::UNKNOWN).unwrap();
        let mut h = alloc.reallocate(&mut h, 1, 32, &CallSite::UNKNOWN).unwrap();
        alloc.release(&mut h, &CallSite::UNKNOWN);
        alloc.release(&mut AllocationHandle::empty(), &CallSite::UNKNOWN);
    }
    assert_eq!(alloc.metrics().audit_failures, 0);
}

#[test]
fn audit_failure_in_warn_mode_does_not_change_results() {
    let config = AllocConfig::default().with_audit(unwritable_path(), false);
    let mut alloc = FaultAllocator::from_config(&config);
    let mut h = alloc.allocate(1, 16, true, &CallSite::UNKNOWN).unwrap();
    assert_eq!(h.len(), 16);
    let mut h = alloc.reallocate(&mut h, 1, 8, &CallSite::UNKNOWN).unwrap();
    alloc.release(&mut h, &CallSite::UNKNOWN);
    assert!(h.is_empty());
    assert_eq!(alloc.metrics().audit_failures, 3);
}

#[test]
fn audit_failure_in_fatal_mode_exits_with_distinct_status() {
    if std::env::var_os(CHILD_MARKER).is_some() {
        let config = AllocConfig {
            audit_exit_code: 74,
            ..AllocConfig::default().with_audit(unwritable_path(), true)
        };
        let mut alloc = FaultAllocator::from_config(&config);
        let _ = alloc.allocate(1, 16, false, &CallSite::UNKNOWN);
        // Unreachable when the sink terminates the process.
        std::process::exit(0);
    }

    let exe = std::env::current_exe().unwrap();
    let output = Command::new(exe)
        .args([
            "--exact",
            "audit_failure_in_fatal_mode_exits_with_distinct_status",
            "--nocapture",
            "--test-threads=1",
        ])
        .env(CHILD_MARKER, "1")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(74));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("WARNING: cannot open dump file"), "{stderr}");
}
