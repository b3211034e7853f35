//! Audit-trail reconciliation.
//!
//! Replays an audit file event by event, tracking which addresses are live,
//! and reports what the program never released or released without owning:
//! - leaks: allocations still live at the end of the trail
//! - unknown frees: frees of addresses the trail never allocated
//! - unknown reallocations: resizes of addresses the trail never allocated
//!
//! Frees of address `0x0` (releasing an already released handle) are legal
//! and only counted.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use salloc_core::audit::{AuditOp, AuditParseError, AuditRecord};
use serde::{Deserialize, Serialize};
use sha2::Digest;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditCheckError {
    #[error("failed reading '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line_number}: {source}")]
    Parse {
        line_number: usize,
        #[source]
        source: AuditParseError,
    },
}

/// Where an event came from in the trail and the program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrailSite {
    /// 1-based line in the audit file.
    pub line_number: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
}

impl TrailSite {
    fn of(record: &AuditRecord<'_>, line_number: usize) -> Self {
        Self {
            line_number,
            file: record.site.file().map(str::to_string),
            line: record.site.line,
            function: record.site.function().map(str::to_string),
        }
    }
}

/// An allocation never released through the façade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leak {
    pub address: String,
    pub size: usize,
    pub id: i64,
    pub allocated_at: TrailSite,
}

/// A free or reallocation naming an address the trail does not hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnknownAddress {
    pub address: String,
    pub at: TrailSite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditCheckReport {
    pub ok: bool,
    pub records: usize,
    pub allocations: usize,
    pub reallocations: usize,
    pub frees: usize,
    pub noop_frees: usize,
    pub leaks: Vec<Leak>,
    pub unknown_frees: Vec<UnknownAddress>,
    pub unknown_reallocations: Vec<UnknownAddress>,
    /// Bytes still live at the end of the trail, saturating at `usize::MAX`.
    pub live_bytes: usize,
    pub peak_live_bytes: usize,
    pub sha256: String,
}

#[derive(Debug)]
struct Live {
    size: usize,
    id: i64,
    site: TrailSite,
}

#[derive(Debug, Default)]
struct Ledger {
    live: BTreeMap<usize, Live>,
    live_bytes: usize,
    peak_live_bytes: usize,
    /// Entries displaced by a new allocation at the same address.
    displaced: Vec<(usize, Live)>,
}

impl Ledger {
    fn insert(&mut self, address: usize, entry: Live) {
        let size = entry.size;
        // The address was handed out again, so the old owner dropped it
        // without a free record.
        if let Some(old) = self.live.insert(address, entry) {
            self.live_bytes = self.live_bytes.saturating_sub(old.size);
            self.displaced.push((address, old));
        }
        // Sizes come straight from the file; pin the totals at usize::MAX.
        self.live_bytes = self.live_bytes.saturating_add(size);
        self.peak_live_bytes = self.peak_live_bytes.max(self.live_bytes);
    }

    fn remove(&mut self, address: usize) -> bool {
        match self.live.remove(&address) {
            Some(entry) => {
                self.live_bytes = self.live_bytes.saturating_sub(entry.size);
                true
            }
            None => false,
        }
    }
}

/// Reconcile an audit trail held in memory.
pub fn reconcile(trail: &str) -> Result<AuditCheckReport, AuditCheckError> {
    let mut ledger = Ledger::default();
    let mut report = AuditCheckReport {
        ok: true,
        records: 0,
        allocations: 0,
        reallocations: 0,
        frees: 0,
        noop_frees: 0,
        leaks: Vec::new(),
        unknown_frees: Vec::new(),
        unknown_reallocations: Vec::new(),
        live_bytes: 0,
        peak_live_bytes: 0,
        sha256: sha256_hex(trail.as_bytes()),
    };

    for (idx, line) in trail.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let line_number = idx + 1;
        let record = AuditRecord::parse(line)
            .map_err(|source| AuditCheckError::Parse { line_number, source })?;
        report.records += 1;
        let live = || Live {
            size: record.size.unwrap_or(0),
            id: record.id.unwrap_or(-1),
            site: TrailSite::of(&record, line_number),
        };

        match record.op {
            AuditOp::Allocate => {
                report.allocations += 1;
                ledger.insert(record.address, live());
            }
            AuditOp::Reallocate => {
                report.reallocations += 1;
                let previous = record.previous.unwrap_or(0);
                if previous != 0 && !ledger.remove(previous) {
                    report.unknown_reallocations.push(UnknownAddress {
                        address: hex(previous),
                        at: TrailSite::of(&record, line_number),
                    });
                }
                ledger.insert(record.address, live());
            }
            AuditOp::Free => {
                report.frees += 1;
                if record.address == 0 {
                    report.noop_frees += 1;
                } else if !ledger.remove(record.address) {
                    report.unknown_frees.push(UnknownAddress {
                        address: hex(record.address),
                        at: TrailSite::of(&record, line_number),
                    });
                }
            }
        }
    }

    report.live_bytes = ledger.live_bytes;
    report.peak_live_bytes = ledger.peak_live_bytes;
    let mut leaks: Vec<(usize, Live)> = ledger.displaced;
    leaks.extend(ledger.live);
    leaks.sort_by_key(|(_, entry)| entry.site.line_number);
    report.leaks = leaks
        .into_iter()
        .map(|(address, entry)| Leak {
            address: hex(address),
            size: entry.size,
            id: entry.id,
            allocated_at: entry.site,
        })
        .collect();
    report.ok = report.leaks.is_empty() && report.unknown_frees.is_empty();
    Ok(report)
}

/// Read and reconcile the audit file at `path`.
pub fn check_file(path: &Path) -> Result<AuditCheckReport, AuditCheckError> {
    let trail = std::fs::read_to_string(path).map_err(|source| AuditCheckError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    reconcile(&trail)
}

fn hex(address: usize) -> String {
    format!("{address:#x}")
}

fn sha256_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    sha2::Sha256::digest(bytes)
        .iter()
        .fold(String::with_capacity(64), |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLEAN: &str = "\
A +[main] +[a.c]:1 0x1000 16 (1)
R +[main] +[a.c]:2 0x1000 0x2000 64 (2)
F +[main] +[a.c]:3 0x2000
F +[main] +[a.c]:4 0x0
";

    #[test]
    fn clean_trail_is_ok() {
        let report = reconcile(CLEAN).unwrap();
        assert!(report.ok);
        assert_eq!(report.records, 4);
        assert_eq!(
            (report.allocations, report.reallocations, report.frees, report.noop_frees),
            (1, 1, 2, 1)
        );
        assert_eq!(report.live_bytes, 0);
        assert_eq!(report.peak_live_bytes, 64);
        assert_eq!(report.sha256.len(), 64);
    }

    #[test]
    fn leak_keeps_its_call_site() {
        let report = reconcile("A +[load] +[b.c]:9 0xabc 32 (7)\n").unwrap();
        assert!(!report.ok);
        assert_eq!(report.leaks.len(), 1);
        let leak = &report.leaks[0];
        assert_eq!(leak.address, "0xabc");
        assert_eq!((leak.size, leak.id), (32, 7));
        assert_eq!(leak.allocated_at.function.as_deref(), Some("load"));
        assert_eq!(leak.allocated_at.line, 9);
        assert_eq!(leak.allocated_at.line_number, 1);
        assert_eq!(report.live_bytes, 32);
    }

    #[test]
    fn unknown_free_fails_the_check() {
        let report = reconcile("F -[] -[]:0 0x10\n").unwrap();
        assert!(!report.ok);
        assert_eq!(report.unknown_frees[0].address, "0x10");
    }

    #[test]
    fn unknown_realloc_is_reported_but_tracked() {
        let report = reconcile("R -[] -[]:0 0x10 0x20 8 (1)\nF -[] -[]:0 0x20\n").unwrap();
        assert!(report.ok);
        assert_eq!(report.unknown_reallocations.len(), 1);
        assert_eq!(report.unknown_reallocations[0].address, "0x10");
    }

    #[test]
    fn realloc_from_null_is_an_allocation() {
        let report = reconcile("R -[] -[]:0 0x0 0x20 8 (1)\nF -[] -[]:0 0x20\n").unwrap();
        assert!(report.ok);
        assert!(report.unknown_reallocations.is_empty());
    }

    #[test]
    fn reused_address_exposes_the_dropped_owner() {
        let trail = "A -[] -[]:1 0x40 8 (1)\nA -[] -[]:2 0x40 16 (2)\nF -[] -[]:3 0x40\n";
        let report = reconcile(trail).unwrap();
        assert_eq!(report.leaks.len(), 1);
        assert_eq!(report.leaks[0].id, 1);
        assert_eq!(report.live_bytes, 0);
        assert_eq!(report.peak_live_bytes, 16);
    }

    #[test]
    fn huge_sizes_saturate_live_totals() {
        let trail = format!(
            "A -[] -[]:1 0x10 {} (1)\nA -[] -[]:2 0x20 1 (1)\n",
            usize::MAX
        );
        let report = reconcile(&trail).unwrap();
        assert_eq!(report.leaks.len(), 2);
        assert_eq!(report.live_bytes, usize::MAX);
        assert_eq!(report.peak_live_bytes, usize::MAX);

        let freed = format!("{trail}F -[] -[]:3 0x20\nF -[] -[]:4 0x10\n");
        let report = reconcile(&freed).unwrap();
        assert!(report.ok);
        assert_eq!(report.live_bytes, 0);
        assert_eq!(report.peak_live_bytes, usize::MAX);
    }

    #[test]
    fn malformed_line_reports_its_number() {
        let err = reconcile("A -[] -[]:1 0x40 8 (1)\n\nQ nonsense\n").unwrap_err();
        match err {
            AuditCheckError::Parse { line_number, source } => {
                assert_eq!(line_number, 3);
                assert_eq!(source, AuditParseError::UnknownTag);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn digest_matches_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
