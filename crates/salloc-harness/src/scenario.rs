//! Fault-scenario runner.
//!
//! Drives a fixed number of allocate/release cycles through a
//! [`FaultAllocator`] under a chosen failure policy and logs every call.

use std::io::Write;
use std::path::PathBuf;

use salloc_core::call_site;
use salloc_membrane::{AllocConfig, FaultAllocator, MetricsSnapshot};
use serde::{Deserialize, Serialize};

use crate::structured_log::{LogEmitter, LogEntry, LogLevel, Outcome};

/// What to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioParams {
    /// Identifier armed for failure (negative disarms).
    pub fail_id: i64,
    /// Successful armed calls before failures begin.
    pub budget: i64,
    /// Number of allocate/release cycles.
    pub calls: u32,
    /// Identifier passed on every call (defaults to `fail_id`).
    pub id: Option<i64>,
    /// Bytes requested per call.
    pub size: usize,
    pub audit: Option<PathBuf>,
    pub fatal: bool,
}

impl Default for ScenarioParams {
    fn default() -> Self {
        Self {
            fail_id: 100,
            budget: 2,
            calls: 3,
            id: None,
            size: 64,
            audit: None,
            fatal: false,
        }
    }
}

impl ScenarioParams {
    #[must_use]
    pub fn call_id(&self) -> i64 {
        self.id.unwrap_or(self.fail_id)
    }

    #[must_use]
    pub fn config(&self) -> AllocConfig {
        let config = AllocConfig::failing(self.fail_id, self.budget);
        match &self.audit {
            Some(path) => config.with_audit(path, self.fatal),
            None => config,
        }
    }
}

/// Per-run totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioSummary {
    pub calls: u32,
    pub succeeded: u32,
    pub failed: u32,
    /// Outcome of each call in order.
    pub outcomes: Vec<Outcome>,
    /// 1-based index of the first failing call.
    pub first_failure: Option<u32>,
}

/// Run `params`, logging one entry per call and a closing summary entry.
pub fn run_scenario<W: Write>(
    params: &ScenarioParams,
    log: &mut LogEmitter<W>,
) -> std::io::Result<(ScenarioSummary, MetricsSnapshot)> {
    let mut alloc = FaultAllocator::from_config(&params.config());
    let id = params.call_id();

    log.emit_entry(
        LogEntry::new("", LogLevel::Info, "scenario_start").with_details(serde_json::json!({
            "fail_id": params.fail_id,
            "budget": params.budget,
            "calls": params.calls,
            "id": id,
            "size": params.size,
            "audit": params.audit.as_ref().map(|p| p.display().to_string()),
            "fatal": params.fatal,
        })),
    )?;

    let mut summary = ScenarioSummary {
        calls: params.calls,
        succeeded: 0,
        failed: 0,
        outcomes: Vec::with_capacity(params.calls as usize),
        first_failure: None,
    };

    for call in 1..=params.calls {
        let result = alloc.allocate(id, params.size, true, &call_site!());
        let outcome = Outcome::from_success(result.is_ok());
        let entry = LogEntry::new("", LogLevel::Info, "allocate")
            .with_call_id(id)
            .with_outcome(outcome);
        let entry = match result {
            Ok(mut handle) => {
                summary.succeeded += 1;
                let details = serde_json::json!({
                    "call": call,
                    "size": params.size,
                    "address": format!("{:#x}", handle.addr()),
                });
                alloc.release(&mut handle, &call_site!());
                entry.with_details(details)
            }
            Err(err) => {
                summary.failed += 1;
                summary.first_failure.get_or_insert(call);
                entry.with_details(serde_json::json!({
                    "call": call,
                    "size": params.size,
                    "error": err.to_string(),
                }))
            }
        };
        summary.outcomes.push(outcome);
        log.emit_entry(entry)?;
    }

    let metrics = alloc.metrics();
    log.emit_entry(
        LogEntry::new("", LogLevel::Info, "scenario_summary")
            .with_outcome(Outcome::from_success(summary.failed == 0))
            .with_details(serde_json::json!({
                "summary": &summary,
                "metrics": metrics_json(&metrics),
            })),
    )?;
    log.flush()?;
    Ok((summary, metrics))
}

/// Metrics snapshot as a JSON object.
#[must_use]
pub fn metrics_json(m: &MetricsSnapshot) -> serde_json::Value {
    serde_json::json!({
        "allocations": m.allocations,
        "reallocations": m.reallocations,
        "releases": m.releases,
        "noop_releases": m.noop_releases,
        "policy_denials": m.policy_denials,
        "exhaustion_failures": m.exhaustion_failures,
        "audit_failures": m.audit_failures,
    })
}
