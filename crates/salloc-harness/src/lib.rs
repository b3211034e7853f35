//! Tooling for salloc.
//!
//! This crate provides:
//! - Scenario runner: drive allocate/release cycles under a failure policy
//! - Audit check: replay an audit trail and report leaks and unknown frees
//! - Structured logging: JSONL records for both of the above

#![forbid(unsafe_code)]

pub mod audit_check;
pub mod scenario;
pub mod structured_log;

pub use audit_check::{AuditCheckError, AuditCheckReport, check_file, reconcile};
pub use scenario::{ScenarioParams, ScenarioSummary, run_scenario};
