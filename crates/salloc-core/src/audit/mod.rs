//! Allocation audit trail.
//!
//! One [`AuditRecord`] per allocate/reallocate/release event, rendered as a
//! single text line and appended to an optional file by [`AuditSink`].

mod record;
mod sink;

pub use record::{AuditOp, AuditParseError, AuditRecord};
pub use sink::{AuditFailureMode, AuditSink, AuditSinkError, DEFAULT_AUDIT_EXIT_CODE};
