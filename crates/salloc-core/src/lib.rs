//! # salloc-core
//!
//! Safe building blocks for the salloc fault-injectable allocation layer.
//!
//! This crate holds everything that does not touch the real heap:
//! - **Failure policy** (`policy`): deterministic fault injection keyed by call-site identifier
//! - **Call sites** (`callsite`): file/line/function triple attached to every event
//! - **Audit trail** (`audit`): record model, line codec and the append-only sink writer
//! - **Last error** (`last_error`): single-slot diagnostic with a bounded message buffer
//!
//! # Threading
//!
//! Nothing here synchronizes. A [`FaultInjector`] or [`LastError`] is owned by one
//! coordinating component and mutated through `&mut`; callers that share one across
//! threads must wrap it in their own lock, and must accept that a single last-error
//! slot only ever tells one story at a time.

#![deny(unsafe_code)]

pub mod audit;
pub mod callsite;
pub mod last_error;
pub mod policy;

pub use audit::{AuditFailureMode, AuditOp, AuditRecord, AuditSink, AuditSinkError};
pub use callsite::CallSite;
pub use last_error::{FormatOverflow, LastError};
pub use policy::{Admission, FailurePolicy, FaultInjector};
