//! # pvw-audit
//!
//! Append-only structured audit trail: one JSON object per line, each record
//! linked to the previous one by a SHA-256 hash chain so that insertion,
//! deletion, or modification of any line is detectable.
//!
//! Three record kinds exist — `plan`, `apply_denied`, `apply` — and every
//! state-changing decision the control plane makes lands here before the
//! response leaves the process.

pub mod event;
pub mod hasher;
pub mod log;

mod error;

pub use error::AuditError;
pub use event::{AuditEvent, AuditKind};
pub use log::AuditLog;
