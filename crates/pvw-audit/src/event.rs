// event.rs — Audit record data model.
//
// Each record captures one lifecycle decision: what was requested, by whom,
// what policy decided, and (for successful applies) what the backend
// produced. The `actor` field is always the identity the front-end
// authenticated, never anything taken from a request body. Secrets never
// appear in any field — requests carry no credentials by construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pvw_model::{ActionRequest, ActionResult, Decision};

/// What kind of lifecycle event this record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    /// A plan evaluation completed (no mutation possible).
    Plan,
    /// Policy refused an apply.
    ApplyDenied,
    /// An apply went through to the backend and succeeded.
    Apply,
}

/// A single audit record — one line in the JSONL audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique identifier for this record.
    pub event_id: Uuid,

    /// When this record was written (UTC, RFC 3339 in JSON).
    pub timestamp: DateTime<Utc>,

    /// Lifecycle event kind.
    pub kind: AuditKind,

    /// The authenticated caller identity.
    pub actor: String,

    /// The request as admitted by the validator.
    pub request: ActionRequest,

    /// The policy decision for the evaluated phase.
    pub decision: Decision,

    /// The backend result, present only for `kind == apply`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ActionResult>,

    /// Hash of the previous record's JSON line (tamper detection).
    /// The first record in the log has this set to None.
    #[serde(default)]
    pub previous_hash: Option<String>,
}

impl AuditEvent {
    /// Create a record with the current timestamp and a random UUID.
    pub fn new(kind: AuditKind, request: &ActionRequest, decision: &Decision) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind,
            actor: request.actor.clone(),
            request: request.clone(),
            decision: decision.clone(),
            result: None,
            previous_hash: None,
        }
    }

    /// Attach a backend result and return self (builder pattern).
    pub fn with_result(mut self, result: ActionResult) -> Self {
        self.result = Some(result);
        self
    }
}
