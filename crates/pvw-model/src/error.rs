// error.rs — Validation failures.
//
// Every variant surfaces as INVALID_ARGUMENT at the HTTP edge. The messages
// are client-facing, so they name the offending field and rule but never
// echo secrets (none flow through validation in the first place).

use thiserror::Error;

use crate::action::ActionType;

/// Why an `ActionRequest` was refused admission.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error("environment is required")]
    MissingEnvironment,

    #[error("environment '{0}' is not configured")]
    UnknownEnvironment(String),

    #[error("target is required")]
    MissingTarget,

    #[error("target '{target}' does not match the grammar for action '{action}'")]
    InvalidTarget { action: ActionType, target: String },

    #[error("approved_by must match [A-Za-z0-9._:@/-] and be 3-128 characters")]
    InvalidApprovedBy,

    #[error("approval_ticket must match [A-Za-z0-9._:-] and be 3-128 characters")]
    InvalidApprovalTicket,

    #[error("reason must be at least 8 characters")]
    ReasonTooShort,

    #[error("expires_at is not a valid RFC 3339 timestamp: '{0}'")]
    InvalidExpiresAt(String),

    #[error("approved_by is required when approval_ticket, reason, or expires_at is set")]
    IncompleteApproval,
}
