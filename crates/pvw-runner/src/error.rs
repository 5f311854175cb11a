// error.rs — Runner failure modes.

use thiserror::Error;

use crate::backend::BackendError;
use pvw_audit::AuditError;

/// Errors surfaced by plan/apply.
///
/// Audit failures are surfaced as the operation's error (fail-closed): an
/// apply whose audit record cannot be written is reported as failed even
/// though the backend call succeeded. See DESIGN.md for the rationale.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Policy refused the apply. The payload is the decision reason.
    #[error("{0}")]
    PolicyDenied(String),

    /// The backend adapter failed; carried verbatim.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The audit trail could not be written.
    #[error("audit write failed: {0}")]
    Audit(#[from] AuditError),
}
