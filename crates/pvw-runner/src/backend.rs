// backend.rs — The backend seam and its failure taxonomy.
//
// The runner talks to a cluster through this trait. The error taxonomy is a
// closed set independent of transport, and implementations must never put a
// token secret into any variant's fields — the messages here flow into
// client-facing errors verbatim.

use async_trait::async_trait;
use thiserror::Error;

use pvw_model::{ActionRequest, ActionResult};

/// Failures an adapter can surface.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Could not reach the cluster API (connect, TLS, timeout).
    #[error("transport error calling {method} {endpoint}: {message}")]
    Transport {
        method: String,
        endpoint: String,
        message: String,
    },

    /// The cluster API answered with a terminal non-2xx status.
    #[error("cluster API returned {status} for {method} {endpoint}: {message}")]
    HttpStatus {
        status: u16,
        method: String,
        endpoint: String,
        message: String,
    },

    /// The cluster API answered 2xx but the body was not the expected
    /// JSON envelope.
    #[error("failed to decode cluster API response: {0}")]
    Decode(String),

    /// The request names an environment the adapter does not hold
    /// connection parameters for.
    #[error("unknown environment '{0}'")]
    UnknownEnvironment(String),

    /// The target (or its required params, e.g. `node`) cannot be
    /// translated to a concrete endpoint.
    #[error("invalid target: {0}")]
    InvalidTarget(String),
}

/// A concrete cluster adapter.
///
/// `execute` performs the dry-run short-circuit, endpoint translation, and
/// the actual API call. Implementations own their retry discipline: GETs
/// may be retried on transient failures, mutations are single-shot.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn execute(&self, req: &ActionRequest) -> Result<ActionResult, BackendError>;
}
