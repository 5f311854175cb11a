// client.rs — Shared HTTP client construction.
//
// One client is built at startup and shared read-only by every request.
// Its TLS configuration is fixed at construction and never mutated at
// runtime: rustls only, minimum TLS 1.2, certificate verification on.
// Disabling verification is a contract violation, so the builder refuses
// rather than obliges.

use std::time::Duration;
use thiserror::Error;

/// How long a single outbound call may take, end to end.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Options for the shared cluster API client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Per-request deadline covering connect, send, and body read.
    pub timeout: Duration,
    /// Present so that a config layer can *ask* — the answer is always no.
    /// Building with this set is an error.
    pub insecure_skip_verify: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_REQUEST_TIMEOUT,
            insecure_skip_verify: false,
        }
    }
}

/// Why a client could not be built.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("TLS certificate verification must not be disabled")]
    InsecureTlsRefused,

    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Build the shared client.
///
/// Rejects any attempt to construct with verification disabled; this is a
/// contract test target, not a configuration choice.
pub fn build_client(options: &ClientOptions) -> Result<reqwest::Client, ClientError> {
    if options.insecure_skip_verify {
        return Err(ClientError::InsecureTlsRefused);
    }

    let client = reqwest::Client::builder()
        .use_rustls_tls()
        .min_tls_version(reqwest::tls::Version::TLS_1_2)
        .timeout(options.timeout)
        .build()?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_insecure_tls() {
        let options = ClientOptions {
            timeout: DEFAULT_REQUEST_TIMEOUT,
            insecure_skip_verify: true,
        };
        match build_client(&options) {
            Err(ClientError::InsecureTlsRefused) => {}
            other => panic!("expected InsecureTlsRefused, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn builds_with_defaults() {
        let options = ClientOptions::default();
        assert!(!options.insecure_skip_verify);
        assert_eq!(options.timeout, DEFAULT_REQUEST_TIMEOUT);
        build_client(&options).unwrap();
    }
}
