// state.rs — Shared application state and bootstrap wiring.
//
// Everything handlers touch hangs off AppState: the config, the runner
// (policy + backend + audit), the idempotency store, and the server bearer
// token. All of it is constructed once at startup and read-only afterwards
// (the idempotency store has interior mutability of its own).

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use pvw_audit::{AuditError, AuditLog};
use pvw_idempotency::IdempotencyStore;
use pvw_policy::PolicyEngine;
use pvw_proxmox::{build_client, ClientError, ClientOptions, EnvironmentHandle, ProxmoxBackend};
use pvw_runner::{Backend, Runner};

use crate::config::{Config, ConfigError};

/// Why the daemon could not come up.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Audit(#[from] AuditError),
}

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub runner: Arc<Runner>,
    pub idempotency: Arc<IdempotencyStore>,
    /// The bearer token clients must present. None means unconfigured, and
    /// every non-health endpoint answers 503 until it is set.
    pub auth_token: Option<Arc<str>>,
}

impl AppState {
    /// Wire the full production stack from a validated config.
    ///
    /// Reads token secrets (fail-fast), builds the shared TLS-verified
    /// client, opens the audit log, and reads the server bearer token from
    /// the configured variable.
    pub fn from_config(config: Config) -> Result<Self, BootstrapError> {
        let secrets = config.resolve_secrets()?;

        let client = build_client(&ClientOptions {
            timeout: Duration::from_secs(config.request_timeout_secs),
            insecure_skip_verify: false,
        })?;

        let environments: Vec<EnvironmentHandle> = config
            .environments
            .iter()
            .map(|env| EnvironmentHandle {
                name: env.name.clone(),
                base_url: env.base_url.clone(),
                token_id: env.token_id.clone(),
                // resolve_secrets() produced an entry per configured
                // environment, so the lookup cannot miss.
                token_secret: secrets.get(&env.name).cloned().unwrap_or_default(),
            })
            .collect();

        let backend: Arc<dyn Backend> = Arc::new(ProxmoxBackend::new(
            client,
            environments,
            config.retry_attempts,
        ));

        let audit = Arc::new(AuditLog::open(&config.audit_log_path)?);
        let auth_token = read_auth_token(&config.auth_token_env);
        if auth_token.is_none() {
            tracing::warn!(
                variable = %config.auth_token_env,
                "server auth token not set; all authenticated endpoints will answer 503"
            );
        }

        Ok(Self::assemble(config, backend, audit, auth_token))
    }

    /// Assemble state from parts. Tests use this to substitute a mock
    /// backend or a disabled audit log.
    pub fn assemble(
        config: Config,
        backend: Arc<dyn Backend>,
        audit: Arc<AuditLog>,
        auth_token: Option<Arc<str>>,
    ) -> Self {
        let idempotency = IdempotencyStore::new(
            Duration::from_secs(config.idempotency_ttl_secs),
            Duration::from_secs(config.idempotency_high_risk_ttl_secs),
        );
        Self {
            config: Arc::new(config),
            runner: Arc::new(Runner::new(PolicyEngine::new(), backend, audit)),
            idempotency: Arc::new(idempotency),
            auth_token,
        }
    }
}

fn read_auth_token(variable: &str) -> Option<Arc<str>> {
    std::env::var(variable)
        .ok()
        .filter(|token| !token.is_empty())
        .map(Arc::from)
}
