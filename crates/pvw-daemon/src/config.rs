// config.rs — Daemon configuration.
//
// A single JSON object: listen address, audit log path, and the cluster
// environments the service may talk to. Token secrets never live in the
// file — each environment names the process environment variable holding
// its secret, and startup fails fast if any named variable is unset.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Connection parameters for one cluster, minus the secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentConfig {
    /// Name clients use in `ActionRequest.environment`.
    pub name: String,
    /// Base URL of the cluster API, e.g. `https://pve.example:8006`.
    pub base_url: String,
    /// API token identifier, e.g. `warden@pve!warden`.
    pub token_id: String,
    /// Name of the environment variable holding the token secret.
    pub token_secret_env: String,
}

/// Daemon configuration as loaded from disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Address the HTTP listener binds, e.g. `127.0.0.1:8787`.
    pub listen_addr: String,

    /// Where the append-only audit log lives.
    #[serde(default = "default_audit_log_path")]
    pub audit_log_path: PathBuf,

    /// Configured clusters. Must be non-empty.
    pub environments: Vec<EnvironmentConfig>,

    /// Environment variable holding the bearer token clients must present.
    #[serde(default = "default_auth_token_env")]
    pub auth_token_env: String,

    /// Per-request deadline for outbound cluster calls, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Attempt budget for GET calls to the cluster (first try included).
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Idempotency record lifetime, in seconds.
    #[serde(default = "default_idempotency_ttl_secs")]
    pub idempotency_ttl_secs: u64,

    /// Idempotency record lifetime for high-risk applies, in seconds.
    #[serde(default = "default_idempotency_high_risk_ttl_secs")]
    pub idempotency_high_risk_ttl_secs: u64,
}

fn default_audit_log_path() -> PathBuf {
    PathBuf::from("./data/audit.log")
}

fn default_auth_token_env() -> String {
    "PVW_AUTH_TOKEN".to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_idempotency_ttl_secs() -> u64 {
    60 * 60
}

fn default_idempotency_high_risk_ttl_secs() -> u64 {
    15 * 60
}

/// Configuration failures. All of these abort startup before the listener
/// binds.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("listen_addr is required")]
    MissingListenAddr,

    #[error("at least one environment must be configured")]
    NoEnvironments,

    #[error("environment '{0}' is configured twice")]
    DuplicateEnvironment(String),

    #[error("environment '{0}' is missing name, base_url, token_id, or token_secret_env")]
    IncompleteEnvironment(String),

    #[error("secret variable '{variable}' for environment '{environment}' is unset or empty")]
    MissingSecret {
        environment: String,
        variable: String,
    },
}

impl Config {
    /// Load and validate a config file. Decoding is strict: unknown fields
    /// are rejected just like they are on the request path.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|source| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Structural validation independent of the process environment.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_addr.is_empty() {
            return Err(ConfigError::MissingListenAddr);
        }
        if self.environments.is_empty() {
            return Err(ConfigError::NoEnvironments);
        }

        let mut seen = Vec::new();
        for env in &self.environments {
            if env.name.is_empty()
                || env.base_url.is_empty()
                || env.token_id.is_empty()
                || env.token_secret_env.is_empty()
            {
                return Err(ConfigError::IncompleteEnvironment(env.name.clone()));
            }
            if seen.contains(&env.name) {
                return Err(ConfigError::DuplicateEnvironment(env.name.clone()));
            }
            seen.push(env.name.clone());
        }
        Ok(())
    }

    /// Read every environment's token secret from the process environment.
    ///
    /// Fails fast on the first unset or empty variable so a half-configured
    /// daemon never starts serving.
    pub fn resolve_secrets(&self) -> Result<HashMap<String, String>, ConfigError> {
        let mut secrets = HashMap::new();
        for env in &self.environments {
            let value = std::env::var(&env.token_secret_env).unwrap_or_default();
            if value.is_empty() {
                return Err(ConfigError::MissingSecret {
                    environment: env.name.clone(),
                    variable: env.token_secret_env.clone(),
                });
            }
            secrets.insert(env.name.clone(), value);
        }
        Ok(secrets)
    }

    /// The configured environment names, for the validator.
    pub fn environment_names(&self) -> Vec<String> {
        self.environments.iter().map(|e| e.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        serde_json::from_str(
            r#"{
                "listen_addr": "127.0.0.1:8787",
                "environments": [
                    {"name": "home", "base_url": "https://pve.example:8006",
                     "token_id": "warden@pve!warden", "token_secret_env": "PVW_TEST_SECRET"}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn defaults_are_applied() {
        let config = sample();
        assert_eq!(config.audit_log_path, PathBuf::from("./data/audit.log"));
        assert_eq!(config.auth_token_env, "PVW_AUTH_TOKEN");
        assert_eq!(config.request_timeout_secs, 15);
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.idempotency_ttl_secs, 3600);
        assert_eq!(config.idempotency_high_risk_ttl_secs, 900);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = serde_json::from_str::<Config>(
            r#"{"listen_addr": "x", "environments": [], "verify_tls": false}"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn empty_environments_fail_validation() {
        let mut config = sample();
        config.environments.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NoEnvironments)
        ));
    }

    #[test]
    fn duplicate_environments_fail_validation() {
        let mut config = sample();
        config.environments.push(config.environments[0].clone());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateEnvironment(name)) if name == "home"
        ));
    }

    #[test]
    fn missing_secret_fails_fast() {
        let mut config = sample();
        config.environments[0].token_secret_env = "PVW_TEST_SECRET_DEFINITELY_UNSET".to_string();
        assert!(matches!(
            config.resolve_secrets(),
            Err(ConfigError::MissingSecret { environment, .. }) if environment == "home"
        ));
    }

    #[test]
    fn secrets_resolve_from_the_process_environment() {
        // Env var access in tests is process-global; use a name unique to
        // this test.
        std::env::set_var("PVW_TEST_SECRET_RESOLVES", "s3cret");
        let mut config = sample();
        config.environments[0].token_secret_env = "PVW_TEST_SECRET_RESOLVES".to_string();
        let secrets = config.resolve_secrets().unwrap();
        assert_eq!(secrets["home"], "s3cret");
        std::env::remove_var("PVW_TEST_SECRET_RESOLVES");
    }
}
