// adapter.rs — The Proxmox backend: execution, envelope handling, retries.
//
// Holds per-environment connection parameters and the shared HTTP client.
// Retry discipline: GETs may be retried on transport errors and 502/503/504
// up to the configured attempt budget; everything else is single-shot.
// Mutating calls are never retried here — client-side retries are
// neutralized one layer up by idempotency keys.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use pvw_model::{ActionRequest, ActionResult, ActionType};
use pvw_runner::{Backend, BackendError};

use crate::route::{translate, PveCall};

/// Default GET attempt budget (first try plus retries).
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Connection parameters for one configured environment.
///
/// The token secret is process-lifetime state read from the environment at
/// startup; it is deliberately excluded from the Debug representation and
/// never copied into errors or results.
#[derive(Clone)]
pub struct EnvironmentHandle {
    pub name: String,
    pub base_url: String,
    pub token_id: String,
    pub token_secret: String,
}

impl fmt::Debug for EnvironmentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentHandle")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("token_id", &self.token_id)
            .field("token_secret", &"<redacted>")
            .finish()
    }
}

/// The Proxmox VE adapter. Read-only after construction.
pub struct ProxmoxBackend {
    client: reqwest::Client,
    environments: HashMap<String, EnvironmentHandle>,
    retry_attempts: u32,
}

impl ProxmoxBackend {
    pub fn new(
        client: reqwest::Client,
        environments: impl IntoIterator<Item = EnvironmentHandle>,
        retry_attempts: u32,
    ) -> Self {
        Self {
            client,
            environments: environments
                .into_iter()
                .map(|env| (env.name.clone(), env))
                .collect(),
            retry_attempts: retry_attempts.max(1),
        }
    }

    fn environment(&self, name: &str) -> Result<&EnvironmentHandle, BackendError> {
        self.environments
            .get(name)
            .ok_or_else(|| BackendError::UnknownEnvironment(name.to_string()))
    }

    /// Send one translated call, honoring the GET-only retry budget.
    async fn send(
        &self,
        env: &EnvironmentHandle,
        call: &PveCall,
    ) -> Result<Vec<u8>, BackendError> {
        let url = format!("{}{}", env.base_url.trim_end_matches('/'), call.path);
        let attempts = attempt_budget(&call.method, self.retry_attempts);

        for attempt in 1..=attempts {
            let mut builder = self
                .client
                .request(call.method.clone(), &url)
                .header("Accept", "application/json")
                .header(
                    "Authorization",
                    format!("PVEAPIToken={}={}", env.token_id, env.token_secret),
                );
            if !call.query.is_empty() {
                builder = builder.query(&call.query);
            }
            if !call.form.is_empty() {
                builder = builder.form(&call.form);
            }

            let response = match builder.send().await {
                Ok(response) => response,
                Err(err) => {
                    if attempt < attempts {
                        tracing::debug!(
                            method = %call.method,
                            endpoint = %call.path,
                            attempt,
                            "transport error, retrying"
                        );
                        continue;
                    }
                    return Err(BackendError::Transport {
                        method: call.method.to_string(),
                        endpoint: call.path.clone(),
                        // reqwest error text never contains credentials; the
                        // Authorization header is not echoed in errors.
                        message: err.to_string(),
                    });
                }
            };

            let status = response.status();
            let body = response.bytes().await.map_err(|err| BackendError::Transport {
                method: call.method.to_string(),
                endpoint: call.path.clone(),
                message: err.to_string(),
            })?;

            if status.is_success() {
                return Ok(body.to_vec());
            }

            if retryable_status(status) && attempt < attempts {
                tracing::debug!(
                    method = %call.method,
                    endpoint = %call.path,
                    status = status.as_u16(),
                    attempt,
                    "transient upstream status, retrying"
                );
                continue;
            }

            return Err(BackendError::HttpStatus {
                status: status.as_u16(),
                method: call.method.to_string(),
                endpoint: call.path.clone(),
                message: extract_error_message(&body),
            });
        }

        // The loop always returns on its final attempt.
        unreachable!("retry loop exhausted without a terminal result")
    }
}

#[async_trait]
impl Backend for ProxmoxBackend {
    async fn execute(&self, req: &ActionRequest) -> Result<ActionResult, BackendError> {
        // Dry-run short-circuits before anything else: zero network calls.
        if req.dry_run {
            return Ok(ActionResult::planned(
                "dry-run only; no cluster API call made",
            ));
        }

        let env = self.environment(&req.environment)?;
        let call = translate(req)?;

        tracing::debug!(
            environment = %env.name,
            method = %call.method,
            endpoint = %call.path,
            "calling cluster API"
        );

        let body = self.send(env, &call).await?;
        let envelope: Value = serde_json::from_slice(&body)
            .map_err(|err| BackendError::Decode(err.to_string()))?;
        let data = envelope.get("data").cloned().unwrap_or(Value::Null);

        Ok(shape_result(req, data))
    }
}

/// GETs get the configured budget; everything else is single-shot.
fn attempt_budget(method: &Method, configured: u32) -> u32 {
    if *method == Method::GET {
        configured.max(1)
    } else {
        1
    }
}

/// Transient upstream statuses worth a retry (GET only).
fn retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 502 | 503 | 504)
}

/// Turn the envelope's data into an ActionResult for the given request.
fn shape_result(req: &ActionRequest, data: Value) -> ActionResult {
    // A string payload is a UPID: the operation was accepted as a task.
    if let Value::String(upid) = &data {
        return ActionResult::accepted(upid.clone());
    }

    match req.action {
        ActionType::ReadVm => ActionResult::ok("vm state retrieved", some_value(data)),
        ActionType::ReadInventory => {
            let running_only = req.target == "inventory/running";
            let filtered = filter_inventory(data, running_only);
            let message = format!("{} resources", filtered.len());
            ActionResult::ok(message, Some(Value::Array(filtered)))
        }
        ActionType::ReadTasks => ActionResult::ok("tasks listed", some_value(data)),
        ActionType::ReadTaskStatus => ActionResult::ok("task status retrieved", some_value(data)),
        ActionType::StartVm
        | ActionType::StopVm
        | ActionType::SnapshotVm
        | ActionType::CloneVm
        | ActionType::MigrateVm
        | ActionType::DeleteVm
        | ActionType::StorageEdit
        | ActionType::FirewallEdit => ActionResult::ok("operation completed", some_value(data)),
    }
}

fn some_value(data: Value) -> Option<Value> {
    match data {
        Value::Null => None,
        other => Some(other),
    }
}

/// Keep only VM-ish resources (qemu/lxc), optionally only running ones.
/// The cluster/resources endpoint returns every resource type; the adapter
/// owns this filter so callers see inventory, not the whole cluster.
fn filter_inventory(data: Value, running_only: bool) -> Vec<Value> {
    let Value::Array(items) = data else {
        return Vec::new();
    };
    items
        .into_iter()
        .filter(|item| {
            let kind = item.get("type").and_then(Value::as_str).unwrap_or_default();
            if kind != "qemu" && kind != "lxc" {
                return false;
            }
            if running_only {
                let status = item.get("status").and_then(Value::as_str).unwrap_or_default();
                return status == "running";
            }
            true
        })
        .collect()
}

/// Best-effort error text from a PVE response body: the envelope's `error`,
/// then `errors`, then `data`, else the raw body.
fn extract_error_message(body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        for key in ["error", "errors", "data"] {
            match value.get(key) {
                None | Some(Value::Null) => continue,
                Some(Value::String(s)) if s.is_empty() => continue,
                Some(Value::String(s)) => return s.clone(),
                Some(other) => return other.to_string(),
            }
        }
    }
    let raw = String::from_utf8_lossy(body);
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        "<empty response body>".to_string()
    } else {
        trimmed.chars().take(300).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{build_client, ClientOptions};
    use serde_json::json;

    fn backend_with_envs(envs: Vec<EnvironmentHandle>) -> ProxmoxBackend {
        let client = build_client(&ClientOptions::default()).unwrap();
        ProxmoxBackend::new(client, envs, DEFAULT_RETRY_ATTEMPTS)
    }

    fn home_env() -> EnvironmentHandle {
        EnvironmentHandle {
            name: "home".to_string(),
            base_url: "https://pve.example:8006".to_string(),
            token_id: "warden@pve!warden".to_string(),
            token_secret: "super-secret-token-value".to_string(),
        }
    }

    #[tokio::test]
    async fn dry_run_short_circuits_with_no_network() {
        // No environments configured at all: if execute resolved the
        // environment or built a call, it would fail.
        let backend = backend_with_envs(Vec::new());
        let req = {
            let mut r = ActionRequest::new("home", ActionType::DeleteVm, "vm/101");
            r.dry_run = true;
            r
        };
        let result = backend.execute(&req).await.unwrap();
        assert_eq!(result.message, "dry-run only; no cluster API call made");
    }

    #[tokio::test]
    async fn unknown_environment_fails() {
        let backend = backend_with_envs(vec![home_env()]);
        let req = ActionRequest::new("lab", ActionType::ReadInventory, "inventory/all");
        match backend.execute(&req).await {
            Err(BackendError::UnknownEnvironment(name)) => assert_eq!(name, "lab"),
            other => panic!("expected UnknownEnvironment, got {:?}", other),
        }
    }

    #[test]
    fn only_gets_have_a_retry_budget() {
        assert_eq!(attempt_budget(&Method::GET, 3), 3);
        assert_eq!(attempt_budget(&Method::POST, 3), 1);
        assert_eq!(attempt_budget(&Method::PUT, 3), 1);
        assert_eq!(attempt_budget(&Method::DELETE, 3), 1);
        // A zero budget still means one attempt.
        assert_eq!(attempt_budget(&Method::GET, 0), 1);
    }

    #[test]
    fn transient_statuses_are_classified() {
        for transient in [502u16, 503, 504] {
            assert!(retryable_status(StatusCode::from_u16(transient).unwrap()));
        }
        for terminal in [400u16, 401, 403, 404, 500, 501] {
            assert!(!retryable_status(StatusCode::from_u16(terminal).unwrap()));
        }
    }

    #[test]
    fn upid_string_data_becomes_accepted() {
        let req = ActionRequest::new("home", ActionType::StartVm, "vm/101");
        let result = shape_result(&req, json!("UPID:node1:000012AB:0:qmstart:101:root@pam:"));
        assert_eq!(result.status, pvw_model::ActionStatus::Accepted);
        assert_eq!(result.message, "UPID:node1:000012AB:0:qmstart:101:root@pam:");
    }

    #[test]
    fn read_vm_keeps_the_status_object() {
        let req = ActionRequest::new("home", ActionType::ReadVm, "vm/101");
        let result = shape_result(&req, json!({"status": "running", "vmid": 101}));
        assert_eq!(result.status, pvw_model::ActionStatus::Ok);
        assert_eq!(result.message, "vm state retrieved");
        assert_eq!(result.data.unwrap()["status"], "running");
    }

    #[test]
    fn inventory_filters_to_vm_types() {
        let data = json!([
            {"type": "qemu", "vmid": 101, "status": "running"},
            {"type": "lxc", "vmid": 200, "status": "stopped"},
            {"type": "storage", "storage": "local"},
            {"type": "node", "node": "node1"},
        ]);
        let req = ActionRequest::new("home", ActionType::ReadInventory, "inventory/all");
        let result = shape_result(&req, data.clone());
        assert_eq!(result.message, "2 resources");

        let running = ActionRequest::new("home", ActionType::ReadInventory, "inventory/running");
        let result = shape_result(&running, data);
        assert_eq!(result.message, "1 resources");
        let items = match result.data.unwrap() {
            Value::Array(items) => items,
            other => panic!("expected array, got {other}"),
        };
        assert_eq!(items[0]["vmid"], 101);
    }

    #[test]
    fn error_message_precedence_is_error_errors_data() {
        assert_eq!(
            extract_error_message(br#"{"error": "no permission"}"#),
            "no permission"
        );
        assert_eq!(
            extract_error_message(br#"{"errors": {"vmid": "invalid"}}"#),
            r#"{"vmid":"invalid"}"#
        );
        assert_eq!(
            extract_error_message(br#"{"data": "storage does not exist"}"#),
            "storage does not exist"
        );
        assert_eq!(extract_error_message(b"plain text failure"), "plain text failure");
        assert_eq!(extract_error_message(b""), "<empty response body>");
    }

    #[test]
    fn debug_output_redacts_the_secret() {
        let debug = format!("{:?}", home_env());
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("super-secret-token-value"));
    }
}
