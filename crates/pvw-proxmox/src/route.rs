// route.rs — Translation from (action, target, params) to a PVE API call.
//
// Every VM action routes to /api2/json/nodes/{node}/qemu/{vmid}/...; the
// node component comes from params.node (or the legacy node/vmid target
// form). The two *_edit actions use the custom-endpoint escape hatch:
// params.endpoint supplies the literal path, constrained to the /api2/json/
// prefix, with an optional params.method override.
//
// Form encoding follows Proxmox conventions: booleans become 0/1, numbers
// their canonical decimal form, strings pass through.

use reqwest::Method;
use std::collections::BTreeMap;

use pvw_model::{ActionRequest, ActionType, ParamValue};
use pvw_runner::BackendError;

/// A fully translated cluster API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PveCall {
    pub method: Method,
    /// Absolute path starting with /api2/json/.
    pub path: String,
    /// Query string parameters (GET and DELETE).
    pub query: Vec<(String, String)>,
    /// URL-form-encoded body parameters (POST and PUT).
    pub form: Vec<(String, String)>,
}

impl PveCall {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            form: Vec::new(),
        }
    }
}

/// Translate an admitted request into a concrete call.
pub fn translate(req: &ActionRequest) -> Result<PveCall, BackendError> {
    match req.action {
        ActionType::ReadVm => {
            let (node, vmid) = vm_location(req)?;
            Ok(PveCall::new(
                Method::GET,
                format!("/api2/json/nodes/{node}/qemu/{vmid}/status/current"),
            ))
        }
        ActionType::StartVm => vm_post(req, "status/start"),
        ActionType::StopVm => vm_post(req, "status/stop"),
        ActionType::SnapshotVm => vm_post(req, "snapshot"),
        ActionType::CloneVm => vm_post(req, "clone"),
        ActionType::MigrateVm => vm_post(req, "migrate"),
        ActionType::DeleteVm => {
            let (node, vmid) = vm_location(req)?;
            let mut call = PveCall::new(
                Method::DELETE,
                format!("/api2/json/nodes/{node}/qemu/{vmid}"),
            );
            call.query = encode_params(&req.params, &["node"])?;
            Ok(call)
        }
        ActionType::ReadInventory => {
            Ok(PveCall::new(Method::GET, "/api2/json/cluster/resources"))
        }
        ActionType::ReadTasks => {
            let node = required_param(req, "node")?;
            let mut call =
                PveCall::new(Method::GET, format!("/api2/json/nodes/{node}/tasks"));
            call.query = encode_params(&req.params, &["node"])?;
            Ok(call)
        }
        ActionType::ReadTaskStatus => {
            let node = required_param(req, "node")?;
            let upid = required_param(req, "upid")?;
            Ok(PveCall::new(
                Method::GET,
                format!("/api2/json/nodes/{node}/tasks/{upid}/status"),
            ))
        }
        ActionType::StorageEdit => custom_endpoint(req, Method::PUT),
        ActionType::FirewallEdit => custom_endpoint(req, Method::POST),
    }
}

/// A POST against a sub-path of the VM, with the remaining params as the
/// form body.
fn vm_post(req: &ActionRequest, suffix: &str) -> Result<PveCall, BackendError> {
    let (node, vmid) = vm_location(req)?;
    let mut call = PveCall::new(
        Method::POST,
        format!("/api2/json/nodes/{node}/qemu/{vmid}/{suffix}"),
    );
    call.form = encode_params(&req.params, &["node"])?;
    Ok(call)
}

/// Resolve (node, vmid) from the target and params.
///
/// Canonical form is `vm/<vmid>` with the node in params.node; the legacy
/// `<node>/<vmid>` target form is still honored for library callers.
fn vm_location(req: &ActionRequest) -> Result<(String, String), BackendError> {
    let mut parts = req.target.splitn(2, '/');
    let first = parts.next().unwrap_or_default();
    let second = parts.next().unwrap_or_default();

    if first == "vm" {
        if second.is_empty() || !second.chars().all(|c| c.is_ascii_digit()) {
            return Err(BackendError::InvalidTarget(format!(
                "'{}' is not of the form vm/<vmid>",
                req.target
            )));
        }
        let node = required_param(req, "node")?;
        return Ok((node, second.to_string()));
    }

    // Legacy node/vmid form carries the node inline.
    if !first.is_empty() && !second.is_empty() && second.chars().all(|c| c.is_ascii_digit()) {
        return Ok((first.to_string(), second.to_string()));
    }

    Err(BackendError::InvalidTarget(format!(
        "'{}' is not of the form vm/<vmid> or <node>/<vmid>",
        req.target
    )))
}

/// The custom-endpoint escape hatch shared by storage_edit and
/// firewall_edit. params.endpoint is the literal path and must stay inside
/// /api2/json/; params.method may override the default verb.
fn custom_endpoint(req: &ActionRequest, default_method: Method) -> Result<PveCall, BackendError> {
    let endpoint = required_param(req, "endpoint")?;
    if !endpoint.starts_with("/api2/json/") {
        return Err(BackendError::InvalidTarget(format!(
            "params.endpoint must begin with /api2/json/, got '{endpoint}'"
        )));
    }

    let method = match req.params.get("method") {
        None => default_method,
        Some(value) => {
            let name = value.as_str().map(str::to_ascii_uppercase).unwrap_or_default();
            match name.as_str() {
                "GET" => Method::GET,
                "POST" => Method::POST,
                "PUT" => Method::PUT,
                "DELETE" => Method::DELETE,
                other => {
                    return Err(BackendError::InvalidTarget(format!(
                        "params.method '{other}' is not one of GET, POST, PUT, DELETE"
                    )))
                }
            }
        }
    };

    let params = encode_params(&req.params, &["endpoint", "method"])?;
    let mut call = PveCall::new(method.clone(), endpoint);
    if method == Method::GET || method == Method::DELETE {
        call.query = params;
    } else {
        call.form = params;
    }
    Ok(call)
}

fn required_param(req: &ActionRequest, name: &str) -> Result<String, BackendError> {
    req.params
        .get(name)
        .and_then(|v| v.as_form_value())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| BackendError::InvalidTarget(format!("params.{name} is required")))
}

/// Encode params (minus the skipped routing keys) as form/query pairs,
/// preserving the sorted key order of the map.
fn encode_params(
    params: &BTreeMap<String, ParamValue>,
    skip: &[&str],
) -> Result<Vec<(String, String)>, BackendError> {
    let mut pairs = Vec::new();
    for (key, value) in params {
        if skip.contains(&key.as_str()) {
            continue;
        }
        let encoded = value.as_form_value().ok_or_else(|| {
            BackendError::InvalidTarget(format!(
                "params.{key} is a nested object and has no form encoding"
            ))
        })?;
        pairs.push((key.clone(), encoded));
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pvw_model::ActionRequest;

    fn vm_request(action: ActionType) -> ActionRequest {
        ActionRequest::new("home", action, "vm/101").with_param("node", "node1")
    }

    #[test]
    fn read_vm_routes_to_status_current() {
        let call = translate(&vm_request(ActionType::ReadVm)).unwrap();
        assert_eq!(call.method, Method::GET);
        assert_eq!(call.path, "/api2/json/nodes/node1/qemu/101/status/current");
        assert!(call.form.is_empty());
    }

    #[test]
    fn vm_mutations_route_to_their_endpoints() {
        let table: &[(ActionType, Method, &str)] = &[
            (ActionType::StartVm, Method::POST, "/api2/json/nodes/node1/qemu/101/status/start"),
            (ActionType::StopVm, Method::POST, "/api2/json/nodes/node1/qemu/101/status/stop"),
            (ActionType::SnapshotVm, Method::POST, "/api2/json/nodes/node1/qemu/101/snapshot"),
            (ActionType::CloneVm, Method::POST, "/api2/json/nodes/node1/qemu/101/clone"),
            (ActionType::MigrateVm, Method::POST, "/api2/json/nodes/node1/qemu/101/migrate"),
            (ActionType::DeleteVm, Method::DELETE, "/api2/json/nodes/node1/qemu/101"),
        ];
        for (action, method, path) in table {
            let call = translate(&vm_request(*action)).unwrap();
            assert_eq!(&call.method, method, "{action}");
            assert_eq!(&call.path, path, "{action}");
        }
    }

    #[test]
    fn node_comes_from_params_for_vm_targets() {
        let req = ActionRequest::new("home", ActionType::ReadVm, "vm/101");
        match translate(&req) {
            Err(BackendError::InvalidTarget(message)) => {
                assert!(message.contains("params.node"))
            }
            other => panic!("expected InvalidTarget, got {:?}", other),
        }
    }

    #[test]
    fn legacy_node_vmid_target_is_honored() {
        let req = ActionRequest::new("home", ActionType::ReadVm, "pve-01/101");
        let call = translate(&req).unwrap();
        assert_eq!(call.path, "/api2/json/nodes/pve-01/qemu/101/status/current");
    }

    #[test]
    fn form_params_are_coerced() {
        let req = vm_request(ActionType::CloneVm)
            .with_param("newid", 201)
            .with_param("full", true)
            .with_param("name", "clone-of-101");
        let call = translate(&req).unwrap();
        // node is routing, not payload.
        assert!(!call.form.iter().any(|(k, _)| k == "node"));
        assert!(call.form.contains(&("newid".to_string(), "201".to_string())));
        assert!(call.form.contains(&("full".to_string(), "1".to_string())));
        assert!(call.form.contains(&("name".to_string(), "clone-of-101".to_string())));
    }

    #[test]
    fn nested_objects_have_no_form_encoding() {
        let mut req = vm_request(ActionType::SnapshotVm);
        req.params.insert(
            "meta".to_string(),
            ParamValue::Map(BTreeMap::from([(
                "a".to_string(),
                ParamValue::Str("b".to_string()),
            )])),
        );
        assert!(matches!(
            translate(&req),
            Err(BackendError::InvalidTarget(_))
        ));
    }

    #[test]
    fn inventory_routes_to_cluster_resources() {
        let req = ActionRequest::new("home", ActionType::ReadInventory, "inventory/all");
        let call = translate(&req).unwrap();
        assert_eq!(call.method, Method::GET);
        assert_eq!(call.path, "/api2/json/cluster/resources");
    }

    #[test]
    fn task_routes_require_their_params() {
        let req = ActionRequest::new("home", ActionType::ReadTasks, "task/list")
            .with_param("node", "node1")
            .with_param("limit", 50);
        let call = translate(&req).unwrap();
        assert_eq!(call.path, "/api2/json/nodes/node1/tasks");
        assert!(call.query.contains(&("limit".to_string(), "50".to_string())));

        let req = ActionRequest::new("home", ActionType::ReadTaskStatus, "task/status")
            .with_param("node", "node1")
            .with_param("upid", "UPID:node1:000012AB:0:qmstart:101:root@pam:");
        let call = translate(&req).unwrap();
        assert_eq!(
            call.path,
            "/api2/json/nodes/node1/tasks/UPID:node1:000012AB:0:qmstart:101:root@pam:/status"
        );

        let missing = ActionRequest::new("home", ActionType::ReadTaskStatus, "task/status")
            .with_param("node", "node1");
        assert!(matches!(
            translate(&missing),
            Err(BackendError::InvalidTarget(_))
        ));
    }

    #[test]
    fn storage_edit_uses_the_escape_hatch() {
        let req = ActionRequest::new("home", ActionType::StorageEdit, "storage/local-lvm")
            .with_param("endpoint", "/api2/json/storage/local-lvm")
            .with_param("content", "images,rootdir");
        let call = translate(&req).unwrap();
        assert_eq!(call.method, Method::PUT);
        assert_eq!(call.path, "/api2/json/storage/local-lvm");
        assert_eq!(
            call.form,
            vec![("content".to_string(), "images,rootdir".to_string())]
        );
    }

    #[test]
    fn firewall_edit_defaults_to_post_and_honors_method_override() {
        let req = ActionRequest::new("home", ActionType::FirewallEdit, "firewall/cluster")
            .with_param("endpoint", "/api2/json/cluster/firewall/rules")
            .with_param("action", "ACCEPT")
            .with_param("type", "in");
        let call = translate(&req).unwrap();
        assert_eq!(call.method, Method::POST);

        let req = req.with_param("method", "PUT");
        let call = translate(&req).unwrap();
        assert_eq!(call.method, Method::PUT);
        // method/endpoint are routing, not payload.
        assert!(!call.form.iter().any(|(k, _)| k == "method" || k == "endpoint"));
    }

    #[test]
    fn escape_hatch_is_fenced_to_the_api_prefix() {
        let req = ActionRequest::new("home", ActionType::StorageEdit, "storage/local")
            .with_param("endpoint", "/api2/extjs/storage/local");
        match translate(&req) {
            Err(BackendError::InvalidTarget(message)) => {
                assert!(message.contains("/api2/json/"))
            }
            other => panic!("expected InvalidTarget, got {:?}", other),
        }

        let req = ActionRequest::new("home", ActionType::StorageEdit, "storage/local");
        assert!(matches!(
            translate(&req),
            Err(BackendError::InvalidTarget(_))
        ));
    }

    #[test]
    fn unknown_method_override_is_rejected() {
        let req = ActionRequest::new("home", ActionType::FirewallEdit, "firewall/cluster")
            .with_param("endpoint", "/api2/json/cluster/firewall/options")
            .with_param("method", "PATCH");
        assert!(matches!(
            translate(&req),
            Err(BackendError::InvalidTarget(_))
        ));
    }
}
