// canonical.rs — Deterministic request fingerprinting.
//
// The canonical form of a request is a JSON document containing exactly the
// semantically significant fields, with object keys sorted at every nesting
// level and empty approval fields omitted. Hashing that serialization binds
// an idempotency key to its payload: any change a client makes to the
// request body changes the hash, while re-ordering params or adding an
// explicit empty approval field does not.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::request::{ActionRequest, ParamValue};

/// Build the canonical JSON value for a request.
///
/// Keys are inserted in sorted order and nested maps come from `BTreeMap`
/// iteration, so the serialized byte sequence is deterministic regardless of
/// how the request was constructed or decoded.
pub fn canonical_json(req: &ActionRequest) -> Value {
    let mut root = Map::new();

    // Alphabetical insertion order: action, approval_ticket, approved_by,
    // dry_run, environment, expires_at, params, reason, target.
    root.insert("action".to_string(), Value::String(req.action.as_str().to_string()));
    if let Some(ticket) = non_empty(&req.approval_ticket) {
        root.insert("approval_ticket".to_string(), Value::String(ticket.to_string()));
    }
    if let Some(approver) = non_empty(&req.approved_by) {
        root.insert("approved_by".to_string(), Value::String(approver.to_string()));
    }
    root.insert("dry_run".to_string(), Value::Bool(req.dry_run));
    root.insert("environment".to_string(), Value::String(req.environment.clone()));
    if let Some(expires) = non_empty(&req.expires_at) {
        root.insert("expires_at".to_string(), Value::String(expires.to_string()));
    }
    root.insert("params".to_string(), params_to_value(&req.params));
    if let Some(reason) = non_empty(&req.reason) {
        root.insert("reason".to_string(), Value::String(reason.to_string()));
    }
    root.insert("target".to_string(), Value::String(req.target.clone()));

    Value::Object(root)
}

/// Lowercase hex SHA-256 of the canonical serialization.
pub fn request_hash(req: &ActionRequest) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(&canonical_json(req))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

fn params_to_value(params: &BTreeMap<String, ParamValue>) -> Value {
    let mut map = Map::new();
    for (key, value) in params {
        map.insert(key.clone(), param_to_value(value));
    }
    Value::Object(map)
}

fn param_to_value(value: &ParamValue) -> Value {
    match value {
        ParamValue::Bool(b) => Value::Bool(*b),
        ParamValue::Int(i) => Value::from(*i),
        ParamValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ParamValue::Str(s) => Value::String(s.clone()),
        ParamValue::Map(m) => params_to_value(m),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionType;

    fn base_request() -> ActionRequest {
        ActionRequest::new("home", ActionType::CloneVm, "vm/101")
            .with_param("node", "node1")
            .with_param("newid", 201)
            .with_param("full", true)
    }

    #[test]
    fn hash_is_deterministic() {
        let a = request_hash(&base_request()).unwrap();
        let b = request_hash(&base_request()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
    }

    #[test]
    fn hash_ignores_params_insertion_order() {
        // BTreeMap sorts on insert, so two requests built in different
        // orders canonicalize identically.
        let forward = ActionRequest::new("home", ActionType::CloneVm, "vm/101")
            .with_param("a", "1")
            .with_param("b", "2");
        let reverse = ActionRequest::new("home", ActionType::CloneVm, "vm/101")
            .with_param("b", "2")
            .with_param("a", "1");
        assert_eq!(
            request_hash(&forward).unwrap(),
            request_hash(&reverse).unwrap()
        );
    }

    #[test]
    fn hash_ignores_nested_map_order() {
        let json_a = r#"{"environment":"home","action":"storage_edit","target":"storage/local",
            "params":{"endpoint":"/api2/json/storage/local","opts":{"x":"1","y":"2"}}}"#;
        let json_b = r#"{"environment":"home","action":"storage_edit","target":"storage/local",
            "params":{"opts":{"y":"2","x":"1"},"endpoint":"/api2/json/storage/local"}}"#;
        let a: ActionRequest = serde_json::from_str(json_a).unwrap();
        let b: ActionRequest = serde_json::from_str(json_b).unwrap();
        assert_eq!(request_hash(&a).unwrap(), request_hash(&b).unwrap());
    }

    #[test]
    fn hash_ignores_empty_approval_fields() {
        let bare = base_request();
        let mut explicit = base_request();
        explicit.approved_by = Some(String::new());
        explicit.reason = Some(String::new());
        assert_eq!(
            request_hash(&bare).unwrap(),
            request_hash(&explicit).unwrap()
        );
    }

    #[test]
    fn hash_changes_with_payload() {
        let a = request_hash(&base_request()).unwrap();
        let mut other = base_request();
        other.target = "vm/102".to_string();
        assert_ne!(a, request_hash(&other).unwrap());

        let mut approved = base_request();
        approved.approved_by = Some("ops-user".to_string());
        assert_ne!(a, request_hash(&approved).unwrap());
    }

    #[test]
    fn actor_does_not_influence_the_hash() {
        let mut with_actor = base_request();
        with_actor.actor = "someone".to_string();
        assert_eq!(
            request_hash(&base_request()).unwrap(),
            request_hash(&with_actor).unwrap()
        );
    }

    #[test]
    fn canonical_form_sorts_keys() {
        let value = canonical_json(&base_request());
        let text = serde_json::to_string(&value).unwrap();
        let action_pos = text.find("\"action\"").unwrap();
        let env_pos = text.find("\"environment\"").unwrap();
        let target_pos = text.find("\"target\"").unwrap();
        assert!(action_pos < env_pos && env_pos < target_pos);
    }
}
