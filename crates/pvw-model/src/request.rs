// request.rs — The ActionRequest unit of work and its params mapping.
//
// An ActionRequest exists transiently per HTTP call. Decoding is strict:
// unknown fields are rejected so that a typo'd approval field can never be
// silently dropped, and the `actor` field is never read from the wire — the
// front-end fills it from the authenticated identity after decoding.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::action::ActionType;

/// An opaque parameter value passed through to the cluster API.
///
/// Params are scalars or string-keyed mappings of scalars. Arrays are not
/// representable, which rejects them at the wire edge: no Proxmox endpoint
/// the control plane models takes a JSON array argument.
///
/// `BTreeMap` keeps sub-object keys sorted, which the canonical hasher
/// relies on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Map(BTreeMap<String, ParamValue>),
}

impl ParamValue {
    /// The string form used for URL-form encoding.
    ///
    /// Booleans use the Proxmox `0`/`1` convention. Mappings have no form
    /// representation and return `None` — the caller decides whether that is
    /// an error for its endpoint.
    pub fn as_form_value(&self) -> Option<String> {
        match self {
            ParamValue::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            ParamValue::Int(i) => Some(i.to_string()),
            ParamValue::Float(f) => Some(f.to_string()),
            ParamValue::Str(s) => Some(s.clone()),
            ParamValue::Map(_) => None,
        }
    }

    /// The string payload if this value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Str(s.to_string())
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        ParamValue::Int(i)
    }
}

impl From<i32> for ParamValue {
    fn from(i: i32) -> Self {
        ParamValue::Int(i64::from(i))
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

/// The unit of work: one requested operation against one environment.
///
/// `deny_unknown_fields` makes decoding strict; note that this also rejects
/// any attempt to supply `actor` in the body, since `actor` is marked
/// `skip_deserializing` and therefore counts as unknown on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionRequest {
    /// Name of a configured cluster environment.
    pub environment: String,

    /// What to do.
    pub action: ActionType,

    /// Structured resource reference, e.g. `vm/101` or `inventory/all`.
    /// The grammar is action-specific and enforced by the validator.
    pub target: String,

    /// Cluster-API arguments (and the custom-endpoint escape hatch).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, ParamValue>,

    /// If true, apply short-circuits before any cluster API call.
    #[serde(default)]
    pub dry_run: bool,

    /// Who approved this operation. Required by policy for high-risk applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,

    /// Ticket reference backing the approval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_ticket: Option<String>,

    /// Free-text justification (at least 8 characters when present).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// RFC 3339 expiry of the approval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,

    /// The authenticated caller. Never on the wire in either direction: the
    /// front-end sets it after authentication, and audit records carry it in
    /// their own `actor` field rather than inside the serialized request.
    #[serde(skip)]
    pub actor: String,
}

impl ActionRequest {
    /// A minimal request for the given action and target, no params.
    pub fn new(environment: impl Into<String>, action: ActionType, target: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            action,
            target: target.into(),
            params: BTreeMap::new(),
            dry_run: false,
            approved_by: None,
            approval_ticket: None,
            reason: None,
            expires_at: None,
            actor: String::new(),
        }
    }

    /// Insert a parameter and return self (builder pattern).
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Set the approver and return self.
    pub fn with_approved_by(mut self, approver: impl Into<String>) -> Self {
        self.approved_by = Some(approver.into());
        self
    }

    /// Whether a non-empty `approved_by` is attached. Empty strings count as
    /// absent everywhere approval presence matters.
    pub fn has_approval(&self) -> bool {
        self.approved_by.as_deref().is_some_and(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_minimal_request() {
        let req: ActionRequest =
            serde_json::from_str(r#"{"environment":"home","action":"read_vm","target":"vm/101"}"#)
                .unwrap();
        assert_eq!(req.environment, "home");
        assert_eq!(req.action, ActionType::ReadVm);
        assert_eq!(req.target, "vm/101");
        assert!(!req.dry_run);
        assert!(req.params.is_empty());
        assert!(req.actor.is_empty());
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = serde_json::from_str::<ActionRequest>(
            r#"{"environment":"home","action":"read_vm","target":"vm/101","unknown":true}"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn actor_is_never_read_from_the_wire() {
        // With skip_deserializing + deny_unknown_fields, a body that tries to
        // smuggle an actor is rejected outright.
        let err = serde_json::from_str::<ActionRequest>(
            r#"{"environment":"home","action":"read_vm","target":"vm/101","actor":"evil"}"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn rejects_trailing_content() {
        let err = serde_json::from_str::<ActionRequest>(
            r#"{"environment":"home","action":"read_vm","target":"vm/101"}{"x":1}"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn params_accept_scalars_and_maps() {
        let req: ActionRequest = serde_json::from_str(
            r#"{"environment":"home","action":"clone_vm","target":"vm/101",
                "params":{"node":"node1","newid":201,"full":true,"meta":{"note":"x"}}}"#,
        )
        .unwrap();
        assert_eq!(req.params["node"], ParamValue::Str("node1".into()));
        assert_eq!(req.params["newid"], ParamValue::Int(201));
        assert_eq!(req.params["full"], ParamValue::Bool(true));
        match &req.params["meta"] {
            ParamValue::Map(m) => assert_eq!(m["note"], ParamValue::Str("x".into())),
            other => panic!("expected Map, got {:?}", other),
        }
    }

    #[test]
    fn params_reject_arrays() {
        let err = serde_json::from_str::<ActionRequest>(
            r#"{"environment":"home","action":"storage_edit","target":"storage/local",
                "params":{"disks":["a","b"]}}"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn form_value_coercion() {
        assert_eq!(ParamValue::Bool(true).as_form_value().unwrap(), "1");
        assert_eq!(ParamValue::Bool(false).as_form_value().unwrap(), "0");
        assert_eq!(ParamValue::Int(42).as_form_value().unwrap(), "42");
        assert_eq!(ParamValue::Float(1.5).as_form_value().unwrap(), "1.5");
        assert_eq!(
            ParamValue::Str("local-lvm".into()).as_form_value().unwrap(),
            "local-lvm"
        );
        assert!(ParamValue::Map(BTreeMap::new()).as_form_value().is_none());
    }

    #[test]
    fn empty_approved_by_counts_as_absent() {
        let mut req = ActionRequest::new("home", ActionType::DeleteVm, "vm/101");
        assert!(!req.has_approval());
        req.approved_by = Some(String::new());
        assert!(!req.has_approval());
        req.approved_by = Some("ops-user".into());
        assert!(req.has_approval());
    }
}
