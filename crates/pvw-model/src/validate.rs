// validate.rs — Structural and semantic admission of an ActionRequest.
//
// The validator is total over the action vocabulary: every action has a
// target grammar, and the approval metadata rules are joint constraints
// across four fields. Anything the validator rejects surfaces as
// INVALID_ARGUMENT; policy never sees an inadmissible request.

use chrono::DateTime;
use regex::Regex;
use std::sync::LazyLock;

use crate::action::ActionType;
use crate::error::ValidateError;
use crate::request::ActionRequest;

static VM_TARGET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^vm/[0-9]+$").expect("hard-coded regex"));
static STORAGE_TARGET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^storage/[A-Za-z0-9._:-]+$").expect("hard-coded regex"));
static FIREWALL_NODE_TARGET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^firewall/node/[A-Za-z0-9._-]+$").expect("hard-coded regex"));
static FIREWALL_VM_TARGET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^firewall/vm/[0-9]+$").expect("hard-coded regex"));
static APPROVED_BY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._:@/-]{3,128}$").expect("hard-coded regex"));
static APPROVAL_TICKET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._:-]{3,128}$").expect("hard-coded regex"));

/// Admit or reject a decoded request.
///
/// `configured_environments` is the set of cluster names the service knows;
/// the front-end passes it from config. Approval metadata fields that are
/// present but empty are treated as absent.
pub fn validate(req: &ActionRequest, configured_environments: &[String]) -> Result<(), ValidateError> {
    if req.environment.is_empty() {
        return Err(ValidateError::MissingEnvironment);
    }
    if !configured_environments.iter().any(|e| e == &req.environment) {
        return Err(ValidateError::UnknownEnvironment(req.environment.clone()));
    }

    if req.target.is_empty() {
        return Err(ValidateError::MissingTarget);
    }
    if !target_matches(req.action, &req.target) {
        return Err(ValidateError::InvalidTarget {
            action: req.action,
            target: req.target.clone(),
        });
    }

    validate_approval(req)
}

/// The action-specific target grammar.
fn target_matches(action: ActionType, target: &str) -> bool {
    match action {
        ActionType::ReadVm
        | ActionType::StartVm
        | ActionType::StopVm
        | ActionType::SnapshotVm
        | ActionType::CloneVm
        | ActionType::MigrateVm
        | ActionType::DeleteVm => VM_TARGET.is_match(target),
        ActionType::ReadInventory => target == "inventory/all" || target == "inventory/running",
        ActionType::ReadTaskStatus => target == "task/status",
        ActionType::ReadTasks => target == "task/list",
        ActionType::StorageEdit => STORAGE_TARGET.is_match(target),
        ActionType::FirewallEdit => {
            target == "firewall/cluster"
                || FIREWALL_NODE_TARGET.is_match(target)
                || FIREWALL_VM_TARGET.is_match(target)
        }
    }
}

fn validate_approval(req: &ActionRequest) -> Result<(), ValidateError> {
    let approved_by = present(&req.approved_by);
    let ticket = present(&req.approval_ticket);
    let reason = present(&req.reason);
    let expires_at = present(&req.expires_at);

    if let Some(approver) = approved_by {
        if !APPROVED_BY.is_match(approver) {
            return Err(ValidateError::InvalidApprovedBy);
        }
    }
    if let Some(ticket) = ticket {
        if !APPROVAL_TICKET.is_match(ticket) {
            return Err(ValidateError::InvalidApprovalTicket);
        }
    }
    if let Some(reason) = reason {
        if reason.chars().count() < 8 {
            return Err(ValidateError::ReasonTooShort);
        }
    }
    if let Some(expires) = expires_at {
        if DateTime::parse_from_rfc3339(expires).is_err() {
            return Err(ValidateError::InvalidExpiresAt(expires.to_string()));
        }
    }

    // Joint rule: any secondary approval field implies an approver.
    if (ticket.is_some() || reason.is_some() || expires_at.is_some()) && approved_by.is_none() {
        return Err(ValidateError::IncompleteApproval);
    }

    Ok(())
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}
