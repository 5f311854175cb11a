// engine.rs — Policy evaluation engine.
//
// Evaluation is a pure function of the request and the phase:
//
// 1. Plan phase — always allowed (given a non-empty environment and target);
//    the decision reports the risk class and whether apply will need
//    approval. Plan never blocks: its job is to tell the caller what apply
//    will demand.
// 2. Apply phase — denied with "approval required before apply" when the
//    action requires approval and no approver is attached; allowed
//    otherwise.
//
// The engine treats approval metadata as opaque beyond presence. The
// validator has already enforced the field patterns, so re-checking them
// here would only create two sources of truth.

use pvw_model::{ActionRequest, ActionType, Decision, RiskLevel};

/// Which half of the plan/apply lifecycle is being evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Plan,
    Apply,
}

/// The policy engine. Stateless; construction exists so callers hold a
/// value they could later swap for a configurable engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyEngine;

impl PolicyEngine {
    pub fn new() -> Self {
        Self
    }

    /// The risk class and approval requirement for an action.
    ///
    /// Exhaustive over the vocabulary: adding an action without classifying
    /// it is a compile error.
    pub fn risk_profile(action: ActionType) -> (RiskLevel, bool) {
        match action {
            ActionType::ReadVm
            | ActionType::ReadInventory
            | ActionType::ReadTaskStatus
            | ActionType::ReadTasks => (RiskLevel::Low, false),
            ActionType::StartVm | ActionType::SnapshotVm | ActionType::CloneVm => {
                (RiskLevel::Medium, false)
            }
            ActionType::StopVm => (RiskLevel::Medium, true),
            ActionType::MigrateVm
            | ActionType::DeleteVm
            | ActionType::StorageEdit
            | ActionType::FirewallEdit => (RiskLevel::High, true),
        }
    }

    /// Evaluate a request for the given phase.
    pub fn evaluate(&self, req: &ActionRequest, phase: Phase) -> Decision {
        let (risk_level, requires_approval) = Self::risk_profile(req.action);

        if req.environment.is_empty() || req.target.is_empty() {
            return Decision {
                allowed: false,
                risk_level,
                requires_approval,
                reason: "environment and target are required".to_string(),
            };
        }

        match phase {
            Phase::Plan => Decision {
                allowed: true,
                risk_level,
                requires_approval,
                reason: if requires_approval {
                    format!("{} risk; approval required before apply", risk_level)
                } else {
                    format!("{} risk; no approval required", risk_level)
                },
            },
            Phase::Apply => {
                if requires_approval && !req.has_approval() {
                    tracing::warn!(
                        action = %req.action,
                        target = %req.target,
                        "apply denied: approval required"
                    );
                    Decision {
                        allowed: false,
                        risk_level,
                        requires_approval,
                        reason: "approval required before apply".to_string(),
                    }
                } else {
                    Decision {
                        allowed: true,
                        risk_level,
                        requires_approval,
                        reason: if requires_approval {
                            format!(
                                "approved by {}",
                                req.approved_by.as_deref().unwrap_or_default()
                            )
                        } else {
                            format!("{} risk; no approval required", risk_level)
                        },
                    }
                }
            }
        }
    }
}
