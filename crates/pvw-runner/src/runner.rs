// runner.rs — Plan and Apply composition.
//
// The invariant this file owns: a successful apply implies the validator
// admitted the request (the caller's responsibility, upstream), policy
// returned allowed for the apply phase, and the backend returned without
// error — and exactly one audit record was written for whichever way the
// operation went (plan, apply_denied, apply). Backend failures write no
// success record.

use serde::Serialize;
use std::sync::Arc;

use pvw_audit::{AuditEvent, AuditKind, AuditLog};
use pvw_model::{ActionRequest, ActionResult, Decision};
use pvw_policy::{Phase, PolicyEngine};

use crate::backend::Backend;
use crate::error::RunnerError;

/// What a plan evaluation returns to the client.
#[derive(Debug, Clone, Serialize)]
pub struct PlanOutcome {
    pub request: ActionRequest,
    pub decision: Decision,
}

/// What a successful apply returns to the client.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyOutcome {
    pub request: ActionRequest,
    pub decision: Decision,
    pub result: ActionResult,
}

/// Composes policy, backend, and audit.
pub struct Runner {
    policy: PolicyEngine,
    backend: Arc<dyn Backend>,
    audit: Arc<AuditLog>,
}

impl Runner {
    pub fn new(policy: PolicyEngine, backend: Arc<dyn Backend>, audit: Arc<AuditLog>) -> Self {
        Self {
            policy,
            backend,
            audit,
        }
    }

    /// Evaluate a request without executing it. Never calls the backend.
    pub fn plan(&self, req: &ActionRequest) -> Result<PlanOutcome, RunnerError> {
        let decision = self.policy.evaluate(req, Phase::Plan);

        let mut event = AuditEvent::new(AuditKind::Plan, req, &decision);
        self.audit.append(&mut event)?;

        tracing::info!(
            action = %req.action,
            target = %req.target,
            environment = %req.environment,
            risk = %decision.risk_level,
            "plan evaluated"
        );

        Ok(PlanOutcome {
            request: req.clone(),
            decision,
        })
    }

    /// Re-evaluate and, if allowed, execute against the backend.
    pub async fn apply(&self, req: &ActionRequest) -> Result<ApplyOutcome, RunnerError> {
        let decision = self.policy.evaluate(req, Phase::Apply);

        if !decision.allowed {
            let mut event = AuditEvent::new(AuditKind::ApplyDenied, req, &decision);
            self.audit.append(&mut event)?;
            return Err(RunnerError::PolicyDenied(decision.reason));
        }

        // Backend errors propagate verbatim; no audit record claims success.
        let result = self.backend.execute(req).await?;

        let mut event =
            AuditEvent::new(AuditKind::Apply, req, &decision).with_result(result.clone());
        self.audit.append(&mut event)?;

        tracing::info!(
            action = %req.action,
            target = %req.target,
            environment = %req.environment,
            status = ?result.status,
            dry_run = req.dry_run,
            "apply executed"
        );

        Ok(ApplyOutcome {
            request: req.clone(),
            decision,
            result,
        })
    }
}
