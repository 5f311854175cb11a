// decision.rs — Policy decisions and risk classes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Risk class of an action. Part of the public contract: changing the
/// mapping from actions to risk levels is an API-breaking change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        };
        f.write_str(s)
    }
}

/// The outcome of a policy evaluation for one request in one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether the operation may proceed in the evaluated phase.
    pub allowed: bool,
    /// Risk class of the action.
    pub risk_level: RiskLevel,
    /// Whether the action needs approval metadata before apply.
    pub requires_approval: bool,
    /// Human-readable explanation of the decision.
    pub reason: String,
}
