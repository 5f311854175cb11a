// result.rs — The result of executing (or planning) an action.

use serde::{Deserialize, Serialize};

/// How far the action got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// Evaluated only; no cluster API call was made (plan or dry-run).
    Planned,
    /// The cluster API returned a synchronous result.
    Ok,
    /// The cluster API accepted the operation as an asynchronous task;
    /// the message carries the UPID.
    Accepted,
}

/// What the backend (or the dry-run short-circuit) produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub status: ActionStatus,
    /// One-line outcome. For accepted tasks this is the UPID verbatim.
    pub message: String,
    /// Structured payload for read operations (VM status object, filtered
    /// inventory array, task data).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ActionResult {
    pub fn planned(message: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Planned,
            message: message.into(),
            data: None,
        }
    }

    pub fn ok(message: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Self {
            status: ActionStatus::Ok,
            message: message.into(),
            data,
        }
    }

    pub fn accepted(upid: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Accepted,
            message: upid.into(),
            data: None,
        }
    }
}
