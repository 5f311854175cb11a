//! # pvw-model
//!
//! The canonical model for PVE Warden: the closed action vocabulary, the
//! `ActionRequest` unit of work, policy decisions, action results, the
//! request validator, and the canonical request hasher.
//!
//! Every other layer of the system speaks in these types. The validator and
//! hasher live here because they are defined purely over the model: admission
//! rules over an `ActionRequest`, and a deterministic fingerprint of one.

pub mod action;
pub mod canonical;
pub mod decision;
pub mod request;
pub mod result;
pub mod validate;

mod error;

pub use action::ActionType;
pub use canonical::{canonical_json, request_hash};
pub use decision::{Decision, RiskLevel};
pub use error::ValidateError;
pub use request::{ActionRequest, ParamValue};
pub use result::{ActionResult, ActionStatus};
pub use validate::validate;
