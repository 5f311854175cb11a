//! # pvw-policy
//!
//! Stateless policy evaluation: maps `(action, approval metadata, phase)` to
//! an allow/deny decision with a risk class.
//!
//! The risk map is part of the public contract — changing which actions are
//! high risk or require approval is an API-breaking change under the
//! project's versioning policy.

pub mod engine;

pub use engine::{Phase, PolicyEngine};
