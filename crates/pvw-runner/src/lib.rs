//! # pvw-runner
//!
//! The action runner composes the policy engine, a backend adapter, and the
//! audit log into the two lifecycle operations:
//!
//! - `plan` — evaluate only; never touches the backend.
//! - `apply` — re-evaluate, and only if policy allows, execute against the
//!   backend; every denial and every successful apply is audited.
//!
//! The backend is a trait seam so the daemon can wire in the Proxmox
//! adapter while tests substitute a counting mock.

pub mod backend;
pub mod runner;

mod error;

pub use backend::{Backend, BackendError};
pub use error::RunnerError;
pub use runner::{ApplyOutcome, PlanOutcome, Runner};
