//! # pvw-daemon
//!
//! The request front-end: accepts HTTP(S), authenticates the actor with a
//! constant-time bearer check, decodes strictly, dispatches to the action
//! runner, and mediates the idempotency cache. Also owns configuration
//! loading and process bootstrap.
//!
//! The binary entrypoint lives in `main.rs`; everything here is a library
//! so integration tests can drive the router in-process.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::{Config, ConfigError, EnvironmentConfig};
pub use error::ApiError;
pub use routes::router;
pub use state::{AppState, BootstrapError};
