//! # pvw-proxmox
//!
//! Translates admitted `ActionRequest`s into concrete Proxmox VE API calls:
//! endpoint routing, URL-form encoding with Proxmox's type conventions,
//! token authentication, the JSON `{data: …}` envelope, and a retry policy
//! that is bounded and GET-only — this layer never invents at-least-once
//! semantics for mutations.
//!
//! TLS verification is always on. There is no configuration surface to
//! disable it; attempting to build a client with verification off is an
//! error, not an option.

pub mod adapter;
pub mod client;
pub mod route;

pub use adapter::{EnvironmentHandle, ProxmoxBackend};
pub use client::{build_client, ClientError, ClientOptions};
pub use route::{translate, PveCall};
