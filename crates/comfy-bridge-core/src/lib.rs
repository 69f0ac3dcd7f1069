//! comfy-bridge core - remote generative-workflow client and run tracking.
//!
//! This crate submits workflows to a ComfyUI-compatible service, follows
//! their progress across the jobs API, history, and queue endpoints, and
//! reports one normalized status with a flat artifact list. Named workflows
//! live in a JSON registry file so callers can run them with stored defaults.
//!
//! It has no CLI or HTTP-server dependency, making it suitable for use in:
//!
//! - the `comfy-bridge` CLI
//! - agent tool layers (via [`tools::ComfyTools`])
//! - any tokio application embedding the client directly

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod runs;
pub mod service;
pub mod store;
pub mod tools;
pub mod workflow;

// Convenience re-exports
pub use client::ComfyClient;
pub use config::ComfyConfig;
pub use error::ComfyError;
pub use service::ComfyService;
