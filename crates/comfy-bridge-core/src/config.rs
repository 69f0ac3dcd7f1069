//! Integration settings read from the environment.
//!
//! | Variable               | Meaning                                   |
//! |------------------------|-------------------------------------------|
//! | `COMFY_ENABLED`        | `1`, `true`, `yes`, `on` enable the client |
//! | `COMFY_BASE_URL`       | remote base URL (required when enabled)   |
//! | `COMFY_BEARER_TOKEN`   | sent as `Authorization: Bearer …`          |
//! | `COMFY_API_KEY`        | sent as `X-API-KEY` when no bearer token  |
//! | `COMFY_TIMEOUT_MS`     | per-request timeout (default 15000)       |
//! | `COMFY_WORKFLOWS_FILE` | registry path (default `config/COMFY_WORKFLOWS.json`) |

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_WORKFLOWS_FILE: &str = "config/COMFY_WORKFLOWS.json";

/// Credentials attached to every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    Bearer(String),
    ApiKey(String),
    None,
}

impl Auth {
    pub fn mode(&self) -> &'static str {
        match self {
            Auth::Bearer(_) => "bearer",
            Auth::ApiKey(_) => "api_key",
            Auth::None => "none",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ComfyConfig {
    pub enabled: bool,
    /// Base URL with any trailing `/` removed.
    pub base_url: Option<String>,
    pub auth: Auth,
    pub request_timeout: Duration,
    pub workflows_file: PathBuf,
}

/// What the integration exposes to callers, without secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub enabled: bool,
    pub base_url: Option<String>,
    pub auth_mode: &'static str,
}

impl Default for ComfyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: None,
            auth: Auth::None,
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            workflows_file: PathBuf::from(DEFAULT_WORKFLOWS_FILE),
        }
    }
}

impl ComfyConfig {
    /// Build the configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let auth = if let Some(token) = get("COMFY_BEARER_TOKEN") {
            Auth::Bearer(token)
        } else if let Some(key) = get("COMFY_API_KEY") {
            Auth::ApiKey(key)
        } else {
            Auth::None
        };

        let request_timeout = match get("COMFY_TIMEOUT_MS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => Duration::from_millis(ms),
                _ => {
                    tracing::warn!(
                        "[Config] Ignoring invalid COMFY_TIMEOUT_MS={:?}, using {}ms",
                        raw,
                        DEFAULT_REQUEST_TIMEOUT_MS
                    );
                    Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS)
                }
            },
            None => Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        };

        Self {
            enabled: get("COMFY_ENABLED").map(|v| env_enabled(&v)).unwrap_or(false),
            base_url: get("COMFY_BASE_URL").map(|v| trim_slash(v.trim())),
            auth,
            request_timeout,
            workflows_file: get("COMFY_WORKFLOWS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_WORKFLOWS_FILE)),
        }
    }

    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> Self {
        self.base_url = Some(trim_slash(base_url.as_ref()));
        self
    }

    pub fn with_workflows_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.workflows_file = path.into();
        self
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            enabled: self.enabled,
            base_url: self.base_url.clone(),
            auth_mode: self.auth.mode(),
        }
    }
}

/// Truthy flag parsing shared by all boolean settings.
pub fn env_enabled(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn trim_slash(value: &str) -> String {
    value.strip_suffix('/').unwrap_or(value).to_string()
}
