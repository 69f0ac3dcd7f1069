//! Core error type for comfy-bridge.
//!
//! `ComfyError` is returned by the transport client, the workflow registry,
//! and the run orchestrator. Each variant carries a stable machine code and an
//! HTTP-like status so that tool and CLI layers can present it to users
//! without inspecting the variant.

use serde::Serialize;

/// A single validation failure on a request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub path: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ComfyError {
    /// Integration disabled or required settings missing.
    #[error("{message}")]
    Configuration { code: &'static str, message: String },

    #[error("ComfyUI request failed: 401")]
    Unauthorized { details: Option<serde_json::Value> },

    #[error("ComfyUI request failed: {status}")]
    Http {
        status: u16,
        details: Option<serde_json::Value>,
    },

    #[error("ComfyUI request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("{0}")]
    Network(String),

    #[error(
        "Workflow conversion endpoint is unavailable. Install a converter endpoint or use File -> Export (API)."
    )]
    ConverterUnavailable,

    #[error("ComfyUI did not return prompt_id for queued run")]
    NoCorrelationId,

    #[error("Workflow \"{0}\" not found")]
    WorkflowNotFound(String),

    #[error("Invalid request: {}", format_issues(.0))]
    InvalidRequest(Vec<FieldIssue>),

    #[error("Workflow registry error at {path}: {message}")]
    Registry { path: String, message: String },

    #[error("Run {run_id} was cancelled while waiting for completion")]
    Cancelled { run_id: String },
}

fn format_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(|i| {
            if i.path.is_empty() {
                i.message.clone()
            } else {
                format!("{}: {}", i.path, i.message)
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

impl ComfyError {
    pub fn disabled() -> Self {
        ComfyError::Configuration {
            code: "COMFY_DISABLED",
            message: "ComfyUI integration is disabled (set COMFY_ENABLED=true)".to_string(),
        }
    }

    pub fn base_url_required() -> Self {
        ComfyError::Configuration {
            code: "COMFY_BASE_URL_REQUIRED",
            message: "COMFY_BASE_URL is required when ComfyUI integration is enabled".to_string(),
        }
    }

    pub fn invalid(path: impl Into<String>, message: impl Into<String>) -> Self {
        ComfyError::InvalidRequest(vec![FieldIssue::new(path, message)])
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ComfyError::Configuration { code, .. } => *code,
            ComfyError::Unauthorized { .. } => "COMFY_UNAUTHORIZED",
            ComfyError::Http { .. } => "COMFY_HTTP_ERROR",
            ComfyError::Timeout { .. } => "COMFY_TIMEOUT",
            ComfyError::Network(_) => "COMFY_NETWORK_ERROR",
            ComfyError::ConverterUnavailable => "CONVERTER_NOT_AVAILABLE",
            ComfyError::NoCorrelationId => "COMFY_NO_PROMPT_ID",
            ComfyError::WorkflowNotFound(_) => "COMFY_WORKFLOW_NOT_FOUND",
            ComfyError::InvalidRequest(_) => "COMFY_INVALID_REQUEST",
            ComfyError::Registry { .. } => "COMFY_REGISTRY_ERROR",
            ComfyError::Cancelled { .. } => "COMFY_RUN_CANCELLED",
        }
    }

    /// HTTP-like status for presenting the error. `None` when the failure
    /// never reached or came from the remote service.
    pub fn status(&self) -> Option<u16> {
        match self {
            ComfyError::Configuration { code, .. } if *code == "COMFY_DISABLED" => Some(404),
            ComfyError::Configuration { .. } => None,
            ComfyError::Unauthorized { .. } => Some(401),
            ComfyError::Http { status, .. } => Some(*status),
            ComfyError::ConverterUnavailable => Some(404),
            ComfyError::WorkflowNotFound(_) => Some(404),
            ComfyError::InvalidRequest(_) => Some(400),
            _ => None,
        }
    }

    /// Parsed response body (or validation issues) attached to the error.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            ComfyError::Unauthorized { details } | ComfyError::Http { details, .. } => {
                details.clone()
            }
            ComfyError::InvalidRequest(issues) => serde_json::to_value(issues).ok(),
            _ => None,
        }
    }

    /// Serializable view used by the tool and CLI layers.
    pub fn to_json(&self) -> serde_json::Value {
        let mut body = serde_json::json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        if let Some(status) = self.status() {
            body["status"] = serde_json::Value::from(status);
        }
        if let Some(details) = self.details() {
            body["details"] = details;
        }
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_status() {
        let err = ComfyError::disabled();
        assert_eq!(err.code(), "COMFY_DISABLED");
        assert_eq!(err.status(), Some(404));

        let err = ComfyError::base_url_required();
        assert_eq!(err.code(), "COMFY_BASE_URL_REQUIRED");
        assert_eq!(err.status(), None);

        let err = ComfyError::Unauthorized { details: None };
        assert_eq!(err.code(), "COMFY_UNAUTHORIZED");
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.to_string(), "ComfyUI request failed: 401");
    }

    #[test]
    fn test_invalid_request_message_lists_issues() {
        let err = ComfyError::InvalidRequest(vec![
            FieldIssue::new("name", "must not be empty"),
            FieldIssue::new("timeout_ms", "must be at least 1000"),
        ]);
        assert_eq!(
            err.to_string(),
            "Invalid request: name: must not be empty; timeout_ms: must be at least 1000"
        );
        let json = err.to_json();
        assert_eq!(json["code"], "COMFY_INVALID_REQUEST");
        assert_eq!(json["details"][0]["path"], "name");
    }
}
