use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ComfyError, FieldIssue};
use crate::models::workflow::{validate_name, WorkflowFormat};

pub const DEFAULT_RUN_TIMEOUT_MS: u64 = 120_000;
pub const MIN_RUN_TIMEOUT_MS: u64 = 1_000;
pub const MAX_RUN_TIMEOUT_MS: u64 = 600_000;

fn default_wait() -> bool {
    true
}

/// A run request as received from the tool or CLI layer: either a
/// registry name or an inline workflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunWorkflowRequest {
    #[serde(default)]
    pub workflow_name: Option<String>,
    #[serde(default)]
    pub workflow: Option<Value>,
    #[serde(default)]
    pub format: Option<WorkflowFormat>,
    #[serde(default)]
    pub inputs: Option<Map<String, Value>>,
    #[serde(default = "default_wait")]
    pub wait: bool,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub prompt_id: Option<String>,
    #[serde(default)]
    pub extra_data: Option<Map<String, Value>>,
}

impl RunWorkflowRequest {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            workflow_name: Some(name.into()),
            wait: true,
            ..Self::default()
        }
    }

    pub fn inline(workflow: Value) -> Self {
        Self {
            workflow: Some(workflow),
            wait: true,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ComfyError> {
        let mut issues = Vec::new();

        if let Some(ref name) = self.workflow_name {
            if let Some(issue) = validate_name(name) {
                issues.push(FieldIssue::new("workflow_name", issue.message));
            }
        }
        if let Some(ref workflow) = self.workflow {
            if !workflow.is_object() {
                issues.push(FieldIssue::new("workflow", "must be a JSON object"));
            }
        }
        if self.workflow_name.is_none() && self.workflow.is_none() {
            issues.push(FieldIssue::new(
                "workflow_name",
                "workflow_name or workflow is required",
            ));
        }
        if let Some(ms) = self.timeout_ms {
            if ms < MIN_RUN_TIMEOUT_MS {
                issues.push(FieldIssue::new(
                    "timeout_ms",
                    format!("must be at least {}", MIN_RUN_TIMEOUT_MS),
                ));
            } else if ms > MAX_RUN_TIMEOUT_MS {
                issues.push(FieldIssue::new(
                    "timeout_ms",
                    format!("must be at most {}", MAX_RUN_TIMEOUT_MS),
                ));
            }
        }
        if let Some(ref id) = self.prompt_id {
            if id.trim().is_empty() {
                issues.push(FieldIssue::new("prompt_id", "must not be empty"));
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ComfyError::InvalidRequest(issues))
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(DEFAULT_RUN_TIMEOUT_MS))
    }
}
