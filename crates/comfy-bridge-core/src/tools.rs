//! ComfyTools - agent-facing tools over [`ComfyService`].
//!
//! Provides:
//!   1. comfy_list_workflows  - List registered workflows
//!   2. comfy_run_workflow    - Run a registered workflow by name
//!   3. comfy_get_run_status  - Check a run by id
//!
//! No tools are offered while the integration is disabled.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::error::ComfyError;
use crate::models::run::RunWorkflowRequest;
use crate::service::ComfyService;

pub const LIST_WORKFLOWS: &str = "comfy_list_workflows";
pub const RUN_WORKFLOW: &str = "comfy_run_workflow";
pub const GET_RUN_STATUS: &str = "comfy_get_run_status";

const MIN_TIMEOUT_SECONDS: u64 = 5;
const MAX_TIMEOUT_SECONDS: u64 = 600;

/// Result of a tool operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ToolResult {
    pub fn success(data: impl Serialize) -> Self {
        Self {
            success: true,
            data: Some(serde_json::to_value(data).unwrap_or_default()),
            error: None,
            code: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
            code: None,
        }
    }
}

impl From<ComfyError> for ToolResult {
    fn from(err: ComfyError) -> Self {
        Self {
            success: false,
            data: err.details(),
            error: Some(err.to_string()),
            code: Some(err.code().to_string()),
        }
    }
}

/// Name, description, and JSON-Schema parameters of one tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ListWorkflowsArgs {}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RunWorkflowArgs {
    /// Workflow name from comfy_list_workflows.
    pub workflow_name: String,
    /// Optional input overrides. Supports node-id maps and dot-paths like "6.inputs.text".
    #[serde(default)]
    pub inputs: Option<Map<String, Value>>,
    /// Wait for completion before returning. Defaults to true.
    #[serde(default)]
    pub wait: Option<bool>,
    /// Maximum seconds to wait when wait=true (5-600).
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetRunStatusArgs {
    /// Run ID (Comfy prompt_id).
    pub run_id: String,
}

pub struct ComfyTools {
    service: Arc<ComfyService>,
}

impl ComfyTools {
    pub fn new(service: Arc<ComfyService>) -> Self {
        Self { service }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        if !self.service.is_enabled() {
            return Vec::new();
        }

        vec![
            ToolDefinition {
                name: LIST_WORKFLOWS,
                description: "List configured ComfyUI workflows from the workflow registry. Use this before running Comfy generations.",
                parameters: schema_value(schemars::schema_for!(ListWorkflowsArgs)),
            },
            ToolDefinition {
                name: RUN_WORKFLOW,
                description: "Run a configured ComfyUI workflow by name. Supports optional input overrides and synchronous waiting for completion.",
                parameters: schema_value(schemars::schema_for!(RunWorkflowArgs)),
            },
            ToolDefinition {
                name: GET_RUN_STATUS,
                description: "Check the status of a ComfyUI run by run_id/prompt_id. Returns pending, in_progress, completed, or failed with artifacts when available.",
                parameters: schema_value(schemars::schema_for!(GetRunStatusArgs)),
            },
        ]
    }

    /// Dispatch a tool call by name with raw JSON arguments.
    pub async fn call(&self, name: &str, args: Value, cancel: &CancellationToken) -> ToolResult {
        let args = if args.is_null() { Value::Object(Map::new()) } else { args };
        match name {
            LIST_WORKFLOWS => self.list_workflows().await,
            RUN_WORKFLOW => match serde_json::from_value::<RunWorkflowArgs>(args) {
                Ok(a) => self.run_workflow(a, cancel).await,
                Err(e) => ToolResult::from(ComfyError::invalid("", e.to_string())),
            },
            GET_RUN_STATUS => match serde_json::from_value::<GetRunStatusArgs>(args) {
                Ok(a) => self.get_run_status(a).await,
                Err(e) => ToolResult::from(ComfyError::invalid("", e.to_string())),
            },
            other => ToolResult::error(format!("Unknown tool: {}", other)),
        }
    }

    pub async fn list_workflows(&self) -> ToolResult {
        match self.service.list_workflows(false).await {
            Ok(workflows) => ToolResult::success(serde_json::json!({
                "count": workflows.len(),
                "workflows": workflows,
            })),
            Err(e) => e.into(),
        }
    }

    pub async fn run_workflow(&self, args: RunWorkflowArgs, cancel: &CancellationToken) -> ToolResult {
        let timeout_ms = match args.timeout_seconds {
            Some(s) if !(MIN_TIMEOUT_SECONDS..=MAX_TIMEOUT_SECONDS).contains(&s) => {
                return ComfyError::invalid(
                    "timeout_seconds",
                    format!(
                        "must be between {} and {}",
                        MIN_TIMEOUT_SECONDS, MAX_TIMEOUT_SECONDS
                    ),
                )
                .into();
            }
            Some(s) => Some(s * 1000),
            None => None,
        };

        let request = RunWorkflowRequest {
            inputs: args.inputs,
            wait: args.wait.unwrap_or(true),
            timeout_ms,
            ..RunWorkflowRequest::named(args.workflow_name)
        };

        match self.service.run_workflow(request, cancel).await {
            Ok(outcome) => ToolResult::success(outcome),
            Err(e) => e.into(),
        }
    }

    pub async fn get_run_status(&self, args: GetRunStatusArgs) -> ToolResult {
        match self.service.get_run_status(&args.run_id).await {
            Ok(report) => ToolResult::success(report),
            Err(e) => e.into(),
        }
    }
}

fn schema_value(schema: schemars::Schema) -> Value {
    serde_json::to_value(schema).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ComfyConfig;

    fn tools(enabled: bool, dir: &std::path::Path) -> ComfyTools {
        let mut config = ComfyConfig::default()
            .with_base_url("http://127.0.0.1:9")
            .with_workflows_file(dir.join("w.json"));
        config.enabled = enabled;
        ComfyTools::new(Arc::new(ComfyService::new(config)))
    }

    #[test]
    fn test_definitions_follow_enabled_flag() {
        let dir = tempfile::tempdir().unwrap();
        assert!(tools(false, dir.path()).definitions().is_empty());

        let defs = tools(true, dir.path()).definitions();
        let names: Vec<_> = defs.iter().map(|d| d.name).collect();
        assert_eq!(names, vec![LIST_WORKFLOWS, RUN_WORKFLOW, GET_RUN_STATUS]);
        assert!(defs[1].parameters["properties"]["workflow_name"].is_object());
        assert!(defs[2].parameters["properties"]["run_id"].is_object());
    }

    #[tokio::test]
    async fn test_disabled_tool_call_reports_code() {
        let dir = tempfile::tempdir().unwrap();
        let result = tools(false, dir.path())
            .call(LIST_WORKFLOWS, Value::Null, &CancellationToken::new())
            .await;
        assert!(!result.success);
        assert_eq!(result.code.as_deref(), Some("COMFY_DISABLED"));
    }

    #[tokio::test]
    async fn test_run_tool_rejects_out_of_range_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let result = tools(true, dir.path())
            .call(
                RUN_WORKFLOW,
                serde_json::json!({ "workflow_name": "x", "timeout_seconds": 2 }),
                &CancellationToken::new(),
            )
            .await;
        assert!(!result.success);
        assert_eq!(result.code.as_deref(), Some("COMFY_INVALID_REQUEST"));
    }

    #[tokio::test]
    async fn test_list_tool_returns_count() {
        let dir = tempfile::tempdir().unwrap();
        let result = tools(true, dir.path()).list_workflows().await;
        assert!(result.success);
        let data = result.data.unwrap();
        assert_eq!(data["count"], 0);
        assert!(data["workflows"].as_array().unwrap().is_empty());
    }
}
