//! Format detection and resolution to an execution-ready prompt.

use serde_json::Value;

use crate::client::ComfyClient;
use crate::error::ComfyError;
use crate::models::WorkflowFormat;

/// Classify a workflow definition by shape.
///
/// A JSON object carrying both a `nodes` array and a `links` array is an
/// editor graph; anything else is treated as API format.
pub fn detect_format(workflow: &Value) -> WorkflowFormat {
    match workflow.as_object() {
        Some(obj)
            if obj.get("nodes").is_some_and(Value::is_array)
                && obj.get("links").is_some_and(Value::is_array) =>
        {
            WorkflowFormat::Workflow
        }
        _ => WorkflowFormat::Api,
    }
}

/// Produce an API-format prompt, converting through the server when the
/// workflow is an editor graph. No local conversion is attempted.
pub async fn resolve_api_prompt(
    client: &ComfyClient,
    workflow: &Value,
    format: Option<WorkflowFormat>,
) -> Result<Value, ComfyError> {
    match format.unwrap_or_else(|| detect_format(workflow)) {
        WorkflowFormat::Api => Ok(workflow.clone()),
        WorkflowFormat::Workflow => {
            tracing::info!("[Runs] Converting graph workflow via /workflow/convert");
            client
                .convert_workflow(workflow)
                .await?
                .ok_or_else(|| ComfyError::invalid("workflow", "converter returned an empty prompt"))
        }
    }
}
