use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ComfyError, FieldIssue};

pub const MAX_NAME_LEN: usize = 120;
pub const MAX_DESCRIPTION_LEN: usize = 2000;

/// Shape of a workflow definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowFormat {
    /// Execution-ready mapping of node id → `{class_type, inputs}`.
    Api,
    /// Editor graph with `nodes` and `links` arrays.
    #[serde(alias = "graph")]
    Workflow,
}

impl WorkflowFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowFormat::Api => "api",
            WorkflowFormat::Workflow => "workflow",
        }
    }
}

impl std::str::FromStr for WorkflowFormat {
    type Err = ComfyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "api" => Ok(WorkflowFormat::Api),
            "workflow" | "graph" => Ok(WorkflowFormat::Workflow),
            other => Err(ComfyError::invalid(
                "format",
                format!("expected 'api' or 'workflow', got '{}'", other),
            )),
        }
    }
}

/// A named workflow stored in the registry file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEntry {
    pub name: String,
    pub format: WorkflowFormat,
    pub workflow: Value,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub defaults: Map<String, Value>,
    /// Absent only for entries written by hand into the registry file.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Registry listing without the (potentially large) workflow body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub name: String,
    pub format: WorkflowFormat,
    pub description: String,
    pub defaults: Map<String, Value>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&WorkflowEntry> for WorkflowSummary {
    fn from(entry: &WorkflowEntry) -> Self {
        Self {
            name: entry.name.clone(),
            format: entry.format,
            description: entry.description.clone(),
            defaults: entry.defaults.clone(),
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        }
    }
}

/// Input for creating or replacing a registry entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertWorkflowInput {
    pub name: String,
    pub workflow: Value,
    #[serde(default)]
    pub format: Option<WorkflowFormat>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub defaults: Option<Map<String, Value>>,
}

impl UpsertWorkflowInput {
    pub fn new(name: impl Into<String>, workflow: Value) -> Self {
        Self {
            name: name.into(),
            workflow,
            format: None,
            description: None,
            defaults: None,
        }
    }

    pub fn validate(&self) -> Result<(), ComfyError> {
        let mut issues = Vec::new();
        if let Some(issue) = validate_name(&self.name) {
            issues.push(issue);
        }
        if !self.workflow.is_object() {
            issues.push(FieldIssue::new("workflow", "must be a JSON object"));
        }
        if let Some(ref d) = self.description {
            if d.chars().count() > MAX_DESCRIPTION_LEN {
                issues.push(FieldIssue::new(
                    "description",
                    format!("must be at most {} characters", MAX_DESCRIPTION_LEN),
                ));
            }
        }
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ComfyError::InvalidRequest(issues))
        }
    }
}

/// Outcome of a registry delete.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteOutcome {
    pub deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow: Option<WorkflowEntry>,
}

pub(crate) fn validate_name(name: &str) -> Option<FieldIssue> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        Some(FieldIssue::new("name", "must not be empty"))
    } else if trimmed.chars().count() > MAX_NAME_LEN {
        Some(FieldIssue::new(
            "name",
            format!("must be at most {} characters", MAX_NAME_LEN),
        ))
    } else {
        None
    }
}
