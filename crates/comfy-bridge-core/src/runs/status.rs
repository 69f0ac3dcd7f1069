//! Normalized run status and artifacts.
//!
//! Provider vocabulary folds into four states:
//!
//! | Remote string                 | RunStatus    |
//! |-------------------------------|--------------|
//! | completed, success            | completed    |
//! | failed, error, cancelled      | failed       |
//! | in_progress, running          | in_progress  |
//! | anything else                 | pending      |

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::ComfyClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl RunStatus {
    /// `completed` and `failed` end polling.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::InProgress => "in_progress",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

/// Which status source produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusSource {
    JobsApi,
    History,
    Queue,
    Unknown,
}

/// Fold a remote status string into [`RunStatus`]. Unrecognized or missing
/// strings map to `Pending`; this never fails.
pub fn normalize_state(status: Option<&str>) -> RunStatus {
    match status.unwrap_or("").to_lowercase().as_str() {
        "completed" | "success" => RunStatus::Completed,
        // Cancellation is reported as failure.
        "failed" | "error" | "cancelled" => RunStatus::Failed,
        "in_progress" | "running" => RunStatus::InProgress,
        _ => RunStatus::Pending,
    }
}

/// A retrievable output file produced by one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub filename: String,
    pub subfolder: String,
    /// Engine output bucket, e.g. `output` or `temp`.
    #[serde(rename = "type")]
    pub kind: String,
    pub media_type: String,
    pub format: Option<String>,
    pub node_id: String,
    pub view_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub run_id: String,
    pub status: RunStatus,
    pub source: StatusSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_start_time: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_end_time: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    pub outputs_count: u64,
    pub artifacts: Vec<Artifact>,
    /// Set only by the polling loop.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timed_out: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl StatusReport {
    /// A report with no positive evidence beyond its source.
    pub fn bare(run_id: &str, status: RunStatus, source: StatusSource) -> Self {
        Self {
            run_id: run_id.to_string(),
            status,
            source,
            created_at: None,
            execution_start_time: None,
            execution_end_time: None,
            error: None,
            outputs_count: 0,
            artifacts: Vec::new(),
            timed_out: None,
            timeout_ms: None,
        }
    }

    /// Build from a `/api/jobs/{id}` payload.
    pub fn from_jobs_api(job: &Value, run_id: &str, client: &ComfyClient) -> Self {
        let artifacts = collect_artifacts(job.get("outputs"), client);
        let outputs_count = job
            .get("outputs_count")
            .and_then(Value::as_u64)
            .unwrap_or(artifacts.len() as u64);

        Self {
            status: normalize_state(job.get("status").and_then(Value::as_str)),
            created_at: present(job.get("create_time")),
            execution_start_time: present(job.get("execution_start_time")),
            execution_end_time: present(job.get("execution_end_time")),
            error: present(job.get("execution_error")),
            outputs_count,
            artifacts,
            ..Self::bare(run_id, RunStatus::Pending, StatusSource::JobsApi)
        }
    }

    /// Build from one `/history/{id}` record.
    pub fn from_history(item: &Value, run_id: &str, client: &ComfyClient) -> Self {
        let status_str = item
            .pointer("/status/status_str")
            .and_then(Value::as_str)
            .unwrap_or("");
        let artifacts = collect_artifacts(item.get("outputs"), client);

        // The prompt tuple is [number, id, prompt, extra_data, outputs]; the
        // creation time lives in extra_data.
        let created_at = present(item.pointer("/prompt/3/create_time"));
        let error = if status_str == "error" {
            present(item.get("status"))
        } else {
            None
        };

        Self {
            status: normalize_state(Some(status_str)),
            created_at,
            error,
            outputs_count: artifacts.len() as u64,
            artifacts,
            ..Self::bare(run_id, RunStatus::Pending, StatusSource::History)
        }
    }
}

/// Flatten a per-node output map into artifacts. Items without a filename
/// and the `animated` bucket are skipped.
pub fn collect_artifacts(outputs: Option<&Value>, client: &ComfyClient) -> Vec<Artifact> {
    let mut artifacts = Vec::new();
    let Some(outputs) = outputs.and_then(Value::as_object) else {
        return artifacts;
    };

    for (node_id, node_outputs) in outputs {
        let Some(node_outputs) = node_outputs.as_object() else {
            continue;
        };

        for (media_type, items) in node_outputs {
            if media_type == "animated" {
                continue;
            }
            let Some(items) = items.as_array() else {
                continue;
            };

            for item in items {
                let Some(filename) = item
                    .get("filename")
                    .and_then(Value::as_str)
                    .filter(|f| !f.is_empty())
                else {
                    continue;
                };

                let subfolder = non_empty_str(item.get("subfolder")).unwrap_or("");
                let kind = non_empty_str(item.get("type")).unwrap_or("output");
                let media = non_empty_str(item.get("mediaType")).unwrap_or(media_type.as_str());

                artifacts.push(Artifact {
                    filename: filename.to_string(),
                    subfolder: subfolder.to_string(),
                    kind: kind.to_string(),
                    media_type: media.to_string(),
                    format: non_empty_str(item.get("format")).map(str::to_string),
                    node_id: node_id.clone(),
                    view_url: client.build_view_url(filename, subfolder, kind),
                });
            }
        }
    }

    artifacts
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn present(value: Option<&Value>) -> Option<Value> {
    value.filter(|v| !v.is_null()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ComfyConfig;
    use serde_json::json;

    fn client() -> ComfyClient {
        ComfyClient::new(&ComfyConfig::default().with_base_url("http://comfy.test")).unwrap()
    }

    #[test]
    fn test_normalize_state() {
        assert_eq!(normalize_state(Some("Success")), RunStatus::Completed);
        assert_eq!(normalize_state(Some("completed")), RunStatus::Completed);
        assert_eq!(normalize_state(Some("ERROR")), RunStatus::Failed);
        assert_eq!(normalize_state(Some("cancelled")), RunStatus::Failed);
        assert_eq!(normalize_state(Some("Running")), RunStatus::InProgress);
        assert_eq!(normalize_state(Some("in_progress")), RunStatus::InProgress);
        assert_eq!(normalize_state(Some("queued")), RunStatus::Pending);
        assert_eq!(normalize_state(Some("banana")), RunStatus::Pending);
        assert_eq!(normalize_state(None), RunStatus::Pending);
    }

    #[test]
    fn test_artifacts_without_filename_are_dropped() {
        let outputs = json!({
            "9": {
                "images": [
                    { "subfolder": "x" },
                    { "filename": "a.png", "subfolder": "x", "type": "output" }
                ]
            }
        });
        let artifacts = collect_artifacts(Some(&outputs), &client());
        assert_eq!(artifacts.len(), 1);
        let a = &artifacts[0];
        assert_eq!(a.filename, "a.png");
        assert_eq!(a.node_id, "9");
        assert_eq!(a.media_type, "images");
        assert_eq!(
            a.view_url,
            "http://comfy.test/view?filename=a.png&subfolder=x&type=output"
        );
    }

    #[test]
    fn test_animated_bucket_and_defaults() {
        let outputs = json!({
            "12": {
                "animated": [true],
                "gifs": [{ "filename": "clip.webp", "format": "image/webp" }],
                "text": "not a list"
            },
            "13": "not an object"
        });
        let artifacts = collect_artifacts(Some(&outputs), &client());
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].subfolder, "");
        assert_eq!(artifacts[0].kind, "output");
        assert_eq!(artifacts[0].format.as_deref(), Some("image/webp"));
        assert!(collect_artifacts(None, &client()).is_empty());
    }

    #[test]
    fn test_history_report_reads_create_time_and_error() {
        let item = json!({
            "prompt": [1, "abc", {}, { "create_time": 1700000000000u64 }, ["9"]],
            "status": { "status_str": "error", "completed": false, "messages": [] },
            "outputs": {}
        });
        let report = StatusReport::from_history(&item, "abc", &client());
        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.source, StatusSource::History);
        assert_eq!(report.created_at, Some(json!(1700000000000u64)));
        assert_eq!(report.error.as_ref().unwrap()["status_str"], "error");
    }

    #[test]
    fn test_jobs_report_uses_outputs_count_when_given() {
        let job = json!({
            "status": "in_progress",
            "create_time": 5,
            "execution_start_time": 6,
            "outputs_count": 3,
            "outputs": {}
        });
        let report = StatusReport::from_jobs_api(&job, "abc", &client());
        assert_eq!(report.status, RunStatus::InProgress);
        assert_eq!(report.outputs_count, 3);
        assert_eq!(report.execution_end_time, None);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["source"], "jobs_api");
        assert!(json.get("timed_out").is_none());
    }
}
