//! Status reconciliation across the three remote sources.
//!
//! Sources are tried in priority order and the first one with data wins:
//!   1. jobs API (only when the one-time probe found it)
//!   2. history record keyed by run id
//!   3. queue snapshot (running, then pending)
//!
//! With no evidence anywhere the report is `pending` from `unknown`, which
//! callers should read as inconclusive.

use serde_json::Value;

use crate::client::ComfyClient;
use crate::error::ComfyError;
use crate::runs::status::{RunStatus, StatusReport, StatusSource};

pub async fn resolve_status(client: &ComfyClient, run_id: &str) -> Result<StatusReport, ComfyError> {
    if let Some(job) = client.get_job(run_id).await? {
        return Ok(StatusReport::from_jobs_api(&job, run_id, client));
    }

    if let Some(item) = client
        .get_history(run_id)
        .await?
        .as_ref()
        .and_then(|history| history.get(run_id))
        .filter(|item| !item.is_null())
    {
        return Ok(StatusReport::from_history(item, run_id, client));
    }

    if let Some(queue) = client.get_queue().await? {
        if queue_contains(&queue, "queue_running", run_id) {
            return Ok(StatusReport::bare(run_id, RunStatus::InProgress, StatusSource::Queue));
        }
        if queue_contains(&queue, "queue_pending", run_id) {
            return Ok(StatusReport::bare(run_id, RunStatus::Pending, StatusSource::Queue));
        }
    }

    tracing::debug!("[Runs] No source knows run {}; reporting pending", run_id);
    Ok(StatusReport::bare(run_id, RunStatus::Pending, StatusSource::Unknown))
}

/// Queue lists hold `[number, prompt_id, ...]` tuples.
fn queue_contains(queue: &Value, list: &str, run_id: &str) -> bool {
    queue
        .get(list)
        .and_then(Value::as_array)
        .is_some_and(|items| {
            items
                .iter()
                .any(|item| item.get(1).and_then(Value::as_str) == Some(run_id))
        })
}
