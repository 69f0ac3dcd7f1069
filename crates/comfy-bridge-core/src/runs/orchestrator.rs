//! Run Orchestrator - submit a prepared prompt and optionally poll it to a
//! terminal state.
//!
//! ```text
//! submitted ──(wait = false)──► Queued(RunHandle)
//!     │
//!     └──(wait = true)──► polling ──► completed | failed | timed_out
//! ```
//!
//! Polling uses a fixed interval, not backoff. A deadline that elapses before
//! a terminal state returns the last observed report with `timed_out = true`;
//! it is not an error.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::client::{ComfyClient, SubmitOptions};
use crate::error::ComfyError;
use crate::models::run::DEFAULT_RUN_TIMEOUT_MS;
use crate::models::WorkflowFormat;
use crate::runs::reconciler::resolve_status;
use crate::runs::status::{RunStatus, StatusReport, StatusSource};
use crate::workflow::{apply_inputs, resolve_api_prompt};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// A fully resolved run: the definition, overrides, and wait policy.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub workflow: Value,
    pub format: Option<WorkflowFormat>,
    pub inputs: Map<String, Value>,
    pub wait: bool,
    pub timeout: Duration,
    /// Caller-chosen run id, used when the service does not echo one.
    pub prompt_id: Option<String>,
    pub extra_data: Option<Map<String, Value>>,
}

impl RunRequest {
    pub fn new(workflow: Value) -> Self {
        Self {
            workflow,
            format: None,
            inputs: Map::new(),
            wait: true,
            timeout: Duration::from_millis(DEFAULT_RUN_TIMEOUT_MS),
            prompt_id: None,
            extra_data: None,
        }
    }
}

/// Returned immediately when the caller does not wait.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunHandle {
    pub run_id: String,
    pub status: RunStatus,
    pub queued: bool,
    pub queue_response: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RunOutcome {
    Queued(RunHandle),
    Finished(StatusReport),
}

impl RunOutcome {
    pub fn run_id(&self) -> &str {
        match self {
            RunOutcome::Queued(h) => &h.run_id,
            RunOutcome::Finished(r) => &r.run_id,
        }
    }

    pub fn status(&self) -> RunStatus {
        match self {
            RunOutcome::Queued(h) => h.status,
            RunOutcome::Finished(r) => r.status,
        }
    }
}

pub struct RunOrchestrator {
    client: Arc<ComfyClient>,
    poll_interval: Duration,
}

impl RunOrchestrator {
    pub fn new(client: Arc<ComfyClient>) -> Self {
        Self {
            client,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Prepare, submit, and (when `wait` is set) poll a run.
    pub async fn run(
        &self,
        request: RunRequest,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, ComfyError> {
        let api_prompt =
            resolve_api_prompt(&self.client, &request.workflow, request.format).await?;
        let prompt = apply_inputs(&api_prompt, &request.inputs);

        let options = SubmitOptions {
            prompt_id: request.prompt_id.clone(),
            client_id: Some(Uuid::new_v4().to_string()),
            extra_data: request.extra_data.clone(),
        };
        let ack = self.client.queue_prompt(&prompt, &options).await?;

        let run_id = ack
            .as_ref()
            .and_then(|a| a.get("prompt_id"))
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .or(request.prompt_id)
            .ok_or(ComfyError::NoCorrelationId)?;

        tracing::info!("[Runs] Queued run {} (wait: {})", run_id, request.wait);

        if !request.wait {
            return Ok(RunOutcome::Queued(RunHandle {
                run_id,
                status: RunStatus::Pending,
                queued: true,
                queue_response: ack,
            }));
        }

        let report = self.wait_for(&run_id, request.timeout, cancel).await?;
        Ok(RunOutcome::Finished(report))
    }

    /// Poll until a terminal status, the deadline, or cancellation.
    pub async fn wait_for(
        &self,
        run_id: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<StatusReport, ComfyError> {
        let deadline = Instant::now() + timeout;
        let mut latest = StatusReport::bare(run_id, RunStatus::Pending, StatusSource::Queue);

        while Instant::now() < deadline {
            if cancel.is_cancelled() {
                return Err(ComfyError::Cancelled {
                    run_id: run_id.to_string(),
                });
            }

            latest = resolve_status(&self.client, run_id).await?;
            if latest.status.is_terminal() {
                tracing::info!("[Runs] Run {} finished: {}", run_id, latest.status.as_str());
                latest.timed_out = Some(false);
                return Ok(latest);
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(ComfyError::Cancelled {
                        run_id: run_id.to_string(),
                    });
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        tracing::warn!(
            "[Runs] Run {} still {} after {}ms",
            run_id,
            latest.status.as_str(),
            timeout.as_millis()
        );
        latest.timed_out = Some(true);
        latest.timeout_ms = Some(timeout.as_millis() as u64);
        Ok(latest)
    }
}
