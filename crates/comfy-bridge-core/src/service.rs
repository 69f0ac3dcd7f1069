//! ComfyService - the entry point used by the tool and CLI layers.
//!
//! Every operation first checks that the integration is enabled. One
//! [`ComfyClient`] is shared by all runs issued through a service, so the
//! jobs-API probe happens at most once per service.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::client::ComfyClient;
use crate::config::{Capabilities, ComfyConfig};
use crate::error::ComfyError;
use crate::models::run::RunWorkflowRequest;
use crate::models::workflow::{DeleteOutcome, UpsertWorkflowInput, WorkflowEntry};
use crate::runs::{resolve_status, RunOrchestrator, RunOutcome, RunRequest, StatusReport};
use crate::store::{merge_defaults, WorkflowListing, WorkflowRegistry};

pub struct ComfyService {
    config: ComfyConfig,
    registry: WorkflowRegistry,
    client: Option<Arc<ComfyClient>>,
    poll_interval: Option<Duration>,
}

impl ComfyService {
    /// Build a service from configuration. A missing or invalid base URL is
    /// reported lazily, when an operation needs the client.
    pub fn new(config: ComfyConfig) -> Self {
        let client = if config.enabled {
            match ComfyClient::new(&config) {
                Ok(c) => Some(Arc::new(c)),
                Err(e) => {
                    tracing::warn!("[ComfyService] Client unavailable: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Self {
            registry: WorkflowRegistry::new(config.workflows_file.clone()),
            config,
            client,
            poll_interval: None,
        }
    }

    pub fn from_env() -> Self {
        Self::new(ComfyConfig::from_env())
    }

    /// Override the poll interval used by `run_workflow`.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn capabilities(&self) -> Capabilities {
        self.config.capabilities()
    }

    pub fn registry(&self) -> &WorkflowRegistry {
        &self.registry
    }

    fn assert_enabled(&self) -> Result<(), ComfyError> {
        if self.config.enabled {
            Ok(())
        } else {
            Err(ComfyError::disabled())
        }
    }

    fn client(&self) -> Result<Arc<ComfyClient>, ComfyError> {
        self.assert_enabled()?;
        match self.client {
            Some(ref c) => Ok(Arc::clone(c)),
            // Re-run construction to surface the precise configuration error.
            None => ComfyClient::new(&self.config).map(Arc::new),
        }
    }

    pub async fn list_workflows(&self, include_workflow: bool) -> Result<WorkflowListing, ComfyError> {
        self.assert_enabled()?;
        self.registry.list(include_workflow).await
    }

    pub async fn get_workflow(&self, name: &str) -> Result<WorkflowEntry, ComfyError> {
        self.assert_enabled()?;
        self.registry
            .get(name)
            .await?
            .ok_or_else(|| ComfyError::WorkflowNotFound(name.to_string()))
    }

    pub async fn upsert_workflow(&self, input: UpsertWorkflowInput) -> Result<WorkflowEntry, ComfyError> {
        self.assert_enabled()?;
        self.registry.upsert(input).await
    }

    pub async fn delete_workflow(&self, name: &str) -> Result<DeleteOutcome, ComfyError> {
        self.assert_enabled()?;
        self.registry.delete(name).await
    }

    /// Resolve a named or inline workflow and hand it to the orchestrator.
    pub async fn run_workflow(
        &self,
        request: RunWorkflowRequest,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, ComfyError> {
        self.assert_enabled()?;
        request.validate()?;
        let client = self.client()?;

        let run_request = self.resolve_run_request(request).await?;

        let mut orchestrator = RunOrchestrator::new(client);
        if let Some(interval) = self.poll_interval {
            orchestrator = orchestrator.with_poll_interval(interval);
        }
        orchestrator.run(run_request, cancel).await
    }

    async fn resolve_run_request(&self, request: RunWorkflowRequest) -> Result<RunRequest, ComfyError> {
        let timeout = request.timeout();

        let (workflow, format, inputs) = if let Some(ref name) = request.workflow_name {
            let name = name.trim();
            let entry = self
                .registry
                .get(name)
                .await?
                .ok_or_else(|| ComfyError::WorkflowNotFound(name.to_string()))?;
            let inputs = merge_defaults(&entry.defaults, request.inputs.as_ref());
            (entry.workflow, request.format.or(Some(entry.format)), inputs)
        } else {
            let workflow = request.workflow.unwrap_or(Value::Null);
            (workflow, request.format, request.inputs.unwrap_or_default())
        };

        Ok(RunRequest {
            workflow,
            format,
            inputs,
            wait: request.wait,
            timeout,
            prompt_id: request.prompt_id.map(|id| id.trim().to_string()),
            extra_data: request.extra_data,
        })
    }

    pub async fn get_run_status(&self, run_id: &str) -> Result<StatusReport, ComfyError> {
        let client = self.client()?;
        if run_id.trim().is_empty() {
            return Err(ComfyError::invalid("run_id", "must not be empty"));
        }
        resolve_status(&client, run_id.trim()).await
    }

    pub async fn verify_connection(&self) -> Result<Option<Value>, ComfyError> {
        self.client()?.verify_connection().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_service_rejects_everything() {
        let dir = tempfile::tempdir().unwrap();
        let config = ComfyConfig::default().with_workflows_file(dir.path().join("w.json"));
        let service = ComfyService::new(config);

        let err = service.list_workflows(false).await.unwrap_err();
        assert_eq!(err.code(), "COMFY_DISABLED");
        assert_eq!(err.status(), Some(404));

        let err = service.get_run_status("abc").await.unwrap_err();
        assert_eq!(err.code(), "COMFY_DISABLED");

        let err = service
            .run_workflow(RunWorkflowRequest::named("x"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "COMFY_DISABLED");
        // The registry file is never touched while disabled.
        assert!(!dir.path().join("w.json").exists());
    }

    #[tokio::test]
    async fn test_enabled_without_base_url() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ComfyConfig::default().with_workflows_file(dir.path().join("w.json"));
        config.enabled = true;
        let service = ComfyService::new(config);

        // Registry operations do not need the remote service.
        assert!(service.list_workflows(false).await.unwrap().is_empty());

        let err = service.get_run_status("abc").await.unwrap_err();
        assert_eq!(err.code(), "COMFY_BASE_URL_REQUIRED");
    }

    #[tokio::test]
    async fn test_unknown_workflow_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ComfyConfig::default()
            .with_base_url("http://127.0.0.1:9")
            .with_workflows_file(dir.path().join("w.json"));
        config.enabled = true;
        let service = ComfyService::new(config);

        let err = service
            .run_workflow(RunWorkflowRequest::named("missing"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "COMFY_WORKFLOW_NOT_FOUND");
        assert_eq!(err.to_string(), "Workflow \"missing\" not found");
    }
}
