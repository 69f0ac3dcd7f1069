//! ComfyClient - authenticated, timeout-bounded HTTP channel to the remote
//! workflow engine.
//!
//! Endpoints used:
//!   POST /prompt             submit an API-format prompt
//!   POST /workflow/convert   graph → API conversion (optional server-side)
//!   GET  /api/jobs           capability probe for the jobs API
//!   GET  /api/jobs/{id}      structured job status
//!   GET  /history/{id}       execution record
//!   GET  /queue              running / pending snapshot
//!   GET  /view               artifact retrieval (URL construction only)

use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{Method, StatusCode, Url};
use serde_json::{Map, Value};
use tokio::sync::OnceCell;

use crate::config::{Auth, ComfyConfig};
use crate::error::ComfyError;

/// Outcome of the one-time `/api/jobs` probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobsApiProbe {
    Unprobed,
    Available,
    Unavailable,
}

/// Per-call options for [`ComfyClient::request`].
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<Value>,
    /// Overrides the client's default timeout.
    pub timeout: Option<Duration>,
    /// Treat a 404 as "no data" instead of an error.
    pub allow_missing: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            body: None,
            timeout: None,
            allow_missing: false,
        }
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post(body: Value) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            ..Self::default()
        }
    }

    pub fn allow_missing(mut self) -> Self {
        self.allow_missing = true;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Optional fields sent alongside a submitted prompt.
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    pub prompt_id: Option<String>,
    pub client_id: Option<String>,
    pub extra_data: Option<Map<String, Value>>,
}

enum Fetched {
    Missing,
    Body(Option<Value>),
}

pub struct ComfyClient {
    http: reqwest::Client,
    base_url: String,
    base: Url,
    auth: Auth,
    timeout: Duration,
    /// `true` once `/api/jobs` answered with anything but 404.
    jobs_api: OnceCell<bool>,
}

impl ComfyClient {
    pub fn new(config: &ComfyConfig) -> Result<Self, ComfyError> {
        let base_url = config
            .base_url
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or_else(ComfyError::base_url_required)?;

        let base = Url::parse(&base_url)
            .ok()
            .filter(|u| !u.cannot_be_a_base())
            .ok_or_else(|| ComfyError::Configuration {
                code: "COMFY_BASE_URL_REQUIRED",
                message: format!("COMFY_BASE_URL is not a valid URL: {}", base_url),
            })?;

        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            base,
            auth: config.auth.clone(),
            timeout: config.request_timeout,
            jobs_api: OnceCell::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current state of the jobs API probe.
    pub fn jobs_api_state(&self) -> JobsApiProbe {
        match self.jobs_api.get() {
            None => JobsApiProbe::Unprobed,
            Some(true) => JobsApiProbe::Available,
            Some(false) => JobsApiProbe::Unavailable,
        }
    }

    /// Issue a request and decode the JSON body.
    ///
    /// Returns `Ok(None)` for an empty body, or for a 404 when
    /// `allow_missing` is set. A body that is not JSON is wrapped as
    /// `{"raw": text}`.
    pub async fn request(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<Option<Value>, ComfyError> {
        match self.fetch(path, options).await? {
            Fetched::Missing => Ok(None),
            Fetched::Body(body) => Ok(body),
        }
    }

    async fn fetch(&self, path: &str, options: RequestOptions) -> Result<Fetched, ComfyError> {
        let timeout = options.timeout.unwrap_or(self.timeout);
        let timeout_ms = timeout.as_millis() as u64;
        let url = format!("{}{}", self.base_url, path);

        tracing::debug!("[ComfyClient] {} {}", options.method, url);

        let mut builder = self
            .http
            .request(options.method.clone(), &url)
            .header(ACCEPT, "application/json")
            .timeout(timeout);

        builder = match &self.auth {
            Auth::Bearer(token) => builder.bearer_auth(token),
            Auth::ApiKey(key) => builder.header("X-API-KEY", key),
            Auth::None => builder,
        };

        if let Some(ref body) = options.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(e, timeout_ms))?;

        let status = response.status();
        if options.allow_missing && status == StatusCode::NOT_FOUND {
            return Ok(Fetched::Missing);
        }

        let text = response
            .text()
            .await
            .map_err(|e| transport_error(e, timeout_ms))?;
        let parsed = parse_body(&text);

        if !status.is_success() {
            tracing::warn!("[ComfyClient] {} {} returned {}", options.method, url, status);
            return Err(if status == StatusCode::UNAUTHORIZED {
                ComfyError::Unauthorized { details: parsed }
            } else {
                ComfyError::Http {
                    status: status.as_u16(),
                    details: parsed,
                }
            });
        }

        Ok(Fetched::Body(parsed))
    }

    /// Submit an API-format prompt. Returns the raw acknowledgement.
    pub async fn queue_prompt(
        &self,
        prompt: &Value,
        options: &SubmitOptions,
    ) -> Result<Option<Value>, ComfyError> {
        let mut payload = serde_json::json!({ "prompt": prompt });
        if let Some(ref id) = options.prompt_id {
            payload["prompt_id"] = Value::String(id.clone());
        }
        if let Some(ref client_id) = options.client_id {
            payload["client_id"] = Value::String(client_id.clone());
        }
        if let Some(ref extra) = options.extra_data {
            if !extra.is_empty() {
                payload["extra_data"] = Value::Object(extra.clone());
            }
        }

        self.request("/prompt", RequestOptions::post(payload)).await
    }

    /// Convert a graph-format workflow through the server-side converter.
    pub async fn convert_workflow(&self, workflow: &Value) -> Result<Option<Value>, ComfyError> {
        match self
            .request("/workflow/convert", RequestOptions::post(workflow.clone()))
            .await
        {
            Err(ComfyError::Http { status: 404, .. }) => Err(ComfyError::ConverterUnavailable),
            other => other,
        }
    }

    /// Probe `/api/jobs` once per client. Any non-404 answer marks the jobs
    /// API as available. The outcome is never re-checked: a probe that fails
    /// returns its error once and leaves the API marked unavailable.
    pub async fn probe_jobs_api(&self) -> Result<bool, ComfyError> {
        let mut failure = None;
        let failure_slot = &mut failure;
        let available = *self
            .jobs_api
            .get_or_init(|| async move {
                match self
                    .fetch("/api/jobs", RequestOptions::get().allow_missing())
                    .await
                {
                    Ok(Fetched::Body(_)) => true,
                    Ok(Fetched::Missing) => false,
                    Err(e) => {
                        *failure_slot = Some(e);
                        false
                    }
                }
            })
            .await;

        if let Some(e) = failure {
            tracing::warn!("[ComfyClient] Jobs API probe failed: {}", e);
            return Err(e);
        }
        Ok(available)
    }

    /// Structured job status, or `None` when the jobs API is unsupported or
    /// does not know the id.
    pub async fn get_job(&self, run_id: &str) -> Result<Option<Value>, ComfyError> {
        if !self.probe_jobs_api().await? {
            return Ok(None);
        }
        self.request(
            &format!("/api/jobs/{}", urlencoding::encode(run_id)),
            RequestOptions::get().allow_missing(),
        )
        .await
    }

    pub async fn get_history(&self, run_id: &str) -> Result<Option<Value>, ComfyError> {
        self.request(
            &format!("/history/{}", urlencoding::encode(run_id)),
            RequestOptions::get().allow_missing(),
        )
        .await
    }

    pub async fn get_queue(&self) -> Result<Option<Value>, ComfyError> {
        self.request("/queue", RequestOptions::get().allow_missing())
            .await
    }

    /// Reachability check against `/prompt`; 404 is tolerated.
    pub async fn verify_connection(&self) -> Result<Option<Value>, ComfyError> {
        self.request("/prompt", RequestOptions::get().allow_missing())
            .await
    }

    /// Retrieval URL for an output file. Empty fields are left out.
    pub fn build_view_url(&self, filename: &str, subfolder: &str, kind: &str) -> String {
        let mut url = self.base.clone();
        url.set_path("/view");
        url.set_query(None);

        let params: Vec<(&str, &str)> = [("filename", filename), ("subfolder", subfolder), ("type", kind)]
            .into_iter()
            .filter(|(_, v)| !v.is_empty())
            .collect();
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        url.to_string()
    }
}

fn parse_body(text: &str) -> Option<Value> {
    if text.is_empty() {
        return None;
    }
    Some(serde_json::from_str(text).unwrap_or_else(|_| serde_json::json!({ "raw": text })))
}

fn transport_error(err: reqwest::Error, timeout_ms: u64) -> ComfyError {
    if err.is_timeout() {
        ComfyError::Timeout { timeout_ms }
    } else {
        ComfyError::Network(err.to_string())
    }
}
