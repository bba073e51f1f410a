//! PDF export through the render API
//!
//! A render request is posted to `/api/v1/md-to-pdf`. The server either
//! answers with the PDF directly or with a job id, in which case
//! `/api/v1/jobs/{id}` is polled at a fixed interval until the artifact is
//! ready, the job fails, or the deadline passes.

use crate::config::ExportConfig;
use bytes::Bytes;
use reqwest::{Client, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Submission endpoint, relative to the API base
pub const SUBMIT_PATH: &str = "api/v1/md-to-pdf";

/// Job status collection, relative to the API base
pub const JOBS_PATH: &str = "api/v1/jobs";

const GENERIC_SUBMIT_FAILURE: &str = "Failed to start render";
const GENERIC_JOB_FAILURE: &str = "Render failed";

/// Errors that can occur during export
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status with the server's detail or a generic message
    #[error("Server returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Render job failed: {0}")]
    JobFailed(String),

    #[error("Render timed out. Please try again.")]
    TimedOut,

    #[error("Render cancelled")]
    Cancelled,

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Could not write artifact: {0}")]
    Io(#[from] std::io::Error),
}

impl ExportError {
    /// Message shown to the user for a failed export
    pub fn user_message(&self) -> String {
        match self {
            ExportError::Server { message, .. } => message.clone(),
            ExportError::JobFailed(reason) => reason.clone(),
            ExportError::UnexpectedResponse(message) => message.clone(),
            ExportError::TimedOut | ExportError::Cancelled => self.to_string(),
            _ => "Failed to render PDF. Please try again.".to_string(),
        }
    }
}

/// Result type for export operations
pub type ExportResult<T> = Result<T, ExportError>;

/// Body of a render request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub css_override: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl RenderPayload {
    /// Render from Markdown source
    pub fn markdown(md: impl Into<String>) -> Self {
        Self {
            md: Some(md.into()),
            ..Default::default()
        }
    }

    /// Render a complete HTML document
    pub fn html(html: impl Into<String>) -> Self {
        Self {
            html: Some(html.into()),
            ..Default::default()
        }
    }

    pub fn with_css_override(mut self, css: impl Into<String>) -> Self {
        self.css_override = Some(css.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

/// Fixed-interval polling bounded by a deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(crate::config::DEFAULT_POLL_INTERVAL_MS),
            timeout: Duration::from_millis(crate::config::DEFAULT_JOB_TIMEOUT_MS),
        }
    }
}

impl PollPolicy {
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.poll_interval_ms),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }
}

/// Answer to a render request
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// The artifact came back in the response
    Ready(Bytes),
    /// The server queued a job
    Queued(String),
}

/// State of a queued job
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Pending,
    Ready(Bytes),
    Failed(String),
}

/// A finished render
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub bytes: Bytes,
    pub job_id: Option<String>,
    /// Status requests made before the artifact was ready
    pub polls: usize,
}

impl Artifact {
    pub fn save(&self, path: &Path) -> ExportResult<()> {
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
    job_id: Option<String>,
    status: Option<String>,
    error: Option<String>,
    detail: Option<String>,
}

impl ApiResponse {
    fn message(&self) -> Option<String> {
        self.detail.clone().or_else(|| self.error.clone())
    }
}

/// Client for the render API
#[derive(Debug, Clone)]
pub struct RenderJobClient {
    client: Client,
    base: Url,
    policy: PollPolicy,
}

impl RenderJobClient {
    pub fn new(api_base: &str, policy: PollPolicy) -> ExportResult<Self> {
        let mut base = api_base.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base).map_err(|e| ExportError::InvalidBaseUrl(e.to_string()))?;
        let client = Client::builder().user_agent(Self::user_agent()).build()?;
        Ok(Self {
            client,
            base,
            policy,
        })
    }

    pub fn from_config(config: &ExportConfig) -> ExportResult<Self> {
        Self::new(&config.api_base, PollPolicy::from_config(config))
    }

    pub fn user_agent() -> &'static str {
        concat!("md2pdf-studio/", env!("CARGO_PKG_VERSION"))
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    fn url(&self, path: &str) -> ExportResult<Url> {
        self.base
            .join(path)
            .map_err(|e| ExportError::InvalidBaseUrl(e.to_string()))
    }

    /// Status URL for a job; the id is one percent-encoded path segment
    pub fn job_url(&self, job_id: &str) -> ExportResult<Url> {
        let mut url = self.url(JOBS_PATH)?;
        url.path_segments_mut()
            .map_err(|_| ExportError::InvalidBaseUrl(self.base.to_string()))?
            .push(job_id);
        Ok(url)
    }

    /// Submit a render and wait for the artifact
    pub async fn submit(&self, payload: &RenderPayload) -> ExportResult<Artifact> {
        self.submit_with_cancel(payload, &CancellationToken::new())
            .await
    }

    /// Submit a render; `cancel` aborts submission or polling
    pub async fn submit_with_cancel(
        &self,
        payload: &RenderPayload,
        cancel: &CancellationToken,
    ) -> ExportResult<Artifact> {
        let submission = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ExportError::Cancelled),
            submission = self.enqueue(payload) => submission?,
        };

        match submission {
            Submission::Ready(bytes) => {
                log::debug!("Render returned the artifact directly ({} bytes)", bytes.len());
                Ok(Artifact {
                    bytes,
                    job_id: None,
                    polls: 0,
                })
            }
            Submission::Queued(job_id) => {
                log::debug!("Render queued as job {}", job_id);
                let (bytes, polls) = self.poll_until_ready(&job_id, cancel).await?;
                Ok(Artifact {
                    bytes,
                    job_id: Some(job_id),
                    polls,
                })
            }
        }
    }

    /// Post a render request
    pub async fn enqueue(&self, payload: &RenderPayload) -> ExportResult<Submission> {
        let url = self.url(SUBMIT_PATH)?;
        let response = self.client.post(url).json(payload).send().await?;
        let status = response.status();
        let content_type = content_type(&response);

        if status.is_success() && content_type.contains("application/pdf") {
            return Ok(Submission::Ready(response.bytes().await?));
        }

        let body = read_json(response, &content_type).await;
        if !status.is_success() {
            return Err(ExportError::Server {
                status: status.as_u16(),
                message: body
                    .and_then(|b| b.message())
                    .unwrap_or_else(|| GENERIC_SUBMIT_FAILURE.to_string()),
            });
        }

        body.and_then(|b| b.job_id)
            .map(Submission::Queued)
            .ok_or_else(|| ExportError::UnexpectedResponse(GENERIC_SUBMIT_FAILURE.to_string()))
    }

    /// Fetch the current state of a job
    pub async fn poll_once(&self, job_id: &str) -> ExportResult<JobState> {
        let url = self.job_url(job_id)?;
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let content_type = content_type(&response);

        if status.is_success() && content_type.contains("application/pdf") {
            return Ok(JobState::Ready(response.bytes().await?));
        }

        let body = read_json(response, &content_type).await.unwrap_or_default();
        if !status.is_success() {
            return Err(ExportError::Server {
                status: status.as_u16(),
                message: body
                    .message()
                    .unwrap_or_else(|| job_fetch_failure(status)),
            });
        }

        match body.status.as_deref() {
            Some("failed") => Ok(JobState::Failed(
                body.error.unwrap_or_else(|| GENERIC_JOB_FAILURE.to_string()),
            )),
            _ => Ok(JobState::Pending),
        }
    }

    /// Poll a job until it is ready, fails, times out or is cancelled
    ///
    /// The deadline is checked after each pending answer, so the total wait
    /// exceeds the timeout by at most one interval plus one request.
    pub async fn poll_until_ready(
        &self,
        job_id: &str,
        cancel: &CancellationToken,
    ) -> ExportResult<(Bytes, usize)> {
        let started = Instant::now();
        let mut polls = 0;

        loop {
            polls += 1;
            let state = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ExportError::Cancelled),
                state = self.poll_once(job_id) => state?,
            };

            match state {
                JobState::Ready(bytes) => return Ok((bytes, polls)),
                JobState::Failed(reason) => {
                    log::warn!("Render job {} failed: {}", job_id, reason);
                    return Err(ExportError::JobFailed(reason));
                }
                JobState::Pending => {}
            }

            if started.elapsed() >= self.policy.timeout {
                log::warn!("Render job {} timed out after {} polls", job_id, polls);
                return Err(ExportError::TimedOut);
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(ExportError::Cancelled),
                _ = tokio::time::sleep(self.policy.interval) => {}
            }
        }
    }
}

fn content_type(response: &Response) -> String {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase()
}

async fn read_json(response: Response, content_type: &str) -> Option<ApiResponse> {
    if !content_type.contains("application/json") {
        return None;
    }
    response.json::<ApiResponse>().await.ok()
}

fn job_fetch_failure(status: StatusCode) -> String {
    format!("Failed to fetch job ({})", status.as_u16())
}
