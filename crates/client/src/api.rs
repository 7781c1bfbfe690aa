//! REST API client for the OCR Job Service.
//!
//! Wraps the two endpoints the client needs (multipart job submission and
//! the per-job summary) using [`reqwest`], and exposes them through the
//! [`JobService`] trait so the controller can be driven by a scripted
//! service in tests.

use std::time::Duration;

use async_trait::async_trait;
use ocrjob_core::types::{FileBlob, JobId};
use reqwest::multipart::{Form, Part};
use reqwest::Url;

/// Multipart field name repeated once per uploaded file.
pub const FILES_FIELD: &str = "files";

/// Field in the submit response carrying the new job identifier.
pub const JOB_ID_FIELD: &str = "job_id";

/// A decoded summary response, kept together with its HTTP status.
///
/// Non-2xx responses with a JSON body are returned here rather than as an
/// error; deciding what they mean is up to the poll classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

/// The two operations the lifecycle controller needs from the Job Service.
#[async_trait]
pub trait JobService: Send + Sync {
    /// Submit every file as one job. Returns the service-assigned id.
    async fn submit_job(&self, files: &[FileBlob]) -> Result<JobId, OcrApiError>;

    /// Fetch the current summary for a job.
    async fn fetch_summary(&self, job_id: &JobId) -> Result<SummaryResponse, OcrApiError>;
}

/// Errors from the Job Service REST layer.
#[derive(Debug, thiserror::Error)]
pub enum OcrApiError {
    /// The HTTP request failed (network, DNS, TLS, timeout) or the body
    /// could not be decoded.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("Job Service error ({status}): {reason}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Canonical reason phrase, e.g. `Internal Server Error`.
        reason: String,
        /// Raw response body for debugging.
        body: String,
    },

    /// A 2xx response whose body did not have the expected shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The base URL cannot have endpoint paths appended to it.
    #[error("Invalid base URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl OcrApiError {
    /// Short text for the user-facing "Upload failed: ..." message.
    pub fn summary(&self) -> String {
        match self {
            Self::ApiError { reason, .. } => reason.clone(),
            other => other.to_string(),
        }
    }
}

/// HTTP client for one Job Service deployment.
pub struct OcrApi {
    client: reqwest::Client,
    base_url: String,
}

impl OcrApi {
    /// Create a client with its own connection pool.
    ///
    /// * `base_url` - e.g. `https://host/v1`; a trailing `/` is dropped.
    /// * `request_timeout` - applied to every request.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, OcrApiError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn jobs_url(&self) -> Result<Url, OcrApiError> {
        self.endpoint(&["jobs"])
    }

    fn summary_url(&self, job_id: &JobId) -> Result<Url, OcrApiError> {
        self.endpoint(&["jobs", job_id.as_str(), "summary"])
    }

    /// Append `segments` to the base URL, percent-encoding each one so a
    /// job id can never add path, query or fragment parts.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, OcrApiError> {
        let invalid = |reason: String| OcrApiError::InvalidUrl {
            url: self.base_url.clone(),
            reason,
        };

        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid("URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn build_form(files: &[FileBlob]) -> Result<Form, OcrApiError> {
        let mut form = Form::new();
        for file in files {
            let part = Part::bytes(file.content.clone())
                .file_name(file.name.clone())
                .mime_str(file.content_type())?;
            form = form.part(FILES_FIELD, part);
        }
        Ok(form)
    }

    /// Pull a non-empty string `job_id` out of a submit response body.
    pub(crate) fn extract_job_id(body: &serde_json::Value) -> Result<JobId, OcrApiError> {
        body.get(JOB_ID_FIELD)
            .and_then(|v| v.as_str())
            .and_then(|s| JobId::new(s))
            .ok_or_else(|| {
                OcrApiError::MalformedResponse(format!(
                    "submit response has no '{JOB_ID_FIELD}' string"
                ))
            })
    }

    // ---- private helpers ----

    /// Return the response unchanged on success, or an
    /// [`OcrApiError::ApiError`] with status, reason and body text.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, OcrApiError> {
        let status = response.status();
        if !status.is_success() {
            let reason = status
                .canonical_reason()
                .unwrap_or("Unknown Status")
                .to_string();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(OcrApiError::ApiError {
                status: status.as_u16(),
                reason,
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl JobService for OcrApi {
    /// `POST {base}/jobs` with one `files` part per blob.
    async fn submit_job(&self, files: &[FileBlob]) -> Result<JobId, OcrApiError> {
        let form = Self::build_form(files)?;

        let response = self
            .client
            .post(self.jobs_url()?)
            .multipart(form)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OcrApiError::MalformedResponse(e.to_string()))?;

        Self::extract_job_id(&body)
    }

    /// `GET {base}/jobs/{id}/summary`.
    async fn fetch_summary(&self, job_id: &JobId) -> Result<SummaryResponse, OcrApiError> {
        let response = self.client.get(self.summary_url(job_id)?).send().await?;
        let status = response.status().as_u16();
        let body = response.json::<serde_json::Value>().await?;
        Ok(SummaryResponse { status, body })
    }
}
