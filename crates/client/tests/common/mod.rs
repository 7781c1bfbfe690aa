#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use ocrjob_client::api::{JobService, OcrApiError, SummaryResponse};
use ocrjob_core::poll::PollPolicy;
use ocrjob_core::types::{FileBlob, JobId};

// ---------------------------------------------------------------------------
// Scripted in-memory Job Service
// ---------------------------------------------------------------------------

/// One canned reply from the summary endpoint.
#[derive(Debug, Clone)]
pub enum Reply {
    Json(u16, serde_json::Value),
    /// Simulates a network or decode failure.
    Transport(&'static str),
}

pub fn pending() -> Reply {
    Reply::Json(200, serde_json::json!({"state": "PENDING"}))
}

pub fn processing() -> Reply {
    Reply::Json(200, serde_json::json!({"state": "PROCESSING"}))
}

/// Job Service double. Summary replies are consumed in order and the last
/// one repeats forever.
pub struct ScriptedService {
    submit_reply: Result<String, (u16, &'static str)>,
    summaries: Mutex<VecDeque<Reply>>,
    submitted: Mutex<Vec<Vec<String>>>,
    summary_calls: Mutex<Vec<String>>,
    /// How long each submit request takes to answer.
    submit_delay: Duration,
    /// How long each summary request takes to answer.
    summary_delay: Duration,
}

impl ScriptedService {
    pub fn accepting(job_id: &str, summaries: Vec<Reply>) -> Arc<Self> {
        Self::slow(job_id, summaries, Duration::ZERO, Duration::ZERO)
    }

    /// Like [`accepting`](Self::accepting), but every request stays in
    /// flight for the given time before it is answered.
    pub fn slow(
        job_id: &str,
        summaries: Vec<Reply>,
        submit_delay: Duration,
        summary_delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            submit_reply: Ok(job_id.to_string()),
            summaries: Mutex::new(summaries.into()),
            submitted: Mutex::new(Vec::new()),
            summary_calls: Mutex::new(Vec::new()),
            submit_delay,
            summary_delay,
        })
    }

    pub fn rejecting(status: u16, reason: &'static str) -> Arc<Self> {
        Arc::new(Self {
            submit_reply: Err((status, reason)),
            summaries: Mutex::new(VecDeque::from(vec![pending()])),
            submitted: Mutex::new(Vec::new()),
            summary_calls: Mutex::new(Vec::new()),
            submit_delay: Duration::ZERO,
            summary_delay: Duration::ZERO,
        })
    }

    /// File names of every submit call, one entry per request.
    pub fn submitted(&self) -> Vec<Vec<String>> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn summary_calls(&self) -> usize {
        self.summary_calls.lock().unwrap().len()
    }

    pub fn polled_ids(&self) -> Vec<String> {
        self.summary_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobService for ScriptedService {
    async fn submit_job(&self, files: &[FileBlob]) -> Result<JobId, OcrApiError> {
        self.submitted
            .lock()
            .unwrap()
            .push(files.iter().map(|f| f.name.clone()).collect());
        if !self.submit_delay.is_zero() {
            tokio::time::sleep(self.submit_delay).await;
        }

        match self.submit_reply.clone() {
            Ok(id) => Ok(JobId::new(id).expect("scripted job id is not blank")),
            Err((status, reason)) => Err(OcrApiError::ApiError {
                status,
                reason: reason.to_string(),
                body: String::new(),
            }),
        }
    }

    async fn fetch_summary(&self, job_id: &JobId) -> Result<SummaryResponse, OcrApiError> {
        self.summary_calls.lock().unwrap().push(job_id.to_string());
        if !self.summary_delay.is_zero() {
            tokio::time::sleep(self.summary_delay).await;
        }

        let reply = {
            let mut summaries = self.summaries.lock().unwrap();
            if summaries.len() > 1 {
                summaries.pop_front().unwrap()
            } else {
                summaries.front().cloned().expect("summary script is empty")
            }
        };

        match reply {
            Reply::Json(status, body) => Ok(SummaryResponse { status, body }),
            Reply::Transport(msg) => Err(OcrApiError::MalformedResponse(msg.to_string())),
        }
    }
}

pub fn files(names: &[&str]) -> Vec<FileBlob> {
    names
        .iter()
        .map(|n| FileBlob::new(*n, n.as_bytes().to_vec()))
        .collect()
}

pub fn default_policy() -> PollPolicy {
    PollPolicy::default()
}

pub fn fast_policy(max_attempts: u32) -> PollPolicy {
    PollPolicy {
        interval: Duration::from_millis(10),
        max_attempts,
    }
}

// ---------------------------------------------------------------------------
// Mock Job Service over HTTP
// ---------------------------------------------------------------------------

/// One uploaded multipart part as seen by the mock server.
#[derive(Debug, Clone)]
pub struct ReceivedPart {
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Default)]
pub struct MockState {
    pub submit_status: u16,
    pub submit_body: serde_json::Value,
    pub uploads: Vec<Vec<ReceivedPart>>,
    pub summaries: VecDeque<(u16, String)>,
    pub summary_paths: Vec<String>,
}

pub type SharedMock = Arc<Mutex<MockState>>;

/// Start an axum mock Job Service on an ephemeral port.
///
/// Returns the base URL (e.g. `http://127.0.0.1:54321/v1`) and the shared
/// state the handlers read from and record into.
pub async fn spawn_mock_service(
    submit_status: u16,
    submit_body: serde_json::Value,
    summaries: Vec<(u16, &str)>,
) -> (String, SharedMock) {
    let state: SharedMock = Arc::new(Mutex::new(MockState {
        submit_status,
        submit_body,
        summaries: summaries
            .into_iter()
            .map(|(s, b)| (s, b.to_string()))
            .collect(),
        ..Default::default()
    }));

    let app = Router::new()
        .route("/v1/jobs", post(submit_handler))
        .route("/v1/jobs/{id}/summary", get(summary_handler))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/v1"), state)
}

async fn submit_handler(
    State(state): State<SharedMock>,
    mut multipart: Multipart,
) -> (StatusCode, Json<serde_json::Value>) {
    let mut parts = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.unwrap().to_vec();
        parts.push(ReceivedPart {
            field: name,
            file_name,
            content_type,
            bytes,
        });
    }

    let mut state = state.lock().unwrap();
    state.uploads.push(parts);
    (
        StatusCode::from_u16(state.submit_status).unwrap(),
        Json(state.submit_body.clone()),
    )
}

async fn summary_handler(
    State(state): State<SharedMock>,
    Path(id): Path<String>,
) -> (StatusCode, [(&'static str, &'static str); 1], String) {
    let mut state = state.lock().unwrap();
    state.summary_paths.push(id);

    let (status, body) = if state.summaries.len() > 1 {
        state.summaries.pop_front().unwrap()
    } else {
        state.summaries.front().cloned().unwrap()
    };

    (
        StatusCode::from_u16(status).unwrap(),
        [("content-type", "application/json")],
        body,
    )
}
