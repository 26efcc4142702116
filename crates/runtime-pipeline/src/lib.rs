//! Request pipeline contract shared by middleware stages and lightweight testing utilities.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

mod headers;

pub use headers::Headers;

/// Inbound request travelling through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRequest {
    /// HTTP method, compared case-insensitively by stages.
    pub method: String,
    /// Raw request path, e.g. `/v1/acct/cont/obj`.
    pub path: String,
    pub headers: Headers,
    /// Body bytes; stages forward them untouched.
    pub body: Vec<u8>,
    /// Identifier that lets log lines from every stage be correlated.
    pub trans_id: Uuid,
}

impl PipelineRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: Headers::new(),
            body: Vec::new(),
            trans_id: Uuid::new_v4(),
        }
    }

    /// Attach a header value.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn is_method(&self, method: &str) -> bool {
        self.method.eq_ignore_ascii_case(method)
    }
}

/// Response travelling back up the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl PipelineResponse {
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// Convenience constructor for OK responses.
    #[must_use]
    pub fn ok() -> Self {
        Self::new(200)
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

/// Failures surfaced by a pipeline stage.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineError {
    /// The addressed resource does not exist.
    #[error("not found: {detail}")]
    NotFound { detail: String },
    /// A collaborator the stage depends on could not be reached.
    #[error("unavailable: {detail}")]
    Unavailable { detail: String },
    /// Any other unexpected failure.
    #[error("internal error: {detail}")]
    Internal { detail: String },
}

impl PipelineError {
    /// Map the error into an HTTP status code.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Unavailable { .. } => 503,
            Self::Internal { .. } => 500,
        }
    }
}

/// A stage that consumes a request and produces a response.
#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn handle(&self, request: PipelineRequest) -> Result<PipelineResponse, PipelineError>;
}

/// Shared pointer helper for chaining stages.
pub type SharedPipeline = Arc<dyn Pipeline>;

/// Simple in-memory terminal stage for testing middleware.
#[derive(Debug, Default)]
pub struct RecordingPipeline {
    calls: tokio::sync::Mutex<Vec<PipelineRequest>>,
    scripted_responses: tokio::sync::Mutex<Vec<Result<PipelineResponse, PipelineError>>>,
}

impl RecordingPipeline {
    /// Queue the response that should be returned for the next request.
    pub async fn script_response(&self, response: Result<PipelineResponse, PipelineError>) {
        self.scripted_responses.lock().await.push(response);
    }

    /// Requests forwarded so far, in arrival order.
    pub async fn calls(&self) -> Vec<PipelineRequest> {
        self.calls.lock().await.clone()
    }

    pub async fn clear(&self) {
        self.calls.lock().await.clear();
        self.scripted_responses.lock().await.clear();
    }
}

#[async_trait]
impl Pipeline for RecordingPipeline {
    async fn handle(&self, request: PipelineRequest) -> Result<PipelineResponse, PipelineError> {
        self.calls.lock().await.push(request);

        let mut scripted = self.scripted_responses.lock().await;
        if scripted.is_empty() {
            return Ok(PipelineResponse::new(204));
        }

        scripted.remove(0)
    }
}

/// Process-wide registry of capability payloads served to discovery probes.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    entries: Mutex<BTreeMap<String, Value>>,
}

impl CapabilityRegistry {
    /// Record (or replace) the capability payload published under `name`.
    pub fn register(&self, name: impl Into<String>, info: Value) {
        self.entries
            .lock()
            .expect("capability registry mutex poisoned")
            .insert(name.into(), info);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(name).cloned())
    }

    /// Snapshot of every registered capability.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}
