//! Upstream vendor client: a blocking HTTP call delegated to a worker thread,
//! plus a deterministic mock used in tests (spec.md §4.2, §5).

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{Error, Result};

use super::types::{UpstreamCompletion, UpstreamRequest};

/// The upstream LLM call. A single combined prompt in, one completion out —
/// the fan-out to individual answers happens later, in [`super::parse`].
///
/// Implementations must not block the async runtime: the upstream call is
/// synchronous I/O and has to be delegated to a worker thread
/// (spec.md §4.2, §5).
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn complete(&self, request: UpstreamRequest) -> Result<UpstreamCompletion>;
}

/// Configuration for the HTTP-backed vendor client. The API key is not part
/// of this struct: it is resolved per batch from the Settings collaborator
/// and carried on each [`UpstreamRequest`] instead (spec.md §6).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            timeout_secs: 120,
        }
    }
}

fn build_blocking_client(timeout_secs: u64) -> reqwest::blocking::Client {
    let timeout = Duration::from_secs(timeout_secs);

    // Sandboxed environments can panic during proxy auto-detection in
    // reqwest's default client builder. Fall back to no-proxy in that case.
    match catch_unwind(AssertUnwindSafe(|| {
        reqwest::blocking::Client::builder().timeout(timeout).build()
    })) {
        Ok(Ok(client)) => client,
        Ok(Err(_)) | Err(_) => reqwest::blocking::Client::builder()
            .no_proxy()
            .timeout(timeout)
            .build()
            .expect("failed to build HTTP client"),
    }
}

#[derive(Debug, Serialize)]
struct VendorRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_output_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct VendorResponse {
    text: String,
    usage: VendorUsage,
}

#[derive(Debug, Deserialize)]
struct VendorUsage {
    total_token_count: u64,
}

/// HTTP client for the upstream vendor. Re-creates its inner blocking client
/// whenever the API key changes; concurrent callers may briefly observe a
/// slightly-older client without a correctness loss, since re-init is
/// idempotent (spec.md §5, Shared resources).
pub struct HttpLlmBackend {
    base_url: String,
    model: String,
    timeout_secs: u64,
    current: Mutex<Option<(String, Arc<reqwest::blocking::Client>)>>,
}

impl HttpLlmBackend {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            base_url: config.base_url,
            model: config.model,
            timeout_secs: config.timeout_secs,
            current: Mutex::new(None),
        }
    }

    async fn client_for(&self, api_key: &str) -> Arc<reqwest::blocking::Client> {
        let mut slot = self.current.lock().await;
        if let Some((key, client)) = slot.as_ref() {
            if key == api_key {
                return Arc::clone(client);
            }
        }
        let client = Arc::new(build_blocking_client(self.timeout_secs));
        *slot = Some((api_key.to_string(), Arc::clone(&client)));
        client
    }
}

#[async_trait]
impl LlmBackend for HttpLlmBackend {
    async fn complete(&self, request: UpstreamRequest) -> Result<UpstreamCompletion> {
        let api_key = request.api_key.clone().unwrap_or_default();
        let client = self.client_for(&api_key).await;
        let url = format!("{}/v1/generate", self.base_url);
        let model = self.model.clone();

        // Synchronous network I/O — must not run on the async executor's
        // own threads (spec.md §4.2, §5).
        let (text, total_tokens) = tokio::task::spawn_blocking(move || -> Result<(String, u64)> {
            let body = VendorRequest {
                model: &model,
                prompt: &request.combined_prompt,
                max_output_tokens: request.max_output_tokens,
                temperature: request.temperature,
            };

            let response = client
                .post(&url)
                .header("authorization", format!("Bearer {api_key}"))
                .json(&body)
                .send()
                .map_err(|e| Error::upstream(format!("request failed: {e}")))?;

            let status = response.status();
            let text = response
                .text()
                .map_err(|e| Error::upstream(format!("failed to read response body: {e}")))?;

            if !status.is_success() {
                return Err(Error::upstream(format!("upstream returned {status}: {text}")));
            }

            let parsed: VendorResponse = serde_json::from_str(&text)
                .map_err(|e| Error::upstream(format!("failed to parse upstream envelope: {e}")))?;

            Ok((parsed.text, parsed.usage.total_token_count))
        })
        .await
        .map_err(|e| Error::internal(format!("upstream worker task panicked: {e}")))??;

        Ok(UpstreamCompletion { text, total_tokens })
    }
}

/// Deterministic backend for tests: echoes a canned reply, optionally after
/// an artificial delay, and never touches the network.
pub struct MockLlmBackend {
    reply: String,
    total_tokens: u64,
    delay: Duration,
}

impl MockLlmBackend {
    pub fn new(reply: impl Into<String>, total_tokens: u64) -> Self {
        Self {
            reply: reply.into(),
            total_tokens,
            delay: Duration::from_millis(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl LlmBackend for MockLlmBackend {
    async fn complete(&self, _request: UpstreamRequest) -> Result<UpstreamCompletion> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let _ = Instant::now();
        Ok(UpstreamCompletion {
            text: self.reply.clone(),
            total_tokens: self.total_tokens,
        })
    }
}

/// Mock backend that always fails, for exercising upstream-failure semantics.
pub struct FailingLlmBackend {
    message: String,
}

impl FailingLlmBackend {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl LlmBackend for FailingLlmBackend {
    async fn complete(&self, _request: UpstreamRequest) -> Result<UpstreamCompletion> {
        Err(Error::upstream(self.message.clone()))
    }
}
