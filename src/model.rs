//! Value types for requests, responses, and the internal batched-reply items
//! (spec.md §3, component C5).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::priority::Priority;

/// A generation request as submitted by a client. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub username: String,
    /// Opaque client-supplied identifier. Uniqueness is the client's responsibility.
    pub request_id: String,
    pub prompt: String,
    pub created_at: DateTime<Utc>,
    pub priority: Priority,
}

impl GenerationRequest {
    pub fn new(
        username: impl Into<String>,
        request_id: impl Into<String>,
        prompt: impl Into<String>,
        priority: Priority,
    ) -> Self {
        Self {
            username: username.into(),
            request_id: request_id.into(),
            prompt: prompt.into(),
            created_at: Utc::now(),
            priority,
        }
    }
}

/// What the client ultimately receives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub request_id: String,
    pub username: String,
    pub text: String,
    pub tokens_used: u32,
    /// `(completed_at - created_at)` in milliseconds.
    pub latency_ms: f64,
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl GenerationResponse {
    /// Build a response from a request and the per-item upstream result.
    pub fn complete(
        request: &GenerationRequest,
        text: impl Into<String>,
        tokens_used: u32,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let latency_ms = (completed_at - request.created_at).num_milliseconds() as f64;
        Self {
            request_id: request.request_id.clone(),
            username: request.username.clone(),
            text: text.into(),
            tokens_used,
            latency_ms,
            created_at: request.created_at,
            completed_at,
        }
    }
}

/// One item of the upstream's combined reply, positioned by index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchedLlmResponseItem {
    pub index: usize,
    pub text: String,
    pub tokens_used: u32,
}

/// The full parsed reply to one combined upstream call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchedLlmResponse {
    /// Ordered by `index`, one entry per input position — even positions the
    /// upstream reply failed to produce carry a sentinel item (spec.md §4.2).
    pub results: Vec<BatchedLlmResponseItem>,
    pub model_latency_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_is_computed_in_milliseconds() {
        let req = GenerationRequest::new("alice", "r1", "hi", Priority::High);
        let completed_at = req.created_at + chrono::Duration::milliseconds(123);
        let resp = GenerationResponse::complete(&req, "hello", 10, completed_at);
        assert!((resp.latency_ms - 123.0).abs() < 1.0);
        assert_eq!(resp.request_id, "r1");
        assert_eq!(resp.username, "alice");
    }
}
