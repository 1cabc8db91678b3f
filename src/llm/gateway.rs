//! LLM Gateway (spec.md §4.2, component C2): combined-prompt construction,
//! upstream invocation, and robust per-item reply reconstruction.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::error::Result;
use crate::model::{BatchedLlmResponse, BatchedLlmResponseItem};
use crate::priority::Priority;
use crate::request_log::RequestLogger;

use super::client::LlmBackend;
use super::parse::parse_batch_reply;
use super::prompt::{build_combined_prompt, output_token_budget};
use super::types::UpstreamRequest;

/// Builds the combined prompt, invokes the backend once, and fans the reply
/// back out to `N` positional results.
pub struct LlmGateway {
    backend: Arc<dyn LlmBackend>,
    request_logger: Arc<dyn RequestLogger>,
}

impl LlmGateway {
    pub fn new(backend: Arc<dyn LlmBackend>, request_logger: Arc<dyn RequestLogger>) -> Self {
        Self { backend, request_logger }
    }

    /// Run one combined upstream call for `prompts`, all sharing `priority`
    /// and `max_tokens` (the batch's per-priority threshold). Fails with an
    /// `Upstream` error only if the backend call itself errors; an
    /// unparseable-but-successful reply still returns `Ok`, with sentinel
    /// text filling any missing position (spec.md §4.2, §7).
    pub async fn generate_batch(
        &self,
        prompts: &[String],
        priority: Priority,
        request_ids: &[String],
        max_tokens: u32,
        api_key: Option<String>,
    ) -> Result<BatchedLlmResponse> {
        let n = prompts.len();
        assert_eq!(request_ids.len(), n, "prompts and request_ids must align");

        let combined_prompt = build_combined_prompt(priority, prompts, request_ids);
        let max_output_tokens = output_token_budget(max_tokens, n);
        let temperature = priority.temperature();

        info!(
            n,
            max_output_tokens, priority = %priority, "sending combined batch request to upstream"
        );

        let started = Instant::now();
        let completion = self
            .backend
            .complete(UpstreamRequest {
                combined_prompt: combined_prompt.clone(),
                max_output_tokens,
                temperature,
                api_key,
            })
            .await?;
        let model_latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        if let Err(e) = self.request_logger.log_combined(&combined_prompt, &completion.text) {
            warn!(error = %e, "failed to write combined request/response log");
        }

        let parsed = parse_batch_reply(&completion.text, n);
        if parsed.len() < n {
            warn!(
                found = parsed.len(),
                expected = n,
                "upstream reply missing some positions; filling with sentinel text"
            );
        }

        let base = if n > 0 { completion.total_tokens / n as u64 } else { 0 };
        let remainder = if n > 0 { completion.total_tokens % n as u64 } else { 0 };

        let results = (0..n)
            .map(|i| {
                let text = parsed.get(&i).cloned().unwrap_or_else(|| {
                    format!(
                        "[Error: failed to parse response for request {}. Check logs.]",
                        request_ids[i]
                    )
                });
                let tokens_used = base + if (i as u64) < remainder { 1 } else { 0 };
                BatchedLlmResponseItem {
                    index: i,
                    text,
                    tokens_used: tokens_used as u32,
                }
            })
            .collect();

        info!(
            n,
            model_latency_ms, total_tokens = completion.total_tokens, "batch reply fanned out"
        );

        Ok(BatchedLlmResponse {
            results,
            model_latency_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::{FailingLlmBackend, MockLlmBackend};
    use crate::request_log::FileRequestLogger;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn test_logger(dir: &std::path::Path) -> Arc<dyn RequestLogger> {
        Arc::new(FileRequestLogger::new(dir.join("llm.log"), dir.join("individual.log")))
    }

    #[tokio::test]
    async fn clean_reply_distributes_tokens_with_low_index_bias() {
        let dir = tempdir().unwrap();
        let reply = r#"[{"index":0,"response":"a"},{"index":1,"response":"b"},{"index":2,"response":"c"}]"#;
        let backend = Arc::new(MockLlmBackend::new(reply, 10));
        let gateway = LlmGateway::new(backend, test_logger(dir.path()));

        let prompts = vec!["p0".into(), "p1".into(), "p2".into()];
        let ids = vec!["r0".into(), "r1".into(), "r2".into()];
        let response = gateway
            .generate_batch(&prompts, Priority::High, &ids, 512, None)
            .await
            .unwrap();

        assert_eq!(response.results.len(), 3);
        // 10 / 3 = 3 remainder 1 -> first index gets the extra token.
        assert_eq!(response.results[0].tokens_used, 4);
        assert_eq!(response.results[1].tokens_used, 3);
        assert_eq!(response.results[2].tokens_used, 3);
        let total: u32 = response.results.iter().map(|r| r.tokens_used).sum();
        assert_eq!(total, 10);

        let combined_log = std::fs::read_to_string(dir.path().join("llm.log")).unwrap();
        assert!(combined_log.contains("p0"));
        assert!(combined_log.contains(reply));
    }

    #[tokio::test]
    async fn missing_positions_get_sentinel_text() {
        let dir = tempdir().unwrap();
        let reply = r#"[{"index":0,"response":"a"}]"#;
        let backend = Arc::new(MockLlmBackend::new(reply, 6));
        let gateway = LlmGateway::new(backend, test_logger(dir.path()));

        let prompts = vec!["p0".into(), "p1".into()];
        let ids = vec!["req-a".into(), "req-b".into()];
        let response = gateway
            .generate_batch(&prompts, Priority::Medium, &ids, 1024, Some("sk-test".to_string()))
            .await
            .unwrap();

        assert_eq!(response.results[0].text, "a");
        assert!(response.results[1]
            .text
            .contains("failed to parse response for request req-b"));
    }

    #[tokio::test]
    async fn upstream_failure_propagates_as_error() {
        let dir = tempdir().unwrap();
        let backend = Arc::new(FailingLlmBackend::new("rate limited"));
        let gateway = LlmGateway::new(backend, test_logger(dir.path()));

        let prompts = vec!["p0".into()];
        let ids = vec!["r0".into()];
        let err = gateway
            .generate_batch(&prompts, Priority::Low, &ids, 2048, None)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::Error::Upstream { .. }));
    }

    /// Run `generate_batch` against a reply that carries exactly the present
    /// positions in `items`, on a fresh runtime (proptest cases are
    /// synchronous). Used by the property tests below to vary `n` and which
    /// positions the upstream actually answered.
    fn run_batch(items: &[(bool, String)]) -> BatchedLlmResponse {
        let n = items.len();
        let reply_items: Vec<serde_json::Value> = items
            .iter()
            .enumerate()
            .filter(|(_, (present, _))| *present)
            .map(|(i, (_, text))| serde_json::json!({"index": i, "response": text}))
            .collect();
        let reply = serde_json::to_string(&reply_items).unwrap();

        let dir = tempdir().unwrap();
        let backend = Arc::new(MockLlmBackend::new(reply, n as u64 * 3));
        let gateway = LlmGateway::new(backend, test_logger(dir.path()));
        let prompts: Vec<String> = (0..n).map(|i| format!("p{i}")).collect();
        let ids: Vec<String> = (0..n).map(|i| format!("id{i}")).collect();

        tokio::runtime::Runtime::new()
            .unwrap()
            .block_on(gateway.generate_batch(&prompts, Priority::High, &ids, 512, None))
            .unwrap()
    }

    fn items_strategy() -> impl Strategy<Value = Vec<(bool, String)>> {
        (1usize..8).prop_flat_map(|n| proptest::collection::vec((any::<bool>(), "[ -~]{0,12}"), n..=n))
    }

    proptest! {
        /// Every input position produces exactly one output position — real
        /// text or sentinel — never fewer, never more (spec.md §8
        /// completion-totality), across arbitrary batch sizes.
        #[test]
        fn completion_totality(items in items_strategy()) {
            let response = run_batch(&items);
            prop_assert_eq!(response.results.len(), items.len());
        }

        /// Each result's `index` matches its input position, and its text is
        /// either the upstream's answer for that position (trimmed) or the
        /// sentinel naming that position's request id — never another
        /// position's content (spec.md §8 positional-fidelity).
        #[test]
        fn positional_fidelity(items in items_strategy()) {
            let response = run_batch(&items);
            for (i, (present, text)) in items.iter().enumerate() {
                let result = &response.results[i];
                prop_assert_eq!(result.index, i);
                if *present {
                    prop_assert_eq!(result.text.trim(), text.trim());
                } else {
                    let needle = format!("failed to parse response for request id{i}");
                    prop_assert!(result.text.contains(needle.as_str()));
                }
            }
        }
    }
}
