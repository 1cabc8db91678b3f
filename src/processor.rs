//! Batch Processor (spec.md §4.3, component C3): turns one dispatched batch
//! into settled completion handles, calling out to the Gateway for the
//! actual generation and treating chat-store/log writes as best-effort.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::chat_store::ChatStore;
use crate::llm::LlmGateway;
use crate::model::GenerationResponse;
use crate::queue::{Batch, BatchHandler};
use crate::request_log::RequestLogger;
use crate::settings::SettingsProvider;

/// Wires the Gateway, Settings, chat store, and request logger together into
/// the [`BatchHandler`] the dispatcher invokes per ready batch.
pub struct BatchProcessor {
    gateway: Arc<LlmGateway>,
    settings: Arc<dyn SettingsProvider>,
    chat_store: Arc<dyn ChatStore>,
    request_logger: Arc<dyn RequestLogger>,
}

impl BatchProcessor {
    pub fn new(
        gateway: Arc<LlmGateway>,
        settings: Arc<dyn SettingsProvider>,
        chat_store: Arc<dyn ChatStore>,
        request_logger: Arc<dyn RequestLogger>,
    ) -> Self {
        Self {
            gateway,
            settings,
            chat_store,
            request_logger,
        }
    }
}

#[async_trait]
impl BatchHandler for BatchProcessor {
    async fn process(&self, mut batch: Batch) {
        let n = batch.len();
        if n == 0 {
            return;
        }

        let prompts: Vec<String> = batch.iter().map(|item| item.request.prompt.clone()).collect();
        let request_ids: Vec<String> = batch.iter().map(|item| item.request.request_id.clone()).collect();
        let priority = batch[0].request.priority;

        info!(n, %priority, "processing dispatched batch");

        let max_tokens = self.settings.thresholds(priority).max_tokens;
        let api_key = self.settings.api_key();

        let generated = self
            .gateway
            .generate_batch(&prompts, priority, &request_ids, max_tokens, api_key)
            .await;

        let results = match generated {
            Ok(response) => response.results,
            Err(err) => {
                error!(%err, n, "batch generation failed; settling every item with the same error");
                for item in batch.drain(..) {
                    item.settle(Err(err.clone_for_batch()));
                }
                return;
            }
        };

        let completed_at = Utc::now();
        let batch_id = Uuid::new_v4().to_string();

        for (item, result) in batch.drain(..).zip(results) {
            let response = GenerationResponse::complete(&item.request, result.text, result.tokens_used, completed_at);

            if let Err(e) = self.request_logger.log_individual(&item.request, &response) {
                warn!(error = %e, request_id = %item.request.request_id, "failed to write individual request log");
            }

            let request_json = json!({
                "request_id": item.request.request_id,
                "username": item.request.username,
                "prompt": item.request.prompt,
                "priority": item.request.priority.rank(),
                "created_at": item.request.created_at,
            });
            let response_json = serde_json::to_value(&response).unwrap_or(json!({}));
            if let Err(e) = self.chat_store.append(request_json, response_json, Some(&batch_id)) {
                warn!(error = %e, request_id = %response.request_id, "failed to append chat history");
            }

            item.settle(Ok(response));
        }
    }
}
