//! A priority-lane batching gateway for LLM generation requests.
//!
//! Individual requests are enqueued into one of three priority lanes
//! (`HIGH`, `MEDIUM`, `LOW`), each with its own dispatch window and batch-size
//! cap. When a lane is ready, the dispatcher hands its prefix to the
//! [`processor::BatchProcessor`], which multiplexes every prompt in the batch
//! into a single combined call to the upstream model via the
//! [`llm::LlmGateway`], then fans the reply back out positionally to each
//! request's completion handle.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use batch_gateway::llm::{ClientConfig, HttpLlmBackend, LlmGateway};
//! use batch_gateway::settings::FileSettingsProvider;
//! use batch_gateway::chat_store::FileChatStore;
//! use batch_gateway::request_log::FileRequestLogger;
//! use batch_gateway::processor::BatchProcessor;
//! use batch_gateway::queue::QueueManager;
//! use batch_gateway::model::GenerationRequest;
//! use batch_gateway::priority::Priority;
//!
//! # async fn run() {
//! let backend = Arc::new(HttpLlmBackend::new(ClientConfig::new("https://upstream", "model")));
//! let request_logger = Arc::new(FileRequestLogger::new("logs/llm.log", "logs/individual.log"));
//! let gateway = Arc::new(LlmGateway::new(backend, request_logger.clone()));
//! let settings = Arc::new(FileSettingsProvider::new("data/settings.json"));
//! let chat_store = Arc::new(FileChatStore::new("data/chats.json"));
//! let processor = Arc::new(BatchProcessor::new(gateway, settings, chat_store, request_logger));
//! let manager = QueueManager::new(processor);
//!
//! let request = GenerationRequest::new("alice", "req-1", "What time is it?", Priority::High);
//! let rx = manager.enqueue(request).await;
//! let response = rx.await.unwrap().unwrap();
//! # }
//! ```

pub mod chat_store;
pub mod config;
pub mod error;
pub mod llm;
pub mod model;
pub mod priority;
pub mod processor;
pub mod queue;
pub mod request_log;
pub mod settings;

pub use error::{Error, Result};
pub use model::{GenerationRequest, GenerationResponse};
pub use priority::Priority;
