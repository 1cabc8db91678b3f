//! LLM gateway: combined-prompt multiplexing of many individual requests into
//! one upstream call, and recovery of the per-request replies (spec.md §4.2).

mod client;
mod gateway;
mod parse;
mod prompt;
mod types;

pub use client::{ClientConfig, FailingLlmBackend, HttpLlmBackend, LlmBackend, MockLlmBackend};
pub use gateway::LlmGateway;
pub use parse::parse_batch_reply;
pub use prompt::{build_combined_prompt, output_token_budget};
pub use types::{UpstreamCompletion, UpstreamRequest};
