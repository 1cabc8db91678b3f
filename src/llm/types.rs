//! Wire-level types for one combined upstream call.

/// One combined-prompt request sent to the upstream vendor.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub combined_prompt: String,
    pub max_output_tokens: u32,
    pub temperature: f64,
    /// Resolved once per batch from the Settings collaborator
    /// (spec.md §6, "Outbound to Settings collaborator ... Called at least
    /// once per batch"); `None` means no key is configured.
    pub api_key: Option<String>,
}

/// The raw text + usage metadata returned by one upstream call, before any
/// JSON-array parsing is applied.
#[derive(Debug, Clone)]
pub struct UpstreamCompletion {
    pub text: String,
    pub total_tokens: u64,
}
