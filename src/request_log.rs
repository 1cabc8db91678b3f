//! Human-readable request/response logs, kept alongside the structured
//! `tracing` output for anyone tailing the raw upstream traffic or the
//! per-client history by hand.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::Result;
use crate::model::{GenerationRequest, GenerationResponse};

const SEPARATOR: &str = "================================================================================";
const RULE: &str = "----------------------------------------";

/// Best-effort append-only logging. A failure here must never fail the
/// request it's logging (spec.md §4.3 step 5); callers log-and-ignore.
pub trait RequestLogger: Send + Sync {
    /// One line for the combined prompt sent upstream and the raw reply.
    fn log_combined(&self, combined_request: &str, combined_response: &str) -> Result<()>;
    /// One line per individual request/response pair in a completed batch.
    fn log_individual(&self, request: &GenerationRequest, response: &GenerationResponse) -> Result<()>;
}

pub struct FileRequestLogger {
    combined_log_path: PathBuf,
    individual_log_path: PathBuf,
}

impl FileRequestLogger {
    pub fn new(combined_log_path: impl Into<PathBuf>, individual_log_path: impl Into<PathBuf>) -> Self {
        Self {
            combined_log_path: combined_log_path.into(),
            individual_log_path: individual_log_path.into(),
        }
    }

    fn append(path: &Path, text: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(text.as_bytes())?;
        Ok(())
    }
}

impl RequestLogger for FileRequestLogger {
    fn log_combined(&self, combined_request: &str, combined_response: &str) -> Result<()> {
        let ts = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let response = if combined_response.is_empty() {
            "(empty response)"
        } else {
            combined_response
        };
        let text = format!(
            "\n{SEPARATOR}\nLLM Request/Response — {ts}\n{SEPARATOR}\n\n\
             REQUEST (combined prompt sent to LLM):\n{RULE}\n{combined_request}\n\n\
             RESPONSE (raw response from LLM):\n{RULE}\n{response}\n"
        );
        Self::append(&self.combined_log_path, &text)
    }

    fn log_individual(&self, request: &GenerationRequest, response: &GenerationResponse) -> Result<()> {
        let ts = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let text = format!(
            "\n{SEPARATOR}\nIndividual Request/Response — {ts}\n{SEPARATOR}\n\n\
             REQUEST:\n{RULE}\n\
             \x20 request_id:  {}\n\
             \x20 username:    {}\n\
             \x20 priority:    {}\n\
             \x20 created_at:  {}\n\
             \x20 prompt:      {}\n\n\
             RESPONSE:\n{RULE}\n\
             \x20 request_id:  {}\n\
             \x20 tokens_used: {}\n\
             \x20 latency_ms:  {:.1}\n\
             \x20 completed_at:{}\n\
             \x20 text:        {}\n",
            request.request_id,
            request.username,
            request.priority,
            request.created_at,
            request.prompt,
            response.request_id,
            response.tokens_used,
            response.latency_ms,
            response.completed_at,
            response.text,
        );
        Self::append(&self.individual_log_path, &text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GenerationRequest;
    use crate::priority::Priority;
    use tempfile::tempdir;

    #[test]
    fn log_combined_appends_request_and_response() {
        let dir = tempdir().unwrap();
        let logger = FileRequestLogger::new(dir.path().join("llm.log"), dir.path().join("individual.log"));

        logger.log_combined("prompt text", "reply text").unwrap();
        let contents = std::fs::read_to_string(dir.path().join("llm.log")).unwrap();
        assert!(contents.contains("prompt text"));
        assert!(contents.contains("reply text"));
    }

    #[test]
    fn log_combined_handles_empty_response() {
        let dir = tempdir().unwrap();
        let logger = FileRequestLogger::new(dir.path().join("llm.log"), dir.path().join("individual.log"));
        logger.log_combined("prompt", "").unwrap();
        let contents = std::fs::read_to_string(dir.path().join("llm.log")).unwrap();
        assert!(contents.contains("(empty response)"));
    }

    #[test]
    fn log_individual_appends_both_sides() {
        let dir = tempdir().unwrap();
        let logger = FileRequestLogger::new(dir.path().join("llm.log"), dir.path().join("individual.log"));

        let request = GenerationRequest::new("alice", "req-1", "hello", Priority::High);
        let response = GenerationResponse::complete(&request, "hi there".to_string(), 10, Utc::now());
        logger.log_individual(&request, &response).unwrap();

        let contents = std::fs::read_to_string(dir.path().join("individual.log")).unwrap();
        assert!(contents.contains("req-1"));
        assert!(contents.contains("alice"));
        assert!(contents.contains("hi there"));
    }

    #[test]
    fn repeated_calls_append_rather_than_overwrite() {
        let dir = tempdir().unwrap();
        let logger = FileRequestLogger::new(dir.path().join("llm.log"), dir.path().join("individual.log"));
        logger.log_combined("first", "a").unwrap();
        logger.log_combined("second", "b").unwrap();
        let contents = std::fs::read_to_string(dir.path().join("llm.log")).unwrap();
        assert!(contents.contains("first"));
        assert!(contents.contains("second"));
    }
}
