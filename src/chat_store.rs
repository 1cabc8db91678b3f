//! Chat history persistence and analytics roll-ups.
//!
//! An external collaborator owns the HTTP surface for browsing this data
//! (spec.md §2, Out of scope); the batch processor only appends to it as a
//! best-effort side effect. Kept here because it is this crate's only
//! caller and the analytics roll-up doubles as a debugging aid during
//! development.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::Result;
use crate::priority::Priority;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEntry {
    pub timestamp: DateTime<Utc>,
    pub batch_id: Option<String>,
    pub request: Value,
    pub response: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriorityCount {
    pub name: &'static str,
    pub value: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestsOnDate {
    pub date: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Analytics {
    pub total_requests: usize,
    pub high_priority: usize,
    pub medium_priority: usize,
    pub low_priority: usize,
    pub request_count_over_time: Vec<RequestsOnDate>,
    pub priority_distribution: Vec<PriorityCount>,
}

/// Append-and-read access to the chat history. A failure to append must
/// never be surfaced to a waiting client — callers log it and move on
/// (spec.md §4.3 step 5).
pub trait ChatStore: Send + Sync {
    fn append(&self, request: Value, response: Value, batch_id: Option<&str>) -> Result<()>;
    fn get_chats(&self) -> Result<Vec<ChatEntry>>;
    fn get_analytics(&self) -> Result<Analytics>;
}

/// Whole-file JSON array store: read, append, write back. Simple and
/// adequate at the traffic this crate's batching is designed for; a
/// database-backed store would be a drop-in replacement behind the same
/// trait.
pub struct FileChatStore {
    path: PathBuf,
}

impl FileChatStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Vec<ChatEntry> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!(path = %self.path.display(), error = %e, "failed to parse chat store, treating as empty");
                Vec::new()
            }),
            Err(_) => Vec::new(),
        }
    }

    fn save(&self, entries: &[ChatEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

impl ChatStore for FileChatStore {
    fn append(&self, request: Value, response: Value, batch_id: Option<&str>) -> Result<()> {
        let mut entries = self.load();
        entries.push(ChatEntry {
            timestamp: Utc::now(),
            batch_id: batch_id.map(str::to_string),
            request,
            response,
        });
        self.save(&entries)
    }

    fn get_chats(&self) -> Result<Vec<ChatEntry>> {
        Ok(self.load())
    }

    fn get_analytics(&self) -> Result<Analytics> {
        let chats = self.load();

        let mut batches: HashMap<String, Vec<&ChatEntry>> = HashMap::new();
        for (i, entry) in chats.iter().enumerate() {
            let key = entry.batch_id.clone().unwrap_or_else(|| format!("legacy_{i}"));
            batches.entry(key).or_default().push(entry);
        }

        let mut high = 0usize;
        let mut medium = 0usize;
        let mut low = 0usize;
        let mut by_date: HashMap<String, usize> = HashMap::new();

        for entries in batches.values() {
            let Some(first) = entries.first() else { continue };
            match normalize_priority(&first.request) {
                Priority::High => high += 1,
                Priority::Low => low += 1,
                Priority::Medium => medium += 1,
            }
            let date = first.timestamp.format("%Y-%m-%d").to_string();
            *by_date.entry(date).or_insert(0) += 1;
        }

        let mut dates: Vec<&String> = by_date.keys().collect();
        dates.sort();
        let request_count_over_time = dates
            .into_iter()
            .map(|d| RequestsOnDate {
                date: d.clone(),
                count: by_date[d],
            })
            .collect();

        Ok(Analytics {
            total_requests: batches.len(),
            high_priority: high,
            medium_priority: medium,
            low_priority: low,
            request_count_over_time,
            priority_distribution: vec![
                PriorityCount { name: "High", value: high },
                PriorityCount { name: "Medium", value: medium },
                PriorityCount { name: "Low", value: low },
            ],
        })
    }
}

/// Recover a priority from whatever the stored request JSON happens to
/// carry — an integer rank, a name string, or neither — defaulting to
/// MEDIUM like the source system does (spec.md §2 glossary: priority is
/// canonicalized from either representation at system boundaries).
fn normalize_priority(request: &Value) -> Priority {
    match request.get("priority") {
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|r| Priority::from_rank(r).ok())
            .unwrap_or(Priority::Medium),
        Some(Value::String(s)) => Priority::from_name(s).unwrap_or(Priority::Medium),
        _ => Priority::Medium,
    }
}
