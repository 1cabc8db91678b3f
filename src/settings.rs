//! Settings provider (spec.md §4.1, component C1): read-only access to
//! per-priority `{max_tokens, latency_ms}` thresholds and the upstream API
//! key. The settings file itself is owned by an external collaborator —
//! this module only reads it, fresh, on every call.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::priority::Priority;

/// Per-priority thresholds exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub max_tokens: u32,
    pub latency_ms: f64,
}

/// Read-only settings accessor. Implementations must observe the current
/// value on every call — no caching (spec.md §4.1).
pub trait SettingsProvider: Send + Sync {
    fn thresholds(&self, priority: Priority) -> Thresholds;
    fn api_key(&self) -> Option<String>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ThresholdRecord {
    tokens: u32,
    latency_ms: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SettingsFile {
    api_key: Option<String>,
    high_priority: Option<ThresholdRecord>,
    medium_priority: Option<ThresholdRecord>,
    low_priority: Option<ThresholdRecord>,
}

/// File-backed settings provider. Re-reads `path` on every call; a missing
/// or unparseable file falls back to the built-in defaults rather than
/// failing the caller.
pub struct FileSettingsProvider {
    path: PathBuf,
}

impl FileSettingsProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> SettingsFile {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!(path = %self.path.display(), error = %e, "failed to parse settings file, using defaults");
                SettingsFile::default()
            }),
            Err(_) => SettingsFile::default(),
        }
    }

    fn record_for(priority: Priority, file: &SettingsFile) -> Option<ThresholdRecord> {
        match priority {
            Priority::High => file.high_priority.clone(),
            Priority::Medium => file.medium_priority.clone(),
            Priority::Low => file.low_priority.clone(),
        }
    }
}

impl SettingsProvider for FileSettingsProvider {
    fn thresholds(&self, priority: Priority) -> Thresholds {
        let file = self.load();
        match Self::record_for(priority, &file) {
            Some(record) => Thresholds {
                max_tokens: record.tokens,
                latency_ms: record.latency_ms,
            },
            None => Thresholds {
                max_tokens: priority.default_max_tokens(),
                latency_ms: priority.default_latency_ms(),
            },
        }
    }

    fn api_key(&self) -> Option<String> {
        let key = self.load().api_key?;
        let trimmed = key.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

/// Write a settings file with the given fields, creating parent directories
/// as needed. Used by tests and by the settings-management surface that
/// owns this file (out of scope here; spec.md §2).
pub fn write_settings_file(
    path: &Path,
    api_key: Option<&str>,
    overrides: &[(Priority, Thresholds)],
) -> Result<()> {
    let mut file = SettingsFile {
        api_key: api_key.map(str::to_string),
        ..SettingsFile::default()
    };
    for (priority, thresholds) in overrides {
        let record = Some(ThresholdRecord {
            tokens: thresholds.max_tokens,
            latency_ms: thresholds.latency_ms,
        });
        match priority {
            Priority::High => file.high_priority = record,
            Priority::Medium => file.medium_priority = record,
            Priority::Low => file.low_priority = record,
        }
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_string_pretty(&file)?;
    std::fs::write(path, contents)?;
    Ok(())
}
