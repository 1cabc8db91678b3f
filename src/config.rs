//! Process configuration: upstream connection details, file paths, and the
//! dispatcher tick. Loaded from a TOML file with environment-variable
//! overrides, in the same style as the file-backed settings store.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_base_url")]
    pub upstream_base_url: String,
    #[serde(default = "default_model")]
    pub upstream_model: String,
    #[serde(default = "default_timeout_secs")]
    pub upstream_timeout_secs: u64,
    pub api_key: Option<String>,

    #[serde(default = "default_settings_path")]
    pub settings_path: String,
    #[serde(default = "default_chat_store_path")]
    pub chat_store_path: String,
    #[serde(default = "default_request_log_path")]
    pub request_log_path: String,

    /// Dispatcher tick in milliseconds. `None` uses the core's built-in
    /// default (spec.md §4.4); tests override this to run the dispatcher
    /// loop faster than real time.
    pub dispatch_tick_ms: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            upstream_base_url: default_base_url(),
            upstream_model: default_model(),
            upstream_timeout_secs: default_timeout_secs(),
            api_key: None,
            settings_path: default_settings_path(),
            chat_store_path: default_chat_store_path(),
            request_log_path: default_request_log_path(),
            dispatch_tick_ms: None,
        }
    }
}

fn default_base_url() -> String {
    "https://api.upstream-llm.example/v1".to_string()
}
fn default_model() -> String {
    "default-model".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_settings_path() -> String {
    "data/settings.json".to_string()
}
fn default_chat_store_path() -> String {
    "data/chats.jsonl".to_string()
}
fn default_request_log_path() -> String {
    "data/requests.log".to_string()
}

impl AppConfig {
    /// Load from `path` if given, otherwise from `gateway.toml` in the
    /// current directory if present, otherwise built-in defaults.
    /// `GATEWAY_API_KEY` always overrides whatever the file contains.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let contents = std::fs::read_to_string(p)
                    .map_err(|e| Error::config(format!("failed to read config from {p}: {e}")))?;
                toml::from_str(&contents)
                    .map_err(|e| Error::config(format!("failed to parse config: {e}")))?
            }
            None => match std::fs::read_to_string("gateway.toml") {
                Ok(contents) => toml::from_str(&contents)
                    .map_err(|e| Error::config(format!("failed to parse config: {e}")))?,
                Err(_) => Self::default(),
            },
        };

        if let Ok(key) = std::env::var("GATEWAY_API_KEY") {
            config.api_key = Some(key);
        } else if config.api_key.is_some() {
            warn!("API key found in config file; prefer the GATEWAY_API_KEY environment variable");
        }

        Ok(config)
    }
}
