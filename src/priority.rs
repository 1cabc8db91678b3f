//! Request priority: a closed, three-member enum with derived (not stored) attributes.
//!
//! Priority selects the lane, the upstream token budget, the style directive in
//! the combined prompt, and the sampling temperature. It never changes for a
//! given request once created.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Request priority. Ordered `HIGH > MEDIUM > LOW`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// Per-priority lane parameters: dispatch window and max batch size.
/// Constants of the core, not user-configurable (spec.md §4.4).
#[derive(Debug, Clone, Copy)]
pub struct LaneParams {
    pub window: Duration,
    pub max_batch: usize,
}

impl Priority {
    /// All members, in rank order (low to high).
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    /// Numeric rank, matching the source system's stored representation
    /// (`{2: HIGH, 1: MEDIUM, 0: LOW}`).
    pub fn rank(self) -> i64 {
        match self {
            Priority::High => 2,
            Priority::Medium => 1,
            Priority::Low => 0,
        }
    }

    /// Canonicalize from the stored numeric rank used at the HTTP/storage boundary.
    pub fn from_rank(rank: i64) -> Result<Self> {
        match rank {
            2 => Ok(Priority::High),
            1 => Ok(Priority::Medium),
            0 => Ok(Priority::Low),
            other => Err(Error::config(format!("unknown priority rank: {other}"))),
        }
    }

    /// Canonicalize from a case-insensitive name (`"high"`, `"Medium"`, `"LOW"`, ...).
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_uppercase().as_str() {
            "HIGH" => Ok(Priority::High),
            "MEDIUM" => Ok(Priority::Medium),
            "LOW" => Ok(Priority::Low),
            other => Err(Error::config(format!("unknown priority name: {other}"))),
        }
    }

    /// Display name (`HIGH`, `MEDIUM`, `LOW`) — used as the lookup key into settings.
    pub fn name(self) -> &'static str {
        match self {
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
        }
    }

    /// Default max output tokens for this priority (before any runtime override).
    pub fn default_max_tokens(self) -> u32 {
        match self {
            Priority::High => 512,
            Priority::Medium => 1024,
            Priority::Low => 2048,
        }
    }

    /// Client-visible latency target in milliseconds.
    pub fn default_latency_ms(self) -> f64 {
        match self {
            Priority::High => 100.0,
            Priority::Medium => 200.0,
            Priority::Low => 300.0,
        }
    }

    /// Style directive inserted into the combined prompt.
    pub fn style_directive(self) -> &'static str {
        match self {
            Priority::High => "very brief, 1-3 sentences each",
            Priority::Medium => "moderate, 2-5 sentences",
            Priority::Low => "comprehensive, with explanation",
        }
    }

    /// Sampling temperature for the upstream call.
    pub fn temperature(self) -> f64 {
        match self {
            Priority::High => 0.3,
            Priority::Medium => 0.5,
            Priority::Low => 0.7,
        }
    }

    /// Dispatcher lane parameters (window + max batch size).
    pub fn lane_params(self) -> LaneParams {
        match self {
            Priority::High => LaneParams {
                window: Duration::from_millis(200),
                max_batch: 6,
            },
            Priority::Medium => LaneParams {
                window: Duration::from_secs(1),
                max_batch: 4,
            },
            Priority::Low => LaneParams {
                window: Duration::from_secs(4),
                max_batch: 4,
            },
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Priority::from_name(s)
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
