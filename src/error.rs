//! Error types for the batching gateway.

use thiserror::Error;

/// Result type alias using the gateway's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while batching and dispatching generation requests.
#[derive(Error, Debug)]
pub enum Error {
    /// The upstream LLM call itself failed (network, auth, quota, SDK exception).
    /// Propagated to every item in the batch that triggered it.
    #[error("upstream error: {message}")]
    Upstream { message: String },

    /// A side effect (chat-store append, log write) failed. Logged at WARN and
    /// discarded — never propagated to a waiting client.
    #[error("side effect failed: {0}")]
    SideEffect(String),

    /// Settings or config file could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem I/O error, surfaced from the chat store, request log, or
    /// settings/config file readers.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal invariant violation — should not happen in correct operation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an upstream error.
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    /// Create a side-effect error.
    pub fn side_effect(message: impl Into<String>) -> Self {
        Self::SideEffect(message.into())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Re-create an equivalent error for settling a second (or third, ...)
    /// handle with "the same" failure. `Serialization`/`Io` aren't `Clone`
    /// upstream, so this degrades them to their message text rather than
    /// cloning the whole crate — every item in a failed batch still sees
    /// the same text, which is all spec.md §4.3 step 2 requires.
    pub fn clone_for_batch(&self) -> Self {
        match self {
            Self::Upstream { message } => Self::Upstream { message: message.clone() },
            Self::SideEffect(m) => Self::SideEffect(m.clone()),
            Self::Config(m) => Self::Config(m.clone()),
            Self::Serialization(e) => Self::Internal(e.to_string()),
            Self::Io(e) => Self::Internal(e.to_string()),
            Self::Internal(m) => Self::Internal(m.clone()),
        }
    }
}
