//! Error types for the journal gateway

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while serving a journaling turn
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or missing request field
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Conversation does not belong to the requesting user
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Completion provider failed or returned an unusable response
    #[error("completion failed{}: {message}", fmt_status(.status))]
    CompletionFailed {
        /// HTTP status reported by the provider, if a response was received
        status: Option<u16>,
        message: String,
    },

    /// Speech provider failed or returned no audio
    #[error("speech synthesis failed{}: {message}", fmt_status(.status))]
    SpeechSynthesisFailed {
        /// HTTP status reported by the provider, if a response was received
        status: Option<u16>,
        message: String,
    },

    /// Transcription provider failed
    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),

    /// Persistence operation failed
    #[error("store failure: {0}")]
    Store(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<r2d2::Error> for Error {
    fn from(err: r2d2::Error) -> Self {
        Self::Store(format!("connection pool: {err}"))
    }
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

/// Bound a provider error body before it is echoed back to callers
pub(crate) fn body_excerpt(body: &str) -> String {
    const LIMIT: usize = 500;

    let body = body.trim();
    if body.is_empty() {
        return "empty response body".to_string();
    }
    match body.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
