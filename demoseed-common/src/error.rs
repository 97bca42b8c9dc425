//! Common error types for demoseed

use thiserror::Error;

/// Common result type for demoseed operations
pub type Result<T> = std::result::Result<T, Error>;

/// Longest payload excerpt attached to an error for diagnostics.
const SNIPPET_LIMIT: usize = 300;

/// Common error types across the seeding pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// No array-shaped JSON could be recovered from model output
    #[error("Extraction error: {reason}; text: {snippet}")]
    Extraction { reason: String, snippet: String },

    /// Remote application or model API failure
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Datastore operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted record file could not be written
    #[error("Data file error for {path}: {reason}")]
    DataFile { path: String, reason: String },

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A generated reference could not be mapped to a real identifier
    #[error("Resolution error: {0}")]
    Resolution(String),
}

/// Failures talking to remote HTTP services
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The service asked us to back off (HTTP 429/529)
    #[error("Rate limited ({status}): {message}")]
    RateLimited { status: u16, message: String },

    /// Non-success status from the service
    #[error("API error {status} from {endpoint}: {message}")]
    Api {
        endpoint: String,
        status: u16,
        message: String,
    },

    /// Transport-level failure before any status was received
    #[error("Network error: {0}")]
    Network(String),
}

impl Error {
    /// Build an extraction error carrying a bounded excerpt of the
    /// offending text.
    pub fn extraction(reason: impl Into<String>, text: &str) -> Self {
        Error::Extraction {
            reason: reason.into(),
            snippet: bounded_snippet(text, SNIPPET_LIMIT),
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::Remote(RemoteError::RateLimited { .. }))
    }
}

/// Truncate `text` to at most `limit` characters, marking the cut.
pub fn bounded_snippet(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let cut: String = text.chars().take(limit).collect();
    format!("{cut}...")
}
