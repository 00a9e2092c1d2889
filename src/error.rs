//! Error types for Chunkvault

/// Result type alias for Chunkvault operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Chunkvault
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Metric definition lookup miss
    #[error("metric definition not found")]
    DefNotFound,
    /// Invalid caller input (bad range, malformed pattern, unknown enum value)
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Wide-column query failure during a read
    #[error("backend error: {0}")]
    Backend(String),
    /// Unreadable chunk payload or inconsistent persisted record
    #[error("corrupt data: {0}")]
    Corrupt(String),
    /// Caller-provided cancellation triggered
    #[error("operation canceled")]
    Canceled,
    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<regex::Error> for Error {
    fn from(e: regex::Error) -> Self {
        Error::BadRequest(format!("invalid pattern: {e}"))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::BadRequest(format!("invalid payload: {e}"))
    }
}
