//! SHOWROOM client error types.

use thiserror::Error;

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, ShowroomError>;

#[derive(Debug, Error)]
pub enum ShowroomError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status: {0}")]
    Status(reqwest::StatusCode),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// The room has no connection token; the listing was stale.
    #[error("room is not on live")]
    NotLive,
    #[error("connection error: {0}")]
    Connection(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShowroomError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }
}
