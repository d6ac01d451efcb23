//! Danmaku error types.

use thiserror::Error;

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, DanmakuError>;

/// Errors that can occur while rendering session output.
#[derive(Error, Debug)]
pub enum DanmakuError {
    /// Event serialization errors
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
