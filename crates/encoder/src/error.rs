//! Encoder errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Camera {channel} has no intrinsics")]
    MissingIntrinsics { channel: String },
}

pub type Result<T> = std::result::Result<T, EncodeError>;
