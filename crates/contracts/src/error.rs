//! Layered error definitions
//!
//! Categorized by containment boundary: transform / sync / session / scene / config

use thiserror::Error;

use crate::{ChannelId, Timestamp};

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Transform Errors =====
    /// Ego pose interpolation requested outside the recorded pose range
    #[error(
        "timestamp {timestamp} outside ego pose range [{first}, {last}] for frame '{frame_id}'"
    )]
    OutOfRangeTimestamp {
        frame_id: String,
        timestamp: Timestamp,
        first: Timestamp,
        last: Timestamp,
    },

    /// Frame id has no calibration in the loaded scene
    #[error("unknown frame '{frame_id}'")]
    UnknownFrame { frame_id: String },

    // ===== Sync Errors =====
    /// Latest sample for a channel is older than the staleness bound
    #[error("stale sample on '{channel}': age {age_us}us exceeds {max_us}us")]
    StaleSample {
        channel: ChannelId,
        age_us: u64,
        max_us: u64,
    },

    // ===== Session Errors =====
    /// Write to a viewer session failed
    #[error("session '{session}' write failure: {message}")]
    SessionWriteFailure { session: String, message: String },

    // ===== Scene Errors =====
    /// The sample store could not supply the requested scene
    #[error("scene load failure for '{selector}': {message}")]
    SceneLoadFailure { selector: String, message: String },

    /// Opaque payload decoder rejected a record
    #[error("payload decode error for channel '{channel}': {message}")]
    PayloadDecode { channel: String, message: String },

    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create session write error
    pub fn session_write(session: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SessionWriteFailure {
            session: session.into(),
            message: message.into(),
        }
    }

    /// Create scene load error
    pub fn scene_load(selector: impl ToString, message: impl Into<String>) -> Self {
        Self::SceneLoadFailure {
            selector: selector.to_string(),
            message: message.into(),
        }
    }

    /// Create payload decode error
    pub fn payload_decode(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PayloadDecode {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// Stable short label for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OutOfRangeTimestamp { .. } => "out_of_range_timestamp",
            Self::UnknownFrame { .. } => "unknown_frame",
            Self::StaleSample { .. } => "stale_sample",
            Self::SessionWriteFailure { .. } => "session_write_failure",
            Self::SceneLoadFailure { .. } => "scene_load_failure",
            Self::PayloadDecode { .. } => "payload_decode",
            Self::ConfigParse { .. } => "config_parse",
            Self::ConfigValidation { .. } => "config_validation",
            Self::Io(_) => "io",
            Self::Other(_) => "other",
        }
    }
}
