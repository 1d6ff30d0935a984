//! Stream publisher error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublisherError {
    /// The publisher is gone; no more sessions are admitted
    #[error("stream publisher is closed")]
    Closed,

    /// Too many connections waiting for admission
    #[error("admission queue full, session {session} rejected")]
    AdmissionFull { session: u64 },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("session error: {0}")]
    Contract(#[from] contracts::ContractError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
