//! ViewerTransport trait - Stream Publisher output interface
//!
//! Defines the abstract write side of one viewer connection.

use bytes::Bytes;

use crate::ContractError;

/// One outbound protocol frame
#[derive(Debug, Clone)]
pub enum OutboundFrame {
    /// JSON control message (server info, advertisements, status)
    Text(String),
    /// Framed message data
    Binary(Bytes),
}

impl OutboundFrame {
    pub fn len(&self) -> usize {
        match self {
            OutboundFrame::Text(s) => s.len(),
            OutboundFrame::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Viewer connection write interface
///
/// All transport implementations must implement this trait.
#[trait_variant::make(ViewerTransport: Send)]
pub trait LocalViewerTransport {
    /// Transport name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one frame
    ///
    /// # Errors
    /// Returns `ContractError::SessionWriteFailure` when the peer is gone.
    async fn send(&mut self, frame: OutboundFrame) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close transport
    async fn close(&mut self) -> Result<(), ContractError>;
}
