//! LogTransport - logs frame summaries via tracing ("render" mode)

use contracts::{ContractError, OutboundFrame, ViewerTransport};
use tracing::{debug, info, instrument};

use crate::protocol::{MESSAGE_DATA_HEADER_LEN, MESSAGE_DATA_OPCODE};

/// Transport that summarizes every frame instead of sending it anywhere
#[derive(Debug)]
pub struct LogTransport {
    name: String,
    text_frames: u64,
    binary_frames: u64,
    bytes: u64,
}

impl LogTransport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text_frames: 0,
            binary_frames: 0,
            bytes: 0,
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.text_frames + self.binary_frames
    }

    fn log_frame(&self, frame: &OutboundFrame) {
        match frame {
            OutboundFrame::Text(text) => {
                let op = serde_json::from_str::<serde_json::Value>(text)
                    .ok()
                    .and_then(|v| v.get("op").and_then(|op| op.as_str()).map(str::to_string))
                    .unwrap_or_default();
                info!(transport = %self.name, op = %op, bytes = text.len(), "Control frame");
            }
            OutboundFrame::Binary(data) => {
                let Some(header) = data.get(..MESSAGE_DATA_HEADER_LEN) else {
                    debug!(transport = %self.name, bytes = data.len(), "Short binary frame");
                    return;
                };
                let mut sub = [0u8; 4];
                sub.copy_from_slice(&header[1..5]);
                let mut log_time = [0u8; 8];
                log_time.copy_from_slice(&header[5..13]);
                debug!(
                    transport = %self.name,
                    opcode = header[0] == MESSAGE_DATA_OPCODE,
                    subscription = u32::from_le_bytes(sub),
                    log_time_ns = u64::from_le_bytes(log_time),
                    payload_bytes = data.len() - MESSAGE_DATA_HEADER_LEN,
                    "Message data"
                );
            }
        }
    }
}

impl ViewerTransport for LogTransport {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "log_transport_send", level = "trace", skip(self, frame), fields(transport = %self.name))]
    async fn send(&mut self, frame: OutboundFrame) -> Result<(), ContractError> {
        self.log_frame(&frame);
        self.bytes += frame.len() as u64;
        match frame {
            OutboundFrame::Text(_) => self.text_frames += 1,
            OutboundFrame::Binary(_) => self.binary_frames += 1,
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        // Nothing to flush for log transport
        Ok(())
    }

    #[instrument(name = "log_transport_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(
            transport = %self.name,
            control = self.text_frames,
            messages = self.binary_frames,
            bytes = self.bytes,
            "LogTransport closed"
        );
        Ok(())
    }
}
