//! Transport implementations
//!
//! Contains the foxglove WebSocket transport and the console log transport.

mod log;
mod websocket;

pub use self::log::LogTransport;
pub use self::websocket::{serve, WebSocketServer, WebSocketTransport};
