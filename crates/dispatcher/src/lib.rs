//! # Dispatcher
//!
//! Stream publisher for viewer sessions.
//!
//! Responsibilities:
//! - Own the channel registry advertised to every viewer
//! - Admit sessions and apply subscription changes between ticks
//! - Fan out encoded messages without ever waiting on a session
//! - Isolate slow or broken viewers in their own queue and worker task

pub mod error;
pub mod metrics;
pub mod protocol;
pub mod publisher;
pub mod registry;
pub mod session;
pub mod transports;

pub use contracts::{OutboundFrame, ViewerTransport, WireMessage};
pub use error::PublisherError;
pub use metrics::{MetricsSnapshot, SessionMetrics};
pub use protocol::{ClientMessage, Status, Subscription, SubscriptionId, SUBPROTOCOL};
pub use publisher::{
    ControlEvent, PublishOutcome, PublisherStats, SessionConnector, SessionLink, StreamPublisher,
};
pub use registry::{ChannelNumber, ChannelRegistry, ChannelSpec};
pub use session::{Delivery, SessionHandle, SessionId, SessionState};
pub use transports::{serve, LogTransport, WebSocketServer, WebSocketTransport};
