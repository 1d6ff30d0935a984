//! SessionHandle - one viewer connection with an isolated queue and worker task

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{ContractError, OutboundFrame, ViewerTransport};

use crate::metrics::SessionMetrics;
use crate::protocol::{message_data, Subscription, SubscriptionId};
use crate::registry::ChannelNumber;

/// Publisher-assigned connection identity
pub type SessionId = u64;

/// Session lifecycle: Connecting -> Active -> Draining -> Closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Connecting = 0,
    Active = 1,
    Draining = 2,
    Closed = 3,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SessionState::Connecting,
            1 => SessionState::Active,
            2 => SessionState::Draining,
            _ => SessionState::Closed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Connecting => "connecting",
            SessionState::Active => "active",
            SessionState::Draining => "draining",
            SessionState::Closed => "closed",
        }
    }
}

/// Lifecycle state shared between the publisher and the session worker
#[derive(Debug, Clone)]
struct SharedState(Arc<AtomicU8>);

impl SharedState {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(SessionState::Connecting as u8)))
    }

    fn get(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn transition(&self, from: SessionState, to: SessionState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Move to Draining unless the worker already closed the session
    fn drain(&self) {
        let _ = self.transition(SessionState::Connecting, SessionState::Draining)
            || self.transition(SessionState::Active, SessionState::Draining);
    }

    fn close(&self) {
        self.0.store(SessionState::Closed as u8, Ordering::Release);
    }
}

/// Work item for a session worker
#[derive(Debug)]
enum Outbound {
    /// JSON control frames written back to back
    Control(Vec<OutboundFrame>),
    /// Message data, framed by the worker
    Message {
        subscription: SubscriptionId,
        log_time_ns: u64,
        payload: Bytes,
    },
}

/// Result of handing one message to a session queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// Queue full; this message is lost for this session only
    Dropped,
    /// Worker gone; the session is draining
    Closed,
}

/// Handle to a running session worker
pub struct SessionHandle {
    id: SessionId,
    /// Transport name
    name: String,
    /// Queue into the worker (None once draining)
    tx: Option<mpsc::Sender<Outbound>>,
    state: SharedState,
    metrics: Arc<SessionMetrics>,
    worker_handle: JoinHandle<()>,
    /// Client subscription id -> channel
    subscriptions: HashMap<SubscriptionId, ChannelNumber>,
    /// Channel -> client subscription id
    by_channel: HashMap<ChannelNumber, SubscriptionId>,
    /// Channels whose latched message was already queued
    latched: HashSet<ChannelNumber>,
}

impl SessionHandle {
    /// Create a new SessionHandle and spawn the worker task
    pub fn spawn<T: ViewerTransport + 'static>(
        id: SessionId,
        transport: T,
        queue_capacity: usize,
    ) -> Self {
        let name = transport.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let state = SharedState::new();
        let metrics = Arc::new(SessionMetrics::new());

        let worker_state = state.clone();
        let worker_metrics = Arc::clone(&metrics);
        let worker_handle = tokio::spawn(async move {
            session_worker(transport, rx, worker_state, worker_metrics, id).await;
        });

        Self {
            id,
            name,
            tx: Some(tx),
            state,
            metrics,
            worker_handle,
            subscriptions: HashMap::new(),
            by_channel: HashMap::new(),
            latched: HashSet::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    pub fn is_closed(&self) -> bool {
        self.state() == SessionState::Closed
    }

    pub fn metrics(&self) -> &Arc<SessionMetrics> {
        &self.metrics
    }

    /// Queue the handshake and move Connecting -> Active.
    ///
    /// The queue is fresh at admission, so the single control item fits.
    pub fn activate(&mut self, handshake: Vec<OutboundFrame>) -> bool {
        match self.enqueue(Outbound::Control(handshake)) {
            Delivery::Queued => self
                .state
                .transition(SessionState::Connecting, SessionState::Active),
            _ => false,
        }
    }

    /// Queue JSON control frames (status, re-advertisement)
    pub fn send_control(&mut self, frames: Vec<OutboundFrame>) -> Delivery {
        self.enqueue(Outbound::Control(frames))
    }

    /// Queue one message for the subscription bound to `channel`.
    ///
    /// Never waits: a full queue drops the message for this session.
    pub fn deliver(&mut self, channel: ChannelNumber, log_time_ns: u64, payload: Bytes) -> Delivery {
        let Some(&subscription) = self.by_channel.get(&channel) else {
            return Delivery::Dropped;
        };
        self.enqueue(Outbound::Message {
            subscription,
            log_time_ns,
            payload,
        })
    }

    fn enqueue(&mut self, item: Outbound) -> Delivery {
        let Some(tx) = &self.tx else {
            return Delivery::Closed;
        };
        match tx.try_send(item) {
            Ok(()) => {
                self.metrics
                    .set_queue_len(tx.max_capacity() - tx.capacity());
                Delivery::Queued
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.metrics.inc_dropped_count();
                debug!(session = self.id, "Queue full, message dropped");
                Delivery::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(session = self.id, "Session worker gone, draining");
                self.begin_draining();
                Delivery::Closed
            }
        }
    }

    /// Bind a client subscription id to a channel
    pub fn subscribe(&mut self, subscription: Subscription) {
        if let Some(previous) = self.by_channel.insert(subscription.channel_id, subscription.id) {
            self.subscriptions.remove(&previous);
        }
        if let Some(old_channel) = self
            .subscriptions
            .insert(subscription.id, subscription.channel_id)
        {
            if old_channel != subscription.channel_id {
                self.by_channel.remove(&old_channel);
                self.latched.remove(&old_channel);
            }
        }
    }

    /// Release subscription ids; unknown ids are ignored
    pub fn unsubscribe(&mut self, ids: &[SubscriptionId]) {
        for id in ids {
            if let Some(channel) = self.subscriptions.remove(id) {
                self.by_channel.remove(&channel);
                self.latched.remove(&channel);
            }
        }
    }

    pub fn is_subscribed(&self, channel: ChannelNumber) -> bool {
        self.by_channel.contains_key(&channel)
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_latched(&self, channel: ChannelNumber) -> bool {
        self.latched.contains(&channel)
    }

    pub fn mark_latched(&mut self, channel: ChannelNumber) {
        self.latched.insert(channel);
    }

    /// Forget latched deliveries (new scene, new calibration)
    pub fn clear_latched(&mut self) {
        self.latched.clear();
    }

    /// Close the queue; the worker writes what is queued, flushes and closes
    pub fn begin_draining(&mut self) {
        self.state.drain();
        self.tx = None;
    }

    /// Close the queue and wait for the worker to finish
    #[instrument(name = "session_handle_shutdown", skip(self), fields(session = self.id))]
    pub async fn shutdown(mut self) {
        self.begin_draining();
        if let Err(e) = self.worker_handle.await {
            error!(session = self.id, error = ?e, "Worker task panicked");
        }
        debug!(session = self.id, "SessionHandle shutdown complete");
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state())
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

async fn write_item<T: ViewerTransport>(
    transport: &mut T,
    item: Outbound,
) -> Result<u64, ContractError> {
    match item {
        Outbound::Control(frames) => {
            let count = frames.len() as u64;
            for frame in frames {
                transport.send(frame).await?;
            }
            Ok(count)
        }
        Outbound::Message {
            subscription,
            log_time_ns,
            payload,
        } => {
            let frame = message_data(subscription, log_time_ns, &payload);
            transport.send(OutboundFrame::Binary(frame)).await?;
            Ok(1)
        }
    }
}

/// Worker task that drains the queue into the transport
#[instrument(name = "session_worker_loop", skip(transport, rx, state, metrics), fields(session = id))]
async fn session_worker<T: ViewerTransport>(
    mut transport: T,
    mut rx: mpsc::Receiver<Outbound>,
    state: SharedState,
    metrics: Arc<SessionMetrics>,
    id: SessionId,
) {
    debug!(session = id, transport = transport.name(), "Session worker started");

    while let Some(item) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        match write_item(&mut transport, item).await {
            Ok(frames) => {
                for _ in 0..frames {
                    metrics.inc_sent_count();
                }
            }
            Err(e) => {
                metrics.inc_failure_count();
                warn!(session = id, error = %e, "Write failed, draining session");
                break;
            }
        }
    }

    state.drain();
    rx.close();

    // One flush attempt, then close regardless
    if let Err(e) = transport.flush().await {
        debug!(session = id, error = %e, "Flush failed while draining");
    }
    if let Err(e) = transport.close().await {
        debug!(session = id, error = %e, "Close failed while draining");
    }

    state.close();
    debug!(session = id, "Session worker stopped");
}
