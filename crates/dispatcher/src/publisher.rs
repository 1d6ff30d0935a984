//! StreamPublisher - viewer sessions and fan-out of encoded messages

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use contracts::{OutboundFrame, ServerConfig, ViewerTransport, WireMessage};

use crate::error::PublisherError;
use crate::metrics::MetricsSnapshot;
use crate::protocol::{
    Advertise, ClientMessage, ServerInfo, ServerMessage, Status, Subscription, SubscriptionId,
};
use crate::registry::ChannelRegistry;
use crate::session::{Delivery, SessionHandle, SessionId};

/// Connections allowed to wait for admission at once
pub const ADMISSION_CAPACITY: usize = 64;

/// Subscription change requested by a viewer, applied between ticks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    Subscribe {
        session: SessionId,
        subscriptions: Vec<Subscription>,
    },
    Unsubscribe {
        session: SessionId,
        subscription_ids: Vec<SubscriptionId>,
    },
    /// Client closed the connection
    Disconnect { session: SessionId },
}

/// Entry point for transports: turns a new connection into a pending session
#[derive(Clone)]
pub struct SessionConnector {
    registry: Arc<ChannelRegistry>,
    next_id: Arc<AtomicU64>,
    admission_tx: async_channel::Sender<SessionHandle>,
    control_tx: mpsc::UnboundedSender<ControlEvent>,
    queue_capacity: usize,
}

impl SessionConnector {
    /// Spawn the session worker and queue the session for admission.
    ///
    /// The session stays Connecting until the publisher admits it between
    /// two ticks.
    pub fn connect<T: ViewerTransport + 'static>(
        &self,
        transport: T,
    ) -> Result<SessionLink, PublisherError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = SessionHandle::spawn(id, transport, self.queue_capacity);

        match self.admission_tx.try_send(handle) {
            Ok(()) => {
                debug!(session = id, "Session queued for admission");
                Ok(SessionLink {
                    id,
                    registry: Arc::clone(&self.registry),
                    control_tx: self.control_tx.clone(),
                })
            }
            Err(async_channel::TrySendError::Full(mut handle)) => {
                handle.begin_draining();
                Err(PublisherError::AdmissionFull { session: id })
            }
            Err(async_channel::TrySendError::Closed(mut handle)) => {
                handle.begin_draining();
                Err(PublisherError::Closed)
            }
        }
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }
}

/// A transport's way back into the publisher for its own session
#[derive(Debug, Clone)]
pub struct SessionLink {
    id: SessionId,
    registry: Arc<ChannelRegistry>,
    control_tx: mpsc::UnboundedSender<ControlEvent>,
}

impl SessionLink {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Forward a parsed client message; false once the publisher is gone
    pub fn forward(&self, message: ClientMessage) -> bool {
        let event = match message {
            ClientMessage::Subscribe { subscriptions } => ControlEvent::Subscribe {
                session: self.id,
                subscriptions,
            },
            ClientMessage::Unsubscribe { subscription_ids } => ControlEvent::Unsubscribe {
                session: self.id,
                subscription_ids,
            },
            ClientMessage::Unsupported => {
                debug!(session = self.id, "Ignoring unsupported client op");
                return true;
            }
        };
        self.control_tx.send(event).is_ok()
    }

    /// Subscribe to every advertised channel, using channel ids as
    /// subscription ids
    pub fn subscribe_all(&self) -> bool {
        let subscriptions = self
            .registry
            .channels()
            .iter()
            .map(|spec| Subscription {
                id: spec.id,
                channel_id: spec.id,
            })
            .collect();
        self.forward(ClientMessage::Subscribe { subscriptions })
    }

    pub fn disconnect(&self) {
        let _ = self.control_tx.send(ControlEvent::Disconnect { session: self.id });
    }
}

/// Fan-out result of one message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOutcome {
    pub delivered: usize,
    pub dropped: usize,
    pub closed: usize,
}

/// Lifetime totals of the publisher
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublisherStats {
    pub admitted: u64,
    pub reaped: u64,
    pub messages: u64,
    pub delivered: u64,
    pub dropped: u64,
}

/// Owns every viewer session and the channel registry
pub struct StreamPublisher {
    name: String,
    registry: Arc<ChannelRegistry>,
    sessions: BTreeMap<SessionId, SessionHandle>,
    admission_rx: async_channel::Receiver<SessionHandle>,
    control_rx: mpsc::UnboundedReceiver<ControlEvent>,
    connector: SessionConnector,
    /// Pre-serialized `advertise` (the registry never changes)
    advertise: String,
    stats: PublisherStats,
}

impl StreamPublisher {
    pub fn new(registry: ChannelRegistry, config: &ServerConfig) -> Result<Self, PublisherError> {
        let registry = Arc::new(registry);
        let advertise = ServerMessage::Advertise(Advertise::from_registry(&registry)).to_json()?;
        let (admission_tx, admission_rx) = async_channel::bounded(ADMISSION_CAPACITY);
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        let connector = SessionConnector {
            registry: Arc::clone(&registry),
            next_id: Arc::new(AtomicU64::new(1)),
            admission_tx,
            control_tx,
            queue_capacity: config.session_queue_capacity,
        };

        info!(
            channels = registry.len(),
            queue_capacity = config.session_queue_capacity,
            "Stream publisher created"
        );

        Ok(Self {
            name: config.name.clone(),
            registry,
            sessions: BTreeMap::new(),
            admission_rx,
            control_rx,
            connector,
            advertise,
            stats: PublisherStats::default(),
        })
    }

    pub fn connector(&self) -> SessionConnector {
        self.connector.clone()
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    pub fn stats(&self) -> PublisherStats {
        self.stats
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn active_session_count(&self) -> usize {
        self.sessions.values().filter(|s| s.is_active()).count()
    }

    pub fn session_metrics(&self) -> Vec<(SessionId, MetricsSnapshot)> {
        self.sessions
            .iter()
            .map(|(id, s)| (*id, s.metrics().snapshot()))
            .collect()
    }

    /// Admit every waiting session: send server info and the channel
    /// advertisement, then mark it Active. Call between ticks only.
    #[instrument(name = "publisher_admit_pending", skip(self))]
    pub fn admit_pending(&mut self) -> usize {
        let mut admitted = 0;

        while let Ok(mut handle) = self.admission_rx.try_recv() {
            let id = handle.id();
            let server_info = match ServerMessage::ServerInfo(ServerInfo::new(&self.name, id)).to_json() {
                Ok(json) => json,
                Err(e) => {
                    warn!(session = id, error = %e, "Failed to encode server info");
                    handle.begin_draining();
                    self.sessions.insert(id, handle);
                    continue;
                }
            };

            let handshake = vec![
                OutboundFrame::Text(server_info),
                OutboundFrame::Text(self.advertise.clone()),
            ];
            if handle.activate(handshake) {
                info!(session = id, transport = handle.name(), "Session admitted");
                admitted += 1;
            } else {
                warn!(session = id, "Session closed before admission");
                handle.begin_draining();
            }
            self.sessions.insert(id, handle);
        }

        self.stats.admitted += admitted as u64;
        admitted
    }

    /// Apply queued subscribe / unsubscribe / disconnect events. Call
    /// between ticks only; each event touches only its own session.
    pub fn apply_control(&mut self) -> usize {
        let mut applied = 0;

        while let Ok(event) = self.control_rx.try_recv() {
            applied += 1;
            match event {
                ControlEvent::Subscribe {
                    session,
                    subscriptions,
                } => {
                    let Some(handle) = self.sessions.get_mut(&session) else {
                        debug!(session, "Subscribe for unknown session");
                        continue;
                    };
                    for sub in subscriptions {
                        match self.registry.get(sub.channel_id) {
                            Some(spec) => {
                                debug!(session, topic = %spec.topic, subscription = sub.id, "Subscribed");
                                handle.subscribe(sub);
                            }
                            None => {
                                warn!(session, channel = sub.channel_id, "Subscribe to unknown channel");
                            }
                        }
                    }
                }
                ControlEvent::Unsubscribe {
                    session,
                    subscription_ids,
                } => {
                    if let Some(handle) = self.sessions.get_mut(&session) {
                        handle.unsubscribe(&subscription_ids);
                    }
                }
                ControlEvent::Disconnect { session } => {
                    if let Some(handle) = self.sessions.get_mut(&session) {
                        info!(session, "Client disconnected, draining");
                        handle.begin_draining();
                    }
                }
            }
        }

        applied
    }

    /// Fan out one message to every Active session subscribed to its topic.
    ///
    /// Never waits on a session: a full queue drops the message for that
    /// session only.
    #[instrument(name = "publisher_publish", level = "trace", skip_all, fields(topic = %message.topic))]
    pub fn publish(&mut self, message: &WireMessage) -> PublishOutcome {
        self.fan_out(message, false)
    }

    /// Deliver a static message once per session per topic, at the first
    /// tick the session is subscribed.
    #[instrument(name = "publisher_publish_latched", level = "trace", skip_all, fields(topic = %message.topic))]
    pub fn publish_latched(&mut self, message: &WireMessage) -> PublishOutcome {
        self.fan_out(message, true)
    }

    fn fan_out(&mut self, message: &WireMessage, latched: bool) -> PublishOutcome {
        let mut outcome = PublishOutcome::default();
        let Some(channel) = self.registry.id_of(&message.topic) else {
            debug!(topic = %message.topic, "Topic not in registry");
            return outcome;
        };
        let log_time_ns = message.log_time.as_nanos();

        for session in self.sessions.values_mut() {
            if !session.is_active() || !session.is_subscribed(channel) {
                continue;
            }
            if latched && session.is_latched(channel) {
                continue;
            }
            match session.deliver(channel, log_time_ns, message.payload.clone()) {
                Delivery::Queued => {
                    outcome.delivered += 1;
                    if latched {
                        session.mark_latched(channel);
                    }
                }
                Delivery::Dropped => outcome.dropped += 1,
                Delivery::Closed => outcome.closed += 1,
            }
        }

        self.stats.messages += 1;
        self.stats.delivered += outcome.delivered as u64;
        self.stats.dropped += outcome.dropped as u64;
        outcome
    }

    /// Forget latched deliveries so the next `publish_latched` goes out again
    pub fn reset_latched(&mut self) {
        for session in self.sessions.values_mut() {
            session.clear_latched();
        }
    }

    /// Send a `status` message to every Active session
    pub fn broadcast_status(&mut self, status: Status) -> usize {
        let json = match ServerMessage::Status(status).to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to encode status");
                return 0;
            }
        };
        self.sessions
            .values_mut()
            .filter(|s| s.is_active())
            .map(|s| s.send_control(vec![OutboundFrame::Text(json.clone())]))
            .filter(|d| *d == Delivery::Queued)
            .count()
    }

    /// Remove Closed sessions and release their subscriptions
    pub fn reap_closed(&mut self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|id, session| {
            let closed = session.is_closed();
            if closed {
                let m = session.metrics().snapshot();
                info!(
                    session = id,
                    sent = m.sent_count,
                    dropped = m.dropped_count,
                    failures = m.failure_count,
                    "Session reaped"
                );
            }
            !closed
        });
        let reaped = before - self.sessions.len();
        self.stats.reaped += reaped as u64;
        reaped
    }

    /// Close every session queue and wait for each worker to drain
    #[instrument(name = "publisher_shutdown", skip(self))]
    pub async fn shutdown(mut self) {
        self.admission_rx.close();
        while let Ok(handle) = self.admission_rx.try_recv() {
            handle.shutdown().await;
        }

        let sessions = std::mem::take(&mut self.sessions);
        info!(sessions = sessions.len(), "Stream publisher shutting down");
        for (_, handle) in sessions {
            handle.shutdown().await;
        }

        info!(
            admitted = self.stats.admitted,
            delivered = self.stats.delivered,
            dropped = self.stats.dropped,
            "Stream publisher shutdown complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use contracts::{ContractError, Modality, Timestamp, Topic};
    use std::sync::Mutex;
    use tokio::time::{sleep, Duration};

    #[derive(Clone, Default)]
    struct MockTransport {
        frames: Arc<Mutex<Vec<OutboundFrame>>>,
    }

    impl ViewerTransport for MockTransport {
        fn name(&self) -> &str {
            "mock"
        }

        async fn send(&mut self, frame: OutboundFrame) -> Result<(), ContractError> {
            self.frames.lock().unwrap().push(frame);
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    fn publisher() -> StreamPublisher {
        let registry = ChannelRegistry::for_sensors([
            ("CAMERA_FRONT", Modality::Camera),
            ("LIDAR_LEFT", Modality::Lidar),
        ]);
        StreamPublisher::new(registry, &ServerConfig::default()).unwrap()
    }

    fn message(topic: Topic) -> WireMessage {
        WireMessage {
            topic,
            log_time: Timestamp::from_micros(1),
            payload: Bytes::from_static(b"{}"),
        }
    }

    #[tokio::test]
    async fn test_session_sees_nothing_before_admission() {
        let mut publisher = publisher();
        let transport = MockTransport::default();
        let frames = Arc::clone(&transport.frames);
        let link = publisher.connector().connect(transport).unwrap();
        link.subscribe_all();

        // not admitted yet
        assert_eq!(publisher.publish(&message(Topic::Transforms)).delivered, 0);

        assert_eq!(publisher.admit_pending(), 1);
        assert_eq!(publisher.apply_control(), 1);
        assert_eq!(publisher.publish(&message(Topic::Transforms)).delivered, 1);

        publisher.shutdown().await;
        let frames = frames.lock().unwrap();
        // serverInfo, advertise, one message
        assert_eq!(frames.len(), 3);
        assert!(matches!(&frames[0], OutboundFrame::Text(t) if t.contains("serverInfo")));
        assert!(matches!(&frames[1], OutboundFrame::Text(t) if t.contains("advertise")));
    }

    #[tokio::test]
    async fn test_only_subscribed_topics_delivered() {
        let mut publisher = publisher();
        let link = publisher.connector().connect(MockTransport::default()).unwrap();
        publisher.admit_pending();

        let lidar = publisher
            .registry()
            .id_of(&Topic::Lidar("LIDAR_LEFT".into()))
            .unwrap();
        link.forward(ClientMessage::Subscribe {
            subscriptions: vec![Subscription { id: 9, channel_id: lidar }],
        });
        publisher.apply_control();

        assert_eq!(publisher.publish(&message(Topic::Lidar("LIDAR_LEFT".into()))).delivered, 1);
        assert_eq!(publisher.publish(&message(Topic::Annotations)).delivered, 0);

        link.forward(ClientMessage::Unsubscribe { subscription_ids: vec![9] });
        publisher.apply_control();
        assert_eq!(publisher.publish(&message(Topic::Lidar("LIDAR_LEFT".into()))).delivered, 0);

        publisher.shutdown().await;
    }

    #[tokio::test]
    async fn test_latched_once_per_session() {
        let mut publisher = publisher();
        let link = publisher.connector().connect(MockTransport::default()).unwrap();
        link.subscribe_all();
        publisher.admit_pending();
        publisher.apply_control();

        let info = message(Topic::CameraInfo("CAMERA_FRONT".into()));
        assert_eq!(publisher.publish_latched(&info).delivered, 1);
        assert_eq!(publisher.publish_latched(&info).delivered, 0);

        publisher.reset_latched();
        assert_eq!(publisher.publish_latched(&info).delivered, 1);

        publisher.shutdown().await;
    }

    #[tokio::test]
    async fn test_disconnect_then_reap() {
        let mut publisher = publisher();
        let link = publisher.connector().connect(MockTransport::default()).unwrap();
        publisher.admit_pending();
        assert_eq!(publisher.active_session_count(), 1);

        link.disconnect();
        publisher.apply_control();
        assert_eq!(publisher.active_session_count(), 0);

        let mut reaped = 0;
        for _ in 0..50 {
            reaped += publisher.reap_closed();
            if reaped > 0 {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(reaped, 1);
        assert_eq!(publisher.session_count(), 0);

        publisher.shutdown().await;
    }

    #[tokio::test]
    async fn test_connect_after_publisher_dropped() {
        let publisher = publisher();
        let connector = publisher.connector();
        publisher.shutdown().await;
        assert!(matches!(
            connector.connect(MockTransport::default()),
            Err(PublisherError::Closed)
        ));
    }
}
