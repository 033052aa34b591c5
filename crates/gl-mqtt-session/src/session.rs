//! MQTT session: async pub/sub transport for GridLink flows.
//!
//! Wraps `rumqttc::AsyncClient` behind the [`Session`] trait. Two things
//! distinguish it from a bare client:
//! - `subscribe` resolves only once the broker's SUBACK has been observed,
//!   so a caller that publishes after subscribing cannot miss a fast reply.
//! - Inbound publishes are demultiplexed by exact topic name into per-topic
//!   [`TopicStream`]s.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, SubscribeReasonCode};
use tokio::sync::{Mutex, mpsc, oneshot};

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::tls;

/// Inbound messages buffered per topic before delivery drops them.
const STREAM_CAPACITY: usize = 16;

// ── Session trait ─────────────────────────────────────────────

/// Abstraction over one pub/sub connection.
///
/// Enables mocking in tests without a real MQTT broker.
#[async_trait]
pub trait Session: Send + Sync {
    /// Subscribe to a topic. Returns only after the broker has acknowledged
    /// the subscription; every message arriving afterwards is readable from
    /// the returned stream.
    async fn subscribe(&self, topic: &str, qos: QoS) -> SessionResult<TopicStream>;

    /// Publish a raw payload to a topic.
    async fn publish(&self, topic: &str, payload: &[u8], qos: QoS) -> SessionResult<()>;

    /// Drop the subscription for a topic. Its stream stops receiving.
    async fn unsubscribe(&self, topic: &str) -> SessionResult<()>;
}

// ── TopicStream ───────────────────────────────────────────────

/// Ordered inbound payloads for one subscribed topic.
pub struct TopicStream {
    topic: String,
    rx: mpsc::Receiver<Vec<u8>>,
}

impl TopicStream {
    pub(crate) fn new(topic: String, rx: mpsc::Receiver<Vec<u8>>) -> Self {
        Self { topic, rx }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next payload, or `None` once the session is closed or the
    /// subscription was dropped.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }
}

// ── Shared session state ──────────────────────────────────────

#[derive(Default)]
struct Shared {
    /// Exact topic name to the delivery side of its stream.
    routes: Mutex<HashMap<String, mpsc::Sender<Vec<u8>>>>,
    /// Subscribe calls awaiting a SUBACK, in wire order. MQTT 3.1.1 brokers
    /// acknowledge subscriptions in order, so FIFO matching is sound.
    pending_subacks: Mutex<VecDeque<oneshot::Sender<SessionResult<()>>>>,
    /// Held across [enqueue waiter + send SUBSCRIBE] so the FIFO order
    /// matches the wire order even with concurrent subscribers.
    subscribe_serial: Mutex<()>,
    closed: AtomicBool,
}

impl Shared {
    async fn route(&self, topic: &str, payload: Vec<u8>) {
        let routes = self.routes.lock().await;
        match routes.get(topic) {
            Some(tx) => {
                if let Err(e) = tx.try_send(payload) {
                    tracing::warn!(topic = topic, error = %e, "dropping inbound message, stream full or gone");
                }
            }
            None => {
                tracing::debug!(topic = topic, "dropping inbound message for unroutable topic");
            }
        }
    }

    async fn resolve_suback(&self, result: SessionResult<()>) {
        match self.pending_subacks.lock().await.pop_front() {
            Some(waiter) => {
                let _ = waiter.send(result);
            }
            None => tracing::warn!("suback with no pending subscribe"),
        }
    }

    async fn fail_pending(&self, reason: &str) {
        let mut pending = self.pending_subacks.lock().await;
        while let Some(waiter) = pending.pop_front() {
            let _ = waiter.send(Err(SessionError::Connection(reason.to_string())));
        }
    }
}

// ── MqttSession ───────────────────────────────────────────────

/// MQTT session connected to AWS IoT Core.
///
/// Owns the `AsyncClient`. The [`SessionDriver`] is returned separately
/// from `connect()` and must be spawned by the caller.
pub struct MqttSession {
    client: AsyncClient,
    shared: Arc<Shared>,
}

impl MqttSession {
    /// Open a session using the configured transport (mTLS unless
    /// `use_tls` is off for local development).
    ///
    /// Returns `(session, driver)`. The caller must run the driver:
    /// ```ignore
    /// let (session, driver) = MqttSession::connect(&config)?;
    /// tokio::spawn(driver.run());
    /// ```
    pub fn connect(config: &SessionConfig) -> SessionResult<(Self, SessionDriver)> {
        let mut options =
            MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(Duration::from_secs(config.keepalive_secs.into()));

        if config.use_tls {
            let transport = tls::load_tls_transport(config)?;
            options.set_transport(transport);
        }

        let (client, eventloop) = AsyncClient::new(options, 64);
        let shared = Arc::new(Shared::default());

        Ok((
            Self {
                client,
                shared: Arc::clone(&shared),
            },
            SessionDriver { eventloop, shared },
        ))
    }

    /// Close the connection. The driver exits once the broker sees the
    /// disconnect; all topic streams end.
    pub async fn disconnect(&self) -> SessionResult<()> {
        self.shared.closed.store(true, Ordering::SeqCst);
        self.client
            .disconnect()
            .await
            .map_err(|e| SessionError::Connection(e.to_string()))
    }

    fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Session for MqttSession {
    async fn subscribe(&self, topic: &str, qos: QoS) -> SessionResult<TopicStream> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }

        let (tx, rx) = mpsc::channel(STREAM_CAPACITY);
        self.shared
            .routes
            .lock()
            .await
            .insert(topic.to_string(), tx);

        let ack = {
            let _serial = self.shared.subscribe_serial.lock().await;
            let (ack_tx, ack_rx) = oneshot::channel();
            self.shared.pending_subacks.lock().await.push_back(ack_tx);

            if let Err(e) = self.client.subscribe(topic, qos).await {
                // Our waiter is the most recent push; nobody else can push
                // while the serial lock is held.
                self.shared.pending_subacks.lock().await.pop_back();
                self.shared.routes.lock().await.remove(topic);
                return Err(SessionError::Subscribe(e.to_string()));
            }

            // The driver drains all waiters when the event loop dies; a
            // waiter pushed after that drain would never resolve. If the
            // session closed since the entry check, clean up our own push
            // (still the newest, the serial lock is held) and bail.
            if self.is_closed() {
                self.shared.pending_subacks.lock().await.pop_back();
                self.shared.routes.lock().await.remove(topic);
                return Err(SessionError::Closed);
            }
            ack_rx
        };

        match ack.await {
            Ok(Ok(())) => Ok(TopicStream::new(topic.to_string(), rx)),
            Ok(Err(e)) => {
                self.shared.routes.lock().await.remove(topic);
                Err(e)
            }
            Err(_) => {
                self.shared.routes.lock().await.remove(topic);
                Err(SessionError::Closed)
            }
        }
    }

    async fn publish(&self, topic: &str, payload: &[u8], qos: QoS) -> SessionResult<()> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        self.client
            .publish(topic, qos, false, payload)
            .await
            .map_err(|e| SessionError::Publish(e.to_string()))
    }

    async fn unsubscribe(&self, topic: &str) -> SessionResult<()> {
        self.shared.routes.lock().await.remove(topic);
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        self.client
            .unsubscribe(topic)
            .await
            .map_err(|e| SessionError::Unsubscribe(e.to_string()))
    }
}

// ── SessionDriver ─────────────────────────────────────────────

/// Drives the rumqttc event loop: routes inbound publishes to topic
/// streams and resolves pending subscribe acknowledgements.
pub struct SessionDriver {
    eventloop: EventLoop,
    shared: Arc<Shared>,
}

impl SessionDriver {
    /// Run until the connection closes. A connection error is terminal for
    /// the session: pending subscribes fail, all topic streams end, and
    /// subsequent session calls return `SessionError::Closed`.
    pub async fn run(mut self) {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    self.shared
                        .route(&publish.topic, publish.payload.to_vec())
                        .await;
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    let refused = ack
                        .return_codes
                        .iter()
                        .any(|code| matches!(code, SubscribeReasonCode::Failure));
                    let result = if refused {
                        Err(SessionError::SubAck(format!(
                            "failure code in suback (pkid {})",
                            ack.pkid
                        )))
                    } else {
                        Ok(())
                    };
                    self.shared.resolve_suback(result).await;
                }
                Ok(_) => {} // ConnAck, PubAck, UnsubAck, PingResp, etc.
                Err(e) => {
                    if self.shared.closed.load(Ordering::SeqCst) {
                        tracing::debug!("mqtt session closed");
                    } else {
                        self.shared.closed.store(true, Ordering::SeqCst);
                        tracing::error!(error = %e, "mqtt event loop error, session is gone");
                    }
                    self.shared.fail_pending(&e.to_string()).await;
                    self.shared.routes.lock().await.clear();
                    break;
                }
            }
        }
    }
}
