//! Mock session for testing pub/sub flows without a real broker.
//!
//! Records every operation in call order, owns the delivery side of each
//! subscribed topic stream, and can script replies so that a publish to a
//! request topic immediately fans out canned responses. Replies land only
//! on topics that are already subscribed, which makes subscribe-before-
//! publish ordering observable in tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use rumqttc::QoS;
use tokio::sync::mpsc;

use crate::error::{SessionError, SessionResult};
use crate::session::{Session, TopicStream};

const STREAM_CAPACITY: usize = 16;

/// A recorded session operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOp {
    Subscribe(String),
    Publish { topic: String, payload: Vec<u8> },
    Unsubscribe(String),
}

#[derive(Debug, Clone)]
struct ScriptedReply {
    reply_topic: String,
    payload: Vec<u8>,
}

/// Mock implementation of the `Session` trait.
///
/// Thread-safe via `Mutex` (fine for test contexts).
pub struct MockSession {
    operations: Mutex<Vec<SessionOp>>,
    senders: Mutex<HashMap<String, mpsc::Sender<Vec<u8>>>>,
    replies: Mutex<HashMap<String, Vec<ScriptedReply>>>,
    fail_subscribe: Mutex<HashSet<String>>,
    fail_publish: Mutex<HashSet<String>>,
}

impl MockSession {
    pub fn new() -> Self {
        Self {
            operations: Mutex::new(Vec::new()),
            senders: Mutex::new(HashMap::new()),
            replies: Mutex::new(HashMap::new()),
            fail_subscribe: Mutex::new(HashSet::new()),
            fail_publish: Mutex::new(HashSet::new()),
        }
    }

    /// Script a reply: when `request_topic` is published to, deliver
    /// `payload` on `reply_topic` (if subscribed). Multiple replies for the
    /// same request are delivered together, in scripting order.
    pub fn script_reply(
        &self,
        request_topic: &str,
        reply_topic: &str,
        payload: impl Into<Vec<u8>>,
    ) {
        self.replies
            .lock()
            .unwrap()
            .entry(request_topic.to_string())
            .or_default()
            .push(ScriptedReply {
                reply_topic: reply_topic.to_string(),
                payload: payload.into(),
            });
    }

    /// Deliver a payload to a subscribed topic stream directly.
    /// Returns false if nothing is subscribed to the topic.
    pub fn deliver(&self, topic: &str, payload: impl Into<Vec<u8>>) -> bool {
        match self.senders.lock().unwrap().get(topic) {
            Some(tx) => tx.try_send(payload.into()).is_ok(),
            None => false,
        }
    }

    /// Make the next and all further subscribes to `topic` fail.
    pub fn fail_subscribe_on(&self, topic: &str) {
        self.fail_subscribe.lock().unwrap().insert(topic.to_string());
    }

    /// Make the next and all further publishes to `topic` fail.
    pub fn fail_publish_on(&self, topic: &str) {
        self.fail_publish.lock().unwrap().insert(topic.to_string());
    }

    /// All recorded operations, in call order.
    pub fn operations(&self) -> Vec<SessionOp> {
        self.operations.lock().unwrap().clone()
    }

    /// Payloads published to a specific topic.
    pub fn published_to(&self, topic: &str) -> Vec<Vec<u8>> {
        self.operations
            .lock()
            .unwrap()
            .iter()
            .filter_map(|op| match op {
                SessionOp::Publish { topic: t, payload } if t == topic => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }

    /// The most recent publish, if any.
    pub fn last_published(&self) -> Option<(String, Vec<u8>)> {
        self.operations
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|op| match op {
                SessionOp::Publish { topic, payload } => {
                    Some((topic.clone(), payload.clone()))
                }
                _ => None,
            })
    }

    /// Whether a subscribe to the topic was ever recorded.
    pub fn is_subscribed_to(&self, topic: &str) -> bool {
        self.operations
            .lock()
            .unwrap()
            .iter()
            .any(|op| matches!(op, SessionOp::Subscribe(t) if t == topic))
    }

    /// Whether an unsubscribe from the topic was ever recorded.
    pub fn unsubscribed_from(&self, topic: &str) -> bool {
        self.operations
            .lock()
            .unwrap()
            .iter()
            .any(|op| matches!(op, SessionOp::Unsubscribe(t) if t == topic))
    }

    /// Clear all recorded state and scripted behavior.
    pub fn reset(&self) {
        self.operations.lock().unwrap().clear();
        self.senders.lock().unwrap().clear();
        self.replies.lock().unwrap().clear();
        self.fail_subscribe.lock().unwrap().clear();
        self.fail_publish.lock().unwrap().clear();
    }
}

impl Default for MockSession {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Session for MockSession {
    async fn subscribe(&self, topic: &str, _qos: QoS) -> SessionResult<TopicStream> {
        if self.fail_subscribe.lock().unwrap().contains(topic) {
            return Err(SessionError::Subscribe(format!(
                "scripted subscribe failure for '{topic}'"
            )));
        }

        let (tx, rx) = mpsc::channel(STREAM_CAPACITY);
        self.senders.lock().unwrap().insert(topic.to_string(), tx);
        self.operations
            .lock()
            .unwrap()
            .push(SessionOp::Subscribe(topic.to_string()));
        Ok(TopicStream::new(topic.to_string(), rx))
    }

    async fn publish(&self, topic: &str, payload: &[u8], _qos: QoS) -> SessionResult<()> {
        if self.fail_publish.lock().unwrap().contains(topic) {
            return Err(SessionError::Publish(format!(
                "scripted publish failure for '{topic}'"
            )));
        }

        self.operations.lock().unwrap().push(SessionOp::Publish {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });

        // Fan out scripted replies, but only to live subscriptions.
        let due = self.replies.lock().unwrap().remove(topic);
        if let Some(due) = due {
            let senders = self.senders.lock().unwrap();
            for reply in due {
                if let Some(tx) = senders.get(&reply.reply_topic) {
                    let _ = tx.try_send(reply.payload);
                }
            }
        }
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> SessionResult<()> {
        self.senders.lock().unwrap().remove(topic);
        self.operations
            .lock()
            .unwrap()
            .push(SessionOp::Unsubscribe(topic.to_string()));
        Ok(())
    }
}
