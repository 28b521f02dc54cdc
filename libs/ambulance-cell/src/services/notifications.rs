use std::collections::HashMap;
use std::sync::Arc;
use serde_json::{json, Value};
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

pub type TopicSender = broadcast::Sender<String>;
pub type TopicReceiver = broadcast::Receiver<String>;

/// Global pool topic: receives every new-request broadcast regardless of
/// zone, so zone filtering is advisory only.
pub const DRIVERS_TOPIC: &str = "drivers";

pub fn zone_topic(zone: &str) -> String {
    format!("zone-{}", zone)
}

pub fn booking_topic(booking_id: &str) -> String {
    format!("booking-{}", booking_id)
}

/// Topic-based publish/subscribe fan-out for dispatch events.
///
/// Delivery is fire-and-forget: at-least-once while a subscription is live,
/// nothing across disconnect gaps, no acks or retries. A slow subscriber
/// drops events without affecting the others.
pub struct AmbulanceNotificationService {
    topics: Arc<RwLock<HashMap<String, TopicSender>>>,
}

impl AmbulanceNotificationService {
    pub fn new() -> Self {
        Self {
            topics: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Join a topic. The channel is created on first join.
    pub async fn subscribe(&self, topic: &str) -> TopicReceiver {
        let mut topics = self.topics.write().await;
        let sender = topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(100).0);

        debug!("Subscription added on topic {}", topic);
        sender.subscribe()
    }

    /// Publish an event envelope to a topic. Events published to a topic
    /// nobody has ever joined are dropped.
    pub async fn publish(&self, topic: &str, event: &str, data: Value) {
        let message = json!({ "event": event, "data": data }).to_string();

        let topics = self.topics.read().await;
        match topics.get(topic) {
            Some(sender) => {
                if sender.send(message).is_err() {
                    debug!("No live subscribers on topic {}, dropped {}", topic, event);
                }
            }
            None => {
                debug!("Topic {} was never joined, dropped {}", topic, event);
            }
        }
    }

    pub async fn active_topics(&self) -> Vec<String> {
        let topics = self.topics.read().await;
        topics.keys().cloned().collect()
    }
}

impl Default for AmbulanceNotificationService {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for AmbulanceNotificationService {
    fn clone(&self) -> Self {
        Self {
            topics: Arc::clone(&self.topics),
        }
    }
}
