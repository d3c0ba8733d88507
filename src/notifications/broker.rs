//! Broker-style publisher for downstream systems
//!
//! Uses tokio broadcast channel for pub/sub pattern. Each message carries
//! the exchange and routing key it was published under so consumers can
//! filter the way a topic exchange would.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::application::ports::{EventPublisher, PublishError};

/// Default channel capacity
pub const DEFAULT_CAPACITY: usize = 1024;

/// Envelope delivered to subscribers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerMessage {
    pub exchange: String,
    pub routing_key: String,
    pub payload: Value,
    pub published_at: DateTime<Utc>,
}

/// In-process broker. Delivery is at-most-once: a message published with
/// no subscriber attached is dropped.
#[derive(Clone)]
pub struct BrokerPublisher {
    sender: broadcast::Sender<BrokerMessage>,
    subscriber_count: Arc<AtomicUsize>,
}

impl BrokerPublisher {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            subscriber_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Raw receiver for every message on every exchange
    pub fn subscribe(&self) -> broadcast::Receiver<BrokerMessage> {
        self.sender.subscribe()
    }

    /// Subscriber bound to one exchange and routing key
    pub fn bind(&self, exchange: impl Into<String>, routing_key: impl Into<String>) -> BrokerSubscriber {
        let count = self.subscriber_count.fetch_add(1, Ordering::SeqCst) + 1;
        info!(subscribers = count, "New broker subscriber");
        BrokerSubscriber {
            receiver: self.sender.subscribe(),
            exchange: exchange.into(),
            routing_key: routing_key.into(),
            subscriber_count: self.subscriber_count.clone(),
        }
    }

    /// Number of bound subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscriber_count.load(Ordering::SeqCst)
    }
}

impl Default for BrokerPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for BrokerPublisher {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: Value,
    ) -> Result<(), PublishError> {
        let message = BrokerMessage {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            payload,
            published_at: Utc::now(),
        };

        match self.sender.send(message) {
            Ok(count) => debug!(exchange, routing_key, receivers = count, "Message published"),
            // Nobody listening is normal for fire-and-forget delivery
            Err(_) => debug!(exchange, routing_key, "Message published (no subscribers)"),
        }
        Ok(())
    }
}

/// Receives the messages routed to one exchange and routing key
pub struct BrokerSubscriber {
    receiver: broadcast::Receiver<BrokerMessage>,
    exchange: String,
    routing_key: String,
    subscriber_count: Arc<AtomicUsize>,
}

impl BrokerSubscriber {
    /// Next matching message, or `None` once the broker is gone
    pub async fn recv(&mut self) -> Option<BrokerMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(msg) if msg.exchange == self.exchange && msg.routing_key == self.routing_key => {
                    return Some(msg)
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(missed = count, "Broker subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for BrokerSubscriber {
    fn drop(&mut self) {
        let prev = self.subscriber_count.fetch_sub(1, Ordering::SeqCst);
        debug!(remaining = prev.saturating_sub(1), "Broker subscriber dropped");
    }
}

/// Shared broker type
pub type SharedBrokerPublisher = Arc<BrokerPublisher>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn bound_subscriber_filters_by_route() {
        let broker = BrokerPublisher::new();
        let mut subscriber = broker.bind("management.system", "transaction.routing.key");

        broker
            .publish("other.exchange", "transaction.routing.key", serde_json::json!({"n": 1}))
            .await
            .unwrap();
        broker
            .publish("management.system", "transaction.routing.key", serde_json::json!({"n": 2}))
            .await
            .unwrap();

        let received = tokio::time::timeout(Duration::from_millis(100), subscriber.recv())
            .await
            .expect("Timeout")
            .expect("No message");
        assert_eq!(received.payload["n"], 2);
    }

    #[tokio::test]
    async fn publish_without_subscribers_succeeds() {
        let broker = BrokerPublisher::new();
        let result = broker
            .publish("management.system", "transaction.routing.key", Value::Null)
            .await;
        assert!(result.is_ok());
    }

    #[test]
    fn subscriber_count_tracks_drops() {
        let broker = BrokerPublisher::new();
        assert_eq!(broker.subscriber_count(), 0);

        let first = broker.bind("a", "b");
        let _second = broker.bind("a", "c");
        assert_eq!(broker.subscriber_count(), 2);

        drop(first);
        assert_eq!(broker.subscriber_count(), 1);
    }
}
