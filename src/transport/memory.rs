//! In-process broker and transport
//!
//! [`MemoryBroker`] is a topic fan-out broker living entirely inside the
//! process. It backs integration tests and embedded single-process setups
//! where a network broker would be overkill: producers and consumers built
//! through [`crate::connect_with`] exchange messages through it with the
//! same semantics the TCP transport provides over the wire.

use crate::error::{BusError, Result};
use crate::transport::{ConnectOptions, ConsumerHandle, ProducerHandle, Transport};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::debug;

/// Per-topic fan-out state
#[derive(Default)]
struct TopicState {
    /// Live subscriber channels
    subscribers: Vec<mpsc::UnboundedSender<Result<String>>>,
    /// Closed topics deliver no further messages and end subscriber streams
    closed: bool,
}

/// In-process topic fan-out broker.
///
/// Cheap to clone; clones share the same topic table.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    topics: Arc<Mutex<HashMap<String, TopicState>>>,
}

impl MemoryBroker {
    /// Create a new broker with no topics
    pub fn new() -> Self {
        Self::default()
    }

    fn topics(&self) -> MutexGuard<'_, HashMap<String, TopicState>> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver a payload to every subscriber of `topic`.
    ///
    /// Returns the number of subscribers the payload reached. Publishing to
    /// a topic nobody subscribes to succeeds and delivers nothing;
    /// publishing to a closed topic fails.
    pub fn publish(&self, topic: &str, payload: &str) -> Result<usize> {
        let mut topics = self.topics();
        let state = topics.entry(topic.to_string()).or_default();
        if state.closed {
            return Err(BusError::delivery(format!("topic '{topic}' is closed")));
        }
        state
            .subscribers
            .retain(|tx| tx.send(Ok(payload.to_string())).is_ok());
        debug!(
            "delivered payload to {} subscriber(s) of '{}'",
            state.subscribers.len(),
            topic
        );
        Ok(state.subscribers.len())
    }

    /// Deliver a transient receive error to every subscriber of `topic`.
    ///
    /// Subscriber streams stay live afterwards; this models per-message
    /// broker errors the receiver loop is expected to log and survive.
    pub fn inject_error(&self, topic: &str, reason: &str) {
        let mut topics = self.topics();
        let state = topics.entry(topic.to_string()).or_default();
        state
            .subscribers
            .retain(|tx| tx.send(Err(BusError::transport(reason))).is_ok());
    }

    /// Close a topic: drop all subscriber channels (ending their streams)
    /// and reject future publishes.
    pub fn close_topic(&self, topic: &str) {
        let mut topics = self.topics();
        let state = topics.entry(topic.to_string()).or_default();
        state.closed = true;
        state.subscribers.clear();
        debug!("closed topic '{}'", topic);
    }

    /// Number of live subscribers on `topic`
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics()
            .get(topic)
            .map(|state| state.subscribers.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Transport for MemoryBroker {
    async fn connect_producer(&self, opts: &ConnectOptions) -> Result<Box<dyn ProducerHandle>> {
        debug!("memory producer connected to '{}'", opts.topic);
        Ok(Box::new(MemoryProducer {
            broker: self.clone(),
            topic: opts.topic.clone(),
        }))
    }

    async fn connect_consumer(&self, opts: &ConnectOptions) -> Result<Box<dyn ConsumerHandle>> {
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut topics = self.topics();
            let state = topics.entry(opts.topic.clone()).or_default();
            // Subscribing to a closed topic yields an immediately-ended
            // stream; dropping the sender is exactly that.
            if !state.closed {
                state.subscribers.push(tx);
            }
        }
        debug!(
            "memory consumer subscribed to '{}' (group {})",
            opts.topic, opts.group_id
        );
        Ok(Box::new(MemoryConsumer { rx }))
    }
}

struct MemoryProducer {
    broker: MemoryBroker,
    topic: String,
}

#[async_trait]
impl ProducerHandle for MemoryProducer {
    async fn send_acked(&self, payload: String) -> Result<()> {
        // In-process delivery completes synchronously, which is the ack.
        self.broker.publish(&self.topic, &payload).map(|_| ())
    }

    fn send(&self, payload: String) -> Result<()> {
        self.broker.publish(&self.topic, &payload).map(|_| ())
    }

    fn take_error(&self) -> Option<BusError> {
        None
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

struct MemoryConsumer {
    rx: mpsc::UnboundedReceiver<Result<String>>,
}

#[async_trait]
impl ConsumerHandle for MemoryConsumer {
    async fn recv(&mut self) -> Option<Result<String>> {
        self.rx.recv().await
    }

    async fn close(&mut self) -> Result<()> {
        self.rx.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BlockingMode;

    fn options(topic: &str) -> ConnectOptions {
        ConnectOptions {
            host: "localhost".to_string(),
            port: 0,
            topic: topic.to_string(),
            group_id: "test-group".to_string(),
            blocking: BlockingMode::NonBlocking,
        }
    }

    #[tokio::test]
    async fn test_fan_out_to_all_subscribers() {
        let broker = MemoryBroker::new();
        let mut first = broker.connect_consumer(&options("t")).await.unwrap();
        let mut second = broker.connect_consumer(&options("t")).await.unwrap();
        assert_eq!(broker.subscriber_count("t"), 2);

        assert_eq!(broker.publish("t", "hello").unwrap(), 2);
        assert_eq!(first.recv().await.unwrap().unwrap(), "hello");
        assert_eq!(second.recv().await.unwrap().unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_succeeds() {
        let broker = MemoryBroker::new();
        assert_eq!(broker.publish("empty", "nobody home").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_close_topic_ends_streams_and_rejects_publish() {
        let broker = MemoryBroker::new();
        let mut consumer = broker.connect_consumer(&options("t")).await.unwrap();

        broker.close_topic("t");
        assert!(consumer.recv().await.is_none());
        assert!(matches!(
            broker.publish("t", "late"),
            Err(BusError::Delivery(_))
        ));
    }

    #[tokio::test]
    async fn test_injected_error_keeps_stream_live() {
        let broker = MemoryBroker::new();
        let mut consumer = broker.connect_consumer(&options("t")).await.unwrap();

        broker.inject_error("t", "transient broker hiccup");
        broker.publish("t", "still here").unwrap();

        assert!(consumer.recv().await.unwrap().is_err());
        assert_eq!(consumer.recv().await.unwrap().unwrap(), "still here");
    }
}
