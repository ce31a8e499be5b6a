//! Producer binding: the write side of a bus connection

use crate::config::{BlockingMode, BusStatus};
use crate::error::{BusError, Result};
use crate::transport::ProducerHandle;
use tokio::sync::watch;
use tracing::{debug, warn};

/// A producer connection to a single topic.
///
/// Created by [`crate::connect`] with a Writer direction. Writes either wait
/// for broker acknowledgment or return immediately after submission,
/// depending on the blocking mode fixed at connection time. The binding is
/// never reopened after [`BusWriter::disconnect`].
pub struct BusWriter {
    topic: String,
    blocking: BlockingMode,
    producer: Box<dyn ProducerHandle>,
    status: watch::Sender<BusStatus>,
    retries_used: u32,
}

impl BusWriter {
    pub(crate) fn new(
        topic: String,
        blocking: BlockingMode,
        producer: Box<dyn ProducerHandle>,
        retries_used: u32,
    ) -> Self {
        let (status, _) = watch::channel(BusStatus::Open);
        Self {
            topic,
            blocking,
            producer,
            status,
            retries_used,
        }
    }

    /// Topic this writer publishes to
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Blocking mode fixed at connection time
    pub fn blocking(&self) -> BlockingMode {
        self.blocking
    }

    /// Failed connection attempts before this binding connected
    pub fn retries_used(&self) -> u32 {
        self.retries_used
    }

    /// Current connection status
    pub fn status(&self) -> BusStatus {
        *self.status.borrow()
    }

    /// Publish a payload to the topic.
    ///
    /// In [`BlockingMode::Blocking`] this returns only once the broker has
    /// acknowledged delivery. In [`BlockingMode::NonBlocking`] the payload is
    /// handed to the transport's async input and this returns immediately;
    /// delivery errors surface on a later call, best-effort, by draining any
    /// error the transport has already reported.
    pub async fn write(&self, msg: &str) -> Result<()> {
        if self.status() != BusStatus::Open {
            return Err(BusError::ConnectionClosed);
        }
        match self.blocking {
            BlockingMode::Blocking => self.producer.send_acked(msg.to_string()).await,
            BlockingMode::NonBlocking => {
                self.producer.send(msg.to_string())?;
                if let Some(e) = self.producer.take_error() {
                    warn!("surfacing earlier delivery failure on '{}': {}", self.topic, e);
                    return Err(e);
                }
                Ok(())
            }
        }
    }

    /// Close the producer connection.
    ///
    /// Idempotent: calls after the first are accepted as no-ops.
    pub async fn disconnect(&self) -> Result<()> {
        if self.status.send_replace(BusStatus::Closed) == BusStatus::Closed {
            return Ok(());
        }
        debug!("disconnecting writer for '{}'", self.topic);
        self.producer.close().await
    }
}
