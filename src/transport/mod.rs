//! Transport abstraction for message bus connections
//!
//! Bindings depend on the [`Transport`] trait rather than a concrete broker
//! client, so the same producer/consumer semantics run against the framed
//! TCP client in production and the in-process [`memory::MemoryBroker`] in
//! tests or embedded setups.

pub mod memory;
pub mod tcp;

use crate::config::BlockingMode;
use crate::error::{BusError, Result};
use async_trait::async_trait;

/// Resolved connection parameters handed to a transport
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Broker hostname
    pub host: String,
    /// Broker port
    pub port: u16,
    /// Topic to publish to or subscribe to
    pub topic: String,
    /// Consumer group identity
    pub group_id: String,
    /// Write blocking mode
    pub blocking: BlockingMode,
}

impl ConnectOptions {
    /// Broker endpoint as `host:port`
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Factory for role-specific broker connections.
///
/// A single connection attempt; the connector owns the retry loop.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a producer connection for the configured topic
    async fn connect_producer(&self, opts: &ConnectOptions) -> Result<Box<dyn ProducerHandle>>;

    /// Open a consumer connection subscribed to the configured topic
    async fn connect_consumer(&self, opts: &ConnectOptions) -> Result<Box<dyn ConsumerHandle>>;
}

/// Underlying broker producer connection
#[async_trait]
pub trait ProducerHandle: Send + Sync {
    /// Submit a payload and wait for the broker to acknowledge it
    async fn send_acked(&self, payload: String) -> Result<()>;

    /// Submit a payload without waiting; delivery errors surface later
    /// through [`ProducerHandle::take_error`]
    fn send(&self, payload: String) -> Result<()>;

    /// Drain one asynchronous delivery error, if any has surfaced.
    ///
    /// Never blocks. Returns `None` when no error is immediately available.
    fn take_error(&self) -> Option<BusError>;

    /// Close the producer connection
    async fn close(&self) -> Result<()>;
}

/// Underlying broker consumer connection
#[async_trait]
pub trait ConsumerHandle: Send + Sync {
    /// Receive the next inbound payload.
    ///
    /// `None` means the inbound stream has ended and no further messages
    /// will arrive. `Some(Err(_))` is a transient receive error; the stream
    /// is still live and the caller may keep receiving.
    async fn recv(&mut self) -> Option<Result<String>>;

    /// Close the consumer connection
    async fn close(&mut self) -> Result<()>;
}
