//! # msgbus
//!
//! A message bus client abstraction over partitioned log-style pub/sub
//! brokers. One configuration surface and one capability set cover both
//! roles: connect as a producer (writer) or consumer (reader) on a topic,
//! with blocking or fire-and-forget writes, bounded retry on the initial
//! connection, and a choice between polling reads from a bounded internal
//! queue or callback-driven delivery.
//!
//! ## Features
//!
//! - **Role-specific bindings**: [`BusWriter`] and [`BusReader`] expose only
//!   the operations their role supports; the [`BusClient`] facade offers the
//!   uniform [`BusIo`] surface for role-agnostic callers
//! - **Pluggable transports**: the framed TCP client for a network broker,
//!   an in-process [`MemoryBroker`] for tests and embedded use, or anything
//!   implementing [`Transport`]
//! - **Bounded-retry connect**: transient broker unavailability at startup is
//!   retried on a fixed backoff up to the configured budget
//! - **Backpressured consumption**: one receiver loop per reader preserves
//!   broker delivery order; full queues and slow callbacks slow consumption
//!   rather than growing memory
//!
//! Reconnection of an established connection that drops mid-stream is out of
//! scope: the receiver loop ends, reads surface [`BusError::ChannelClosed`],
//! and recovery is a fresh [`connect`].
//!
//! ## Basic usage
//!
//! ```rust
//! use msgbus::{connect_with, BusConfig, BusDirection, BusIo, BusTech, MemoryBroker};
//!
//! #[tokio::main]
//! async fn main() -> msgbus::Result<()> {
//!     let broker = MemoryBroker::new();
//!
//!     let reader = connect_with(
//!         &BusConfig {
//!             technology: Some(BusTech::Tcp),
//!             topic: "telemetry".to_string(),
//!             direction: Some(BusDirection::Reader),
//!             retry_budget: 1,
//!             ..Default::default()
//!         },
//!         &broker,
//!     )
//!     .await?;
//!
//!     let writer = connect_with(
//!         &BusConfig {
//!             technology: Some(BusTech::Tcp),
//!             topic: "telemetry".to_string(),
//!             direction: Some(BusDirection::Writer),
//!             retry_budget: 1,
//!             ..Default::default()
//!         },
//!         &broker,
//!     )
//!     .await?;
//!
//!     writer.write("temperature=41").await?;
//!     println!("received: {}", reader.read().await?);
//!
//!     writer.disconnect().await?;
//!     reader.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod connect;
pub mod consumer;
pub mod error;
pub mod manager;
pub mod producer;
pub mod transport;

// Re-export main types for convenience
pub use client::BusClient;
pub use config::{
    parse_host_spec, BlockingMode, BusConfig, BusDirection, BusStatus, BusTech,
    CONNECT_RETRY_DELAY, DEFAULT_PORT, MSG_QUEUE_MAX_LEN, RETRY_FOREVER,
};
pub use connect::{connect, connect_with};
pub use consumer::{BusReader, Callback};
pub use error::{BusError, Result};
pub use manager::BusManager;
pub use producer::BusWriter;
pub use transport::memory::MemoryBroker;
pub use transport::tcp::TcpTransport;
pub use transport::{ConnectOptions, ConsumerHandle, ProducerHandle, Transport};

/// The uniform bus client capability set.
///
/// Implemented by the [`BusClient`] facade. Operations that do not apply to
/// the client's role fail with [`BusError::NotSupportedForWriter`] /
/// [`BusError::NotSupportedForReader`] (and `messages_available` reports
/// zero on a writer); the role-specific bindings simply do not carry the
/// foreign operations.
#[allow(async_fn_in_trait)]
pub trait BusIo {
    /// Close the connection; idempotent
    async fn disconnect(&self) -> Result<()>;

    /// Publish a payload to the topic (writers only)
    async fn write(&self, msg: &str) -> Result<()>;

    /// Take the next inbound payload, waiting if none is queued (readers
    /// only, polling mode)
    async fn read(&self) -> Result<String>;

    /// Depth of the reader's internal queue; zero on writers, when closed,
    /// or while a callback is registered
    fn messages_available(&self) -> usize;

    /// Register the at-most-one inbound payload callback (readers only)
    fn register_callback<F>(&self, cbfunc: F) -> Result<()>
    where
        F: Fn(String) + Send + Sync + 'static;

    /// Clear any registered callback (readers only)
    fn unregister_callback(&self) -> Result<()>;

    /// Current connection status
    fn status(&self) -> BusStatus;
}
