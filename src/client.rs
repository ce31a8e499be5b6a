//! Role-agnostic bus client facade
//!
//! [`BusClient`] wraps either binding behind the uniform [`BusIo`] surface.
//! The role-specific types expose only the operations their role supports;
//! the facade is where a read-side call on a writer (or vice versa) turns
//! into a role-mismatch error, for callers that handle connections
//! generically.

use crate::config::{BusDirection, BusStatus};
use crate::consumer::BusReader;
use crate::error::{BusError, Result};
use crate::producer::BusWriter;
use crate::BusIo;
use std::fmt;
use tracing::error;

/// A connected bus client: a producer or a consumer binding.
pub enum BusClient {
    /// Producer binding
    Writer(BusWriter),
    /// Consumer binding
    Reader(BusReader),
}

impl BusClient {
    /// Role of this client
    pub fn direction(&self) -> BusDirection {
        match self {
            Self::Writer(_) => BusDirection::Writer,
            Self::Reader(_) => BusDirection::Reader,
        }
    }

    /// Borrow the producer binding, if this client is one
    pub fn as_writer(&self) -> Option<&BusWriter> {
        match self {
            Self::Writer(writer) => Some(writer),
            Self::Reader(_) => None,
        }
    }

    /// Borrow the consumer binding, if this client is one
    pub fn as_reader(&self) -> Option<&BusReader> {
        match self {
            Self::Writer(_) => None,
            Self::Reader(reader) => Some(reader),
        }
    }
}

// The bindings hold boxed transport handles, so Debug is written by hand.
impl fmt::Debug for BusClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Writer(writer) => f
                .debug_struct("BusClient::Writer")
                .field("topic", &writer.topic())
                .field("status", &writer.status())
                .finish(),
            Self::Reader(reader) => f
                .debug_struct("BusClient::Reader")
                .field("topic", &reader.topic())
                .field("status", &reader.status())
                .finish(),
        }
    }
}

impl BusIo for BusClient {
    async fn disconnect(&self) -> Result<()> {
        match self {
            Self::Writer(writer) => writer.disconnect().await,
            Self::Reader(reader) => reader.disconnect().await,
        }
    }

    async fn write(&self, msg: &str) -> Result<()> {
        match self {
            Self::Writer(writer) => writer.write(msg).await,
            Self::Reader(_) => Err(BusError::NotSupportedForReader("write")),
        }
    }

    async fn read(&self) -> Result<String> {
        match self {
            Self::Writer(_) => Err(BusError::NotSupportedForWriter("read")),
            Self::Reader(reader) => reader.read().await,
        }
    }

    fn messages_available(&self) -> usize {
        match self {
            Self::Writer(_) => {
                error!("messages_available is not supported on a writer connection");
                0
            }
            Self::Reader(reader) => reader.messages_available(),
        }
    }

    fn register_callback<F>(&self, cbfunc: F) -> Result<()>
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        match self {
            Self::Writer(_) => Err(BusError::NotSupportedForWriter("register_callback")),
            Self::Reader(reader) => reader.register_callback(cbfunc),
        }
    }

    fn unregister_callback(&self) -> Result<()> {
        match self {
            Self::Writer(_) => Err(BusError::NotSupportedForWriter("unregister_callback")),
            Self::Reader(reader) => reader.unregister_callback(),
        }
    }

    fn status(&self) -> BusStatus {
        match self {
            Self::Writer(writer) => writer.status(),
            Self::Reader(reader) => reader.status(),
        }
    }
}
