//! Connection lifecycle wrapper for services
//!
//! Services usually carry a single bus connection configured from a flat
//! `host:port:topic` spec on their command line or environment.
//! [`BusManager`] packages that pattern: configure once, then connect,
//! disconnect, and reconnect without rebuilding the configuration, with the
//! handle dropped on disconnect even when the transport close fails (a
//! possibly stale broker-side connection beats a handle that can never be
//! released).

use crate::client::BusClient;
use crate::config::{parse_host_spec, BlockingMode, BusConfig, BusDirection, BusTech};
use crate::connect::connect_with;
use crate::error::{BusError, Result};
use crate::transport::tcp::TcpTransport;
use crate::transport::Transport;
use crate::BusIo;
use std::sync::Arc;
use tracing::{info, warn};

/// Retry budget for managed connections; services want prompt failure over
/// the connector's retry-forever default.
const MANAGED_CONNECT_RETRIES: u32 = 10;

/// Single-connection lifecycle manager.
pub struct BusManager {
    transport: Arc<dyn Transport>,
    config: Option<BusConfig>,
    client: Option<BusClient>,
}

impl BusManager {
    /// Create a manager that connects through the given transport
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            config: None,
            client: None,
        }
    }

    /// Create a manager using the built-in TCP transport
    pub fn tcp() -> Self {
        Self::new(Arc::new(TcpTransport::new()))
    }

    /// Configure from a `host:port:topic` spec string.
    ///
    /// Uses blocking writes/reads and a bounded retry budget, the defaults
    /// services want for a telemetry connection. Rejected while a
    /// connection is active.
    pub fn configure(&mut self, spec: &str, direction: BusDirection) -> Result<()> {
        if self.client.is_some() {
            return Err(BusError::AlreadyConnected);
        }
        let (host, port, topic) = parse_host_spec(spec)?;
        self.config = Some(BusConfig {
            technology: Some(BusTech::Tcp),
            host,
            port,
            blocking: Some(BlockingMode::Blocking),
            direction: Some(direction),
            retry_budget: MANAGED_CONNECT_RETRIES,
            topic,
            group_id: None,
        });
        Ok(())
    }

    /// Configure from a full [`BusConfig`]. Rejected while a connection is
    /// active.
    pub fn configure_with(&mut self, config: BusConfig) -> Result<()> {
        if self.client.is_some() {
            return Err(BusError::AlreadyConnected);
        }
        self.config = Some(config);
        Ok(())
    }

    /// Connect using the stored configuration
    pub async fn connect(&mut self) -> Result<()> {
        if self.client.is_some() {
            return Err(BusError::AlreadyConnected);
        }
        let config = self.config.as_ref().ok_or(BusError::NotConfigured)?;
        let client = connect_with(config, self.transport.as_ref()).await?;
        info!("bus manager connected to '{}'", config.topic);
        self.client = Some(client);
        Ok(())
    }

    /// Disconnect if connected.
    ///
    /// The handle is dropped even when the transport close fails, so the
    /// connection is considered closed either way.
    pub async fn disconnect(&mut self) -> Result<()> {
        match self.client.take() {
            Some(client) => client.disconnect().await,
            None => Ok(()),
        }
    }

    /// Disconnect (a no-op when not connected) and connect again
    pub async fn reconnect(&mut self) -> Result<()> {
        if let Err(e) = self.disconnect().await {
            warn!("disconnect failed during reconnect: {}", e);
        }
        self.connect().await
    }

    /// Whether a connection is currently held
    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    /// Read the next message from the managed connection.
    ///
    /// Messages are meant to be read serially through one connection; the
    /// connection is the unit of parallelism.
    pub async fn read_next(&self) -> Result<String> {
        match &self.client {
            Some(client) => client.read().await,
            None => Err(BusError::ConnectionClosed),
        }
    }

    /// Write a message through the managed connection
    pub async fn write(&self, msg: &str) -> Result<()> {
        match &self.client {
            Some(client) => client.write(msg).await,
            None => Err(BusError::ConnectionClosed),
        }
    }
}
