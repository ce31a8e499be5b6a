//! Connector: validation, transport dispatch, and bounded connection retry

use crate::client::BusClient;
use crate::config::{BusConfig, BusDirection, BusTech, ResolvedConfig, CONNECT_RETRY_DELAY};
use crate::consumer::BusReader;
use crate::error::{BusError, Result};
use crate::producer::BusWriter;
use crate::transport::tcp::TcpTransport;
use crate::transport::Transport;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{info, warn};

/// Connect to the message bus with the built-in transport for the
/// configured technology.
///
/// Validates the configuration, applies defaults to an internal copy, and
/// performs the initial connection with bounded retry: failed attempts are
/// repeated after [`CONNECT_RETRY_DELAY`] until one succeeds or the retry
/// budget is exhausted. This runs on the caller's task and does not return
/// until one of those outcomes. For readers, the receiver loop is running by
/// the time this returns.
pub async fn connect(config: &BusConfig) -> Result<BusClient> {
    let resolved = config.resolve()?;
    let transport: Arc<dyn Transport> = match resolved.technology {
        BusTech::Tcp => Arc::new(TcpTransport::new()),
    };
    connect_resolved(resolved, transport.as_ref()).await
}

/// Connect with a caller-provided transport.
///
/// Same contract as [`connect`], with the transport injected: production
/// code can share one transport across connections, and tests substitute an
/// in-process broker. The configured technology selector is ignored in
/// favor of the given transport.
pub async fn connect_with(config: &BusConfig, transport: &dyn Transport) -> Result<BusClient> {
    let resolved = config.resolve()?;
    connect_resolved(resolved, transport).await
}

async fn connect_resolved(cfg: ResolvedConfig, transport: &dyn Transport) -> Result<BusClient> {
    match cfg.direction {
        BusDirection::Writer => {
            let mut attempts = 0u32;
            let handle = loop {
                attempts += 1;
                match transport.connect_producer(&cfg.options).await {
                    Ok(handle) => break handle,
                    Err(e) => back_off(attempts, cfg.retry_budget, e).await?,
                }
            };
            info!("message bus writer connected to '{}'", cfg.options.topic);
            Ok(BusClient::Writer(BusWriter::new(
                cfg.options.topic,
                cfg.options.blocking,
                handle,
                attempts - 1,
            )))
        }
        BusDirection::Reader => {
            let mut attempts = 0u32;
            let handle = loop {
                attempts += 1;
                match transport.connect_consumer(&cfg.options).await {
                    Ok(handle) => break handle,
                    Err(e) => back_off(attempts, cfg.retry_budget, e).await?,
                }
            };
            info!("message bus reader connected to '{}'", cfg.options.topic);
            Ok(BusClient::Reader(BusReader::spawn(
                cfg.options.topic,
                handle,
                attempts - 1,
            )))
        }
    }
}

/// Sleep out the retry delay, or fail once the budget is spent.
async fn back_off(attempts: u32, budget: u32, cause: BusError) -> Result<()> {
    if attempts >= budget {
        warn!(
            "unable to connect to message bus after {} attempt(s): {}",
            attempts, cause
        );
        return Err(BusError::RetriesExhausted { attempts });
    }
    warn!(
        "unable to connect to message bus ({}), retrying in {:?}",
        cause, CONNECT_RETRY_DELAY
    );
    sleep(CONNECT_RETRY_DELAY).await;
    Ok(())
}
