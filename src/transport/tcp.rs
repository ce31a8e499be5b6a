//! Framed TCP transport
//!
//! Newline-framed protocol over a plain TCP connection to the broker. A
//! connection declares its role with a single handshake line:
//!
//! ```text
//! PUB <topic> ACK      producer; broker answers each payload with OK / ERR <reason>
//! PUB <topic> NOACK    producer; fire-and-forget, no per-payload replies
//! SUB <topic> <group>  consumer; every subsequent broker line is a payload
//! ```
//!
//! Payloads are opaque single-line UTF-8 text; a payload containing a
//! newline is rejected before it reaches the wire. A background writer task
//! owns the producer's stream so that fire-and-forget submissions never
//! block the caller; write failures it encounters are parked for
//! [`ProducerHandle::take_error`] to drain.

use crate::config::BlockingMode;
use crate::error::{BusError, Result};
use crate::transport::{ConnectOptions, ConsumerHandle, ProducerHandle, Transport};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, info, warn};

/// Maximum frame length accepted on the wire (1 MiB)
const MAX_FRAME_LEN: usize = 1024 * 1024;

type WireStream = Framed<TcpStream, LinesCodec>;

/// Transport speaking the newline-framed TCP protocol
#[derive(Debug, Clone, Default)]
pub struct TcpTransport;

impl TcpTransport {
    /// Create a new TCP transport
    pub fn new() -> Self {
        Self
    }

    async fn open(&self, opts: &ConnectOptions) -> Result<WireStream> {
        let endpoint = opts.endpoint();
        let stream = TcpStream::connect(&endpoint).await.map_err(|e| {
            BusError::transport(format!("cannot connect to broker at {endpoint}: {e}"))
        })?;
        debug!("tcp connection established to {}", endpoint);
        Ok(Framed::new(
            stream,
            LinesCodec::new_with_max_length(MAX_FRAME_LEN),
        ))
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect_producer(&self, opts: &ConnectOptions) -> Result<Box<dyn ProducerHandle>> {
        let mut framed = self.open(opts).await?;
        let ack_mode = opts.blocking == BlockingMode::Blocking;
        let mode = if ack_mode { "ACK" } else { "NOACK" };
        framed
            .send(format!("PUB {} {}", opts.topic, mode))
            .await
            .map_err(|e| BusError::transport(format!("producer handshake failed: {e}")))?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let err_slot = Arc::new(Mutex::new(None));
        tokio::spawn(producer_task(framed, cmd_rx, Arc::clone(&err_slot), ack_mode));

        info!("connected to message bus at {} as writer", opts.endpoint());
        Ok(Box::new(TcpProducer { cmd_tx, err_slot }))
    }

    async fn connect_consumer(&self, opts: &ConnectOptions) -> Result<Box<dyn ConsumerHandle>> {
        let mut framed = self.open(opts).await?;
        framed
            .send(format!("SUB {} {}", opts.topic, opts.group_id))
            .await
            .map_err(|e| BusError::transport(format!("consumer handshake failed: {e}")))?;

        info!("connected to message bus at {} as reader", opts.endpoint());
        Ok(Box::new(TcpConsumer { framed }))
    }
}

enum Command {
    Send {
        payload: String,
        ack: Option<oneshot::Sender<Result<()>>>,
    },
    Close {
        done: oneshot::Sender<()>,
    },
}

struct TcpProducer {
    cmd_tx: mpsc::UnboundedSender<Command>,
    err_slot: Arc<Mutex<Option<BusError>>>,
}

fn check_payload(payload: &str) -> Result<()> {
    if payload.contains('\n') {
        return Err(BusError::transport(
            "payload must not contain a newline on the framed TCP transport",
        ));
    }
    Ok(())
}

#[async_trait]
impl ProducerHandle for TcpProducer {
    async fn send_acked(&self, payload: String) -> Result<()> {
        check_payload(&payload)?;
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Send {
                payload,
                ack: Some(tx),
            })
            .map_err(|_| BusError::transport("producer task has exited"))?;
        rx.await
            .map_err(|_| BusError::transport("producer task exited before acknowledging"))?
    }

    fn send(&self, payload: String) -> Result<()> {
        check_payload(&payload)?;
        self.cmd_tx
            .send(Command::Send { payload, ack: None })
            .map_err(|_| BusError::transport("producer task has exited"))
    }

    fn take_error(&self) -> Option<BusError> {
        self.err_slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    async fn close(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Close { done: tx }).is_ok() {
            // Wait for the writer task to flush and shut the stream down.
            let _ = rx.await;
        }
        Ok(())
    }
}

/// Writer task owning the producer's wire stream.
///
/// Runs until a close command arrives or the producer handle is dropped.
async fn producer_task(
    mut framed: WireStream,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    err_slot: Arc<Mutex<Option<BusError>>>,
    ack_mode: bool,
) {
    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            Command::Send { payload, ack } => {
                let result = write_payload(&mut framed, payload, ack_mode).await;
                match ack {
                    Some(done) => {
                        let _ = done.send(result);
                    }
                    None => {
                        if let Err(e) = result {
                            warn!("asynchronous message delivery failed: {}", e);
                            *err_slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(e);
                        }
                    }
                }
            }
            Command::Close { done } => {
                if let Err(e) = SinkExt::<String>::close(&mut framed).await {
                    debug!("error closing producer stream: {}", e);
                }
                let _ = done.send(());
                return;
            }
        }
    }
    debug!("producer handle dropped, writer task exiting");
}

async fn write_payload(framed: &mut WireStream, payload: String, ack_mode: bool) -> Result<()> {
    framed
        .send(payload)
        .await
        .map_err(|e| BusError::transport(format!("write failed: {e}")))?;
    if !ack_mode {
        return Ok(());
    }
    match framed.next().await {
        Some(Ok(line)) if line == "OK" => Ok(()),
        Some(Ok(line)) => match line.strip_prefix("ERR ") {
            Some(reason) => Err(BusError::delivery(reason.to_string())),
            None => Err(BusError::transport(format!(
                "unexpected broker reply '{line}'"
            ))),
        },
        Some(Err(e)) => Err(BusError::transport(format!("ack read failed: {e}"))),
        None => Err(BusError::transport("broker closed the connection")),
    }
}

struct TcpConsumer {
    framed: WireStream,
}

#[async_trait]
impl ConsumerHandle for TcpConsumer {
    async fn recv(&mut self) -> Option<Result<String>> {
        match self.framed.next().await {
            Some(Ok(line)) => Some(Ok(line)),
            Some(Err(e)) => Some(Err(BusError::transport(format!("receive failed: {e}")))),
            None => None,
        }
    }

    async fn close(&mut self) -> Result<()> {
        SinkExt::<String>::close(&mut self.framed)
            .await
            .map_err(|e| BusError::transport(format!("close failed: {e}")))
    }
}
