//! Consumer binding: the read side of a bus connection, plus its
//! background receiver loop
//!
//! A [`BusReader`] supports two mutually exclusive consumption styles:
//! polling the bounded internal queue with [`BusReader::read`], or
//! registering a callback that the receiver loop invokes for every inbound
//! payload. While a callback is registered, `read` fails fast and
//! [`BusReader::messages_available`] reports zero.

use crate::config::{BusStatus, MSG_QUEUE_MAX_LEN};
use crate::error::{BusError, Result};
use crate::transport::ConsumerHandle;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, warn};

/// Callback invoked by the receiver loop for each inbound payload.
///
/// Callbacks are invoked synchronously, one payload at a time, from the
/// receiver loop's task; a slow callback backpressures consumption from the
/// broker. Callbacks are not reentrant: calling back into the same binding
/// from inside a callback is unsupported.
pub type Callback = Arc<dyn Fn(String) + Send + Sync + 'static>;

type CallbackSlot = Arc<RwLock<Option<Callback>>>;

fn read_slot(slot: &CallbackSlot) -> Option<Callback> {
    slot.read().unwrap_or_else(PoisonError::into_inner).clone()
}

/// A consumer connection subscribed to a single topic.
///
/// Created by [`crate::connect`] with a Reader direction, which also spawns
/// the binding's receiver loop. The binding is never reopened after
/// [`BusReader::disconnect`].
pub struct BusReader {
    topic: String,
    status: watch::Sender<BusStatus>,
    callback: CallbackSlot,
    queue_rx: Mutex<mpsc::Receiver<String>>,
    queue_depth: Arc<AtomicUsize>,
    retries_used: u32,
}

impl BusReader {
    /// Build the binding and spawn its receiver loop.
    pub(crate) fn spawn(topic: String, handle: Box<dyn ConsumerHandle>, retries_used: u32) -> Self {
        let (status, status_rx) = watch::channel(BusStatus::Open);
        let (queue_tx, queue_rx) = mpsc::channel(MSG_QUEUE_MAX_LEN);
        let callback: CallbackSlot = Arc::new(RwLock::new(None));
        let queue_depth = Arc::new(AtomicUsize::new(0));

        tokio::spawn(receiver_loop(
            handle,
            Arc::clone(&callback),
            queue_tx,
            Arc::clone(&queue_depth),
            status_rx,
        ));

        Self {
            topic,
            status,
            callback,
            queue_rx: Mutex::new(queue_rx),
            queue_depth,
            retries_used,
        }
    }

    /// Topic this reader is subscribed to
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Failed connection attempts before this binding connected
    pub fn retries_used(&self) -> u32 {
        self.retries_used
    }

    /// Current connection status
    pub fn status(&self) -> BusStatus {
        *self.status.borrow()
    }

    fn callback_registered(&self) -> bool {
        read_slot(&self.callback).is_some()
    }

    /// Take the next payload off the internal queue, waiting if none is
    /// available yet.
    ///
    /// Fails immediately with [`BusError::CallbackActive`] while a callback
    /// is registered. Once the queue is permanently closed (the broker
    /// stream ended or the binding was disconnected) and drained, returns
    /// [`BusError::ChannelClosed`].
    pub async fn read(&self) -> Result<String> {
        if self.callback_registered() {
            return Err(BusError::CallbackActive);
        }
        let mut rx = self.queue_rx.lock().await;
        let payload = rx.recv().await.ok_or(BusError::ChannelClosed)?;
        self.queue_depth.fetch_sub(1, Ordering::SeqCst);
        Ok(payload)
    }

    /// Current depth of the internal queue.
    ///
    /// Only meaningful for polling consumers: reports zero while a callback
    /// is registered (inbound payloads are routed to it, not the queue) and
    /// zero after the binding is closed. Payloads still buffered when the
    /// inbound stream ends stay counted until they are read out.
    pub fn messages_available(&self) -> usize {
        if self.status() != BusStatus::Open || self.callback_registered() {
            return 0;
        }
        self.queue_depth.load(Ordering::SeqCst)
    }

    /// Register a callback to receive inbound payloads.
    ///
    /// At most one callback may be registered at a time.
    pub fn register_callback<F>(&self, cbfunc: F) -> Result<()>
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        let mut slot = self.callback.write().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Err(BusError::CallbackAlreadyRegistered);
        }
        *slot = Some(Arc::new(cbfunc));
        Ok(())
    }

    /// Clear any registered callback. Cannot fail.
    pub fn unregister_callback(&self) -> Result<()> {
        *self.callback.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }

    /// Close the consumer connection.
    ///
    /// Signals the receiver loop, which closes the underlying transport and
    /// the internal queue on its way out. Idempotent: calls after the first
    /// are accepted as no-ops.
    pub async fn disconnect(&self) -> Result<()> {
        if self.status.send_replace(BusStatus::Closed) == BusStatus::Closed {
            return Ok(());
        }
        debug!("disconnecting reader for '{}'", self.topic);
        Ok(())
    }
}

/// Long-lived background task draining the transport's inbound stream.
///
/// Each inbound payload goes to the registered callback if one is set,
/// otherwise onto the bounded queue (blocking when the queue is full, which
/// backpressures the broker). Transient receive errors are logged and the
/// loop continues; the loop ends when the inbound stream does, when the
/// binding is disconnected, or when the binding itself is dropped. On exit
/// it closes the transport handle and drops the queue sender, which is what
/// turns pending and future reads into [`BusError::ChannelClosed`].
async fn receiver_loop(
    mut handle: Box<dyn ConsumerHandle>,
    callback: CallbackSlot,
    queue_tx: mpsc::Sender<String>,
    queue_depth: Arc<AtomicUsize>,
    mut status_rx: watch::Receiver<BusStatus>,
) {
    loop {
        if *status_rx.borrow() == BusStatus::Closed {
            break;
        }
        tokio::select! {
            // Fires on disconnect, and errors out if the binding is dropped;
            // the loop ends either way.
            _ = status_rx.changed() => break,
            inbound = handle.recv() => match inbound {
                None => {
                    debug!("inbound stream ended, receiver loop exiting");
                    break;
                }
                Some(Err(e)) => {
                    warn!("transient receive error on message bus: {}", e);
                }
                Some(Ok(payload)) => match read_slot(&callback) {
                    Some(cbfunc) => cbfunc(payload),
                    None => {
                        // Count before the push so a concurrent read never
                        // decrements a payload that was not yet counted.
                        queue_depth.fetch_add(1, Ordering::SeqCst);
                        if queue_tx.send(payload).await.is_err() {
                            queue_depth.fetch_sub(1, Ordering::SeqCst);
                            break;
                        }
                    }
                },
            }
        }
    }
    if let Err(e) = handle.close().await {
        debug!("error closing consumer transport: {}", e);
    }
}
