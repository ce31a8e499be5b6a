//! Error types for message bus operations

use thiserror::Error;

/// Result type alias for message bus operations
pub type Result<T> = std::result::Result<T, BusError>;

/// Errors that can occur when configuring, connecting to, or using the bus.
///
/// Variants fall into five categories: configuration errors (detected before
/// any network activity), connection errors (retried up to the configured
/// budget), role-mismatch errors (calling a read-side operation on a writer
/// or vice versa), runtime I/O errors (individual send/receive failures on an
/// open connection), and state errors (operating on a closed connection or
/// misusing the callback registration).
#[derive(Error, Debug)]
pub enum BusError {
    /// No bus technology was specified in the configuration
    #[error("missing bus technology")]
    MissingTechnology,

    /// No topic was specified in the configuration
    #[error("missing bus topic")]
    MissingTopic,

    /// No direction (writer/reader) was specified in the configuration
    #[error("missing bus direction")]
    MissingDirection,

    /// The direction string could not be parsed
    #[error("invalid bus direction '{0}'")]
    InvalidDirection(String),

    /// The blocking mode string could not be parsed
    #[error("invalid blocking mode '{0}'")]
    InvalidBlockingMode(String),

    /// The technology string does not name a known bus technology
    #[error("unknown bus technology '{0}'")]
    UnknownTechnology(String),

    /// A host spec string was not in `host:port:topic` form
    #[error("invalid host spec '{0}', expected host:port:topic")]
    InvalidHostSpec(String),

    /// All connection attempts failed
    #[error("exhausted retry count ({attempts}), cannot connect to message bus")]
    RetriesExhausted {
        /// Number of connection attempts made before giving up
        attempts: u32,
    },

    /// Transport-level failure (socket, channel, framing)
    #[error("transport error: {0}")]
    Transport(String),

    /// The broker reported a delivery failure for a published message
    #[error("message delivery failed: {0}")]
    Delivery(String),

    /// A read-side operation was called on a writer connection
    #[error("operation not supported on a writer connection: {0}")]
    NotSupportedForWriter(&'static str),

    /// A write-side operation was called on a reader connection
    #[error("operation not supported on a reader connection: {0}")]
    NotSupportedForReader(&'static str),

    /// The connection has been closed
    #[error("connection is closed")]
    ConnectionClosed,

    /// The receive queue is closed and will deliver no further messages
    #[error("receive channel closed, no further messages")]
    ChannelClosed,

    /// A callback is already registered on this reader
    #[error("callback function already registered")]
    CallbackAlreadyRegistered,

    /// The operation is invalid while a callback is registered
    #[error("invalid while a callback is registered")]
    CallbackActive,

    /// The operation is not allowed while a connection is active
    #[error("operation not allowed while a connection is active")]
    AlreadyConnected,

    /// The bus has not been configured yet
    #[error("message bus has not been configured")]
    NotConfigured,
}

impl BusError {
    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a delivery error
    pub fn delivery(msg: impl Into<String>) -> Self {
        Self::Delivery(msg.into())
    }
}
