use serde_json::Value;
use thiserror::Error;

/// Errors raised while decoding inbound frames.
///
/// Caught per message by the consume loop; the offending message is logged
/// and dropped (still acknowledged) so it never blocks the queue.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("unknown frame kind '{0}'")]
    UnknownFrameKind(String),

    #[error("reply frame is missing a correlation id")]
    MissingCorrelationId,
}

/// Errors from the broker transport.
///
/// Setup variants abort `connect()`; publish/consume faults are logged by the
/// owning task and never crash the process.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("broker connect failed: {0}")]
    Connect(String),

    #[error("channel setup failed: {0}")]
    ChannelSetup(String),

    #[error("queue assert failed for '{queue}': {reason}")]
    QueueAssert { queue: String, reason: String },

    #[error("publish to '{queue}' failed: {reason}")]
    Publish { queue: String, reason: String },

    #[error("consume on '{queue}' failed: {reason}")]
    Consume { queue: String, reason: String },

    #[error("transport channel closed")]
    Closed,
}

/// Errors returned to callers of `get` and `post`.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The manager has no transport channel yet; call `connect()` first.
    #[error("not connected: call connect() before sending requests")]
    NotConnected,

    /// No dispatch queue from the call parameters, the request, or the
    /// manager default.
    #[error("no dispatch queue configured for request '{0}'")]
    NoDispatchQueue(String),

    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The replying side sent an `error` frame; carries its payload verbatim.
    #[error("remote error: {0}")]
    Remote(Value),
}

impl RequestError {
    /// The remote error payload, when this is a [`RequestError::Remote`].
    pub fn remote_payload(&self) -> Option<&Value> {
        match self {
            Self::Remote(payload) => Some(payload),
            _ => None,
        }
    }
}
