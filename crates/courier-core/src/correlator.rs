//! Matches asynchronous replies to pending callers.
//!
//! Each outstanding `get` owns a [`PendingReply`] registered under its
//! correlation id. The first of a matching reply or the timer wins; the
//! loser finds no registration and is a no-op. A timeout resolves the waiter
//! with an absent result -- it is not an error.

use std::sync::Arc;

use courier_types::config::ReplyTimeout;
use courier_types::frame::{CorrelationId, Envelope};
use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::debug;

/// Registry of outstanding requests, keyed by correlation id.
///
/// Cloning is cheap and shares the underlying map. Entries are independent:
/// resolving one id never affects another, and resolution order is the
/// arrival order of replies and timeouts, not registration order.
#[derive(Clone, Default)]
pub struct ResponseCorrelator {
    pending: Arc<DashMap<CorrelationId, oneshot::Sender<Envelope>>>,
}

impl ResponseCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a waiter slot for `id`.
    ///
    /// Must be called before the request frame is published, so a fast reply
    /// cannot arrive ahead of its registration. Registering an id that is
    /// already pending replaces the previous slot.
    pub fn register(&self, id: CorrelationId) -> PendingReply {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id.clone(), tx);
        PendingReply {
            id,
            rx,
            correlator: self.clone(),
        }
    }

    /// Fulfill the waiter registered for `id` with `envelope`.
    ///
    /// Removes the registration and returns true on delivery. When no waiter
    /// is registered -- the id is unknown, or its timeout already fired --
    /// the reply is silently dropped and false is returned.
    pub fn resolve(&self, id: &CorrelationId, envelope: Envelope) -> bool {
        match self.pending.remove(id) {
            Some((_, tx)) => match tx.send(envelope) {
                Ok(()) => true,
                Err(_) => {
                    debug!(correlation_id = %id, "waiter dropped before reply delivery");
                    false
                }
            },
            None => {
                debug!(correlation_id = %id, "no pending waiter for reply");
                false
            }
        }
    }

    /// Number of currently outstanding registrations.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn remove(&self, id: &CorrelationId) {
        self.pending.remove(id);
    }
}

impl std::fmt::Debug for ResponseCorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCorrelator")
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// Handle for one outstanding request.
///
/// Dropping the handle without waiting removes the registration, so an
/// abandoned `get` cannot leak a slot.
pub struct PendingReply {
    id: CorrelationId,
    rx: oneshot::Receiver<Envelope>,
    correlator: ResponseCorrelator,
}

impl PendingReply {
    /// The correlation id this handle is registered under.
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.id
    }

    /// Await resolution: the matching reply envelope, or `None` once the
    /// timer expires (`ReplyTimeout::Never` disables the timer entirely).
    ///
    /// A timeout removes the registration, so a late reply finds no waiter
    /// and has no effect.
    pub async fn wait(mut self, timeout: ReplyTimeout) -> Option<Envelope> {
        match timeout {
            ReplyTimeout::Never => (&mut self.rx).await.ok(),
            ReplyTimeout::After(duration) => {
                match tokio::time::timeout(duration, &mut self.rx).await {
                    Ok(received) => received.ok(),
                    Err(_) => {
                        self.correlator.remove(&self.id);
                        None
                    }
                }
            }
        }
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        self.correlator.remove(&self.id);
    }
}
