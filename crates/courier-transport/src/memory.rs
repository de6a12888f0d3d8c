//! In-process broker backed by named tokio mpsc queues.
//!
//! `MemoryBroker` implements the transport port for loopback use: every
//! queue is a bounded mpsc channel created on first reference, publishes
//! buffer until a consumer appears, and acknowledgement is tracked per
//! delivery tag. Durability is recorded and checked on re-assertion but has
//! no persistence behind it.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use courier_core::transport::{Channel, Connection, Delivery, Transport};
use courier_types::error::TransportError;
use courier_types::frame::FrameProperties;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

/// Buffer size for per-queue delivery channels.
const QUEUE_BUFFER: usize = 256;

struct QueueState {
    sender: mpsc::Sender<Delivery>,
    /// Taken by the first consumer; a queue has at most one.
    receiver: Mutex<Option<mpsc::Receiver<Delivery>>>,
    durable: bool,
}

struct BrokerState {
    queues: DashMap<String, Arc<QueueState>>,
    next_tag: AtomicU64,
    /// Delivery tags published but not yet acknowledged, by queue name.
    unacked: DashMap<u64, String>,
}

impl BrokerState {
    fn queue(&self, name: &str, durable: bool) -> Arc<QueueState> {
        self.queues
            .entry(name.to_string())
            .or_insert_with(|| {
                let (sender, receiver) = mpsc::channel(QUEUE_BUFFER);
                debug!(queue = %name, durable, "queue created");
                Arc::new(QueueState {
                    sender,
                    receiver: Mutex::new(Some(receiver)),
                    durable,
                })
            })
            .clone()
    }
}

/// In-process broker; cloning shares the queue registry, so clones handed to
/// several managers form one loopback fabric.
#[derive(Clone)]
pub struct MemoryBroker {
    state: Arc<BrokerState>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self {
            state: Arc::new(BrokerState {
                queues: DashMap::new(),
                next_tag: AtomicU64::new(1),
                unacked: DashMap::new(),
            }),
        }
    }

    /// Whether a queue has been created (asserted or published to).
    pub fn queue_exists(&self, name: &str) -> bool {
        self.state.queues.contains_key(name)
    }

    /// Number of deliveries published but not yet acknowledged.
    pub fn unacked_count(&self) -> usize {
        self.state.unacked.len()
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBroker")
            .field("queues", &self.state.queues.len())
            .field("unacked", &self.state.unacked.len())
            .finish()
    }
}

impl Transport for MemoryBroker {
    type Connection = MemoryConnection;

    async fn connect(&self, url: &str) -> Result<Self::Connection, TransportError> {
        debug!(url = %url, "memory broker connected");
        Ok(MemoryConnection {
            state: Arc::clone(&self.state),
        })
    }
}

/// A connection into the shared broker state.
pub struct MemoryConnection {
    state: Arc<BrokerState>,
}

impl Connection for MemoryConnection {
    type Channel = MemoryChannel;

    async fn create_channel(&self) -> Result<Self::Channel, TransportError> {
        Ok(MemoryChannel {
            state: Arc::clone(&self.state),
        })
    }
}

/// A channel over the shared broker state.
#[derive(Clone)]
pub struct MemoryChannel {
    state: Arc<BrokerState>,
}

impl Channel for MemoryChannel {
    async fn assert_queue(&self, name: &str, durable: bool) -> Result<(), TransportError> {
        let queue = self.state.queue(name, durable);
        if queue.durable != durable {
            return Err(TransportError::QueueAssert {
                queue: name.to_string(),
                reason: format!(
                    "queue exists with durable={}, asserted with durable={durable}",
                    queue.durable
                ),
            });
        }
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<mpsc::Receiver<Delivery>, TransportError> {
        let state = self.state.queue(queue, false);
        // A poisoned slot is treated the same as an already-taken one.
        let receiver = state.receiver.lock().ok().and_then(|mut slot| slot.take());
        receiver.ok_or_else(|| TransportError::Consume {
            queue: queue.to_string(),
            reason: "queue already has a consumer".to_string(),
        })
    }

    async fn publish(
        &self,
        queue: &str,
        properties: &FrameProperties,
        body: Vec<u8>,
    ) -> Result<(), TransportError> {
        let state = self.state.queue(queue, false);
        let tag = self.state.next_tag.fetch_add(1, Ordering::Relaxed);
        self.state.unacked.insert(tag, queue.to_string());

        let delivery = Delivery {
            tag,
            properties: properties.clone(),
            body,
        };
        state.sender.send(delivery).await.map_err(|_| {
            self.state.unacked.remove(&tag);
            TransportError::Publish {
                queue: queue.to_string(),
                reason: "consumer dropped the queue".to_string(),
            }
        })
    }

    async fn ack(&self, tag: u64) -> Result<(), TransportError> {
        if self.state.unacked.remove(&tag).is_none() {
            debug!(tag, "ack for unknown delivery tag");
        }
        Ok(())
    }
}
