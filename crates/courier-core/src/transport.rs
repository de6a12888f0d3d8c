//! Transport port: the broker capability consumed by the connection manager.
//!
//! The core never talks to a concrete broker. It consumes an abstract
//! connect/consume/publish/ack capability through these traits;
//! implementations live in `courier-transport` (and embedders may bring
//! their own). Uses native async fn in traits (Rust 2024 edition, no
//! async_trait macro); managers are generic over the transport, mirroring
//! the service-over-port layering of the rest of the workspace.

use courier_types::error::TransportError;
use courier_types::frame::FrameProperties;
use tokio::sync::mpsc;

/// A raw inbound message: frame properties, body bytes, and the delivery tag
/// used for manual acknowledgement.
#[derive(Debug)]
pub struct Delivery {
    /// Transport-assigned tag, passed back via [`Channel::ack`].
    pub tag: u64,
    /// Out-of-band frame metadata.
    pub properties: FrameProperties,
    /// UTF-8 JSON body bytes.
    pub body: Vec<u8>,
}

/// Broker bootstrap: produces connections from a URL.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;

    /// Establish a broker connection. Any failure aborts startup.
    fn connect(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// An established broker connection; produces channels.
pub trait Connection: Send + Sync {
    type Channel: Channel;

    /// Open a channel on this connection.
    fn create_channel(
        &self,
    ) -> impl Future<Output = Result<Self::Channel, TransportError>> + Send;
}

/// A broker channel: queue declaration, consumption, publishing, and manual
/// acknowledgement.
///
/// Channels are `Clone` so the consume loop and the publisher task can share
/// one; implementations must tolerate concurrent use of the clones.
pub trait Channel: Clone + Send + Sync + 'static {
    /// Idempotently declare a queue.
    fn assert_queue(
        &self,
        name: &str,
        durable: bool,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Begin consuming `queue`, delivering raw messages on the returned
    /// receiver. One consumer per queue; messages must be acknowledged via
    /// [`ack`](Self::ack) or the transport will redeliver them.
    fn consume(
        &self,
        queue: &str,
    ) -> impl Future<Output = Result<mpsc::Receiver<Delivery>, TransportError>> + Send;

    /// Fire-and-forget publish of a frame body with its properties.
    fn publish(
        &self,
        queue: &str,
        properties: &FrameProperties,
        body: Vec<u8>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Acknowledge a delivery after processing.
    fn ack(&self, tag: u64) -> impl Future<Output = Result<(), TransportError>> + Send;
}
