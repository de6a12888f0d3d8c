//! RPC correlation and routing core for Courier.
//!
//! This crate holds the protocol state machines: [`ResponseCorrelator`]
//! matches asynchronous replies to pending callers, [`RequestRouter`]
//! dispatches inbound requests to named route handlers, and
//! [`ConnectionManager`] orchestrates both over a broker transport.
//!
//! The transport itself is a port -- the [`transport`] module defines the
//! traits, and implementations live in `courier-transport`. This crate never
//! depends on a concrete broker.

pub mod correlator;
pub mod manager;
pub mod reply;
pub mod router;
pub mod transport;

pub use correlator::{PendingReply, ResponseCorrelator};
pub use manager::ConnectionManager;
pub use reply::{OutboundFrame, ReplyContext};
pub use router::RequestRouter;
pub use transport::{Channel, Connection, Delivery, Transport};
