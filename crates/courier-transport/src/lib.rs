//! Transport implementations for Courier.
//!
//! Implements the transport port defined in `courier-core`. The only
//! built-in backend is the in-process [`MemoryBroker`]: named queues over
//! tokio mpsc channels with manual-ack bookkeeping. It exists to exercise
//! the port -- loopback wiring for tests, demos, and embedders -- not to be
//! a broker.

pub mod memory;

#[cfg(test)]
mod loopback;

pub use memory::{MemoryBroker, MemoryChannel, MemoryConnection};
