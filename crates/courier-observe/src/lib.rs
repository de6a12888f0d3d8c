//! Observability setup for Courier binaries.

pub mod tracing_setup;
