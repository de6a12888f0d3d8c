//! Shared wire and configuration types for Courier.
//!
//! This crate contains the frame model exchanged over the message-queue
//! transport, request normalization, manager configuration, and the error
//! taxonomy used across the Courier workspace.
//!
//! Zero infrastructure dependencies -- only serde, serde_json, uuid, thiserror.

pub mod config;
pub mod error;
pub mod frame;
pub mod request;
