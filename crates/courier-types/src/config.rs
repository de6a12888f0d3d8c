//! Connection manager configuration and per-call parameters.
//!
//! `ManagerConfig` is the construction-time configuration, loadable from a
//! TOML document. All fields have sensible defaults. `CallParams` carries the
//! per-call overrides accepted by `get`/`post`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Construction-time configuration for a connection manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Display label used in logs and the info table.
    #[serde(default = "default_name")]
    pub name: String,

    /// Broker URL handed to the transport.
    #[serde(default = "default_url")]
    pub url: String,

    /// Default queue outbound requests are dispatched to.
    #[serde(default)]
    pub dispatch_to: Option<String>,

    /// Queue this process consumes from (inbound requests and replies).
    #[serde(default)]
    pub consume_on: Option<String>,

    /// Queue durability flag passed to the transport on assertion.
    #[serde(default)]
    pub durable: bool,

    /// Default reply wait for `get`, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Whether error replies surface as failures from `get`.
    #[serde(default = "default_throw_errors")]
    pub throw_errors: bool,

    /// Emit the connection info banner on construction.
    #[serde(default)]
    pub show_info_table: bool,
}

fn default_name() -> String {
    "courier".to_string()
}

fn default_url() -> String {
    "amqp://localhost".to_string()
}

fn default_timeout_ms() -> u64 {
    8000
}

fn default_throw_errors() -> bool {
    true
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            url: default_url(),
            dispatch_to: None,
            consume_on: None,
            durable: false,
            timeout_ms: default_timeout_ms(),
            throw_errors: default_throw_errors(),
            show_info_table: false,
        }
    }
}

impl ManagerConfig {
    /// The default reply wait as a [`ReplyTimeout`].
    pub fn default_timeout(&self) -> ReplyTimeout {
        ReplyTimeout::After(Duration::from_millis(self.timeout_ms))
    }
}

/// How long a `get` call waits for its correlated reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyTimeout {
    /// Resolve with an absent result once the duration elapses.
    After(Duration),
    /// Wait indefinitely (the `"none"` sentinel of the wire protocol).
    Never,
}

impl ReplyTimeout {
    /// Convenience constructor from milliseconds.
    pub fn from_millis(ms: u64) -> Self {
        Self::After(Duration::from_millis(ms))
    }
}

/// Shape of the value a `get` call resolves with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// The error payload if present, else the responce payload.
    #[default]
    Unwrapped,
    /// The whole reply content object.
    Body,
    /// The entire reply envelope (properties and content).
    Full,
}

/// Per-call overrides for `get` and `post`.
#[derive(Debug, Clone, Default)]
pub struct CallParams {
    /// Dispatch queue override; takes precedence over the per-request field
    /// and the manager default.
    pub dispatch_to: Option<String>,

    /// Reply queue override for this call.
    pub consume_on: Option<String>,

    /// Reply wait override; `None` falls back to the manager default.
    pub timeout: Option<ReplyTimeout>,

    /// Output shaping for the resolved value.
    pub output: OutputMode,
}

impl CallParams {
    /// Override the dispatch queue.
    pub fn dispatch_to(mut self, queue: impl Into<String>) -> Self {
        self.dispatch_to = Some(queue.into());
        self
    }

    /// Override the reply queue.
    pub fn consume_on(mut self, queue: impl Into<String>) -> Self {
        self.consume_on = Some(queue.into());
        self
    }

    /// Wait at most the given number of milliseconds for a reply.
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout = Some(ReplyTimeout::from_millis(ms));
        self
    }

    /// Disable the reply timer entirely.
    pub fn no_timeout(mut self) -> Self {
        self.timeout = Some(ReplyTimeout::Never);
        self
    }

    /// Select the output shape.
    pub fn output(mut self, mode: OutputMode) -> Self {
        self.output = mode;
        self
    }
}
