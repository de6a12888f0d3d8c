//! Reply capability handed to route handlers.
//!
//! A [`ReplyContext`] addresses the answer to the current inbound frame from
//! its `replyTo` and correlation id, and enqueues outbound reply frames on
//! the manager's publisher queue. Handlers never touch the transport
//! directly, so they cannot block the consume loop on broker I/O.

use courier_types::frame::{CorrelationId, Envelope, FrameContent, FrameKind, ReplyContent};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// An outbound frame queued for the publisher task.
#[derive(Debug)]
pub struct OutboundFrame {
    /// Destination queue name.
    pub queue: String,
    /// The frame to publish.
    pub envelope: Envelope,
}

/// Send/error capability for answering one inbound request.
///
/// A handler may reply zero, one, or many times; exactly-once is not
/// enforced here. Callers using `get` only observe the first reply that
/// arrives, per the correlator's at-most-once resolution.
pub struct ReplyContext {
    correlation_id: Option<CorrelationId>,
    reply_to: Option<String>,
    request_name: Option<String>,
    request_echo: Option<Value>,
    envelope_echo: Option<Value>,
    outbound: mpsc::UnboundedSender<OutboundFrame>,
}

impl ReplyContext {
    /// Build the reply capability for an inbound request envelope.
    pub fn for_envelope(
        envelope: &Envelope,
        outbound: mpsc::UnboundedSender<OutboundFrame>,
    ) -> Self {
        let request_echo = match &envelope.content {
            FrameContent::Request(content) => serde_json::to_value(&content.request).ok(),
            FrameContent::Reply(_) => None,
        };
        Self {
            correlation_id: envelope.properties.correlation_id.clone(),
            reply_to: envelope.properties.reply_to.clone(),
            request_name: envelope.request_name().map(str::to_string),
            request_echo,
            envelope_echo: serde_json::to_value(envelope).ok(),
            outbound,
        }
    }

    /// Emit a `responce` frame back to the requester.
    ///
    /// No-op (returns false) when the inbound frame carried no `replyTo` or
    /// no correlation id -- a post has no reply channel.
    pub fn send(&self, body: Value) -> bool {
        self.emit(FrameKind::Response, body)
    }

    /// Emit an `error` frame back to the requester. Same addressing rule as
    /// [`send`](Self::send).
    pub fn error(&self, body: Value) -> bool {
        self.emit(FrameKind::Error, body)
    }

    /// Whether the inbound frame carried a reply address.
    pub fn can_reply(&self) -> bool {
        self.reply_to.is_some() && self.correlation_id.is_some()
    }

    fn emit(&self, kind: FrameKind, body: Value) -> bool {
        let (Some(reply_to), Some(correlation_id)) = (&self.reply_to, &self.correlation_id) else {
            debug!(
                request = self.request_name.as_deref().unwrap_or("<unnamed>"),
                "no reply channel on inbound frame; dropping reply"
            );
            return false;
        };

        let (responce, error) = match kind {
            FrameKind::Error => (None, Some(body)),
            _ => (Some(body), None),
        };
        let content = ReplyContent {
            responce,
            error,
            request_message: self.envelope_echo.clone(),
            request_body: self.request_echo.clone(),
            request_name: self.request_name.clone(),
        };
        let envelope = Envelope::reply(kind, correlation_id.clone(), content);

        debug!(
            request = self.request_name.as_deref().unwrap_or("<unnamed>"),
            queue = %reply_to,
            kind = %kind,
            "queued reply"
        );
        let queued = self
            .outbound
            .send(OutboundFrame {
                queue: reply_to.clone(),
                envelope,
            })
            .is_ok();
        if !queued {
            warn!(queue = %reply_to, "outbound queue closed; reply dropped");
        }
        queued
    }
}
