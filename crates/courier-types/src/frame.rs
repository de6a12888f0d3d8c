//! Frame model for the Courier wire protocol.
//!
//! A frame is a UTF-8 JSON body plus properties carried out-of-band by the
//! transport (correlation id, frame kind, reply queue). Which body shape to
//! parse is decided by the frame kind, never by sniffing the body: request
//! and post frames carry `{"request": ...}`, reply frames carry a
//! `responce`/`error` payload plus traceability echoes of the original frame.
//!
//! The wire string for a successful reply is the historical `"responce"`
//! spelling; it is load-bearing for interoperability and preserved through
//! serde renames.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::WireError;
use crate::request::{Request, RequestSpec};

/// Unique token pairing an outbound request with its eventual reply.
///
/// Generated locally from a UUID v7 (time-sortable), but stored as an opaque
/// string because remote senders may use any token scheme.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    /// Generate a fresh correlation id.
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// View the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

impl From<String> for CorrelationId {
    fn from(token: String) -> Self {
        Self(token)
    }
}

/// Discriminates the routing path of a frame.
///
/// `Post` routes exactly like `Request` on the receiving side but expects no
/// reply. `Response` and `Error` are the two reply kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    Request,
    Post,
    #[serde(rename = "responce")]
    Response,
    Error,
}

impl FrameKind {
    /// The out-of-band `type` property string for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Post => "post",
            Self::Response => "responce",
            Self::Error => "error",
        }
    }

    /// Whether this frame is dispatched to named routes.
    pub fn is_request(&self) -> bool {
        matches!(self, Self::Request | Self::Post)
    }

    /// Whether this frame resolves a pending waiter.
    pub fn is_reply(&self) -> bool {
        matches!(self, Self::Response | Self::Error)
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FrameKind {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "request" => Ok(Self::Request),
            "post" => Ok(Self::Post),
            "responce" => Ok(Self::Response),
            "error" => Ok(Self::Error),
            other => Err(WireError::UnknownFrameKind(other.to_string())),
        }
    }
}

/// Frame metadata carried out-of-band from the JSON body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameProperties {
    /// Correlation token. Present on every frame sent by Courier; tolerated
    /// as absent on inbound posts from foreign senders.
    #[serde(rename = "correlationId", default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,

    /// Frame kind, the `type` property on the wire.
    #[serde(rename = "type")]
    pub kind: FrameKind,

    /// Queue the original sender listens on. Present on `request` frames sent
    /// via `get`; absent for fire-and-forget posts.
    #[serde(rename = "replyTo", default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

impl FrameProperties {
    /// Properties for an outbound `request` frame.
    pub fn request(correlation_id: CorrelationId, reply_to: Option<String>) -> Self {
        Self {
            correlation_id: Some(correlation_id),
            kind: FrameKind::Request,
            reply_to,
        }
    }

    /// Properties for an outbound `post` frame (no reply channel).
    pub fn post(correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id: Some(correlation_id),
            kind: FrameKind::Post,
            reply_to: None,
        }
    }

    /// Properties for an outbound reply frame (`responce` or `error`).
    pub fn reply(kind: FrameKind, correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id: Some(correlation_id),
            kind,
            reply_to: None,
        }
    }
}

/// Body of a request or post frame: `{"request": <name-or-object>}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContent {
    pub request: RequestSpec,
}

/// Body of a reply frame.
///
/// Exactly one of `responce`/`error` is set by well-behaved senders; the
/// frame kind property stays authoritative for classification. The remaining
/// fields echo the frame being answered, for traceability at the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplyContent {
    /// Successful reply payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responce: Option<Value>,

    /// Error reply payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,

    /// Echo of the whole original request envelope.
    #[serde(rename = "requestMessage", default, skip_serializing_if = "Option::is_none")]
    pub request_message: Option<Value>,

    /// Echo of the original `request` body value.
    #[serde(rename = "requestBody", default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<Value>,

    /// Resolved name of the request being answered.
    #[serde(rename = "request", default, skip_serializing_if = "Option::is_none")]
    pub request_name: Option<String>,
}

impl ReplyContent {
    /// The convenience-unwrapped payload: `error` if present, else `responce`.
    pub fn unwrapped(&self) -> Option<&Value> {
        self.error.as_ref().or(self.responce.as_ref())
    }

    /// Whether this reply carries an error payload.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Parsed body of a frame; the variant follows the frame kind.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum FrameContent {
    Request(RequestContent),
    Reply(ReplyContent),
}

/// A complete frame: out-of-band properties plus parsed body.
///
/// Envelopes are transient -- built at send time or parsed at receive time,
/// dropped after dispatch or resolution.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub properties: FrameProperties,
    pub content: FrameContent,
}

impl Envelope {
    /// Build an outbound `request` frame.
    pub fn request(
        request: Request,
        correlation_id: CorrelationId,
        reply_to: Option<String>,
    ) -> Self {
        Self {
            properties: FrameProperties::request(correlation_id, reply_to),
            content: FrameContent::Request(RequestContent {
                request: RequestSpec::Detailed(request),
            }),
        }
    }

    /// Build an outbound `post` frame.
    pub fn post(request: Request, correlation_id: CorrelationId) -> Self {
        Self {
            properties: FrameProperties::post(correlation_id),
            content: FrameContent::Request(RequestContent {
                request: RequestSpec::Detailed(request),
            }),
        }
    }

    /// Build an outbound reply frame (`responce` or `error`).
    pub fn reply(kind: FrameKind, correlation_id: CorrelationId, content: ReplyContent) -> Self {
        Self {
            properties: FrameProperties::reply(kind, correlation_id),
            content: FrameContent::Reply(content),
        }
    }

    /// Parse an inbound frame body, classified by the `kind` property.
    pub fn parse(properties: FrameProperties, body: &[u8]) -> Result<Self, WireError> {
        let content = match properties.kind {
            FrameKind::Request | FrameKind::Post => {
                FrameContent::Request(serde_json::from_slice(body)?)
            }
            FrameKind::Response | FrameKind::Error => {
                FrameContent::Reply(serde_json::from_slice(body)?)
            }
        };
        Ok(Self { properties, content })
    }

    /// Serialize the body for publishing. Properties travel out-of-band.
    pub fn body_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        match &self.content {
            FrameContent::Request(content) => serde_json::to_vec(content),
            FrameContent::Reply(content) => serde_json::to_vec(content),
        }
    }

    /// Resolved request name, when this is a request/post frame.
    pub fn request_name(&self) -> Option<&str> {
        match &self.content {
            FrameContent::Request(content) => Some(content.request.name()),
            FrameContent::Reply(_) => None,
        }
    }

    /// The frame's correlation id, if any.
    pub fn correlation_id(&self) -> Option<&CorrelationId> {
        self.properties.correlation_id.as_ref()
    }
}
