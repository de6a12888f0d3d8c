//! Request normalization at the API boundary.
//!
//! On the wire the `request` field of a request frame may be a bare string
//! name (legacy senders) or a structured object with a `name` plus arbitrary
//! payload fields. Both shapes are normalized into [`Request`] exactly once,
//! at the boundary; everything past it works with the structured form.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A named request with an optional per-request dispatch queue override and
/// a flexible JSON payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Route name the receiving side dispatches on.
    pub name: String,

    /// Per-request dispatch queue override. Resolved with lower precedence
    /// than a per-call parameter and higher than the manager default.
    #[serde(rename = "dispatchTo", default, skip_serializing_if = "Option::is_none")]
    pub dispatch_to: Option<String>,

    /// Arbitrary extra payload fields, inlined next to `name` on the wire.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Request {
    /// Create a request with just a name and an empty payload.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dispatch_to: None,
            payload: Map::new(),
        }
    }

    /// Attach a payload field (builder style).
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }

    /// Override the dispatch queue for this request only.
    pub fn with_dispatch_to(mut self, queue: impl Into<String>) -> Self {
        self.dispatch_to = Some(queue.into());
        self
    }
}

/// The dynamic wire shape of the `request` field: a bare name or a full
/// request object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestSpec {
    /// Structured request object with a required `name`.
    Detailed(Request),
    /// Legacy bare-string form, equivalent to a request with no payload.
    Name(String),
}

impl RequestSpec {
    /// The request name, regardless of shape.
    pub fn name(&self) -> &str {
        match self {
            Self::Detailed(request) => &request.name,
            Self::Name(name) => name,
        }
    }

    /// Normalize into the structured form.
    pub fn into_request(self) -> Request {
        match self {
            Self::Detailed(request) => request,
            Self::Name(name) => Request::new(name),
        }
    }
}

impl From<Request> for RequestSpec {
    fn from(request: Request) -> Self {
        Self::Detailed(request)
    }
}

/// Conversion accepted by the public `get`/`post` operations, so callers can
/// pass a bare name or a full [`Request`].
pub trait IntoRequest {
    /// Normalize into a structured [`Request`].
    fn into_request(self) -> Request;
}

impl IntoRequest for Request {
    fn into_request(self) -> Request {
        self
    }
}

impl IntoRequest for &str {
    fn into_request(self) -> Request {
        Request::new(self)
    }
}

impl IntoRequest for String {
    fn into_request(self) -> Request {
        Request::new(self)
    }
}
