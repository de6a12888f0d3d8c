//! Name-based dispatch of inbound request and post frames.
//!
//! Routes are an explicit mapping from request name to an ordered list of
//! handler closures -- fan-out, not first-match-wins. Every handler for a
//! matched name runs, in registration order, and a failing handler never
//! prevents the ones after it.

use std::sync::Arc;

use courier_types::frame::Envelope;
use courier_types::request::Request;
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::reply::ReplyContext;

/// A registered route handler.
///
/// Handlers receive the normalized request, the reply capability for the
/// current frame, and the raw envelope. They return `Err` to report a fault;
/// faults are logged and isolated, never propagated.
pub type RouteHandler =
    dyn Fn(&Request, &ReplyContext, &Envelope) -> anyhow::Result<()> + Send + Sync;

/// Registry mapping request names to their handler lists.
///
/// Cloning is cheap and shares the underlying table.
#[derive(Clone, Default)]
pub struct RequestRouter {
    routes: Arc<DashMap<String, Vec<Arc<RouteHandler>>>>,
}

impl RequestRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handler` to the ordered list for `name`.
    ///
    /// Multiple handlers may be registered for the same name; all are invoked
    /// on a match, in registration order.
    pub fn add_route<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(&Request, &ReplyContext, &Envelope) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let name = name.into();
        self.routes
            .entry(name.clone())
            .or_default()
            .push(Arc::new(handler));
        debug!(request = %name, "route registered");
    }

    /// Invoke every handler registered for `name`.
    ///
    /// Returns false without side effects when no route matches. A handler
    /// fault is logged and does not stop later handlers.
    pub fn dispatch(
        &self,
        name: &str,
        request: &Request,
        envelope: &Envelope,
        reply: &ReplyContext,
    ) -> bool {
        // Clone the handler list out of the map so a handler that registers
        // new routes cannot deadlock against the table.
        let handlers = match self.routes.get(name) {
            Some(entry) => entry.value().clone(),
            None => return false,
        };

        for (index, handler) in handlers.iter().enumerate() {
            if let Err(fault) = handler(request, reply, envelope) {
                warn!(request = %name, handler = index, fault = %fault, "route handler failed");
            }
        }
        true
    }

    /// Whether any handler is registered for `name`.
    pub fn has_route(&self, name: &str) -> bool {
        self.routes.contains_key(name)
    }

    /// Number of distinct request names with registered handlers.
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }
}

impl std::fmt::Debug for RequestRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestRouter")
            .field("routes", &self.routes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_types::frame::{CorrelationId, FrameKind};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    fn inbound_request(name: &str) -> (Request, Envelope) {
        let request = Request::new(name);
        let envelope = Envelope::request(
            request.clone(),
            CorrelationId::new(),
            Some("caller".to_string()),
        );
        (request, envelope)
    }

    fn reply_context(envelope: &Envelope) -> ReplyContext {
        let (tx, _rx) = mpsc::unbounded_channel();
        ReplyContext::for_envelope(envelope, tx)
    }

    #[test]
    fn matched_route_invokes_handler_exactly_once() {
        let router = RequestRouter::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        router.add_route("ping", move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let (request, envelope) = inbound_request("ping");
        let reply = reply_context(&envelope);
        assert!(router.dispatch("ping", &request, &envelope, &reply));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unmatched_name_is_a_silent_no_op() {
        let router = RequestRouter::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        router.add_route("ping", move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let (request, envelope) = inbound_request("pong");
        let reply = reply_context(&envelope);
        assert!(!router.dispatch("pong", &request, &envelope, &reply));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let router = RequestRouter::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            router.add_route("ping", move |_, _, _| {
                order.lock().unwrap().push(tag);
                Ok(())
            });
        }

        let (request, envelope) = inbound_request("ping");
        let reply = reply_context(&envelope);
        router.dispatch("ping", &request, &envelope, &reply);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn failing_handler_does_not_stop_later_handlers() {
        let router = RequestRouter::new();
        let calls = Arc::new(AtomicUsize::new(0));
        router.add_route("ping", |_, _, _| anyhow::bail!("broken handler"));
        let counter = Arc::clone(&calls);
        router.add_route("ping", move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let (request, envelope) = inbound_request("ping");
        let reply = reply_context(&envelope);
        assert!(router.dispatch("ping", &request, &envelope, &reply));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handler_receives_request_payload() {
        let router = RequestRouter::new();
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        router.add_route("lookup", move |request, _, _| {
            *sink.lock().unwrap() = Some(request.payload["key"].clone());
            Ok(())
        });

        let request = Request::new("lookup").with_field("key", serde_json::json!("user:7"));
        let envelope = Envelope::request(request.clone(), CorrelationId::new(), None);
        let reply = reply_context(&envelope);
        router.dispatch("lookup", &request, &envelope, &reply);
        assert_eq!(*seen.lock().unwrap(), Some(serde_json::json!("user:7")));
    }

    #[test]
    fn handler_sees_frame_kind_on_envelope() {
        let router = RequestRouter::new();
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        router.add_route("notify", move |_, _, envelope| {
            *sink.lock().unwrap() = Some(envelope.properties.kind);
            Ok(())
        });

        let request = Request::new("notify");
        let envelope = Envelope::post(request.clone(), CorrelationId::new());
        let reply = reply_context(&envelope);
        router.dispatch("notify", &request, &envelope, &reply);
        assert_eq!(*seen.lock().unwrap(), Some(FrameKind::Post));
    }

    #[test]
    fn route_bookkeeping() {
        let router = RequestRouter::new();
        assert_eq!(router.route_count(), 0);
        router.add_route("ping", |_, _, _| Ok(()));
        router.add_route("ping", |_, _, _| Ok(()));
        router.add_route("pong", |_, _, _| Ok(()));
        assert_eq!(router.route_count(), 2);
        assert!(router.has_route("ping"));
        assert!(!router.has_route("lookup"));
    }
}
