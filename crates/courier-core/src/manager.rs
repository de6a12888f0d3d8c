//! Top-level orchestration: the public `get`/`post`/`add_route` surface and
//! the inbound classification loop.
//!
//! `connect()` bootstraps the transport, then spawns two tasks: a consume
//! loop that classifies every inbound frame (requests to the router, replies
//! to the correlator) and acknowledges it, and a publisher that drains the
//! outbound queue into the channel. All sends -- requests, posts, and
//! handler replies -- funnel through that single publisher, so the shared
//! channel is never driven concurrently.

use std::sync::OnceLock;

use courier_types::config::{CallParams, ManagerConfig, OutputMode};
use courier_types::error::{RequestError, TransportError, WireError};
use courier_types::frame::{CorrelationId, Envelope, FrameContent, FrameKind};
use courier_types::request::{IntoRequest, Request};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::correlator::ResponseCorrelator;
use crate::reply::{OutboundFrame, ReplyContext};
use crate::router::RequestRouter;
use crate::transport::{Channel, Connection, Delivery, Transport};

/// Connection state installed by a successful `connect()`.
struct Link {
    outbound: mpsc::UnboundedSender<OutboundFrame>,
}

/// Orchestrates the correlator, the router, and a broker transport behind
/// the public `get` / `post` / `add_route` operations.
pub struct ConnectionManager<T: Transport> {
    config: ManagerConfig,
    transport: T,
    correlator: ResponseCorrelator,
    router: RequestRouter,
    link: OnceLock<Link>,
    shutdown: CancellationToken,
}

impl<T: Transport> ConnectionManager<T> {
    /// Create a manager from its configuration and a transport.
    ///
    /// No broker I/O happens here; call [`connect`](Self::connect) to start
    /// consuming.
    pub fn new(config: ManagerConfig, transport: T) -> Self {
        if config.show_info_table {
            info!(
                name = %config.name,
                durable = config.durable,
                timeout_ms = config.timeout_ms,
                throw_errors = config.throw_errors,
                dispatch_to = config.dispatch_to.as_deref().unwrap_or("<unset>"),
                consume_on = config.consume_on.as_deref().unwrap_or("<unset>"),
                "connection manager configured"
            );
        }
        Self {
            config,
            transport,
            correlator: ResponseCorrelator::new(),
            router: RequestRouter::new(),
            link: OnceLock::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Acquire the transport, declare the consume queue, and start the
    /// consume loop and publisher tasks.
    ///
    /// Setup failures propagate to the caller and abort this attempt; they
    /// are never swallowed. Calling `connect` on an already-connected
    /// manager is a no-op.
    pub async fn connect(&self) -> Result<(), TransportError> {
        if self.link.get().is_some() {
            debug!(name = %self.config.name, "already connected");
            return Ok(());
        }

        let consume_on = self.config.consume_on.clone().ok_or_else(|| {
            TransportError::ChannelSetup("consume queue not configured".to_string())
        })?;

        let connection = self.transport.connect(&self.config.url).await?;
        let channel = connection.create_channel().await?;
        channel
            .assert_queue(&consume_on, self.config.durable)
            .await?;
        let inbound = channel.consume(&consume_on).await?;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        if self
            .link
            .set(Link {
                outbound: outbound_tx.clone(),
            })
            .is_err()
        {
            // Lost a concurrent connect race; the winner's tasks are running.
            return Ok(());
        }

        tokio::spawn(run_publisher(
            channel.clone(),
            outbound_rx,
            self.shutdown.clone(),
        ));
        tokio::spawn(run_consume_loop(
            channel,
            inbound,
            consume_on.clone(),
            self.correlator.clone(),
            self.router.clone(),
            outbound_tx,
            self.shutdown.clone(),
        ));

        info!(name = %self.config.name, queue = %consume_on, "ready to consume messages");
        Ok(())
    }

    /// Register a handler for requests named `name`. Chainable.
    pub fn add_route<F>(&self, name: impl Into<String>, handler: F) -> &Self
    where
        F: Fn(&Request, &ReplyContext, &Envelope) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.router.add_route(name, handler);
        self
    }

    /// Send a request and await its correlated reply.
    ///
    /// Resolves to `Ok(None)` when the reply window elapses -- a timeout is
    /// an absent result, not a failure. A reply carrying an `error` payload
    /// fails with [`RequestError::Remote`] unless `throw_errors` is off.
    /// Otherwise the reply is shaped by `params.output`.
    pub async fn get(
        &self,
        request: impl IntoRequest,
        params: CallParams,
    ) -> Result<Option<Value>, RequestError> {
        let request = request.into_request();
        let link = self.link.get().ok_or(RequestError::NotConnected)?;

        let queue = resolve_dispatch_queue(&params, &request, &self.config)
            .ok_or_else(|| RequestError::NoDispatchQueue(request.name.clone()))?;
        let reply_to = params
            .consume_on
            .clone()
            .or_else(|| self.config.consume_on.clone());
        let timeout = params.timeout.unwrap_or_else(|| self.config.default_timeout());

        // Register the waiter before publishing, so a fast reply cannot race
        // its own registration.
        let correlation_id = CorrelationId::new();
        let waiter = self.correlator.register(correlation_id.clone());

        let envelope = Envelope::request(request.clone(), correlation_id.clone(), reply_to);
        debug!(
            request = %request.name,
            queue = %queue,
            correlation_id = %correlation_id,
            "sending request"
        );
        link.outbound
            .send(OutboundFrame {
                queue: queue.clone(),
                envelope,
            })
            .map_err(|_| RequestError::Transport(TransportError::Closed))?;

        let Some(reply) = waiter.wait(timeout).await else {
            warn!(request = %request.name, queue = %queue, "no reply before timeout");
            return Ok(None);
        };

        let FrameContent::Reply(content) = &reply.content else {
            warn!(request = %request.name, "reply frame carried request content; dropping");
            return Ok(None);
        };
        debug!(request = %request.name, error = content.is_error(), "reply received");

        if self.config.throw_errors {
            if let Some(error) = &content.error {
                return Err(RequestError::Remote(error.clone()));
            }
        }

        let value = match params.output {
            OutputMode::Full => serde_json::to_value(&reply)?,
            OutputMode::Body => serde_json::to_value(content)?,
            OutputMode::Unwrapped => content.unwrapped().cloned().unwrap_or(Value::Null),
        };
        Ok(Some(value))
    }

    /// Send a request without registering a waiter (fire-and-forget).
    ///
    /// The frame carries no `replyTo`, so the receiving side's reply context
    /// is a no-op even if a handler answers.
    pub async fn post(
        &self,
        request: impl IntoRequest,
        params: CallParams,
    ) -> Result<(), RequestError> {
        let request = request.into_request();
        let link = self.link.get().ok_or(RequestError::NotConnected)?;

        let queue = resolve_dispatch_queue(&params, &request, &self.config)
            .ok_or_else(|| RequestError::NoDispatchQueue(request.name.clone()))?;

        let envelope = Envelope::post(request.clone(), CorrelationId::new());
        debug!(request = %request.name, queue = %queue, "sending post");
        link.outbound
            .send(OutboundFrame { queue, envelope })
            .map_err(|_| RequestError::Transport(TransportError::Closed))?;
        Ok(())
    }

    /// Stop the consume loop and publisher tasks.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Whether `connect()` has completed successfully.
    pub fn is_connected(&self) -> bool {
        self.link.get().is_some()
    }

    /// Number of requests currently awaiting a reply.
    pub fn pending_replies(&self) -> usize {
        self.correlator.pending_count()
    }

    /// Number of distinct request names with registered handlers.
    pub fn route_count(&self) -> usize {
        self.router.route_count()
    }

    /// The manager's configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }
}

impl<T: Transport> std::fmt::Debug for ConnectionManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("name", &self.config.name)
            .field("connected", &self.is_connected())
            .field("routes", &self.router.route_count())
            .field("pending_replies", &self.correlator.pending_count())
            .finish()
    }
}

/// Dispatch-queue precedence: per-call param, then per-request field, then
/// the manager default.
fn resolve_dispatch_queue(
    params: &CallParams,
    request: &Request,
    config: &ManagerConfig,
) -> Option<String> {
    params
        .dispatch_to
        .clone()
        .or_else(|| request.dispatch_to.clone())
        .or_else(|| config.dispatch_to.clone())
}

/// Drain the outbound queue into the channel. The single serialization point
/// for every publish on this manager.
async fn run_publisher<C: Channel>(
    channel: C,
    mut outbound: mpsc::UnboundedReceiver<OutboundFrame>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            frame = outbound.recv() => {
                let Some(OutboundFrame { queue, envelope }) = frame else {
                    break;
                };
                let body = match envelope.body_bytes() {
                    Ok(body) => body,
                    Err(e) => {
                        error!(queue = %queue, error = %e, "failed to encode outbound frame");
                        continue;
                    }
                };
                if let Err(e) = channel.publish(&queue, &envelope.properties, body).await {
                    error!(queue = %queue, error = %e, "publish failed");
                }
            }
        }
    }
    debug!("publisher task stopped");
}

/// Consume loop: classify each inbound frame and acknowledge it.
///
/// Deliveries are processed one at a time; handlers run synchronously inside
/// the loop. Per-message faults are logged and the message is still acked so
/// a bad payload never blocks the queue.
async fn run_consume_loop<C: Channel>(
    channel: C,
    mut inbound: mpsc::Receiver<Delivery>,
    queue: String,
    correlator: ResponseCorrelator,
    router: RequestRouter,
    outbound: mpsc::UnboundedSender<OutboundFrame>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            delivery = inbound.recv() => {
                let Some(delivery) = delivery else {
                    debug!(queue = %queue, "inbound stream closed");
                    break;
                };
                let tag = delivery.tag;
                if let Err(e) = classify_delivery(delivery, &correlator, &router, &outbound) {
                    warn!(queue = %queue, error = %e, "dropping inbound message");
                }
                if let Err(e) = channel.ack(tag).await {
                    warn!(queue = %queue, tag, error = %e, "ack failed");
                }
            }
        }
    }
    debug!(queue = %queue, "consume loop stopped");
}

/// Parse one delivery and fan it out by frame kind: requests and posts to
/// the router, replies to the correlator.
fn classify_delivery(
    delivery: Delivery,
    correlator: &ResponseCorrelator,
    router: &RequestRouter,
    outbound: &mpsc::UnboundedSender<OutboundFrame>,
) -> Result<(), WireError> {
    let envelope = Envelope::parse(delivery.properties, &delivery.body)?;

    match envelope.properties.kind {
        FrameKind::Request | FrameKind::Post => {
            let FrameContent::Request(content) = &envelope.content else {
                // Envelope::parse ties content shape to the frame kind.
                return Ok(());
            };
            let request = content.request.clone().into_request();
            debug!(request = %request.name, kind = %envelope.properties.kind, "request received");
            let reply = ReplyContext::for_envelope(&envelope, outbound.clone());
            if !router.dispatch(&request.name, &request, &envelope, &reply) {
                debug!(request = %request.name, "no route registered");
            }
        }
        FrameKind::Response | FrameKind::Error => {
            let id = envelope
                .properties
                .correlation_id
                .clone()
                .ok_or(WireError::MissingCorrelationId)?;
            correlator.resolve(&id, envelope);
        }
    }
    Ok(())
}
