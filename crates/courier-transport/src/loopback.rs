//! End-to-end exercises of the connection manager over the memory broker:
//! two managers on one fabric, one routing requests, one issuing them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use courier_core::manager::ConnectionManager;
use courier_core::transport::{Channel as _, Connection as _, Transport as _};
use courier_types::config::{CallParams, ManagerConfig, OutputMode};
use courier_types::error::{RequestError, TransportError};
use courier_types::frame::{CorrelationId, FrameProperties};
use courier_types::request::Request;
use serde_json::{Value, json};

use crate::memory::MemoryBroker;

fn responder_config() -> ManagerConfig {
    ManagerConfig {
        name: "responder".to_string(),
        consume_on: Some("svc".to_string()),
        ..ManagerConfig::default()
    }
}

fn requester_config() -> ManagerConfig {
    ManagerConfig {
        name: "requester".to_string(),
        dispatch_to: Some("svc".to_string()),
        consume_on: Some("client".to_string()),
        ..ManagerConfig::default()
    }
}

async fn connected_pair(
    broker: &MemoryBroker,
) -> (
    ConnectionManager<MemoryBroker>,
    ConnectionManager<MemoryBroker>,
) {
    let responder = ConnectionManager::new(responder_config(), broker.clone());
    let requester = ConnectionManager::new(requester_config(), broker.clone());
    responder.connect().await.unwrap();
    requester.connect().await.unwrap();
    (responder, requester)
}

#[tokio::test]
async fn get_round_trip_unwraps_responce_payload() {
    let broker = MemoryBroker::new();
    let (responder, requester) = connected_pair(&broker).await;

    responder.add_route("ping", |request, reply, _| {
        reply.send(json!({"pong": request.payload.get("seq")}));
        Ok(())
    });

    let result = requester
        .get(
            Request::new("ping").with_field("seq", json!(3)),
            CallParams::default(),
        )
        .await
        .unwrap();
    assert_eq!(result, Some(json!({"pong": 3})));
    assert_eq!(requester.pending_replies(), 0);
}

#[tokio::test]
async fn error_reply_fails_the_get() {
    let broker = MemoryBroker::new();
    let (responder, requester) = connected_pair(&broker).await;

    responder.add_route("explode", |_, reply, _| {
        reply.error(json!("boom"));
        Ok(())
    });

    let result = requester.get("explode", CallParams::default()).await;
    let Err(RequestError::Remote(payload)) = &result else {
        panic!("expected remote error, got {result:?}");
    };
    assert_eq!(payload, &json!("boom"));
}

#[tokio::test]
async fn throw_errors_off_returns_error_payload_as_value() {
    let broker = MemoryBroker::new();
    let responder = ConnectionManager::new(responder_config(), broker.clone());
    let requester = ConnectionManager::new(
        ManagerConfig {
            throw_errors: false,
            ..requester_config()
        },
        broker.clone(),
    );
    responder.connect().await.unwrap();
    requester.connect().await.unwrap();

    responder.add_route("explode", |_, reply, _| {
        reply.error(json!("boom"));
        Ok(())
    });

    let result = requester.get("explode", CallParams::default()).await.unwrap();
    assert_eq!(result, Some(json!("boom")));
}

#[tokio::test]
async fn unhandled_request_times_out_with_absent_result() {
    let broker = MemoryBroker::new();
    let (_responder, requester) = connected_pair(&broker).await;

    let started = Instant::now();
    let result = requester
        .get("nobody-home", CallParams::default().timeout_ms(50))
        .await
        .unwrap();
    assert!(result.is_none());
    assert!(started.elapsed() >= Duration::from_millis(50));
    assert_eq!(requester.pending_replies(), 0);
}

#[tokio::test]
async fn output_mode_body_returns_reply_content_object() {
    let broker = MemoryBroker::new();
    let (responder, requester) = connected_pair(&broker).await;

    responder.add_route("ping", |_, reply, _| {
        reply.send(json!("pong"));
        Ok(())
    });

    let body = requester
        .get("ping", CallParams::default().output(OutputMode::Body))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(body["responce"], json!("pong"));
    assert_eq!(body["request"], json!("ping"));
    assert!(body.get("requestMessage").is_some());
    assert!(body.get("requestBody").is_some());
}

#[tokio::test]
async fn output_mode_full_returns_whole_envelope() {
    let broker = MemoryBroker::new();
    let (responder, requester) = connected_pair(&broker).await;

    responder.add_route("ping", |_, reply, _| {
        reply.send(json!("pong"));
        Ok(())
    });

    let envelope = requester
        .get("ping", CallParams::default().output(OutputMode::Full))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(envelope["properties"]["type"], json!("responce"));
    assert!(envelope["properties"]["correlationId"].is_string());
    assert_eq!(envelope["content"]["responce"], json!("pong"));
}

#[tokio::test]
async fn post_is_fire_and_forget_and_reply_send_is_a_no_op() {
    let broker = MemoryBroker::new();
    let (responder, requester) = connected_pair(&broker).await;

    let handled = Arc::new(AtomicBool::new(false));
    let reply_attempted = Arc::new(AtomicBool::new(false));
    let handled_flag = Arc::clone(&handled);
    let attempt_flag = Arc::clone(&reply_attempted);
    responder.add_route("notify", move |_, reply, _| {
        handled_flag.store(true, Ordering::SeqCst);
        // A post carries no replyTo; the send must be a no-op.
        attempt_flag.store(reply.send(json!("ignored")), Ordering::SeqCst);
        Ok(())
    });

    requester.post("notify", CallParams::default()).await.unwrap();

    // Give the fabric a moment to route the post.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(handled.load(Ordering::SeqCst));
    assert!(!reply_attempted.load(Ordering::SeqCst));
    assert_eq!(requester.pending_replies(), 0);
}

#[tokio::test]
async fn fan_out_handlers_all_run_and_get_sees_first_reply() {
    let broker = MemoryBroker::new();
    let (responder, requester) = connected_pair(&broker).await;

    let calls = Arc::new(AtomicUsize::new(0));
    let first = Arc::clone(&calls);
    responder.add_route("ping", move |_, reply, _| {
        first.fetch_add(1, Ordering::SeqCst);
        reply.send(json!("first"));
        Ok(())
    });
    let second = Arc::clone(&calls);
    responder.add_route("ping", move |_, reply, _| {
        second.fetch_add(1, Ordering::SeqCst);
        reply.send(json!("second"));
        Ok(())
    });

    let result = requester.get("ping", CallParams::default()).await.unwrap();
    assert_eq!(result, Some(json!("first")));

    // Both handlers ran; the second reply found no waiter and was dropped.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(requester.pending_replies(), 0);
}

#[tokio::test]
async fn concurrent_gets_resolve_independently() {
    let broker = MemoryBroker::new();
    let (responder, requester) = connected_pair(&broker).await;

    responder.add_route("echo", |request, reply, _| {
        reply.send(request.payload["tag"].clone());
        Ok(())
    });

    let (a, b) = tokio::join!(
        requester.get(
            Request::new("echo").with_field("tag", json!("a")),
            CallParams::default(),
        ),
        requester.get(
            Request::new("echo").with_field("tag", json!("b")),
            CallParams::default(),
        ),
    );
    assert_eq!(a.unwrap(), Some(json!("a")));
    assert_eq!(b.unwrap(), Some(json!("b")));
}

#[tokio::test]
async fn malformed_inbound_payload_does_not_stop_the_loop() {
    let broker = MemoryBroker::new();
    let (responder, requester) = connected_pair(&broker).await;

    responder.add_route("ping", |_, reply, _| {
        reply.send(json!("pong"));
        Ok(())
    });

    // Inject garbage straight onto the responder's queue.
    let raw = broker
        .connect("amqp://localhost")
        .await
        .unwrap()
        .create_channel()
        .await
        .unwrap();
    raw.publish(
        "svc",
        &FrameProperties::request(CorrelationId::new(), Some("client".to_string())),
        b"not json at all".to_vec(),
    )
    .await
    .unwrap();

    let result = requester.get("ping", CallParams::default()).await.unwrap();
    assert_eq!(result, Some(json!("pong")));
}

#[tokio::test]
async fn faulty_handler_does_not_poison_later_requests() {
    let broker = MemoryBroker::new();
    let (responder, requester) = connected_pair(&broker).await;

    responder.add_route("flaky", |_, reply, _| {
        reply.send(json!("before-fault"));
        anyhow::bail!("handler exploded")
    });

    let first = requester.get("flaky", CallParams::default()).await.unwrap();
    assert_eq!(first, Some(json!("before-fault")));

    let second = requester.get("flaky", CallParams::default()).await.unwrap();
    assert_eq!(second, Some(json!("before-fault")));
}

#[tokio::test]
async fn bare_string_request_body_is_routed() {
    let broker = MemoryBroker::new();
    let (responder, requester) = connected_pair(&broker).await;

    let seen = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&seen);
    responder.add_route("legacy", move |request, _, _| {
        assert!(request.payload.is_empty());
        flag.store(true, Ordering::SeqCst);
        Ok(())
    });

    // Legacy senders put a bare name in the request field.
    let raw = broker
        .connect("amqp://localhost")
        .await
        .unwrap()
        .create_channel()
        .await
        .unwrap();
    raw.publish(
        "svc",
        &FrameProperties::post(CorrelationId::new()),
        br#"{"request": "legacy"}"#.to_vec(),
    )
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(seen.load(Ordering::SeqCst));
    let _ = requester;
}

#[tokio::test]
async fn dispatch_queue_override_reaches_a_second_responder() {
    let broker = MemoryBroker::new();
    let (responder, requester) = connected_pair(&broker).await;

    let other = ConnectionManager::new(
        ManagerConfig {
            name: "other".to_string(),
            consume_on: Some("svc-2".to_string()),
            ..ManagerConfig::default()
        },
        broker.clone(),
    );
    other.connect().await.unwrap();
    other.add_route("ping", |_, reply, _| {
        reply.send(json!("from-other"));
        Ok(())
    });
    responder.add_route("ping", |_, reply, _| {
        reply.send(json!("from-default"));
        Ok(())
    });

    let via_default = requester.get("ping", CallParams::default()).await.unwrap();
    assert_eq!(via_default, Some(json!("from-default")));

    let via_override = requester
        .get("ping", CallParams::default().dispatch_to("svc-2"))
        .await
        .unwrap();
    assert_eq!(via_override, Some(json!("from-other")));
}

#[tokio::test]
async fn connect_is_idempotent() {
    let broker = MemoryBroker::new();
    let (responder, _requester) = connected_pair(&broker).await;
    responder.connect().await.unwrap();
    assert!(responder.is_connected());
}

#[tokio::test]
async fn shutdown_stops_consuming() {
    let broker = MemoryBroker::new();
    let (responder, requester) = connected_pair(&broker).await;

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    responder.add_route("ping", move |_, reply, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        reply.send(json!("pong"));
        Ok(())
    });

    responder.shutdown();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let result = requester
        .get("ping", CallParams::default().timeout_ms(100))
        .await
        .unwrap();
    assert!(result.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn deliveries_are_acknowledged_after_processing() {
    let broker = MemoryBroker::new();
    let (responder, requester) = connected_pair(&broker).await;

    responder.add_route("ping", |_, reply, _| {
        reply.send(json!("pong"));
        Ok(())
    });

    requester.get("ping", CallParams::default()).await.unwrap();
    // Request and reply deliveries both processed and acked.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(broker.unacked_count(), 0);
}

#[tokio::test]
async fn get_with_value_result_distinguishes_null_reply_from_timeout() {
    let broker = MemoryBroker::new();
    let (responder, requester) = connected_pair(&broker).await;

    responder.add_route("quiet", |_, reply, _| {
        reply.send(Value::Null);
        Ok(())
    });

    // A received null reply is Some(Null) -- not the absent timeout result.
    let result = requester.get("quiet", CallParams::default()).await.unwrap();
    assert_eq!(result, Some(Value::Null));
}

#[tokio::test]
async fn memory_connect_never_fails_but_setup_errors_surface() {
    let broker = MemoryBroker::new();
    // Durability mismatch on the consume queue aborts connect().
    let first = ConnectionManager::new(
        ManagerConfig {
            name: "durable-owner".to_string(),
            consume_on: Some("jobs".to_string()),
            durable: true,
            ..ManagerConfig::default()
        },
        broker.clone(),
    );
    first.connect().await.unwrap();

    let second = ConnectionManager::new(
        ManagerConfig {
            name: "mismatched".to_string(),
            consume_on: Some("jobs".to_string()),
            durable: false,
            ..ManagerConfig::default()
        },
        broker.clone(),
    );
    let result = second.connect().await;
    assert!(matches!(result, Err(TransportError::QueueAssert { .. })));
    assert!(!second.is_connected());
}
