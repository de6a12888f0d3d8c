//! Loopback demo: two connection managers on one in-process broker.
//!
//! A responder answers `ping` and `fail`; a requester sends a batch of gets,
//! one deliberate remote error, one unhandled request that times out, and a
//! fire-and-forget post. Results are printed as a table or JSON.

use std::time::Instant;

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use courier_core::manager::ConnectionManager;
use courier_transport::MemoryBroker;
use courier_types::config::{CallParams, ManagerConfig};
use courier_types::error::RequestError;
use courier_types::request::Request;
use serde_json::json;
use tracing::info;

struct DemoRow {
    request: String,
    outcome: String,
    detail: String,
    elapsed_ms: u128,
}

pub async fn run_demo(requests: u32, timeout_ms: u64, json_output: bool) -> Result<()> {
    let broker = MemoryBroker::new();

    let responder = ConnectionManager::new(
        ManagerConfig {
            name: "demo-responder".to_string(),
            consume_on: Some("demo.svc".to_string()),
            ..ManagerConfig::default()
        },
        broker.clone(),
    );
    responder.connect().await?;
    responder
        .add_route("ping", |request, reply, _| {
            reply.send(json!({"pong": request.payload.get("seq")}));
            Ok(())
        })
        .add_route("fail", |_, reply, _| {
            reply.error(json!("deliberate demo failure"));
            Ok(())
        });

    let requester = ConnectionManager::new(
        ManagerConfig {
            name: "demo-requester".to_string(),
            consume_on: Some("demo.client".to_string()),
            dispatch_to: Some("demo.svc".to_string()),
            timeout_ms,
            ..ManagerConfig::default()
        },
        broker.clone(),
    );
    requester.connect().await?;
    info!(requests, timeout_ms, "loopback demo fabric connected");

    let mut rows = Vec::new();

    for seq in 0..requests {
        let started = Instant::now();
        let result = requester
            .get(
                Request::new("ping").with_field("seq", json!(seq)),
                CallParams::default(),
            )
            .await;
        rows.push(match result {
            Ok(Some(value)) => DemoRow {
                request: format!("ping #{seq}"),
                outcome: "responce".to_string(),
                detail: value.to_string(),
                elapsed_ms: started.elapsed().as_millis(),
            },
            Ok(None) => DemoRow {
                request: format!("ping #{seq}"),
                outcome: "timeout".to_string(),
                detail: "-".to_string(),
                elapsed_ms: started.elapsed().as_millis(),
            },
            Err(e) => DemoRow {
                request: format!("ping #{seq}"),
                outcome: "error".to_string(),
                detail: e.to_string(),
                elapsed_ms: started.elapsed().as_millis(),
            },
        });
    }

    // A request the responder answers with an error frame.
    let started = Instant::now();
    let failure = requester.get("fail", CallParams::default()).await;
    rows.push(DemoRow {
        request: "fail".to_string(),
        outcome: match &failure {
            Err(RequestError::Remote(_)) => "remote error".to_string(),
            other => format!("unexpected: {other:?}"),
        },
        detail: match &failure {
            Err(RequestError::Remote(payload)) => payload.to_string(),
            _ => "-".to_string(),
        },
        elapsed_ms: started.elapsed().as_millis(),
    });

    // A request nobody handles; resolves absent after the timeout.
    let started = Instant::now();
    let missing = requester.get("missing", CallParams::default()).await?;
    rows.push(DemoRow {
        request: "missing".to_string(),
        outcome: if missing.is_none() {
            "timeout".to_string()
        } else {
            "unexpected reply".to_string()
        },
        detail: "-".to_string(),
        elapsed_ms: started.elapsed().as_millis(),
    });

    // Fire-and-forget.
    requester
        .post(
            Request::new("ping").with_field("seq", json!("post")),
            CallParams::default(),
        )
        .await?;
    rows.push(DemoRow {
        request: "ping (post)".to_string(),
        outcome: "sent".to_string(),
        detail: "fire-and-forget".to_string(),
        elapsed_ms: 0,
    });

    responder.shutdown();
    requester.shutdown();

    if json_output {
        let report: Vec<_> = rows
            .iter()
            .map(|row| {
                json!({
                    "request": row.request,
                    "outcome": row.outcome,
                    "detail": row.detail,
                    "elapsed_ms": row.elapsed_ms,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Request", "Outcome", "Detail", "Elapsed (ms)"]);
    for row in &rows {
        let outcome_cell = match row.outcome.as_str() {
            "responce" | "sent" => Cell::new(&row.outcome).fg(Color::Green),
            "timeout" => Cell::new(&row.outcome).fg(Color::Yellow),
            _ => Cell::new(&row.outcome).fg(Color::Red),
        };
        table.add_row(vec![
            Cell::new(&row.request),
            outcome_cell,
            Cell::new(&row.detail),
            Cell::new(row.elapsed_ms),
        ]);
    }

    println!();
    println!(
        "  {} Loopback demo over the in-process broker",
        style("✓").green().bold()
    );
    println!();
    println!("{table}");
    Ok(())
}
