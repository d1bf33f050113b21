//! End-to-end behaviour of the dispatch loop over an in-memory connection.

#![allow(clippy::panic)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

use bigslacker::domain::Route;
use bigslacker::{
    DispatcherConfig, Dispatcher, DispatcherState, Event, MemoryConnection, OutgoingMessage,
    Plugin, PluginRegistry,
};

type Log = Arc<Mutex<Vec<&'static str>>>;

fn record(log: &Log, entry: &'static str) {
    if let Ok(mut entries) = log.lock() {
        entries.push(entry);
    }
}

fn message_event() -> Event {
    let Ok(event) = Event::try_from(json!({"type": "message", "channel": "C", "text": "hi"}))
    else {
        panic!("expected a JSON object");
    };
    event
}

/// P1 replies, P2 observes everything, P3 fails on every message.
fn scenario_registry(log: &Log) -> PluginRegistry {
    let p1_log = Arc::clone(log);
    let p2_log = Arc::clone(log);
    let p3_log = Arc::clone(log);
    PluginRegistry::new()
        .with(
            Plugin::builder("p1")
                .on("message", move |_| {
                    record(&p1_log, "p1.message");
                    Ok(Some(vec![OutgoingMessage::new("C", "ack")]))
                })
                .build(),
        )
        .with(
            Plugin::builder("p2")
                .catch_all(move |_| {
                    record(&p2_log, "p2.catch_all");
                    Ok(None)
                })
                .build(),
        )
        .with(
            Plugin::builder("p3")
                .on("message", move |_| {
                    record(&p3_log, "p3.message");
                    Err(anyhow::anyhow!("p3 cannot handle messages"))
                })
                .build(),
        )
}

#[tokio::test]
async fn failing_plugin_is_isolated_from_the_rest() {
    let log = Log::default();
    let conn = MemoryConnection::new();
    let Ok(mut dispatcher) =
        Dispatcher::from_registry(conn.clone(), scenario_registry(&log), DispatcherConfig::default())
    else {
        panic!("valid config");
    };
    assert_ok!(dispatcher.connect().await);

    conn.push_batch(vec![message_event()]).await;
    assert_eq!(assert_ok!(dispatcher.run_iteration().await), 1);

    let entries = log.lock().map(|e| e.clone()).unwrap_or_default();
    assert_eq!(entries, vec!["p1.message", "p2.catch_all", "p3.message"]);
    assert_eq!(conn.sent().await, vec![OutgoingMessage::new("C", "ack")]);

    let stats = dispatcher.stats();
    assert_eq!(stats.invocations, 3);
    assert_eq!(stats.handler_failures, 1);
    assert_eq!(stats.messages_sent, 1);
}

#[tokio::test]
async fn report_lists_invocations_and_failure() {
    let log = Log::default();
    let Ok(mut dispatcher) = Dispatcher::from_registry(
        MemoryConnection::new(),
        scenario_registry(&log),
        DispatcherConfig::default(),
    ) else {
        panic!("valid config");
    };

    let report = dispatcher.dispatch_event(&message_event());
    assert_eq!(
        report.invocations,
        vec![
            ("p1".to_string(), Route::Typed("message".to_string())),
            ("p2".to_string(), Route::CatchAll),
            ("p3".to_string(), Route::Typed("message".to_string())),
        ]
    );
    assert_eq!(report.outgoing, vec![OutgoingMessage::new("C", "ack")]);
    let plugins: Vec<&str> = report.failures.iter().map(|f| f.plugin.as_str()).collect();
    assert_eq!(plugins, vec!["p3"]);
}

#[tokio::test(start_paused = true)]
async fn run_routes_batches_pings_and_stops_on_cancel() {
    let log = Log::default();
    let conn = MemoryConnection::new();
    conn.push_batch(vec![message_event()]).await;
    conn.push_batch(Vec::new()).await;
    conn.push_batch(vec![message_event(), message_event()]).await;

    let Ok(mut dispatcher) =
        Dispatcher::from_registry(conn.clone(), scenario_registry(&log), DispatcherConfig::default())
    else {
        panic!("valid config");
    };

    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let handle = tokio::spawn(async move {
        let result = dispatcher.run(token).await;
        (dispatcher, result)
    });

    tokio::time::sleep(Duration::from_millis(5_500)).await;
    cancel.cancel();

    let Ok((dispatcher, result)) = handle.await else {
        panic!("dispatch task panicked");
    };
    assert_ok!(result);
    assert_eq!(dispatcher.state(), DispatcherState::Idle);
    assert_eq!(conn.pending_batches().await, 0);

    let sent = conn.sent().await;
    assert_eq!(sent.len(), 3);
    assert!(sent.iter().all(|m| m == &OutgoingMessage::new("C", "ack")));

    let stats = dispatcher.stats();
    assert_eq!(stats.events, 3);
    assert_eq!(stats.handler_failures, 3);
    assert!(stats.iterations >= 5);
    assert!(stats.keepalives >= 1);
    assert_eq!(conn.keepalives().await as u64, stats.keepalives);
}

#[tokio::test(start_paused = true)]
async fn disabled_return_processing_never_sends() {
    let log = Log::default();
    let conn = MemoryConnection::new();
    conn.push_batch(vec![message_event(), message_event()]).await;
    let config = DispatcherConfig::default()
        .with_process_plugin_return(false)
        .with_sleeping_time(Duration::from_millis(100));

    let Ok(mut dispatcher) = Dispatcher::from_registry(conn.clone(), scenario_registry(&log), config)
    else {
        panic!("valid config");
    };
    assert_ok!(dispatcher.connect().await);
    assert_ok!(dispatcher.run_iteration().await);

    assert!(conn.sent().await.is_empty());
    assert_eq!(dispatcher.stats().invocations, 6);
}

#[tokio::test]
async fn panicking_plugin_does_not_stop_the_loop() {
    let log = Log::default();
    let p1_log = Arc::clone(&log);
    let p2_log = Arc::clone(&log);
    let registry = PluginRegistry::new()
        .with(
            Plugin::builder("p1")
                .on("message", move |_| {
                    record(&p1_log, "p1.message");
                    Ok(Some(vec![OutgoingMessage::new("C", "ack")]))
                })
                .build(),
        )
        .with(
            Plugin::builder("p2")
                .catch_all(move |_| {
                    record(&p2_log, "p2.catch_all");
                    Ok(None)
                })
                .build(),
        )
        .with(
            Plugin::builder("p3")
                .on("message", |_| panic!("p3 blew up"))
                .build(),
        );

    let conn = MemoryConnection::new();
    let Ok(mut dispatcher) =
        Dispatcher::from_registry(conn.clone(), registry, DispatcherConfig::default())
    else {
        panic!("valid config");
    };
    assert_ok!(dispatcher.connect().await);
    conn.push_batch(vec![message_event(), message_event()]).await;

    let outcome = tokio::spawn(async move {
        let routed = dispatcher.run_iteration().await;
        (dispatcher, routed)
    })
    .await;
    let Ok((dispatcher, routed)) = outcome else {
        panic!("a handler panic escaped the dispatcher");
    };
    assert_eq!(assert_ok!(routed), 2);

    let entries = log.lock().map(|e| e.clone()).unwrap_or_default();
    assert_eq!(
        entries,
        vec!["p1.message", "p2.catch_all", "p1.message", "p2.catch_all"]
    );
    assert_eq!(
        conn.sent().await,
        vec![OutgoingMessage::new("C", "ack"), OutgoingMessage::new("C", "ack")]
    );
    assert_eq!(dispatcher.stats().handler_failures, 2);
    assert_eq!(dispatcher.state(), DispatcherState::Idle);
}
