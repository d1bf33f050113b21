//! bigslacker demo runner.
//!
//! Wires two sample plugins to an in-memory connection seeded with a few
//! events and runs the dispatch loop until Ctrl-C.

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use bigslacker::config::DispatcherConfig;
use bigslacker::connection::MemoryConnection;
use bigslacker::dispatcher::Dispatcher;
use bigslacker::domain::{Event, OutgoingMessage, Plugin, PluginRegistry};

/// Replies to every `message` event in the channel it came from.
fn echo_plugin() -> Plugin {
    Plugin::builder("echo")
        .on("message", |event| {
            let (Some(channel), Some(text)) = (event.get_str("channel"), event.get_str("text"))
            else {
                return Ok(None);
            };
            Ok(Some(vec![OutgoingMessage::new(channel, format!("echo: {text}"))]))
        })
        .build()
}

/// Logs every event it sees.
fn audit_plugin() -> Plugin {
    let mut seen: u64 = 0;
    Plugin::builder("audit")
        .catch_all(move |event| {
            seen += 1;
            tracing::info!(seen, event_type = event.event_type().unwrap_or("<none>"), "event");
            Ok(None)
        })
        .build()
}

fn seed_events() -> Vec<Event> {
    [
        json!({"type": "hello"}),
        json!({"type": "message", "channel": "C024BE91L", "user": "U2147483697", "text": "ping"}),
        json!({"reply_to": 1, "ok": true}),
    ]
    .into_iter()
    .filter_map(|value| Event::try_from(value).ok())
    .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = DispatcherConfig::from_env()?;
    tracing::info!(
        ping_interval = ?config.ping_interval,
        sleeping_time = ?config.sleeping_time,
        process_plugin_return = config.process_plugin_return,
        "starting bigslacker"
    );

    let connection = MemoryConnection::new();
    connection.push_batch(seed_events()).await;

    let registry = PluginRegistry::new()
        .with(echo_plugin())
        .with(audit_plugin());
    let mut dispatcher = Dispatcher::from_registry(connection.clone(), registry, config)?;

    // Stop on Ctrl-C
    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
        }
    });

    dispatcher.run(cancel).await?;

    let stats = dispatcher.stats();
    tracing::info!(
        events = stats.events,
        sent = connection.sent().await.len(),
        keepalives = stats.keepalives,
        "bigslacker stopped"
    );
    Ok(())
}
