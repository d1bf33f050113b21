//! The dispatch loop: connect, read, route, send, ping, sleep.
//!
//! [`Dispatcher`] exclusively owns the [`Connection`]. Each iteration reads
//! one batch of events and, for every event, visits the plugins in
//! registration order. A plugin's typed handler (if its name matches the
//! event type) runs first, then its catch-all (if any). Replies are sent in
//! exactly the order they were produced.
//!
//! ```text
//! Unconnected ──connect()──▶ Idle ──non-empty batch──▶ Processing
//!                              ▲                           │
//!                              └────── routed, pinged ─────┘
//! ```
//!
//! Handler errors and panics are isolated: they are logged, counted, and
//! reported in the [`DispatchReport`], and dispatch continues. Connection errors are
//! fatal and propagate out of [`Dispatcher::run`].

use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::DispatcherConfig;
use crate::connection::Connection;
use crate::domain::{Event, HandlerResult, OutgoingMessage, Plugin, PluginRegistry, Route};
use crate::error::{ConnectionError, DispatchError, HandlerFailure};

/// Lifecycle state of a [`Dispatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// `connect()` has not succeeded yet.
    Unconnected,
    /// Connected and waiting for the next batch.
    Idle,
    /// Routing a non-empty batch, sending its replies and pinging.
    ///
    /// Returns to `Idle` once the iteration's ping has completed.
    Processing,
}

/// Cumulative counters since the dispatcher was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Completed loop iterations.
    pub iterations: u64,
    /// Events routed.
    pub events: u64,
    /// Handler invocations, typed and catch-all.
    pub invocations: u64,
    /// Handler invocations that returned an error or panicked.
    pub handler_failures: u64,
    /// Messages accepted by the connection.
    pub messages_sent: u64,
    /// Keepalives sent.
    pub keepalives: u64,
}

/// Outcome of routing a single event.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Every handler invoked, in invocation order.
    pub invocations: Vec<(String, Route)>,
    /// Replies produced by the handlers, in production order.
    pub outgoing: Vec<OutgoingMessage>,
    /// Handlers that returned an error or panicked.
    pub failures: Vec<HandlerFailure>,
}

impl DispatchReport {
    fn record(&mut self, plugin: &str, route: Route, result: HandlerResult) {
        self.invocations.push((plugin.to_string(), route.clone()));
        match result {
            Ok(Some(messages)) => self.outgoing.extend(messages),
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(
                    plugin,
                    %route,
                    error = %format_args!("{error:#}"),
                    "plugin handler failed"
                );
                self.failures.push(HandlerFailure {
                    plugin: plugin.to_string(),
                    route,
                    error,
                });
            }
        }
    }
}

/// Routes events from one connection to an ordered, fixed set of plugins.
#[derive(Debug)]
pub struct Dispatcher<C> {
    connection: C,
    plugins: Vec<Plugin>,
    config: DispatcherConfig,
    last_ping: Option<Instant>,
    state: DispatcherState,
    stats: DispatchStats,
}

impl<C: Connection> Dispatcher<C> {
    /// Creates a dispatcher over `connection` with `plugins` in dispatch
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Config`] if `config` is invalid.
    pub fn new(
        connection: C,
        plugins: Vec<Plugin>,
        config: DispatcherConfig,
    ) -> Result<Self, DispatchError> {
        config.validate()?;
        Ok(Self {
            connection,
            plugins,
            config,
            last_ping: None,
            state: DispatcherState::Unconnected,
            stats: DispatchStats::default(),
        })
    }

    /// Creates a dispatcher with the plugins loaded from `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Config`] if `config` is invalid.
    pub fn from_registry(
        connection: C,
        registry: PluginRegistry,
        config: DispatcherConfig,
    ) -> Result<Self, DispatchError> {
        Self::new(connection, registry.load(), config)
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> DispatcherState {
        self.state
    }

    /// Returns the cumulative counters.
    #[must_use]
    pub const fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Returns the loaded plugins in dispatch order.
    #[must_use]
    pub fn plugins(&self) -> &[Plugin] {
        &self.plugins
    }

    /// Returns the underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &C {
        &self.connection
    }

    /// Returns when the keepalive timer was last reset, if ever.
    #[must_use]
    pub const fn last_ping(&self) -> Option<Instant> {
        self.last_ping
    }

    /// Opens the realtime session.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Connection`] if the collaborator fails to
    /// connect. There is no retry.
    pub async fn connect(&mut self) -> Result<(), DispatchError> {
        if let Err(e) = self.connection.connect().await {
            tracing::error!(error = %e, "connect failed");
            return Err(e.into());
        }
        self.state = DispatcherState::Idle;
        tracing::info!(plugins = self.plugins.len(), "connected");
        Ok(())
    }

    /// Runs the loop until `cancel` fires or a connection error occurs.
    ///
    /// Connects first if still unconnected. Cancellation is honoured at the
    /// top of each iteration and during the sleep; an iteration in progress
    /// always completes.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Connection`] on any connect, read, send or
    /// keepalive failure.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<(), DispatchError> {
        if self.state == DispatcherState::Unconnected {
            self.connect().await?;
        }

        loop {
            if cancel.is_cancelled() {
                break;
            }

            if let Err(e) = self.run_iteration().await {
                tracing::error!(error = %e, "dispatch loop stopped");
                return Err(e);
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.config.sleeping_time) => {}
            }
        }

        tracing::info!(iterations = self.stats.iterations, "dispatch loop cancelled");
        Ok(())
    }

    /// Runs one read → route → send → ping pass, without the sleep.
    ///
    /// Returns the number of events routed.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NotConnected`] before a successful
    /// `connect()`, and [`DispatchError::Connection`] if reading, sending or
    /// pinging fails.
    pub async fn run_iteration(&mut self) -> Result<usize, DispatchError> {
        if self.state == DispatcherState::Unconnected {
            return Err(DispatchError::NotConnected);
        }

        let events = self.connection.read_events().await?;
        let count = events.len();
        if count > 0 {
            self.state = DispatcherState::Processing;
        }
        let finished = self.process_and_ping(&events).await;
        self.state = DispatcherState::Idle;
        finished?;

        self.stats.iterations += 1;
        Ok(count)
    }

    async fn process_and_ping(&mut self, events: &[Event]) -> Result<(), DispatchError> {
        self.process_batch(events).await?;
        self.ping().await?;
        Ok(())
    }

    async fn process_batch(&mut self, events: &[Event]) -> Result<(), DispatchError> {
        for event in events {
            let report = self.dispatch_event(event);
            if !self.config.process_plugin_return {
                continue;
            }
            for message in report.outgoing {
                self.send_message(&message.channel, &message.text).await?;
            }
        }
        Ok(())
    }

    /// Routes `event` to every matching handler without sending anything.
    ///
    /// For each plugin in order: the handler named after the event type
    /// (when the type is present), then the catch-all (when defined).
    pub fn dispatch_event(&mut self, event: &Event) -> DispatchReport {
        let event_type = event.event_type();
        tracing::debug!(event_type = event_type.unwrap_or("<none>"), "dispatching event");

        let mut report = DispatchReport::default();
        for plugin in &mut self.plugins {
            if let Some(event_type) = event_type
                && let Some(result) = plugin.call_typed(event_type, event)
            {
                report.record(plugin.name(), Route::Typed(event_type.to_string()), result);
            }
            if let Some(result) = plugin.call_catch_all(event) {
                report.record(plugin.name(), Route::CatchAll, result);
            }
        }

        self.stats.events += 1;
        self.stats.invocations += report.invocations.len() as u64;
        self.stats.handler_failures += report.failures.len() as u64;
        report
    }

    /// Sends a keepalive if the interval has been exceeded.
    ///
    /// The first call only starts the timer. Later calls send one keepalive
    /// and reset the timer once the elapsed time strictly exceeds
    /// `ping_interval`. Returns `true` when a keepalive was sent.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Connection`] if the keepalive fails; the
    /// timer is left unchanged in that case.
    pub async fn ping(&mut self) -> Result<bool, DispatchError> {
        let now = Instant::now();
        let Some(last) = self.last_ping else {
            self.last_ping = Some(now);
            return Ok(false);
        };

        if now.duration_since(last) <= self.config.ping_interval {
            return Ok(false);
        }

        self.connection.keepalive().await?;
        self.last_ping = Some(now);
        self.stats.keepalives += 1;
        tracing::debug!(keepalives = self.stats.keepalives, "keepalive sent");
        Ok(true)
    }

    /// Sends one text message and returns the connection's acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns the connection's error unchanged.
    pub async fn send_message(&mut self, channel: &str, text: &str) -> Result<Value, ConnectionError> {
        let ack = self.connection.send(channel, text).await?;
        self.stats.messages_sent += 1;
        Ok(ack)
    }

    /// Passes an arbitrary request straight to the connection.
    ///
    /// # Errors
    ///
    /// Returns the connection's error unchanged.
    pub async fn api_call(&mut self, method: &str, args: Value) -> Result<Value, ConnectionError> {
        self.connection.generic_call(method, args).await
    }
}
