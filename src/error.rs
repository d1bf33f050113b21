//! Error types for the dispatcher and its connection boundary.
//!
//! [`ConnectionError`] is what a [`crate::connection::Connection`] reports.
//! The dispatcher never rewrites it: `send_message` and `api_call` hand it
//! back as-is, and the run loop wraps it in [`DispatchError::Connection`].
//!
//! Handler failures are not errors at this level. They are captured as
//! [`HandlerFailure`] values so one misbehaving plugin cannot stop dispatch.

use crate::domain::Route;

/// Failure reported by the messaging-backend collaborator.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The realtime session could not be established.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Reading the next batch of events failed.
    #[error("read failed: {0}")]
    Read(String),

    /// A text message could not be delivered.
    #[error("send to {channel} failed: {reason}")]
    Send {
        /// Destination channel of the failed message.
        channel: String,
        /// Collaborator-provided reason.
        reason: String,
    },

    /// The keepalive signal could not be sent.
    #[error("keepalive failed: {0}")]
    Keepalive(String),

    /// A generic passthrough request failed.
    #[error("request {method} failed: {reason}")]
    Request {
        /// Backend method that was called.
        method: String,
        /// Collaborator-provided reason.
        reason: String,
    },

    /// The session is not open (never connected, or closed by the backend).
    #[error("connection closed")]
    Closed,
}

/// Loop-level error returned by [`crate::dispatcher::Dispatcher`].
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Fatal error from the connection layer.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The operation requires a successful `connect()` first.
    #[error("dispatcher is not connected")]
    NotConnected,

    /// Invalid dispatcher configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl DispatchError {
    /// Returns `true` if the error came from the connection collaborator.
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

/// A handler invocation that returned an error.
///
/// Collected per event in a [`crate::dispatcher::DispatchReport`] and logged
/// at `warn` level; dispatch continues with the next handler.
#[derive(Debug)]
pub struct HandlerFailure {
    /// Name of the plugin whose handler failed.
    pub plugin: String,
    /// Which of the plugin's handlers failed.
    pub route: Route,
    /// The error returned by the handler.
    pub error: anyhow::Error,
}

impl std::fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "plugin {} ({}) failed: {:#}", self.plugin, self.route, self.error)
    }
}
