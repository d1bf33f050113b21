//! Boundary with the messaging-backend client.
//!
//! The dispatcher owns exactly one [`Connection`] and is the only code that
//! touches it. Plugins never receive it.

pub mod memory;

pub use memory::MemoryConnection;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::Event;
use crate::error::ConnectionError;

/// Operations the dispatcher needs from a realtime backend client.
///
/// Acknowledgements are returned as raw JSON; their meaning is defined by
/// the backend.
#[async_trait]
pub trait Connection: Send {
    /// Establishes the realtime session.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Connect`] if the session cannot be opened.
    async fn connect(&mut self) -> Result<(), ConnectionError>;

    /// Returns every event received since the previous call.
    ///
    /// Must not block waiting for new events; an empty batch is normal.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectionError`] if the session is broken.
    async fn read_events(&mut self) -> Result<Vec<Event>, ConnectionError>;

    /// Sends one text message to `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Send`] if the message was not accepted.
    async fn send(&mut self, channel: &str, text: &str) -> Result<Value, ConnectionError>;

    /// Sends an out-of-band liveness signal.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Keepalive`] if the signal cannot be sent.
    async fn keepalive(&mut self) -> Result<(), ConnectionError>;

    /// Issues an arbitrary backend request not covered by the event model.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Request`] if the backend rejects the call.
    async fn generic_call(&mut self, method: &str, args: Value) -> Result<Value, ConnectionError>;
}
