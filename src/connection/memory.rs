//! In-memory [`Connection`] with scripted input and recorded output.
//!
//! [`MemoryConnection`] is a cheap clonable handle: the dispatcher owns one
//! clone while the caller keeps another to feed events and inspect what was
//! sent. It backs the test suite and the demo binary.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use super::Connection;
use crate::domain::{Event, OutgoingMessage};
use crate::error::ConnectionError;

#[derive(Debug, Default)]
struct Inner {
    connected: bool,
    fail_connect: Option<String>,
    fail_send: Option<String>,
    fail_keepalive: Option<String>,
    batches: VecDeque<Vec<Event>>,
    sent: Vec<OutgoingMessage>,
    keepalives: usize,
    calls: Vec<(String, Value)>,
    responses: HashMap<String, Value>,
    next_id: u64,
}

/// Scripted connection shared between a dispatcher and a test or demo.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnection {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryConnection {
    /// Creates a connection with no scripted events.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a batch returned by one future `read_events` call.
    pub async fn push_batch(&self, events: Vec<Event>) {
        self.inner.lock().await.batches.push_back(events);
    }

    /// Makes the next `connect` calls fail with `reason`.
    pub async fn fail_connect(&self, reason: impl Into<String>) {
        self.inner.lock().await.fail_connect = Some(reason.into());
    }

    /// Makes every subsequent `send` fail with `reason`.
    pub async fn fail_send(&self, reason: impl Into<String>) {
        self.inner.lock().await.fail_send = Some(reason.into());
    }

    /// Makes every subsequent `keepalive` fail with `reason`.
    pub async fn fail_keepalive(&self, reason: impl Into<String>) {
        self.inner.lock().await.fail_keepalive = Some(reason.into());
    }

    /// Sets the canned response for `generic_call(method, ..)`.
    pub async fn respond(&self, method: impl Into<String>, response: Value) {
        self.inner
            .lock()
            .await
            .responses
            .insert(method.into(), response);
    }

    /// Closes the session; further reads fail with [`ConnectionError::Closed`].
    pub async fn close(&self) {
        self.inner.lock().await.connected = false;
    }

    /// Returns whether `connect` has succeeded.
    pub async fn is_connected(&self) -> bool {
        self.inner.lock().await.connected
    }

    /// Returns every message sent so far, in order.
    pub async fn sent(&self) -> Vec<OutgoingMessage> {
        self.inner.lock().await.sent.clone()
    }

    /// Returns the number of keepalives sent so far.
    pub async fn keepalives(&self) -> usize {
        self.inner.lock().await.keepalives
    }

    /// Returns every generic call made so far, in order.
    pub async fn calls(&self) -> Vec<(String, Value)> {
        self.inner.lock().await.calls.clone()
    }

    /// Returns the number of scripted batches not yet read.
    pub async fn pending_batches(&self) -> usize {
        self.inner.lock().await.batches.len()
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn connect(&mut self) -> Result<(), ConnectionError> {
        let mut inner = self.inner.lock().await;
        if let Some(reason) = &inner.fail_connect {
            return Err(ConnectionError::Connect(reason.clone()));
        }
        inner.connected = true;
        Ok(())
    }

    async fn read_events(&mut self) -> Result<Vec<Event>, ConnectionError> {
        let mut inner = self.inner.lock().await;
        if !inner.connected {
            return Err(ConnectionError::Closed);
        }
        Ok(inner.batches.pop_front().unwrap_or_default())
    }

    async fn send(&mut self, channel: &str, text: &str) -> Result<Value, ConnectionError> {
        let mut inner = self.inner.lock().await;
        if !inner.connected {
            return Err(ConnectionError::Closed);
        }
        if let Some(reason) = &inner.fail_send {
            return Err(ConnectionError::Send {
                channel: channel.to_string(),
                reason: reason.clone(),
            });
        }
        inner.next_id += 1;
        let id = inner.next_id;
        inner.sent.push(OutgoingMessage::new(channel, text));
        Ok(json!({ "ok": true, "reply_to": id, "channel": channel, "text": text }))
    }

    async fn keepalive(&mut self) -> Result<(), ConnectionError> {
        let mut inner = self.inner.lock().await;
        if !inner.connected {
            return Err(ConnectionError::Keepalive("not connected".to_string()));
        }
        if let Some(reason) = &inner.fail_keepalive {
            return Err(ConnectionError::Keepalive(reason.clone()));
        }
        inner.keepalives += 1;
        Ok(())
    }

    async fn generic_call(&mut self, method: &str, args: Value) -> Result<Value, ConnectionError> {
        let mut inner = self.inner.lock().await;
        inner.calls.push((method.to_string(), args));
        inner
            .responses
            .get(method)
            .cloned()
            .ok_or_else(|| ConnectionError::Request {
                method: method.to_string(),
                reason: "unknown_method".to_string(),
            })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    #[tokio::test]
    async fn read_before_connect_is_closed() {
        let mut conn = MemoryConnection::new();
        let result = conn.read_events().await;
        assert!(matches!(result, Err(ConnectionError::Closed)));
    }

    #[tokio::test]
    async fn batches_are_returned_in_order_then_empty() {
        let mut conn = MemoryConnection::new();
        conn.push_batch(vec![Event::default()]).await;
        conn.push_batch(vec![Event::default(), Event::default()]).await;
        assert_ok!(conn.connect().await);

        assert_eq!(assert_ok!(conn.read_events().await).len(), 1);
        assert_eq!(assert_ok!(conn.read_events().await).len(), 2);
        assert!(assert_ok!(conn.read_events().await).is_empty());
        assert_eq!(conn.pending_batches().await, 0);
    }

    #[tokio::test]
    async fn clones_share_state() {
        let observer = MemoryConnection::new();
        let mut conn = observer.clone();
        assert_ok!(conn.connect().await);
        assert_ok!(conn.send("C1", "hello").await);
        assert_ok!(conn.keepalive().await);

        assert!(observer.is_connected().await);
        assert_eq!(observer.sent().await, vec![OutgoingMessage::new("C1", "hello")]);
        assert_eq!(observer.keepalives().await, 1);
    }

    #[tokio::test]
    async fn injected_failures_surface() {
        let mut conn = MemoryConnection::new();
        conn.fail_connect("invalid_auth").await;
        let err = assert_err!(conn.connect().await);
        assert_eq!(err.to_string(), "connect failed: invalid_auth");

        let mut conn = MemoryConnection::new();
        assert_ok!(conn.connect().await);
        conn.fail_send("channel_not_found").await;
        assert!(matches!(
            conn.send("C9", "x").await,
            Err(ConnectionError::Send { channel, .. }) if channel == "C9"
        ));
    }

    #[tokio::test]
    async fn generic_call_uses_canned_responses() {
        let mut conn = MemoryConnection::new();
        conn.respond("auth.test", json!({"ok": true, "user": "bot"})).await;

        let reply = assert_ok!(conn.generic_call("auth.test", json!({})).await);
        assert_eq!(reply.get("user"), Some(&json!("bot")));
        assert_err!(conn.generic_call("users.list", json!({"limit": 1})).await);
        assert_eq!(conn.calls().await.len(), 2);
    }
}
