//! Messages produced by plugins for the dispatcher to send.

use serde::{Deserialize, Serialize};

/// A text message bound for one destination channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Destination channel identifier.
    pub channel: String,
    /// Message body.
    pub text: String,
}

impl OutgoingMessage {
    /// Creates a message for `channel`.
    #[must_use]
    pub fn new(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            text: text.into(),
        }
    }
}

impl<C, T> From<(C, T)> for OutgoingMessage
where
    C: Into<String>,
    T: Into<String>,
{
    fn from((channel, text): (C, T)) -> Self {
        Self::new(channel, text)
    }
}
