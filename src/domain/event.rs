//! Events received from the messaging backend.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One unit of data received from the backend.
///
/// The raw JSON object is kept as-is and handed to plugins unmodified. The
/// only field the dispatcher looks at is `type`, and even that is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event(Map<String, Value>);

impl Event {
    /// Creates an event from its raw fields.
    #[must_use]
    pub const fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Returns the event type used for typed routing.
    ///
    /// `None` when the `type` field is absent, null, not a string, or empty.
    #[must_use]
    pub fn event_type(&self) -> Option<&str> {
        self.0
            .get("type")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
    }

    /// Returns a single payload field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns a string payload field.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Returns the full payload, including `type`.
    #[must_use]
    pub const fn payload(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes the event, returning its raw fields.
    #[must_use]
    pub fn into_payload(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Event {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

impl TryFrom<Value> for Event {
    type Error = Value;

    /// Accepts JSON objects only; anything else is handed back.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(other),
        }
    }
}
