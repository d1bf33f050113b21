//! Plugins and their handler tables.
//!
//! A [`Plugin`] is a named set of handlers keyed by event type, plus an
//! optional catch-all. The table is fixed when the plugin is built, so the
//! dispatcher routes with a map lookup rather than probing the plugin for
//! capabilities at runtime.
//!
//! ```
//! use bigslacker::domain::{Event, OutgoingMessage, Plugin};
//!
//! let plugin = Plugin::builder("greeter")
//!     .on("member_joined_channel", |event| {
//!         let channel = event.get_str("channel").unwrap_or_default();
//!         Ok(Some(vec![OutgoingMessage::new(channel, "welcome!")]))
//!     })
//!     .build();
//!
//! assert!(plugin.handles("member_joined_channel"));
//! assert!(!plugin.has_catch_all());
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use super::{Event, OutgoingMessage};

/// Value returned by every handler.
///
/// `Ok(None)` and `Ok(Some(vec![]))` both mean "nothing to send".
pub type HandlerResult = anyhow::Result<Option<Vec<OutgoingMessage>>>;

/// A callable invoked with one event.
///
/// Implemented for every `FnMut(&Event) -> HandlerResult + Send` closure.
/// Handlers take `&mut self` so a plugin may keep internal state.
pub trait Handler: Send {
    /// Handles `event`, optionally producing messages to send.
    ///
    /// # Errors
    ///
    /// Any error is reported by the dispatcher and does not stop dispatch
    /// to other handlers.
    fn call(&mut self, event: &Event) -> HandlerResult;
}

impl<F> Handler for F
where
    F: FnMut(&Event) -> HandlerResult + Send,
{
    fn call(&mut self, event: &Event) -> HandlerResult {
        self(event)
    }
}

/// Identifies which handler of a plugin was invoked.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    /// The handler registered for this event type.
    Typed(String),
    /// The plugin's catch-all handler.
    CatchAll,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Typed(event_type) => f.write_str(event_type),
            Self::CatchAll => f.write_str("catch_all"),
        }
    }
}

/// A named handler unit consulted on every event.
pub struct Plugin {
    name: String,
    handlers: HashMap<String, Box<dyn Handler>>,
    catch_all: Option<Box<dyn Handler>>,
}

impl Plugin {
    /// Starts building a plugin called `name`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> PluginBuilder {
        PluginBuilder {
            name: name.into(),
            handlers: HashMap::new(),
            catch_all: None,
        }
    }

    /// Returns the plugin name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if a handler is registered for `event_type`.
    #[must_use]
    pub fn handles(&self, event_type: &str) -> bool {
        self.handlers.contains_key(event_type)
    }

    /// Returns `true` if the plugin has a catch-all handler.
    #[must_use]
    pub const fn has_catch_all(&self) -> bool {
        self.catch_all.is_some()
    }

    /// Returns the registered event types, sorted.
    #[must_use]
    pub fn event_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Invokes the handler registered for `event_type`.
    ///
    /// Returns `None` when the plugin has no such handler. A panicking
    /// handler yields an `Err` instead of unwinding into the caller.
    pub fn call_typed(&mut self, event_type: &str, event: &Event) -> Option<HandlerResult> {
        self.handlers
            .get_mut(event_type)
            .map(|handler| invoke(handler.as_mut(), event))
    }

    /// Invokes the catch-all handler.
    ///
    /// Returns `None` when the plugin has no catch-all. A panicking handler
    /// yields an `Err` instead of unwinding into the caller.
    pub fn call_catch_all(&mut self, event: &Event) -> Option<HandlerResult> {
        self.catch_all
            .as_mut()
            .map(|handler| invoke(handler.as_mut(), event))
    }
}

/// Calls `handler`, converting a panic into an error.
fn invoke(handler: &mut dyn Handler, event: &Event) -> HandlerResult {
    panic::catch_unwind(AssertUnwindSafe(|| handler.call(event))).unwrap_or_else(|payload| {
        Err(anyhow::anyhow!(
            "handler panicked: {}",
            panic_message(&*payload)
        ))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string payload>")
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("event_types", &self.event_types())
            .field("catch_all", &self.has_catch_all())
            .finish()
    }
}

/// Builder for [`Plugin`]; see [`Plugin::builder`].
pub struct PluginBuilder {
    name: String,
    handlers: HashMap<String, Box<dyn Handler>>,
    catch_all: Option<Box<dyn Handler>>,
}

impl PluginBuilder {
    /// Registers a closure for events whose `type` is exactly `event_type`.
    ///
    /// Registering the same event type again replaces the earlier handler.
    #[must_use]
    pub fn on<F>(self, event_type: impl Into<String>, handler: F) -> Self
    where
        F: FnMut(&Event) -> HandlerResult + Send + 'static,
    {
        self.on_handler(event_type, handler)
    }

    /// Registers any [`Handler`] for events whose `type` is `event_type`.
    #[must_use]
    pub fn on_handler(
        mut self,
        event_type: impl Into<String>,
        handler: impl Handler + 'static,
    ) -> Self {
        let event_type = event_type.into();
        if self
            .handlers
            .insert(event_type.clone(), Box::new(handler))
            .is_some()
        {
            tracing::debug!(plugin = %self.name, %event_type, "handler replaced");
        }
        self
    }

    /// Registers a closure invoked for every event regardless of type.
    #[must_use]
    pub fn catch_all<F>(self, handler: F) -> Self
    where
        F: FnMut(&Event) -> HandlerResult + Send + 'static,
    {
        self.catch_all_handler(handler)
    }

    /// Registers any [`Handler`] as the catch-all.
    #[must_use]
    pub fn catch_all_handler(mut self, handler: impl Handler + 'static) -> Self {
        self.catch_all = Some(Box::new(handler));
        self
    }

    /// Finishes the plugin.
    #[must_use]
    pub fn build(self) -> Plugin {
        Plugin {
            name: self.name,
            handlers: self.handlers,
            catch_all: self.catch_all,
        }
    }
}

impl fmt::Debug for PluginBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginBuilder")
            .field("name", &self.name)
            .field("handlers", &self.handlers.len())
            .field("catch_all", &self.catch_all.is_some())
            .finish()
    }
}
