//! Domain layer: events, outgoing messages, plugins and their registry.
//!
//! Plugins never see the connection. They receive an [`Event`] and express
//! outbound effects only through the [`OutgoingMessage`]s they return.

pub mod event;
pub mod outgoing;
pub mod plugin;
pub mod registry;

pub use event::Event;
pub use outgoing::OutgoingMessage;
pub use plugin::{Handler, HandlerResult, Plugin, PluginBuilder, Route};
pub use registry::PluginRegistry;
