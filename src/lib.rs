//! # bigslacker
//!
//! Minimal real-time chat event dispatcher.
//!
//! A [`dispatcher::Dispatcher`] keeps one realtime connection open, reads
//! batches of events, routes each event to the registered plugins by event
//! type, keeps the session alive with periodic keepalives, and optionally
//! sends whatever the plugins return as replies.
//!
//! ## Architecture
//!
//! ```text
//! Messaging backend
//!     │
//!     ├── Connection (connection/)       collaborator boundary
//!     │
//!     ├── Dispatcher (dispatcher.rs)     connect → read → route → send → ping → sleep
//!     │
//!     ├── PluginRegistry (domain/)       explicit, ordered registration
//!     └── Plugin (domain/)               event-type → handler table + catch-all
//! ```
//!
//! Plugins never touch the connection. Their only outbound channel is the
//! list of [`domain::OutgoingMessage`]s they return.

pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod domain;
pub mod error;

pub use config::DispatcherConfig;
pub use connection::{Connection, MemoryConnection};
pub use dispatcher::{DispatchReport, DispatchStats, Dispatcher, DispatcherState};
pub use domain::{Event, OutgoingMessage, Plugin, PluginRegistry};
pub use error::{ConnectionError, DispatchError, HandlerFailure};
