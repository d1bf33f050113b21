//! Explicit, ordered plugin registration.
//!
//! [`PluginRegistry`] collects plugin instances in the order the caller
//! registers them. There is no global discovery: two registries never share
//! plugins, and the order of registration is the order of dispatch.

use super::Plugin;

/// Ordered list of plugins waiting to be handed to a dispatcher.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: Vec<Plugin>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `plugin` after every plugin registered so far.
    pub fn register(&mut self, plugin: Plugin) {
        tracing::debug!(plugin = plugin.name(), position = self.plugins.len(), "plugin registered");
        self.plugins.push(plugin);
    }

    /// Builder-style [`Self::register`].
    #[must_use]
    pub fn with(mut self, plugin: Plugin) -> Self {
        self.register(plugin);
        self
    }

    /// Returns the plugin names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(Plugin::name).collect()
    }

    /// Returns the number of registered plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Returns `true` if no plugin has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Produces the ordered plugin list, consuming the registry.
    ///
    /// An empty list is valid: the dispatcher then only reads and pings.
    #[must_use]
    pub fn load(self) -> Vec<Plugin> {
        tracing::info!(count = self.plugins.len(), "plugins loaded");
        self.plugins
    }
}

impl FromIterator<Plugin> for PluginRegistry {
    fn from_iter<I: IntoIterator<Item = Plugin>>(iter: I) -> Self {
        Self {
            plugins: iter.into_iter().collect(),
        }
    }
}
