//! Dispatcher configuration loaded from environment variables.
//!
//! Follows 12-factor style: settings come from environment variables (or a
//! `.env` file via `dotenvy`). Every key is optional and falls back to the
//! documented default.
//!
//! | Key                                | Default | Meaning                          |
//! |------------------------------------|---------|----------------------------------|
//! | `BIGSLACKER_PING_INTERVAL_SECS`    | `3`     | Minimum gap between keepalives   |
//! | `BIGSLACKER_PROCESS_PLUGIN_RETURN` | `true`  | Send handler return values       |
//! | `BIGSLACKER_SLEEPING_TIME_MS`      | `1000`  | Pause between read iterations    |

use std::time::Duration;

use crate::error::DispatchError;

/// Default keepalive interval.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(3);

/// Default pause between two reads.
pub const DEFAULT_SLEEPING_TIME: Duration = Duration::from_secs(1);

/// Runtime settings for a [`crate::dispatcher::Dispatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Elapsed time that must be exceeded before another keepalive is sent.
    pub ping_interval: Duration,

    /// Whether handler return values are turned into outgoing messages.
    pub process_plugin_return: bool,

    /// Fixed delay between read iterations.
    pub sleeping_time: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            ping_interval: DEFAULT_PING_INTERVAL,
            process_plugin_return: true,
            sleeping_time: DEFAULT_SLEEPING_TIME,
        }
    }
}

impl DispatcherConfig {
    /// Sets the keepalive interval.
    #[must_use]
    pub const fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Enables or disables sending handler return values.
    #[must_use]
    pub const fn with_process_plugin_return(mut self, enabled: bool) -> Self {
        self.process_plugin_return = enabled;
        self
    }

    /// Sets the pause between read iterations.
    #[must_use]
    pub const fn with_sleeping_time(mut self, sleeping_time: Duration) -> Self {
        self.sleeping_time = sleeping_time;
        self
    }

    /// Checks that the settings describe a usable loop.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Config`] if `sleeping_time` is zero.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.sleeping_time.is_zero() {
            return Err(DispatchError::Config(
                "sleeping time must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Config`] if a key is set but cannot be
    /// parsed, or if the resulting settings fail [`Self::validate`].
    pub fn from_env() -> Result<Self, DispatchError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DispatchError> {
        let defaults = Self::default();

        let ping_interval = parse_key(&lookup, "BIGSLACKER_PING_INTERVAL_SECS")?
            .map_or(defaults.ping_interval, Duration::from_secs);

        let process_plugin_return = match lookup("BIGSLACKER_PROCESS_PLUGIN_RETURN") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                DispatchError::Config(format!(
                    "BIGSLACKER_PROCESS_PLUGIN_RETURN: expected a boolean, got {raw:?}"
                ))
            })?,
            None => defaults.process_plugin_return,
        };

        let sleeping_time = parse_key(&lookup, "BIGSLACKER_SLEEPING_TIME_MS")?
            .map_or(defaults.sleeping_time, Duration::from_millis);

        let config = Self {
            ping_interval,
            process_plugin_return,
            sleeping_time,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Parses `key` as a `u64` when it is set.
fn parse_key(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<u64>, DispatchError> {
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| DispatchError::Config(format!("{key}: {e} (got {raw:?})")))
        })
        .transpose()
}

/// Accepts `"true"`, `"1"`, `"false"`, `"0"` (and upper-case forms).
fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "true" | "TRUE" | "1" => Some(true),
        "false" | "FALSE" | "0" => Some(false),
        _ => None,
    }
}
