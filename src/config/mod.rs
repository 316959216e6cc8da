//! Queue configuration.
//!
//! Values come from code (builder methods), from the environment via
//! [`QueueConfig::from_env`], or from any serde format a host application
//! already uses for its own settings.
//!
//! | Variable              | Meaning                              | Default   |
//! |-----------------------|--------------------------------------|-----------|
//! | `TASKLANE_QUEUE_NAME` | name attached to every log event     | `default` |
//! | `TASKLANE_PACING_MS`  | pause between two tasks, in ms       | `100`     |

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable holding the queue name.
pub const NAME_VAR: &str = "TASKLANE_QUEUE_NAME";

/// Environment variable holding the pacing interval in milliseconds.
pub const PACING_VAR: &str = "TASKLANE_PACING_MS";

/// Pause inserted between two consecutive tasks unless configured otherwise.
pub const DEFAULT_PACING: Duration = Duration::from_millis(100);

/// Errors produced while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings for a [`TaskQueue`](crate::background::TaskQueue).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tasklane::config::QueueConfig;
///
/// let config = QueueConfig::default()
///     .name("movie-inserts")
///     .pacing_interval(Duration::from_millis(250));
/// assert_eq!(config.name, "movie-inserts");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Name used in log events, handy when a process runs several queues.
    pub name: String,

    /// Fixed pause between the end of one task and the start of the next.
    /// Zero is allowed; the worker still yields to the scheduler.
    #[serde(rename = "pacing_ms", with = "millis")]
    pub pacing_interval: Duration,
}

impl QueueConfig {
    /// Sets the queue name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the pacing interval.
    pub fn pacing_interval(mut self, interval: Duration) -> Self {
        self.pacing_interval = interval;
        self
    }

    /// Loads overrides from the process environment.
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a variable is set but cannot be
    /// parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), but reads variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(NAME_VAR) {
            let name = raw.trim();
            if name.is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: NAME_VAR,
                    value: raw,
                    reason: "must not be empty".to_owned(),
                });
            }
            config.name = name.to_owned();
        }

        if let Some(raw) = lookup(PACING_VAR) {
            let millis = raw
                .trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::InvalidValue {
                    key: PACING_VAR,
                    value: raw.clone(),
                    reason: e.to_string(),
                })?;
            config.pacing_interval = Duration::from_millis(millis);
        }

        Ok(config)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: "default".to_owned(),
            pacing_interval: DEFAULT_PACING,
        }
    }
}

// Durations travel as whole milliseconds.
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
