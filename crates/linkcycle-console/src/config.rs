//! Console session configuration

use crate::session::SpawnTarget;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Console interaction settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Terminal program attached to the serial device
    pub spawn: SpawnTarget,
    /// Wait after spawning before the first newline
    #[serde(with = "humantime_serde")]
    pub settle: Duration,
    pub prompt: String,
    #[serde(with = "humantime_serde")]
    pub prompt_timeout: Duration,
    pub pagination: String,
    #[serde(with = "humantime_serde")]
    pub pagination_timeout: Duration,
    /// Command whose reply is the interface status table
    pub query: String,
    pub teardown: TeardownConfig,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            spawn: SpawnTarget::new("picocom", ["-b", "115200", "/dev/ttyS6"]),
            settle: Duration::from_secs(2),
            prompt: "Console#".to_string(),
            prompt_timeout: Duration::from_secs(60),
            pagination: "Type <CR> to continue, Q<CR> to stop:".to_string(),
            pagination_timeout: Duration::from_secs(30),
            query: "show interfaces status all".to_string(),
            teardown: TeardownConfig::default(),
        }
    }
}

impl ConsoleConfig {
    #[inline]
    #[must_use]
    pub fn with_spawn(mut self, spawn: SpawnTarget) -> Self {
        self.spawn = spawn;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>, timeout: Duration) -> Self {
        self.prompt = prompt.into();
        self.prompt_timeout = timeout;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_pagination(mut self, marker: impl Into<String>, timeout: Duration) -> Self {
        self.pagination = marker.into();
        self.pagination_timeout = timeout;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_teardown(mut self, teardown: TeardownConfig) -> Self {
        self.teardown = teardown;
        self
    }
}

/// Escape sequences and waits of the teardown ladder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeardownConfig {
    /// Sent in order; each followed by `escape_wait`
    pub escapes: Vec<String>,
    #[serde(with = "humantime_serde")]
    pub escape_wait: Duration,
    #[serde(with = "humantime_serde")]
    pub terminate_wait: Duration,
    #[serde(with = "humantime_serde")]
    pub kill_wait: Duration,
}

impl Default for TeardownConfig {
    fn default() -> Self {
        Self {
            // Ctrl-A q, then Ctrl-A x
            escapes: vec!["\x01q".to_string(), "\x01x".to_string()],
            escape_wait: Duration::from_millis(500),
            terminate_wait: Duration::from_secs(1),
            kill_wait: Duration::from_millis(500),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_switch_console() {
        let config = ConsoleConfig::default();
        assert_eq!(config.spawn.to_string(), "picocom -b 115200 /dev/ttyS6");
        assert_eq!(config.prompt_timeout, Duration::from_secs(60));
        assert_eq!(config.teardown.escapes.len(), 2);
    }
}
