//! Run configuration
//!
//! Loaded from YAML; every field has a default, so an empty file is a valid
//! configuration. Durations are written the humantime way (`"35s"`, `"500ms"`).
//!
//! ```yaml
//! nodes: [3, 6, 9, 12]
//! cycles: 20
//! boot_wait: 35s
//! power:
//!   retry:
//!     max_attempts: 3
//!     backoff: 3s
//! console:
//!   spawn:
//!     program: picocom
//!     args: ["-b", "115200", "/dev/ttyS6"]
//! ```

use crate::error::ConfigError;
use linkcycle_console::ConsoleConfig;
use linkcycle_power::{NodeId, PowerConfig};
use linkcycle_record::DuplicatePolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete run configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Nodes cycled together, in this order
    pub nodes: Vec<NodeId>,
    pub cycles: u32,
    /// Number written for the first cycle
    pub start_cycle: u32,
    pub power: PowerConfig,
    /// Pause between power-off and power-on
    #[serde(with = "humantime_serde")]
    pub off_settle: Duration,
    /// Time given to the nodes to boot before the switch is queried
    #[serde(with = "humantime_serde")]
    pub boot_wait: Duration,
    pub console: ConsoleConfig,
    pub duplicate_policy: DuplicatePolicy,
    /// Append-only cycle record log
    pub record_log: PathBuf,
    /// Plain-text copy of the run's tracing output
    pub run_log: Option<PathBuf>,
    pub show_progress: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nodes: vec![3, 6, 9, 12],
            cycles: 20,
            start_cycle: 1,
            power: PowerConfig::default(),
            off_settle: Duration::from_secs(2),
            boot_wait: Duration::from_secs(35),
            console: ConsoleConfig::default(),
            duplicate_policy: DuplicatePolicy::default(),
            record_log: PathBuf::from("/share/test.log"),
            run_log: Some(PathBuf::from("/share/power_cycle_test.log")),
            show_progress: true,
        }
    }
}

impl AppConfig {
    /// Read and parse a YAML file
    ///
    /// # Errors
    ///
    /// [`ConfigError::Read`] or [`ConfigError::Parse`]; the result is not validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Serialize as YAML
    ///
    /// # Errors
    ///
    /// [`ConfigError::Serialize`] if serialization fails.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(ConfigError::Serialize)
    }

    /// Reject configurations that cannot run
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nodes.is_empty() {
            return Err(ConfigError::Invalid("no nodes configured".into()));
        }
        if self.cycles == 0 {
            return Err(ConfigError::Invalid("cycles must be at least 1".into()));
        }

        let retry = &self.power.retry;
        if retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("power.retry.max_attempts must be at least 1".into()));
        }
        if let Some(at) = retry.corrective_attempt {
            if at == 0 || at >= retry.max_attempts {
                return Err(ConfigError::Invalid(format!(
                    "power.retry.corrective_attempt {at} must be between 1 and {}",
                    retry.max_attempts - 1
                )));
            }
        }

        if self.console.spawn.program.trim().is_empty() {
            return Err(ConfigError::Invalid("console.spawn.program is empty".into()));
        }
        if self.console.prompt.is_empty() {
            return Err(ConfigError::Invalid("console.prompt is empty".into()));
        }
        if self.console.pagination.is_empty() {
            return Err(ConfigError::Invalid("console.pagination is empty".into()));
        }
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn with_nodes(mut self, nodes: impl Into<Vec<NodeId>>) -> Self {
        self.nodes = nodes.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_cycles(mut self, cycles: u32) -> Self {
        self.cycles = cycles;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_start_cycle(mut self, start_cycle: u32) -> Self {
        self.start_cycle = start_cycle;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_power(mut self, power: PowerConfig) -> Self {
        self.power = power;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_waits(mut self, off_settle: Duration, boot_wait: Duration) -> Self {
        self.off_settle = off_settle;
        self.boot_wait = boot_wait;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_console(mut self, console: ConsoleConfig) -> Self {
        self.console = console;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_record_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.record_log = path.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_run_log(mut self, path: Option<PathBuf>) -> Self {
        self.run_log = path;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkcycle_power::RetryConfig;

    #[test]
    fn empty_document_is_the_default() {
        let config: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn humantime_durations_and_partial_sections() {
        let yaml = "\
nodes: [1, 2]
boot_wait: 90s
duplicate_policy: last_wins
power:
  retry:
    backoff: 500ms
console:
  prompt: 'Switch#'
";
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.nodes, vec![1, 2]);
        assert_eq!(config.boot_wait, Duration::from_secs(90));
        assert_eq!(config.duplicate_policy, DuplicatePolicy::LastWins);
        assert_eq!(config.power.retry.backoff, Duration::from_millis(500));
        assert_eq!(config.power.retry.max_attempts, 3);
        assert_eq!(config.console.prompt, "Switch#");
        assert_eq!(config.console.query, "show interfaces status all");
    }

    #[test]
    fn yaml_round_trip() {
        let config = AppConfig::default().with_cycles(5).with_run_log(None);
        let back: AppConfig = serde_yaml::from_str(&config.to_yaml().unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn validation_rejects_unusable_settings() {
        assert!(AppConfig::default().with_nodes(vec![]).validate().is_err());
        assert!(AppConfig::default().with_cycles(0).validate().is_err());

        let zero_attempts = PowerConfig::default().with_retry(RetryConfig::default().with_max_attempts(0));
        assert!(AppConfig::default().with_power(zero_attempts).validate().is_err());

        let late_corrective = PowerConfig::default()
            .with_retry(RetryConfig::default().with_corrective(Some(3), Duration::from_secs(5)));
        let err = AppConfig::default().with_power(late_corrective).validate().unwrap_err();
        assert!(err.to_string().contains("corrective_attempt 3"));

        let no_prompt = ConsoleConfig::default().with_prompt("", Duration::from_secs(60));
        assert!(AppConfig::default().with_console(no_prompt).validate().is_err());
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = AppConfig::load("/nonexistent/linkcycle.yaml").unwrap_err();
        assert!(err.is_not_found());
    }
}
