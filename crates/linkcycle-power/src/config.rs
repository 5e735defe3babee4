//! Power control configuration

use crate::command::ManagementTool;
use crate::retry::{CorrectiveStep, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Management tool shape, command timeout and retry schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerConfig {
    pub tool: ManagementTool,
    /// Upper bound for a single management command
    #[serde(with = "humantime_serde")]
    pub command_timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            tool: ManagementTool::default(),
            command_timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
        }
    }
}

impl PowerConfig {
    #[inline]
    #[must_use]
    pub fn with_tool(mut self, tool: ManagementTool) -> Self {
        self.tool = tool;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Retry schedule for change commands
///
/// The corrective step only applies to power-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub backoff: Duration,
    /// Failed attempt after which the off command is reissued; `None` disables it
    pub corrective_attempt: Option<u32>,
    #[serde(with = "humantime_serde")]
    pub corrective_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(3),
            corrective_attempt: Some(2),
            corrective_delay: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_corrective(mut self, at_attempt: Option<u32>, delay: Duration) -> Self {
        self.corrective_attempt = at_attempt;
        self.corrective_delay = delay;
        self
    }

    /// Policy for power-on: plain retry
    #[must_use]
    pub fn on_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.backoff)
    }

    /// Policy for power-off, including the corrective step when configured
    #[must_use]
    pub fn off_policy(&self) -> RetryPolicy {
        let policy = RetryPolicy::new(self.max_attempts, self.backoff);
        match self.corrective_attempt {
            Some(at_attempt) => policy.with_corrective(CorrectiveStep {
                at_attempt,
                extra_delay: self.corrective_delay,
            }),
            None => policy,
        }
    }
}
