//! Bounded retry with fixed backoff
//!
//! One [`RetryPolicy`] value replaces per-operation retry loops. An optional
//! [`CorrectiveStep`] runs once after a specific failed attempt, before that
//! attempt's backoff sleep.
//!
//! Every wait selects on a [`CancellationToken`]. An attempt already running
//! is allowed to finish; no further attempt starts once the token fires.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Extra action scheduled after one specific failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectiveStep {
    /// 1-based attempt index after whose failure the step runs
    pub at_attempt: u32,
    /// Additional wait after the step, before the regular backoff
    #[serde(with = "humantime_serde")]
    pub extra_delay: Duration,
}

/// Attempt cap, backoff and optional corrective step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
    corrective: Option<CorrectiveStep>,
}

/// How a retried operation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryOutcome {
    pub succeeded: bool,
    /// Attempts actually made; zero only when cancelled before the first
    pub attempts: u32,
    /// Cancellation cut the retries short
    pub interrupted: bool,
}

impl RetryOutcome {
    const fn interrupted(attempts: u32) -> Self {
        Self {
            succeeded: false,
            attempts,
            interrupted: true,
        }
    }
}

/// Sleep unless `cancel` fires first; `false` on cancellation
async fn wait(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(duration) => true,
    }
}

impl RetryPolicy {
    /// Create a policy; `max_attempts` below 1 is treated as 1
    #[inline]
    #[must_use]
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            corrective: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_corrective(mut self, step: CorrectiveStep) -> Self {
        self.corrective = Some(step);
        self
    }

    #[inline]
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[inline]
    #[must_use]
    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    #[inline]
    #[must_use]
    pub fn corrective(&self) -> Option<CorrectiveStep> {
        self.corrective
    }

    /// Run `action` until it succeeds or the attempt cap is reached
    ///
    /// Never fails: exhaustion and cancellation are reported through
    /// [`RetryOutcome`].
    pub async fn attempt<A, AF, E>(&self, label: &str, action: A, cancel: &CancellationToken) -> RetryOutcome
    where
        A: FnMut(u32) -> AF,
        AF: Future<Output = Result<(), E>>,
        E: Display,
    {
        self.attempt_with(label, action, || async {}, cancel).await
    }

    /// Like [`RetryPolicy::attempt`], running `corrective` when the configured step is due
    pub async fn attempt_with<A, AF, E, C, CF>(
        &self,
        label: &str,
        mut action: A,
        mut corrective: C,
        cancel: &CancellationToken,
    ) -> RetryOutcome
    where
        A: FnMut(u32) -> AF,
        AF: Future<Output = Result<(), E>>,
        E: Display,
        C: FnMut() -> CF,
        CF: Future<Output = ()>,
    {
        for attempt in 1..=self.max_attempts {
            if cancel.is_cancelled() {
                tracing::info!(op = label, attempts = attempt - 1, "retries cancelled");
                return RetryOutcome::interrupted(attempt - 1);
            }

            match action(attempt).await {
                Ok(()) => {
                    tracing::info!(op = label, attempt, max_attempts = self.max_attempts, "attempt succeeded");
                    return RetryOutcome {
                        succeeded: true,
                        attempts: attempt,
                        interrupted: false,
                    };
                }
                Err(e) => {
                    tracing::warn!(
                        op = label,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "attempt failed"
                    );

                    if attempt == self.max_attempts {
                        break;
                    }

                    if let Some(step) = self.corrective.filter(|s| s.at_attempt == attempt) {
                        tracing::info!(op = label, attempt, "running corrective step");
                        corrective().await;
                        if !wait(step.extra_delay, cancel).await {
                            return RetryOutcome::interrupted(attempt);
                        }
                    }

                    tracing::info!(
                        op = label,
                        backoff = ?self.backoff,
                        next_attempt = attempt + 1,
                        "retrying after backoff"
                    );
                    if !wait(self.backoff, cancel).await {
                        tracing::info!(op = label, attempts = attempt, "retries cancelled during backoff");
                        return RetryOutcome::interrupted(attempt);
                    }
                }
            }
        }

        RetryOutcome {
            succeeded: false,
            attempts: self.max_attempts,
            interrupted: false,
        }
    }
}
