//! Cancellable waits with an optional progress bar

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const TEMPLATE: &str = "{msg} [{bar:40.cyan/blue}] {pos}/{len}s";

/// The wait was cut short by cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("wait interrupted")]
pub struct Interrupted;

/// Sleep for `duration` unless `cancel` fires first
///
/// # Errors
///
/// [`Interrupted`] on cancellation.
pub async fn pause(duration: Duration, cancel: &CancellationToken) -> Result<(), Interrupted> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Interrupted),
        () = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Like [`pause`], ticking a progress bar once per second
///
/// The bar is hidden when `show` is false or stderr is not a terminal. On
/// cancellation it is abandoned so the terminal line is left intact.
///
/// # Errors
///
/// [`Interrupted`] on cancellation.
pub async fn wait_with_progress(
    duration: Duration,
    message: &str,
    show: bool,
    cancel: &CancellationToken,
) -> Result<(), Interrupted> {
    let bar = if show {
        ProgressBar::new(duration.as_secs())
    } else {
        ProgressBar::hidden()
    };
    if let Ok(style) = ProgressStyle::with_template(TEMPLATE) {
        bar.set_style(style.progress_chars("=> "));
    }
    bar.set_message(message.to_string());

    let tick = Duration::from_secs(1);
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + tick, tick);
    let done = tokio::time::sleep(duration);
    tokio::pin!(done);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                bar.abandon_with_message(format!("{message} (interrupted)"));
                return Err(Interrupted);
            }
            () = &mut done => {
                bar.finish();
                return Ok(());
            }
            _ = ticker.tick() => bar.inc(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn completes_after_full_duration() {
        let started = tokio::time::Instant::now();
        wait_with_progress(Duration::from_secs(35), "booting", false, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(started.elapsed(), Duration::from_secs(35));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_the_wait() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });

        let started = tokio::time::Instant::now();
        let result = wait_with_progress(Duration::from_secs(35), "booting", false, &cancel).await;

        assert_eq!(result, Err(Interrupted));
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn pause_honours_prior_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(pause(Duration::from_secs(2), &cancel).await, Err(Interrupted));
    }
}
