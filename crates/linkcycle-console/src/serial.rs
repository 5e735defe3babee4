//! Serial console capture as an explicit state machine
//!
//! ```text
//! Closed -> Spawned -> Ready -> Executing -> Draining -> Done -> Closing -> Closed
//!              |         |          |            |                  ^
//!              +---------+----------+------------+------------------+
//! ```
//!
//! Every path that got past spawning ends in `Closing`, which runs the
//! teardown ladder: escape sequences, SIGTERM, SIGKILL. Timeouts never fail
//! the run; they show up as flags on the returned [`Capture`].

use crate::config::ConsoleConfig;
use crate::error::SessionError;
use crate::session::{ControllableSession, ExpectOutcome};
use crate::state::{validate_transition, SessionState};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How the console process ended during teardown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Teardown {
    /// Spawn failed; nothing to tear down
    #[default]
    NotStarted,
    ExitedOnEscape,
    Terminated,
    Killed,
    /// Still alive after SIGKILL
    Survived,
}

impl Teardown {
    /// Whether the process is known to be gone
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        !matches!(self, Teardown::Survived)
    }
}

/// Result of one console run
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Capture {
    /// Concatenated console text from the query onwards (may be partial)
    pub raw_output: String,
    /// Prompt seen after spawning
    pub reached_ready: bool,
    /// Prompt seen again after the query output
    pub reached_done: bool,
    /// Cancelled before completion
    pub interrupted: bool,
    pub teardown: Teardown,
}

/// Why the conversation stopped before `Done`
enum Abort {
    Interrupted,
    Session(SessionError),
    Quiet,
}

impl From<SessionError> for Abort {
    fn from(e: SessionError) -> Self {
        Abort::Session(e)
    }
}

/// Drives one query against the switch console
#[derive(Debug)]
pub struct SerialSession<S> {
    session: S,
    config: ConsoleConfig,
    state: SessionState,
}

impl<S: ControllableSession> SerialSession<S> {
    #[must_use]
    pub fn new(session: S, config: ConsoleConfig) -> Self {
        Self {
            session,
            config,
            state: SessionState::Closed,
        }
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[inline]
    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    #[must_use]
    pub fn into_inner(self) -> S {
        self.session
    }

    /// Spawn the console, run `command`, drain its paginated output and tear down
    ///
    /// Always returns with the machine in [`SessionState::Closed`].
    pub async fn run(&mut self, command: &str, cancel: &CancellationToken) -> Capture {
        let mut capture = Capture::default();

        if let Err(e) = self.session.spawn(&self.config.spawn).await {
            tracing::warn!(command = %self.config.spawn, error = %e, "failed to open console");
            return capture;
        }
        self.enter(SessionState::Spawned);
        tracing::info!(command = %self.config.spawn, "console opened");

        match self.converse(command, cancel, &mut capture).await {
            Ok(()) => {}
            Err(Abort::Interrupted) => {
                tracing::warn!(state = ?self.state, "console run interrupted");
                capture.interrupted = true;
            }
            Err(Abort::Session(e)) => {
                tracing::error!(state = ?self.state, error = %e, "console session error");
            }
            Err(Abort::Quiet) => {}
        }

        self.enter(SessionState::Closing);
        capture.teardown = self.teardown().await;
        self.enter(SessionState::Closed);
        capture
    }

    async fn converse(
        &mut self,
        command: &str,
        cancel: &CancellationToken,
        capture: &mut Capture,
    ) -> Result<(), Abort> {
        let prompt = self.config.prompt.clone();
        let pagination = self.config.pagination.clone();

        // Spawned -> Ready
        cancellable(cancel, tokio::time::sleep(self.config.settle)).await?;
        self.session.send_line("").await?;
        match self
            .expect(cancel, &[prompt.as_str()], self.config.prompt_timeout)
            .await?
        {
            ExpectOutcome::Matched { .. } => {}
            ExpectOutcome::Timeout { .. } => {
                tracing::warn!(
                    prompt = %prompt,
                    timeout = ?self.config.prompt_timeout,
                    "console prompt not seen"
                );
                return Err(Abort::Quiet);
            }
            ExpectOutcome::Closed { .. } => {
                tracing::warn!("console closed before prompt");
                return Err(Abort::Quiet);
            }
        }
        self.advance(SessionState::Ready)?;
        capture.reached_ready = true;
        tracing::info!("console ready");

        // Ready -> Executing -> Draining
        self.advance(SessionState::Executing)?;
        self.session.send_line(command).await?;
        self.advance(SessionState::Draining)?;

        let patterns = [pagination.as_str(), prompt.as_str()];
        let mut pages = 0u32;
        loop {
            match self
                .expect(cancel, &patterns, self.config.pagination_timeout)
                .await?
            {
                ExpectOutcome::Matched { index: 0, before } => {
                    capture.raw_output.push_str(&before);
                    pages += 1;
                    tracing::debug!(page = pages, "pagination marker; continuing");
                    self.session.send_line("").await?;
                }
                ExpectOutcome::Matched { before, .. } => {
                    capture.raw_output.push_str(&before);
                    capture.reached_done = true;
                    break;
                }
                ExpectOutcome::Timeout { pending } => {
                    capture.raw_output.push_str(&pending);
                    tracing::warn!(
                        pages,
                        captured_bytes = capture.raw_output.len(),
                        "command output timed out; keeping partial output"
                    );
                    break;
                }
                ExpectOutcome::Closed { pending } => {
                    capture.raw_output.push_str(&pending);
                    tracing::warn!(pages, "console closed while draining output");
                    return Err(Abort::Quiet);
                }
            }
        }

        self.advance(SessionState::Done)?;
        tracing::info!(pages, captured_bytes = capture.raw_output.len(), "command output captured");
        Ok(())
    }

    async fn expect(
        &mut self,
        cancel: &CancellationToken,
        patterns: &[&str],
        timeout: Duration,
    ) -> Result<ExpectOutcome, Abort> {
        Ok(cancellable(cancel, self.session.expect(patterns, timeout)).await??)
    }

    async fn teardown(&mut self) -> Teardown {
        let teardown = self.config.teardown.clone();

        for (i, escape) in teardown.escapes.iter().enumerate() {
            if i > 0 && !self.session.is_alive() {
                break;
            }
            tracing::info!(sequence = ?escape, "sending console escape sequence");
            if let Err(e) = self.session.send(escape.as_bytes()).await {
                tracing::debug!(error = %e, "escape sequence not delivered");
            }
            tokio::time::sleep(teardown.escape_wait).await;
        }
        if !self.session.is_alive() {
            tracing::info!("console exited");
            return Teardown::ExitedOnEscape;
        }

        tracing::warn!("console still running; terminating");
        if let Err(e) = self.session.terminate() {
            tracing::warn!(error = %e, "terminate failed");
        }
        tokio::time::sleep(teardown.terminate_wait).await;
        if !self.session.is_alive() {
            tracing::info!("console terminated");
            return Teardown::Terminated;
        }

        tracing::warn!("graceful termination failed; killing console");
        if let Err(e) = self.session.kill() {
            tracing::warn!(error = %e, "kill failed");
        }
        tokio::time::sleep(teardown.kill_wait).await;
        if self.session.is_alive() {
            tracing::warn!("console survived kill; manual intervention required");
            Teardown::Survived
        } else {
            tracing::warn!("console had to be force-killed");
            Teardown::Killed
        }
    }

    fn advance(&mut self, to: SessionState) -> Result<(), SessionError> {
        validate_transition(self.state, to)?;
        tracing::debug!(from = ?self.state, to = ?to, "console state transition");
        self.state = to;
        Ok(())
    }

    /// Transition that must happen regardless of the current state
    fn enter(&mut self, to: SessionState) {
        if let Err(e) = self.advance(to) {
            tracing::error!(error = %e, "forcing console state");
            self.state = to;
        }
    }
}

async fn cancellable<F: Future>(cancel: &CancellationToken, fut: F) -> Result<F::Output, Abort> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Abort::Interrupted),
        out = fut => Ok(out),
    }
}
