//! Scripted console session
//!
//! Each `expect` call consumes script steps until one of the patterns shows up
//! in the accumulated output. [`FakeProbe`] stays with the test after the
//! session is moved into a [`SerialSession`](linkcycle_console::SerialSession)
//! or a session factory.

use crate::fixtures::{PAGINATION, PROMPT, STATUS_PAGES};
use async_trait::async_trait;
use linkcycle_console::{find_earliest, ControllableSession, ExpectOutcome, SessionError, SpawnTarget};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// One scripted console event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeStep {
    /// Text printed by the console
    Output(String),
    /// Nothing arrives; the pending `expect` runs into its timeout
    Silence,
    /// Console exits
    Eof,
}

/// Which teardown step makes the fake process exit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FakeExit {
    #[default]
    OnEscape,
    /// Ignores the first escape sequence, exits on the second
    OnSecondEscape,
    OnTerminate,
    OnKill,
    Never,
}

#[derive(Debug, Default)]
struct Recorded {
    spawns: Vec<SpawnTarget>,
    lines: Vec<String>,
    raw: Vec<Vec<u8>>,
    terminations: usize,
    kills: usize,
    alive: bool,
}

/// Read access to what a [`FakeSession`] observed
#[derive(Debug, Clone, Default)]
pub struct FakeProbe(Arc<Mutex<Recorded>>);

impl FakeProbe {
    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.0.lock().unwrap()
    }

    pub fn spawns(&self) -> Vec<SpawnTarget> {
        self.lock().spawns.clone()
    }

    /// Every `send_line` argument, in order
    pub fn lines_sent(&self) -> Vec<String> {
        self.lock().lines.clone()
    }

    /// Empty lines sent after `command`
    pub fn continuations_after(&self, command: &str) -> usize {
        let lines = self.lines_sent();
        lines
            .iter()
            .position(|l| l == command)
            .map_or(0, |pos| lines[pos + 1..].iter().filter(|l| l.is_empty()).count())
    }

    /// Every raw `send` payload, in order
    pub fn raw_sent(&self) -> Vec<Vec<u8>> {
        self.lock().raw.clone()
    }

    pub fn terminations(&self) -> usize {
        self.lock().terminations
    }

    pub fn kills(&self) -> usize {
        self.lock().kills
    }

    pub fn is_alive(&self) -> bool {
        self.lock().alive
    }
}

/// Scripted [`ControllableSession`]
#[derive(Debug, Default)]
pub struct FakeSession {
    script: VecDeque<FakeStep>,
    buffer: String,
    exit: FakeExit,
    spawn_fails: bool,
    recorded: FakeProbe,
}

impl FakeSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prompt, then the three status pages separated by pagination markers,
    /// then the closing prompt
    #[must_use]
    pub fn switch_console() -> Self {
        Self::with_pages(&STATUS_PAGES)
    }

    /// Prompt, `pages` separated by pagination markers, closing prompt
    #[must_use]
    pub fn with_pages(pages: &[&str]) -> Self {
        let mut fake = Self::new().output(format!("\r\n{PROMPT}"));
        let last = pages.len().saturating_sub(1);
        for (i, page) in pages.iter().enumerate() {
            let tail = if i == last { PROMPT } else { PAGINATION };
            fake = fake.output(format!("{page}{tail}"));
        }
        fake
    }

    #[must_use]
    pub fn output(mut self, text: impl Into<String>) -> Self {
        self.script.push_back(FakeStep::Output(text.into()));
        self
    }

    #[must_use]
    pub fn silence(mut self) -> Self {
        self.script.push_back(FakeStep::Silence);
        self
    }

    #[must_use]
    pub fn eof(mut self) -> Self {
        self.script.push_back(FakeStep::Eof);
        self
    }

    #[must_use]
    pub fn exiting(mut self, exit: FakeExit) -> Self {
        self.exit = exit;
        self
    }

    #[must_use]
    pub fn failing_spawn(mut self) -> Self {
        self.spawn_fails = true;
        self
    }

    #[must_use]
    pub fn probe(&self) -> FakeProbe {
        self.recorded.clone()
    }

    fn check_alive(&self) -> Result<(), SessionError> {
        let recorded = self.recorded.lock();
        if recorded.spawns.is_empty() {
            Err(SessionError::NotRunning)
        } else if recorded.alive {
            Ok(())
        } else {
            Err(SessionError::Io(std::io::ErrorKind::BrokenPipe.into()))
        }
    }
}

#[async_trait]
impl ControllableSession for FakeSession {
    async fn spawn(&mut self, target: &SpawnTarget) -> Result<(), SessionError> {
        if self.spawn_fails {
            return Err(SessionError::Spawn {
                command: target.to_string(),
                source: std::io::ErrorKind::NotFound.into(),
            });
        }
        let mut recorded = self.recorded.lock();
        recorded.spawns.push(target.clone());
        recorded.alive = true;
        Ok(())
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<(), SessionError> {
        self.check_alive()?;
        let mut recorded = self.recorded.lock();
        recorded.raw.push(bytes.to_vec());
        let escapes = recorded.raw.iter().filter(|raw| raw.first() == Some(&0x01)).count();
        let exits = match self.exit {
            FakeExit::OnEscape => escapes >= 1,
            FakeExit::OnSecondEscape => escapes >= 2,
            _ => false,
        };
        if exits {
            recorded.alive = false;
        }
        Ok(())
    }

    async fn send_line(&mut self, line: &str) -> Result<(), SessionError> {
        self.check_alive()?;
        self.recorded.lock().lines.push(line.to_string());
        Ok(())
    }

    async fn expect(&mut self, patterns: &[&str], timeout: Duration) -> Result<ExpectOutcome, SessionError> {
        loop {
            if let Some((index, start, end)) = find_earliest(&self.buffer, patterns) {
                let before = self.buffer[..start].to_string();
                self.buffer.drain(..end);
                return Ok(ExpectOutcome::Matched { index, before });
            }
            match self.script.pop_front() {
                Some(FakeStep::Output(text)) => self.buffer.push_str(&text),
                Some(FakeStep::Silence) | None => {
                    tokio::time::sleep(timeout).await;
                    return Ok(ExpectOutcome::Timeout {
                        pending: std::mem::take(&mut self.buffer),
                    });
                }
                Some(FakeStep::Eof) => {
                    self.recorded.lock().alive = false;
                    return Ok(ExpectOutcome::Closed {
                        pending: std::mem::take(&mut self.buffer),
                    });
                }
            }
        }
    }

    fn is_alive(&mut self) -> bool {
        self.recorded.is_alive()
    }

    fn terminate(&mut self) -> Result<(), SessionError> {
        let mut recorded = self.recorded.lock();
        recorded.terminations += 1;
        if self.exit == FakeExit::OnTerminate {
            recorded.alive = false;
        }
        Ok(())
    }

    fn kill(&mut self) -> Result<(), SessionError> {
        let mut recorded = self.recorded.lock();
        recorded.kills += 1;
        if self.exit != FakeExit::Never {
            recorded.alive = false;
        }
        Ok(())
    }
}
