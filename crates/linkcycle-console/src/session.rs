//! Capability interface over a spawned interactive process
//!
//! [`ControllableSession`] is the seam between the serial state machine and
//! the real terminal. Everything the machine needs goes through these few
//! operations, so a scripted fake can stand in for the console in tests.

use crate::error::SessionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Program and arguments to spawn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnTarget {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl SpawnTarget {
    #[must_use]
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Split a whitespace-separated command line; `None` when empty
    #[must_use]
    pub fn parse(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program, parts))
    }
}

impl fmt::Display for SpawnTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Result of waiting for one of several patterns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectOutcome {
    /// `patterns[index]` was seen; `before` is the text preceding it
    Matched { index: usize, before: String },
    /// Nothing matched in time; `pending` is the unmatched text read so far
    Timeout { pending: String },
    /// Peer closed its output before a match
    Closed { pending: String },
}

impl ExpectOutcome {
    #[inline]
    #[must_use]
    pub fn matched(&self) -> Option<usize> {
        match self {
            ExpectOutcome::Matched { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// Minimal control over one interactive process
#[async_trait]
pub trait ControllableSession: Send {
    /// Start the process
    async fn spawn(&mut self, target: &SpawnTarget) -> Result<(), SessionError>;

    /// Write raw bytes, e.g. a control sequence
    async fn send(&mut self, bytes: &[u8]) -> Result<(), SessionError>;

    /// Write `line` followed by the line terminator
    async fn send_line(&mut self, line: &str) -> Result<(), SessionError>;

    /// Wait up to `timeout` for the earliest occurrence of any pattern
    ///
    /// Matched text and everything before it is consumed.
    async fn expect(&mut self, patterns: &[&str], timeout: Duration) -> Result<ExpectOutcome, SessionError>;

    fn is_alive(&mut self) -> bool;

    /// Ask the process to exit (SIGTERM)
    fn terminate(&mut self) -> Result<(), SessionError>;

    /// Force the process to exit (SIGKILL)
    fn kill(&mut self) -> Result<(), SessionError>;
}

#[async_trait]
impl<S: ControllableSession + ?Sized> ControllableSession for Box<S> {
    async fn spawn(&mut self, target: &SpawnTarget) -> Result<(), SessionError> {
        (**self).spawn(target).await
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<(), SessionError> {
        (**self).send(bytes).await
    }

    async fn send_line(&mut self, line: &str) -> Result<(), SessionError> {
        (**self).send_line(line).await
    }

    async fn expect(&mut self, patterns: &[&str], timeout: Duration) -> Result<ExpectOutcome, SessionError> {
        (**self).expect(patterns, timeout).await
    }

    fn is_alive(&mut self) -> bool {
        (**self).is_alive()
    }

    fn terminate(&mut self) -> Result<(), SessionError> {
        (**self).terminate()
    }

    fn kill(&mut self) -> Result<(), SessionError> {
        (**self).kill()
    }
}

/// Earliest match of any pattern in `haystack`
///
/// Returns `(pattern index, match start, match end)` as byte offsets. When two
/// patterns start at the same offset the lower index wins. Empty patterns
/// never match.
#[must_use]
pub fn find_earliest(haystack: impl AsRef<[u8]>, patterns: &[&str]) -> Option<(usize, usize, usize)> {
    let haystack = haystack.as_ref();
    patterns
        .iter()
        .enumerate()
        .filter(|(_, p)| !p.is_empty())
        .filter_map(|(index, p)| {
            let needle = p.as_bytes();
            haystack
                .windows(needle.len())
                .position(|window| window == needle)
                .map(|start| (index, start, start + needle.len()))
        })
        .min_by_key(|&(index, start, _)| (start, index))
}
