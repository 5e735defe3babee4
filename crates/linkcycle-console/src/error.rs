//! Error types for console sessions

use crate::state::SessionState;

/// Console session failure
///
/// Timeouts are not errors; they are reported through
/// [`ExpectOutcome::Timeout`](crate::ExpectOutcome::Timeout).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Spawn target has no program
    #[error("empty console command")]
    EmptyCommand,

    /// Console program could not be started
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Pseudo-terminal setup failed
    #[error("pty {stage} failed: {message}")]
    Pty { stage: &'static str, message: String },

    /// Operation on a session that was never spawned or already reaped
    #[error("session not running")]
    NotRunning,

    /// Reading from or writing to the console failed
    #[error("console I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Signal delivery failed
    #[error("failed to signal console process: {0}")]
    Signal(#[from] nix::Error),

    /// State machine asked for a transition it does not allow
    #[error("illegal session transition {from:?} -> {to:?}")]
    IllegalTransition { from: SessionState, to: SessionState },
}

impl SessionError {
    /// Whether the peer is gone, so further sends are pointless
    #[inline]
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        match self {
            Self::NotRunning => true,
            Self::Io(e) => {
                e.kind() == std::io::ErrorKind::BrokenPipe
                    || e.raw_os_error() == Some(nix::errno::Errno::EIO as i32)
            }
            _ => false,
        }
    }
}
