use crate::error::SessionError;

/// Lifecycle of one console capture
///
/// `Closing` is reachable from every live state so teardown always runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Closed,
    Spawned,
    Ready,
    Executing,
    Draining,
    Done,
    Closing,
}

/// Checks a state transition.
pub fn validate_transition(from: SessionState, to: SessionState) -> Result<(), SessionError> {
    if allowed(from, to) {
        Ok(())
    } else {
        Err(SessionError::IllegalTransition { from, to })
    }
}

#[must_use]
pub fn allowed_transitions(from: SessionState) -> Vec<SessionState> {
    use SessionState::*;
    match from {
        Closed => vec![Spawned],
        Spawned => vec![Ready, Closing],
        Ready => vec![Executing, Closing],
        Executing => vec![Draining, Closing],
        Draining => vec![Done, Closing],
        Done => vec![Closing],
        Closing => vec![Closed],
    }
}

fn allowed(from: SessionState, to: SessionState) -> bool {
    allowed_transitions(from).into_iter().any(|s| s == to)
}
