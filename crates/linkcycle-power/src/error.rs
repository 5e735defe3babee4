//! Error types for management command execution

use std::time::Duration;

/// Management command failure
///
/// Every variant counts as a transient failure: the caller retries under its
/// policy and then skips the node.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Program could not be started
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Program did not finish in time and was killed
    #[error("'{command}' timed out after {}ms", .after.as_millis())]
    Timeout { command: String, after: Duration },

    /// Program exited unsuccessfully
    #[error("'{command}' exited with {}: {stderr}", exit_label(.status))]
    Failed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
}

impl CommandError {
    /// Whether the failure came from the command itself rather than the host
    #[inline]
    #[must_use]
    pub fn is_exit_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

fn exit_label(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "signal".to_string(),
    }
}
