//! Management command seam
//!
//! [`CommandRunner`] is the only way the power controller touches the outside
//! world. [`ProcessRunner`] executes the management tool directly (no shell)
//! under a timeout; tests substitute a mock or a scripted runner.

use crate::error::CommandError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::Stdio;
use std::time::Duration;

/// Node identifier as understood by the management tool
pub type NodeId = u32;

/// Program plus arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    #[must_use]
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when terminated by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Exit code 0
    #[inline]
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Executes management commands
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion and capture output
    ///
    /// A non-zero exit is reported through [`CommandOutput::status`], not as
    /// an error; errors are reserved for spawn failures and timeouts.
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError>;
}

/// Runs the command as a child process
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    #[inline]
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
        tracing::debug!(command = %invocation, "executing management command");

        let child = tokio::process::Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CommandError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;

        // Dropping the output future on timeout kills the child.
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| CommandError::Timeout {
                command: invocation.to_string(),
                after: self.timeout,
            })?
            .map_err(|source| CommandError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Management tool operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    Get,
    Off,
    On,
}

impl PowerAction {
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            PowerAction::Get => "get",
            PowerAction::Off => "off",
            PowerAction::On => "on",
        }
    }
}

impl fmt::Display for PowerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Command line shape of the management tool: `<program> <prefix..> <action> -n <id>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagementTool {
    pub program: String,
    pub prefix: Vec<String>,
}

impl ManagementTool {
    #[must_use]
    pub fn invocation(&self, action: PowerAction, node: NodeId) -> Invocation {
        let args = self
            .prefix
            .iter()
            .cloned()
            .chain([action.as_str().to_string(), "-n".to_string(), node.to_string()]);
        Invocation::new(self.program.clone(), args)
    }
}

impl Default for ManagementTool {
    fn default() -> Self {
        Self {
            program: "mgmt_tool".to_string(),
            prefix: vec!["node".to_string(), "power".to_string()],
        }
    }
}
