//! Simulated management tool
//!
//! Keeps a power state per node, answers `get` with `power on`/`power off`
//! and applies `on`/`off`. Failures can be injected per node and action.

use async_trait::async_trait;
use linkcycle_power::{CommandError, CommandOutput, CommandRunner, Invocation, NodeId, PowerAction, PowerState};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Bmc {
    states: HashMap<NodeId, PowerState>,
    failures: HashMap<(NodeId, &'static str), u32>,
    calls: Vec<Invocation>,
}

/// Scripted [`CommandRunner`]
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    bmc: Mutex<Bmc>,
}

impl ScriptedRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial state of `node` (unlisted nodes start powered on)
    #[must_use]
    pub fn with_node(self, node: NodeId, state: PowerState) -> Self {
        self.lock().states.insert(node, state);
        self
    }

    /// Make the next `times` invocations of `action` on `node` exit with status 1
    #[must_use]
    pub fn failing(self, node: NodeId, action: PowerAction, times: u32) -> Self {
        self.lock().failures.insert((node, action.as_str()), times);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Bmc> {
        self.bmc.lock().unwrap()
    }

    /// Every invocation received, in order
    pub fn calls(&self) -> Vec<Invocation> {
        self.lock().calls.clone()
    }

    /// Number of invocations of `action` on `node`
    pub fn count(&self, action: PowerAction, node: NodeId) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|inv| parse(inv) == Some((action.as_str().to_string(), node)))
            .count()
    }

    pub fn state(&self, node: NodeId) -> PowerState {
        self.lock().states.get(&node).copied().unwrap_or(PowerState::On)
    }
}

/// `(action, node)` from `... <action> -n <id>`
fn parse(inv: &Invocation) -> Option<(String, NodeId)> {
    match inv.args.as_slice() {
        [.., action, flag, id] if flag == "-n" => Some((action.clone(), id.parse().ok()?)),
        _ => None,
    }
}

fn exit(status: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> CommandOutput {
    CommandOutput {
        status: Some(status),
        stdout: stdout.into(),
        stderr: stderr.into(),
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
        let mut bmc = self.lock();
        bmc.calls.push(invocation.clone());

        let Some((action, node)) = parse(invocation) else {
            return Ok(exit(2, "", "usage: node power <get|on|off> -n <id>"));
        };

        let key = [PowerAction::Get, PowerAction::On, PowerAction::Off]
            .into_iter()
            .map(|a| a.as_str())
            .find(|a| *a == action);
        if let Some(remaining) = key.and_then(|a| bmc.failures.get_mut(&(node, a))) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(exit(1, "", "bmc busy"));
            }
        }

        let current = bmc.states.get(&node).copied().unwrap_or(PowerState::On);
        match action.as_str() {
            "get" => Ok(exit(0, format!("node {node}: {}", probe_text(current)), "")),
            "on" => {
                bmc.states.insert(node, PowerState::On);
                Ok(exit(0, "", ""))
            }
            "off" => {
                bmc.states.insert(node, PowerState::Off);
                Ok(exit(0, "", ""))
            }
            other => Ok(exit(2, "", format!("unknown action {other}"))),
        }
    }
}

fn probe_text(state: PowerState) -> &'static str {
    match state {
        PowerState::On => "power on",
        PowerState::Off => "power off",
        PowerState::Unknown => "power state unavailable",
    }
}
