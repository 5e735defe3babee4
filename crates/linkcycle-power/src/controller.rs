//! Sequential power control for a batch of nodes
//!
//! Each node is probed first and only changed when it is not already in the
//! target state. Change commands run under a [`RetryPolicy`]; a node that
//! exhausts its attempts is marked [`PowerState::Unknown`] and the batch moves
//! on. Nodes are never operated on concurrently.
//!
//! Cancellation is checked between nodes and during every retry wait. A
//! management command already running finishes, bounded by its own timeout.

use crate::command::{CommandOutput, CommandRunner, Invocation, ManagementTool, NodeId, PowerAction, ProcessRunner};
use crate::config::PowerConfig;
use crate::error::CommandError;
use crate::retry::RetryPolicy;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Last known power state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerState {
    On,
    Off,
    #[default]
    Unknown,
}

impl PowerState {
    /// Interpret the output of the `get` command
    #[must_use]
    pub fn from_probe(stdout: &str) -> Self {
        if stdout.contains("power off") {
            PowerState::Off
        } else if stdout.contains("power on") {
            PowerState::On
        } else {
            PowerState::Unknown
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PowerState::On => "on",
            PowerState::Off => "off",
            PowerState::Unknown => "unknown",
        })
    }
}

/// Requested power state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerTarget {
    On,
    Off,
}

impl PowerTarget {
    #[inline]
    #[must_use]
    pub const fn action(self) -> PowerAction {
        match self {
            PowerTarget::On => PowerAction::On,
            PowerTarget::Off => PowerAction::Off,
        }
    }

    #[inline]
    #[must_use]
    pub const fn state(self) -> PowerState {
        match self {
            PowerTarget::On => PowerState::On,
            PowerTarget::Off => PowerState::Off,
        }
    }
}

impl fmt::Display for PowerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.state().fmt(f)
    }
}

/// A managed node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub state: PowerState,
}

impl Node {
    #[inline]
    #[must_use]
    pub const fn new(id: NodeId) -> Self {
        Self {
            id,
            state: PowerState::Unknown,
        }
    }
}

/// What happened to one node during a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOutcome {
    /// Probe showed the target state; no change command issued
    AlreadyInState,
    Changed { attempts: u32 },
    Failed { attempts: u32 },
    /// Cancelled after `attempts` change commands; state left unknown
    Interrupted { attempts: u32 },
}

impl NodeOutcome {
    #[inline]
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, NodeOutcome::Failed { .. })
    }
}

/// Per-node outcomes of one `set_power` call, in batch order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerReport {
    pub target: PowerTarget,
    /// Nodes handled before the batch ended; shorter than the batch when interrupted
    pub nodes: Vec<(NodeId, NodeOutcome)>,
    pub interrupted: bool,
}

impl PowerReport {
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        !self.nodes.iter().any(|(_, outcome)| outcome.is_failure())
    }

    /// Nodes left in an unknown state
    pub fn failed(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .filter(|(_, outcome)| outcome.is_failure())
            .map(|(id, _)| *id)
    }
}

/// Drives the management tool for a batch of nodes
pub struct PowerController {
    tool: ManagementTool,
    runner: Arc<dyn CommandRunner>,
    on_policy: RetryPolicy,
    off_policy: RetryPolicy,
}

impl fmt::Debug for PowerController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PowerController")
            .field("tool", &self.tool)
            .field("on_policy", &self.on_policy)
            .field("off_policy", &self.off_policy)
            .finish_non_exhaustive()
    }
}

impl PowerController {
    /// Controller that runs the management tool as a child process
    #[must_use]
    pub fn new(config: &PowerConfig) -> Self {
        Self::with_runner(config, Arc::new(ProcessRunner::new(config.command_timeout)))
    }

    /// Controller over a custom runner
    #[must_use]
    pub fn with_runner(config: &PowerConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            tool: config.tool.clone(),
            runner,
            on_policy: config.retry.on_policy(),
            off_policy: config.retry.off_policy(),
        }
    }

    /// Bring every node to `target`, one node at a time
    ///
    /// Never fails as a whole; per-node results are in the returned report and
    /// in each node's updated `state`. When `cancel` fires the batch stops
    /// and the partial report is marked `interrupted`.
    pub async fn set_power(
        &self,
        nodes: &mut [Node],
        target: PowerTarget,
        cancel: &CancellationToken,
    ) -> PowerReport {
        let mut report = PowerReport {
            target,
            nodes: Vec::with_capacity(nodes.len()),
            interrupted: false,
        };

        for node in nodes.iter_mut() {
            if cancel.is_cancelled() {
                report.interrupted = true;
                break;
            }
            let outcome = self.set_node(node, target, cancel).await;
            report.nodes.push((node.id, outcome));
            if matches!(outcome, NodeOutcome::Interrupted { .. }) {
                report.interrupted = true;
                break;
            }
        }

        if report.interrupted {
            tracing::info!(target = %target, handled = report.nodes.len(), "power batch cancelled");
        }
        report
    }

    async fn set_node(&self, node: &mut Node, target: PowerTarget, cancel: &CancellationToken) -> NodeOutcome {
        match self.probe(node.id).await {
            Ok(state) => {
                node.state = state;
                if state == target.state() {
                    tracing::info!(node = node.id, state = %state, "node already in requested state");
                    return NodeOutcome::AlreadyInState;
                }
                tracing::info!(node = node.id, current = %state, target = %target, "changing node power");
            }
            Err(e) => {
                node.state = PowerState::Unknown;
                tracing::warn!(node = node.id, error = %e, "power probe failed; issuing change anyway");
            }
        }

        if cancel.is_cancelled() {
            return NodeOutcome::Interrupted { attempts: 0 };
        }

        let invocation = self.tool.invocation(target.action(), node.id);
        let label = format!("power {target} node {}", node.id);
        let runner = self.runner.as_ref();
        let inv = &invocation;

        let outcome = match target {
            PowerTarget::On => {
                self.on_policy
                    .attempt(&label, move |_| async move { issue(runner, inv).await.map(drop) }, cancel)
                    .await
            }
            // The corrective step reissues the same off command.
            PowerTarget::Off => {
                self.off_policy
                    .attempt_with(
                        &label,
                        move |_| async move { issue(runner, inv).await.map(drop) },
                        move || async move {
                            if let Err(e) = issue(runner, inv).await {
                                tracing::debug!(command = %inv, error = %e, "corrective command failed");
                            }
                        },
                        cancel,
                    )
                    .await
            }
        };

        if outcome.interrupted {
            node.state = PowerState::Unknown;
            NodeOutcome::Interrupted {
                attempts: outcome.attempts,
            }
        } else if outcome.succeeded {
            node.state = target.state();
            NodeOutcome::Changed {
                attempts: outcome.attempts,
            }
        } else {
            node.state = PowerState::Unknown;
            tracing::warn!(
                node = node.id,
                target = %target,
                attempts = outcome.attempts,
                "giving up on node; continuing with the batch"
            );
            NodeOutcome::Failed {
                attempts: outcome.attempts,
            }
        }
    }

    async fn probe(&self, node: NodeId) -> Result<PowerState, CommandError> {
        let invocation = self.tool.invocation(PowerAction::Get, node);
        let output = issue(self.runner.as_ref(), &invocation).await?;
        Ok(PowerState::from_probe(&output.stdout))
    }
}

/// Run once, mapping a non-zero exit to [`CommandError::Failed`]
async fn issue(runner: &dyn CommandRunner, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
    let output = runner.run(invocation).await?;
    if output.success() {
        Ok(output)
    } else {
        Err(CommandError::Failed {
            command: invocation.to_string(),
            status: output.status,
            stderr: output.stderr.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::MockCommandRunner;

    fn is(inv: &Invocation, action: &str, node: NodeId) -> bool {
        inv.args.ends_with(&[action.to_string(), "-n".to_string(), node.to_string()])
    }

    fn ok(stdout: &str) -> Result<CommandOutput, CommandError> {
        Ok(CommandOutput {
            status: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        })
    }

    fn exit_1() -> Result<CommandOutput, CommandError> {
        Ok(CommandOutput {
            status: Some(1),
            stdout: String::new(),
            stderr: "bmc busy".to_string(),
        })
    }

    fn controller(mock: MockCommandRunner) -> PowerController {
        PowerController::with_runner(&PowerConfig::default(), Arc::new(mock))
    }

    #[test]
    fn probe_text_maps_to_state() {
        assert_eq!(PowerState::from_probe("Chassis power off\n"), PowerState::Off);
        assert_eq!(PowerState::from_probe("node 3: power on"), PowerState::On);
        assert_eq!(PowerState::from_probe("error"), PowerState::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn node_already_off_gets_no_change_command() {
        let mut mock = MockCommandRunner::new();
        mock.expect_run()
            .withf(|inv| is(inv, "get", 3))
            .times(1)
            .returning(|_| ok("power off"));
        mock.expect_run().withf(|inv| is(inv, "off", 3)).times(0);

        let mut nodes = [Node::new(3)];
        let report = controller(mock)
            .set_power(&mut nodes, PowerTarget::Off, &CancellationToken::new())
            .await;

        assert_eq!(report.nodes, vec![(3, NodeOutcome::AlreadyInState)]);
        assert_eq!(nodes[0].state, PowerState::Off);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_node_stops_after_three_attempts_and_batch_continues() {
        let mut mock = MockCommandRunner::new();
        mock.expect_run()
            .withf(|inv| is(inv, "get", 3))
            .times(1)
            .returning(|_| exit_1());
        // Three attempts plus the corrective reissue after attempt 2.
        mock.expect_run()
            .withf(|inv| is(inv, "off", 3))
            .times(4)
            .returning(|_| exit_1());
        mock.expect_run()
            .withf(|inv| is(inv, "get", 6))
            .times(1)
            .returning(|_| ok("power on"));
        mock.expect_run()
            .withf(|inv| is(inv, "off", 6))
            .times(1)
            .returning(|_| ok(""));

        let mut nodes = [Node::new(3), Node::new(6)];
        let report = controller(mock)
            .set_power(&mut nodes, PowerTarget::Off, &CancellationToken::new())
            .await;

        assert_eq!(
            report.nodes,
            vec![
                (3, NodeOutcome::Failed { attempts: 3 }),
                (6, NodeOutcome::Changed { attempts: 1 }),
            ]
        );
        assert_eq!(report.failed().collect::<Vec<_>>(), vec![3]);
        assert_eq!(nodes[0].state, PowerState::Unknown);
        assert_eq!(nodes[1].state, PowerState::Off);
    }

    #[tokio::test(start_paused = true)]
    async fn power_on_retries_without_corrective() {
        let mut mock = MockCommandRunner::new();
        mock.expect_run()
            .withf(|inv| is(inv, "get", 9))
            .returning(|_| ok("power off"));
        mock.expect_run()
            .withf(|inv| is(inv, "on", 9))
            .times(3)
            .returning(|_| {
                Err(CommandError::Timeout {
                    command: "mgmt_tool node power on -n 9".to_string(),
                    after: std::time::Duration::from_secs(30),
                })
            });

        let started = tokio::time::Instant::now();
        let mut nodes = [Node::new(9)];
        let report = controller(mock)
            .set_power(&mut nodes, PowerTarget::On, &CancellationToken::new())
            .await;

        assert!(!report.all_succeeded());
        // Two 3s backoffs, no corrective delay.
        assert_eq!(started.elapsed().as_secs(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_batch_issues_no_commands() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut nodes = [Node::new(3), Node::new(6)];
        let report = controller(MockCommandRunner::new())
            .set_power(&mut nodes, PowerTarget::Off, &cancel)
            .await;

        assert!(report.interrupted);
        assert!(report.nodes.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_backoff_stops_the_batch() {
        let mut mock = MockCommandRunner::new();
        mock.expect_run()
            .withf(|inv| is(inv, "get", 3))
            .times(1)
            .returning(|_| exit_1());
        mock.expect_run()
            .withf(|inv| is(inv, "off", 3))
            .times(1)
            .returning(|_| exit_1());

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let started = tokio::time::Instant::now();
        let mut nodes = [Node::new(3), Node::new(6)];
        let report = controller(mock).set_power(&mut nodes, PowerTarget::Off, &cancel).await;

        assert!(report.interrupted);
        assert_eq!(report.nodes, vec![(3, NodeOutcome::Interrupted { attempts: 1 })]);
        assert_eq!(nodes[0].state, PowerState::Unknown);
        assert_eq!(nodes[1].state, PowerState::Unknown);
        assert_eq!(started.elapsed().as_secs(), 1);
    }
}
