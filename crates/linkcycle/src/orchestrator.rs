//! The multi-cycle test loop
//!
//! One cycle: power off every node, settle, power on, wait for boot, capture
//! the switch's interface table over the console, extract link states and
//! append a record. Cycles run strictly one after another and each console
//! session is fully torn down before the next cycle starts.
//!
//! Failures inside a cycle are logged and absorbed. Only cancellation ends
//! the loop early, and it still lets an open console session tear down.

use crate::config::AppConfig;
use crate::error::{ConfigError, RunError};
use crate::progress::{pause, wait_with_progress};
use linkcycle_console::{Capture, ControllableSession, ProcessSession, SerialSession};
use linkcycle_power::{CommandRunner, Node, PowerController, PowerReport, PowerTarget};
use linkcycle_record::{CycleLogWriter, CycleRecord, LinkStatusExtractor};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Source of a fresh console session per cycle
pub trait SessionFactory: Send + Sync {
    fn open(&self) -> Box<dyn ControllableSession>;
}

/// Opens [`ProcessSession`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessSessionFactory;

impl SessionFactory for ProcessSessionFactory {
    fn open(&self) -> Box<dyn ControllableSession> {
        Box::new(ProcessSession::new())
    }
}

impl<F> SessionFactory for F
where
    F: Fn() -> Box<dyn ControllableSession> + Send + Sync,
{
    fn open(&self) -> Box<dyn ControllableSession> {
        self()
    }
}

/// What happened in one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    pub cycle: u32,
    pub power_off: Option<PowerReport>,
    pub power_on: Option<PowerReport>,
    pub capture: Option<Capture>,
    /// Ports found in the capture
    pub ports_extracted: usize,
    pub record_written: bool,
    pub interrupted: bool,
}

impl CycleOutcome {
    fn new(cycle: u32) -> Self {
        Self {
            cycle,
            power_off: None,
            power_on: None,
            capture: None,
            ports_extracted: 0,
            record_written: false,
            interrupted: false,
        }
    }
}

/// Per-run results, owned by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: Vec<CycleOutcome>,
}

impl RunSummary {
    #[must_use]
    pub fn records_written(&self) -> usize {
        self.cycles.iter().filter(|c| c.record_written).count()
    }

    /// Cycles where at least one node ended in an unknown power state
    #[must_use]
    pub fn cycles_with_power_failures(&self) -> usize {
        self.cycles
            .iter()
            .filter(|c| {
                [&c.power_off, &c.power_on]
                    .into_iter()
                    .flatten()
                    .any(|r| !r.all_succeeded())
            })
            .count()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cycle(s), {} record(s) written, {} with power failures",
            self.cycles.len(),
            self.records_written(),
            self.cycles_with_power_failures()
        )
    }
}

/// Drives the whole test
pub struct Orchestrator {
    config: AppConfig,
    power: PowerController,
    sessions: Arc<dyn SessionFactory>,
    extractor: LinkStatusExtractor,
    writer: CycleLogWriter,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("power", &self.power)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Orchestrator over the real management tool and console program
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if the configuration does not validate.
    pub fn new(config: AppConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let power = PowerController::new(&config.power);
        Ok(Self::assemble(config, power, Arc::new(ProcessSessionFactory)))
    }

    /// Orchestrator over custom command and session seams
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if the configuration does not validate.
    pub fn with_parts(
        config: AppConfig,
        runner: Arc<dyn CommandRunner>,
        sessions: Arc<dyn SessionFactory>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let power = PowerController::with_runner(&config.power, runner);
        Ok(Self::assemble(config, power, sessions))
    }

    fn assemble(config: AppConfig, power: PowerController, sessions: Arc<dyn SessionFactory>) -> Self {
        Self {
            extractor: LinkStatusExtractor::new(config.duplicate_policy),
            writer: CycleLogWriter::new(config.record_log.clone()),
            config,
            power,
            sessions,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run every configured cycle
    ///
    /// # Errors
    ///
    /// [`RunError::Interrupted`] when `cancel` fires; the summary covers the
    /// cycles attempted, including the interrupted one.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<RunSummary, RunError> {
        let mut summary = RunSummary::default();
        let mut nodes: Vec<Node> = self.config.nodes.iter().copied().map(Node::new).collect();
        let first = self.config.start_cycle;
        let last = first.saturating_add(self.config.cycles - 1);

        tracing::info!(
            nodes = ?self.config.nodes,
            cycles = self.config.cycles,
            record_log = %self.writer.path().display(),
            "starting power cycle test"
        );

        for cycle in first..=last {
            if cancel.is_cancelled() {
                return Err(RunError::Interrupted { summary });
            }

            tracing::info!(cycle, last, "cycle started");
            let outcome = self.run_cycle(cycle, &mut nodes, cancel).await;
            let interrupted = outcome.interrupted;
            summary.cycles.push(outcome);

            if interrupted {
                tracing::warn!(cycle, "cycle interrupted; stopping run");
                return Err(RunError::Interrupted { summary });
            }
            tracing::info!(cycle, "cycle finished");
        }

        tracing::info!(summary = %summary, "power cycle test complete");
        Ok(summary)
    }

    async fn run_cycle(&self, cycle: u32, nodes: &mut [Node], cancel: &CancellationToken) -> CycleOutcome {
        let mut outcome = CycleOutcome::new(cycle);

        let off = self.power.set_power(nodes, PowerTarget::Off, cancel).await;
        log_batch(cycle, &off);
        let off_interrupted = off.interrupted;
        outcome.power_off = Some(off);

        if off_interrupted || pause(self.config.off_settle, cancel).await.is_err() {
            outcome.interrupted = true;
            return outcome;
        }

        let on = self.power.set_power(nodes, PowerTarget::On, cancel).await;
        log_batch(cycle, &on);
        let on_interrupted = on.interrupted;
        outcome.power_on = Some(on);
        if on_interrupted {
            outcome.interrupted = true;
            return outcome;
        }

        tracing::info!(cycle, wait_secs = self.config.boot_wait.as_secs(), "waiting for nodes to boot");
        let boot = wait_with_progress(
            self.config.boot_wait,
            &format!("cycle {cycle}: booting"),
            self.config.show_progress,
            cancel,
        )
        .await;
        if boot.is_err() {
            outcome.interrupted = true;
            return outcome;
        }

        tracing::info!(cycle, "querying switch console");
        let mut console = SerialSession::new(self.sessions.open(), self.config.console.clone());
        let capture = console.run(&self.config.console.query, cancel).await;
        outcome.interrupted = capture.interrupted;

        if !capture.interrupted && capture.reached_ready {
            self.persist(cycle, &capture, &mut outcome);
        } else if !capture.reached_ready {
            tracing::warn!(cycle, "no console output this cycle; record skipped");
        }

        outcome.capture = Some(capture);
        outcome
    }

    fn persist(&self, cycle: u32, capture: &Capture, outcome: &mut CycleOutcome) {
        let ports = self.extractor.extract(&capture.raw_output);
        outcome.ports_extracted = ports.len();
        tracing::info!(cycle, ports = ports.len(), complete = capture.reached_done, "port states extracted");

        if ports.is_empty() {
            tracing::warn!(cycle, "no port status lines in console output; record skipped");
            return;
        }

        let record = CycleRecord::now(cycle, ports);
        match self.writer.append(&record) {
            Ok(()) => outcome.record_written = true,
            Err(e) => tracing::warn!(cycle, error = %e, "failed to write cycle record"),
        }
    }
}

fn log_batch(cycle: u32, report: &PowerReport) {
    if report.interrupted {
        tracing::warn!(cycle, target = %report.target, handled = report.nodes.len(), "power batch interrupted");
    } else if report.all_succeeded() {
        tracing::info!(cycle, target = %report.target, "all nodes reached requested power state");
    } else {
        let failed: Vec<_> = report.failed().collect();
        tracing::warn!(cycle, target = %report.target, failed = ?failed, "some nodes did not change power state");
    }
}
