//! Power-cycle link reliability test
//!
//! Repeatedly power-cycles a set of nodes, captures the switch's per-port
//! link state over its serial console after each boot and appends one record
//! per cycle to a plain-text log. The same log later feeds the report.
//!
//! The building blocks live in their own crates:
//!
//! - `linkcycle-power`: management-tool commands, retry policy, power controller
//! - `linkcycle-console`: console session seam and the serial state machine
//! - `linkcycle-record`: extraction, record log writer/reader, statistics
//!
//! This crate wires them together: [`AppConfig`], [`Orchestrator`], logging
//! setup and the cancellable boot wait.

#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod progress;

pub use config::AppConfig;
pub use error::{ConfigError, LoggingError, RunError};
pub use orchestrator::{CycleOutcome, Orchestrator, ProcessSessionFactory, RunSummary, SessionFactory};
pub use progress::{pause, wait_with_progress, Interrupted};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
