//! Node power control
//!
//! Probe-before-act power changes through an external management tool, with
//! bounded retry and per-node failure isolation.
//!
//! ```no_run
//! use linkcycle_power::{Node, PowerConfig, PowerController, PowerTarget};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! let controller = PowerController::new(&PowerConfig::default());
//! let mut nodes = vec![Node::new(3), Node::new(6)];
//! let report = controller
//!     .set_power(&mut nodes, PowerTarget::Off, &CancellationToken::new())
//!     .await;
//! if !report.all_succeeded() {
//!     eprintln!("unreachable nodes: {:?}", report.failed().collect::<Vec<_>>());
//! }
//! # }
//! ```

#![allow(missing_docs)]

pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod retry;

pub use command::{CommandOutput, CommandRunner, Invocation, ManagementTool, NodeId, PowerAction, ProcessRunner};
pub use config::{PowerConfig, RetryConfig};
pub use controller::{Node, NodeOutcome, PowerController, PowerReport, PowerState, PowerTarget};
pub use error::CommandError;
pub use retry::{CorrectiveStep, RetryOutcome, RetryPolicy};
