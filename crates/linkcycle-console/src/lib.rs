//! Interactive serial console sessions
//!
//! [`SerialSession`] drives a switch console through a [`ControllableSession`]:
//! wait for the prompt, run one query, follow pagination until the prompt
//! returns, then tear the terminal program down in escalating steps.
//! [`ProcessSession`] is the production session backed by a child process.

#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod process;
pub mod serial;
pub mod session;
pub mod state;

pub use config::{ConsoleConfig, TeardownConfig};
pub use error::SessionError;
pub use process::ProcessSession;
pub use serial::{Capture, SerialSession, Teardown};
pub use session::{find_earliest, ControllableSession, ExpectOutcome, SpawnTarget};
pub use state::{allowed_transitions, validate_transition, SessionState};
