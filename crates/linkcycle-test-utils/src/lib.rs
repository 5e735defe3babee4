//! Testing utilities for the linkcycle workspace
//!
//! Scripted stand-ins for the two outside-world seams (management tool and
//! serial console) plus canned switch output.

#![allow(missing_docs)]

pub mod fake_session;
pub mod fixtures;
pub mod scripted_runner;

pub use fake_session::{FakeExit, FakeProbe, FakeSession, FakeStep};
pub use scripted_runner::ScriptedRunner;
