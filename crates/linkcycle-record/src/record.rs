//! Cycle record and its persisted text form
//!
//! One record is four tagged lines and a blank line:
//!
//! ```text
//! Cycle: 3
//! Time: 2024-05-01 10:15:42
//! Dev/Port: 0/3  0/24 0/25
//! Link:     Down Up  Up
//! ```
//!
//! Ports are left-aligned to the widest port token, states to width 3, and
//! tokens are joined with single spaces. Position `i` of the ports line
//! belongs to position `i` of the states line.

use crate::port::{LinkState, Port, PortStatus};

/// `strftime` layout of the time line
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) const CYCLE_LABEL: &str = "Cycle:";
pub(crate) const TIME_LABEL: &str = "Time:";
pub(crate) const PORTS_LABEL: &str = "Dev/Port:";
pub(crate) const STATES_LABEL: &str = "Link:";

/// Labels written by the earlier tooling; still accepted by the reader
pub(crate) const LEGACY_CYCLE_LABEL: &str = "循环次数:";
pub(crate) const LEGACY_TIME_LABEL: &str = "执行时间:";

const STATE_WIDTH: usize = 3;

/// Result of one power-cycle iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleRecord {
    /// Cycle number as counted by the writer (not unique across runs)
    pub cycle: u32,
    /// Local time the record was taken, [`TIMESTAMP_FORMAT`]
    pub timestamp: String,
    /// Ports sorted by `(device, index)`
    ports: Vec<PortStatus>,
}

impl CycleRecord {
    /// Build a record; ports are sorted on the way in
    #[must_use]
    pub fn new(cycle: u32, timestamp: impl Into<String>, mut ports: Vec<PortStatus>) -> Self {
        ports.sort_by_key(|p| p.port);
        Self {
            cycle,
            timestamp: timestamp.into(),
            ports,
        }
    }

    /// Build a record stamped with the current local time
    #[must_use]
    pub fn now(cycle: u32, ports: Vec<PortStatus>) -> Self {
        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
        Self::new(cycle, timestamp, ports)
    }

    #[inline]
    #[must_use]
    pub fn ports(&self) -> &[PortStatus] {
        &self.ports
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// State of `port`, or `None` when the record does not list it
    #[must_use]
    pub fn state_of(&self, port: Port) -> Option<LinkState> {
        self.ports
            .binary_search_by_key(&port, |p| p.port)
            .ok()
            .map(|i| self.ports[i].state)
    }

    /// Copy keeping only the ports in `targets`
    #[must_use]
    pub fn restricted_to(&self, targets: &[Port]) -> Self {
        Self {
            cycle: self.cycle,
            timestamp: self.timestamp.clone(),
            ports: self
                .ports
                .iter()
                .filter(|p| targets.contains(&p.port))
                .copied()
                .collect(),
        }
    }

    /// Column-aligned ports and states lines
    #[must_use]
    pub fn format(&self) -> FormattedRecord {
        let width = self
            .ports
            .iter()
            .map(|p| p.port.to_string().len())
            .max()
            .unwrap_or(0);

        let ports_line = self
            .ports
            .iter()
            .map(|p| format!("{:<width$}", p.port))
            .collect::<Vec<_>>()
            .join(" ");
        let states_line = self
            .ports
            .iter()
            .map(|p| format!("{:<width$}", p.state, width = STATE_WIDTH))
            .collect::<Vec<_>>()
            .join(" ");

        FormattedRecord {
            ports_line,
            states_line,
        }
    }

    /// Full persisted group, blank terminator line included
    #[must_use]
    pub fn to_log_text(&self) -> String {
        let FormattedRecord {
            ports_line,
            states_line,
        } = self.format();
        format!(
            "{} {}\n{} {}\n{} {ports_line}\n{:<width$} {states_line}\n\n",
            CYCLE_LABEL,
            self.cycle,
            TIME_LABEL,
            self.timestamp,
            PORTS_LABEL,
            STATES_LABEL,
            width = PORTS_LABEL.len(),
        )
    }
}

/// Ports and states lines of one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedRecord {
    pub ports_line: String,
    pub states_line: String,
}
