//! Link record model for the power-cycle harness
//!
//! Turns raw switch console text into canonical per-port link records and
//! keeps them in an append-only text log:
//! - [`LinkStatusExtractor`] finds `device/port ... Up|Down` data lines
//! - [`CycleLogWriter`] appends one tagged four-line group per cycle
//! - [`CycleLogReader`] scans the log back and aggregates [`PortStats`]
//!
//! # Example
//!
//! ```rust,ignore
//! use linkcycle_record::{CycleLogWriter, CycleRecord, LinkStatusExtractor};
//!
//! let ports = LinkStatusExtractor::default().extract(&raw_output);
//! let record = CycleRecord::now(7, ports);
//! CycleLogWriter::new("/share/test.log").append(&record)?;
//! ```

#![allow(missing_docs)]

pub mod error;
pub mod extract;
pub mod port;
pub mod reader;
pub mod record;
pub mod report;
pub mod stats;
pub mod writer;

pub use error::{ReadError, RecordError, WriteError};
pub use extract::{DuplicatePolicy, LinkStatusExtractor};
pub use port::{LinkState, Port, PortStatus};
pub use reader::{CycleLogReader, ParsedLog};
pub use record::{CycleRecord, FormattedRecord, TIMESTAMP_FORMAT};
pub use report::render_report;
pub use stats::{PortStats, StatsTable};
pub use writer::CycleLogWriter;

/// Ports the reporting path looks at when none are given.
pub const DEFAULT_TARGET_PORTS: [Port; 2] = [Port::new(0, 24), Port::new(0, 25)];

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
