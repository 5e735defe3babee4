//! Error types for link records and the cycle log

use std::path::PathBuf;

/// Failure to interpret a single token of record text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// Port token is not `<device>/<port>`
    #[error("invalid port '{0}': expected <device>/<port>")]
    InvalidPort(String),

    /// State token is neither Up nor Down
    #[error("invalid link state '{0}'")]
    InvalidLinkState(String),
}

/// Failure appending to the cycle log
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// Nothing to persist
    #[error("record for cycle {0} has no ports")]
    EmptyRecord(u32),

    /// Underlying file error
    #[error("cannot append to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure parsing the cycle log
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    /// Log path does not exist
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// File exists but holds no record groups
    #[error("no records found in {0}")]
    NoRecords(PathBuf),

    /// Underlying file error
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ReadError {
    /// Whether the failure is "nothing to report" rather than a broken file
    #[inline]
    #[must_use]
    pub fn is_empty_input(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::NoRecords(_))
    }

    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
