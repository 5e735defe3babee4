//! Error types for configuration, logging setup and runs

use crate::orchestrator::RunSummary;
use std::path::PathBuf;

/// Configuration loading or validation failure
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[source] serde_yaml::Error),

    /// Parsed but semantically unusable
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Read { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Tracing subscriber could not be installed
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("invalid log filter '{filter}': {source}")]
    Filter {
        filter: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("failed to open run log {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("tracing subscriber already installed: {0}")]
    Install(#[from] tracing_subscriber::util::TryInitError),
}

/// A run that did not complete all cycles
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// External interrupt; `summary` holds the cycles attempted so far
    #[error("run interrupted after {} cycle(s)", .summary.cycles.len())]
    Interrupted { summary: RunSummary },
}

impl RunError {
    #[must_use]
    pub fn summary(&self) -> &RunSummary {
        match self {
            Self::Interrupted { summary } => summary,
        }
    }
}
