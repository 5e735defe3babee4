//! Append-only cycle log writer
//!
//! Single writer per file; each append opens the file in append mode so a
//! crash between cycles never truncates earlier records.

use crate::error::WriteError;
use crate::record::CycleRecord;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writer for the record log
#[derive(Debug, Clone)]
pub struct CycleLogWriter {
    path: PathBuf,
}

impl CycleLogWriter {
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record group
    ///
    /// # Errors
    /// - `WriteError::EmptyRecord` if the record lists no ports
    /// - `WriteError::Io` if the file cannot be opened or written
    pub fn append(&self, record: &CycleRecord) -> Result<(), WriteError> {
        if record.is_empty() {
            return Err(WriteError::EmptyRecord(record.cycle));
        }

        let io_err = |source| WriteError::Io {
            path: self.path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;
        file.write_all(record.to_log_text().as_bytes())
            .map_err(io_err)?;
        file.flush().map_err(io_err)?;

        tracing::info!(
            cycle = record.cycle,
            ports = record.ports().len(),
            path = %self.path.display(),
            "cycle record appended"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{LinkState, Port, PortStatus};

    #[test]
    fn appends_without_truncating() {
        let dir = tempfile::tempdir().unwrap();
        let writer = CycleLogWriter::new(dir.path().join("test.log"));
        let ports = vec![PortStatus::new(Port::new(0, 1), LinkState::Up)];

        writer.append(&CycleRecord::new(1, "t1", ports.clone())).unwrap();
        writer.append(&CycleRecord::new(2, "t2", ports)).unwrap();

        let text = std::fs::read_to_string(writer.path()).unwrap();
        assert_eq!(text.matches("Cycle: ").count(), 2);
        assert!(text.starts_with("Cycle: 1\n"));
        assert!(text.ends_with("\n\n"));
    }

    #[test]
    fn empty_record_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let writer = CycleLogWriter::new(dir.path().join("test.log"));
        let err = writer.append(&CycleRecord::new(4, "t", Vec::new())).unwrap_err();
        assert!(matches!(err, WriteError::EmptyRecord(4)));
        assert!(!writer.path().exists());
    }
}
