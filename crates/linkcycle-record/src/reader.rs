//! Cycle log reader
//!
//! Line-based scanner over the four-line grammar written by
//! [`crate::CycleLogWriter`]. A group is accepted when its cycle, time, ports
//! and states lines are consecutive; the trailing blank line is optional and
//! `\r\n` endings are tolerated. A line that breaks a group is re-examined as
//! the start of the next one, so a torn write only costs that one record.

use crate::error::ReadError;
use crate::port::{LinkState, Port, PortStatus};
use crate::record::{
    CycleRecord, CYCLE_LABEL, LEGACY_CYCLE_LABEL, LEGACY_TIME_LABEL, PORTS_LABEL, STATES_LABEL,
    TIME_LABEL,
};
use crate::stats::StatsTable;
use std::path::{Path, PathBuf};

/// Records and statistics of one read pass
#[derive(Debug, Clone)]
pub struct ParsedLog {
    /// Source file
    pub path: PathBuf,
    /// Ports the pass was restricted to, in caller order
    pub targets: Vec<Port>,
    /// Matched groups in file order, each restricted to `targets`
    pub records: Vec<CycleRecord>,
    /// Per-target aggregation over `records`
    pub stats: StatsTable,
}

/// Reader restricted to a set of target ports
#[derive(Debug, Clone)]
pub struct CycleLogReader {
    targets: Vec<Port>,
}

impl CycleLogReader {
    #[must_use]
    pub fn new(targets: impl Into<Vec<Port>>) -> Self {
        Self {
            targets: targets.into(),
        }
    }

    #[inline]
    #[must_use]
    pub fn targets(&self) -> &[Port] {
        &self.targets
    }

    /// Parse the whole file and aggregate per-port statistics
    ///
    /// # Errors
    /// - `ReadError::NotFound` if `path` does not exist
    /// - `ReadError::NoRecords` if no group matched
    /// - `ReadError::Io` for any other read failure
    pub fn parse_all(&self, path: impl AsRef<Path>) -> Result<ParsedLog, ReadError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ReadError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|source| ReadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let records = self.parse_str(&content);
        if records.is_empty() {
            return Err(ReadError::NoRecords(path.to_path_buf()));
        }

        tracing::debug!(
            path = %path.display(),
            records = records.len(),
            "cycle log parsed"
        );

        let stats = StatsTable::from_records(&records, &self.targets);
        Ok(ParsedLog {
            path: path.to_path_buf(),
            targets: self.targets.clone(),
            records,
            stats,
        })
    }

    /// Scan log text into records restricted to the target ports
    #[must_use]
    pub fn parse_str(&self, content: &str) -> Vec<CycleRecord> {
        let mut records = Vec::new();
        let mut pending = Pending::Cycle;

        for line in content.lines() {
            let line = line.trim_end();
            pending = match pending.advance(line) {
                Step::Continue(next) => next,
                Step::Complete(group) => {
                    records.push(self.build(&group));
                    Pending::Cycle
                }
                // Broken group: the offending line may open the next one
                Step::Reset => match Pending::Cycle.advance(line) {
                    Step::Continue(next) => next,
                    Step::Complete(_) | Step::Reset => Pending::Cycle,
                },
            };
        }

        records
    }

    fn build(&self, group: &RawGroup<'_>) -> CycleRecord {
        let ports: Vec<&str> = group.ports_line.split_whitespace().collect();
        let states: Vec<&str> = group.states_line.split_whitespace().collect();
        if ports.len() != states.len() {
            tracing::warn!(
                cycle = group.cycle,
                ports = ports.len(),
                states = states.len(),
                "ports and states lines differ in length, pairing positionally"
            );
        }

        let statuses = ports
            .iter()
            .zip(states.iter())
            .filter_map(|(port, state)| {
                let port: Port = port.parse().ok()?;
                if !self.targets.contains(&port) {
                    return None;
                }
                match state.parse::<LinkState>() {
                    Ok(state) => Some(PortStatus::new(port, state)),
                    Err(e) => {
                        tracing::warn!(cycle = group.cycle, %port, error = %e, "skipping entry");
                        None
                    }
                }
            })
            .collect();

        CycleRecord::new(group.cycle, group.timestamp, statuses)
    }
}

/// Lines of one group before token parsing
struct RawGroup<'a> {
    cycle: u32,
    timestamp: &'a str,
    ports_line: &'a str,
    states_line: &'a str,
}

/// Scanner position inside the four-line grammar
enum Pending<'a> {
    Cycle,
    Time {
        cycle: u32,
    },
    Ports {
        cycle: u32,
        timestamp: &'a str,
    },
    States {
        cycle: u32,
        timestamp: &'a str,
        ports_line: &'a str,
    },
}

enum Step<'a> {
    Continue(Pending<'a>),
    Complete(RawGroup<'a>),
    Reset,
}

impl<'a> Pending<'a> {
    fn advance(self, line: &'a str) -> Step<'a> {
        match self {
            Pending::Cycle => match tagged(line, &[CYCLE_LABEL, LEGACY_CYCLE_LABEL])
                .and_then(|v| v.parse::<u32>().ok())
            {
                Some(cycle) => Step::Continue(Pending::Time { cycle }),
                None => Step::Continue(Pending::Cycle),
            },
            Pending::Time { cycle } => match tagged(line, &[TIME_LABEL, LEGACY_TIME_LABEL]) {
                Some(timestamp) => Step::Continue(Pending::Ports { cycle, timestamp }),
                None => Step::Reset,
            },
            Pending::Ports { cycle, timestamp } => match tagged(line, &[PORTS_LABEL]) {
                Some(ports_line) => Step::Continue(Pending::States {
                    cycle,
                    timestamp,
                    ports_line,
                }),
                None => Step::Reset,
            },
            Pending::States {
                cycle,
                timestamp,
                ports_line,
            } => match tagged(line, &[STATES_LABEL]) {
                Some(states_line) => Step::Complete(RawGroup {
                    cycle,
                    timestamp,
                    ports_line,
                    states_line,
                }),
                None => Step::Reset,
            },
        }
    }
}

fn tagged<'a>(line: &'a str, labels: &[&str]) -> Option<&'a str> {
    labels
        .iter()
        .find_map(|label| line.strip_prefix(label))
        .map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "Cycle: 1\n\
        Time: 2024-05-01 10:00:00\n\
        Dev/Port: 0/3  0/24 0/25\n\
        Link:     Down Up   Up \n\
        \n\
        Cycle: 2\r\n\
        Time: 2024-05-01 10:05:00\r\n\
        Dev/Port: 0/24 0/25\r\n\
        Link:     Down Up \r\n";

    fn targets() -> Vec<Port> {
        vec![Port::new(0, 24), Port::new(0, 25)]
    }

    #[test]
    fn parses_groups_with_and_without_trailing_blank() {
        let records = CycleLogReader::new(targets()).parse_str(LOG);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].cycle, 1);
        assert_eq!(records[0].timestamp, "2024-05-01 10:00:00");
        assert_eq!(records[1].state_of(Port::new(0, 24)), Some(LinkState::Down));
    }

    #[test]
    fn restricts_to_targets() {
        let records = CycleLogReader::new(targets()).parse_str(LOG);
        assert_eq!(records[0].ports().len(), 2);
        assert_eq!(records[0].state_of(Port::new(0, 3)), None);
    }

    #[test]
    fn broken_group_does_not_swallow_the_next() {
        let text = "Cycle: 1\nTime: t\ngarbage\nCycle: 2\nTime: t\nDev/Port: 0/24\nLink: Up\n";
        let records = CycleLogReader::new(targets()).parse_str(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].cycle, 2);
    }

    #[test]
    fn repeated_cycle_numbers_are_kept() {
        let group = "Cycle: 1\nTime: t\nDev/Port: 0/24\nLink: Up\n\n";
        let text = group.repeat(3);
        assert_eq!(CycleLogReader::new(targets()).parse_str(&text).len(), 3);
    }

    #[test]
    fn accepts_legacy_labels() {
        let text = "循环次数: 9\n执行时间: 2024-01-01 00:00:00\nDev/Port: 0/25\nLink:     Down\n\n";
        let records = CycleLogReader::new(targets()).parse_str(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].cycle, 9);
        assert_eq!(records[0].state_of(Port::new(0, 25)), Some(LinkState::Down));
    }

    #[test]
    fn missing_file_is_an_explicit_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = CycleLogReader::new(targets())
            .parse_all(dir.path().join("absent.log"))
            .unwrap_err();
        assert!(matches!(err, ReadError::NotFound(_)));
        assert!(err.is_empty_input());
    }

    #[test]
    fn file_without_groups_reports_no_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.log");
        std::fs::write(&path, "nothing to see\n").unwrap();
        let err = CycleLogReader::new(targets()).parse_all(&path).unwrap_err();
        assert!(matches!(err, ReadError::NoRecords(_)));
    }
}
