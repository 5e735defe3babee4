//! Plain-text report over a parsed log

use crate::reader::ParsedLog;
use std::fmt::Write;

const CYCLE_COL: usize = 10;
const TIME_COL: usize = 25;
const PORT_COL: usize = 15;
const NOT_FOUND: &str = "not found";

/// Render every matched record followed by the per-port statistics block
#[must_use]
pub fn render_report(log: &ParsedLog) -> String {
    let width = CYCLE_COL + TIME_COL + PORT_COL * log.targets.len();
    let rule = "=".repeat(width);
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "Port status across all records ({})", log.path.display());
    let _ = writeln!(out, "{rule}");
    let _ = write!(out, "{:<CYCLE_COL$}{:<TIME_COL$}", "Cycle", "Time");
    for port in &log.targets {
        let _ = write!(out, "{:<PORT_COL$}", format!("{port} status"));
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "{rule}");

    for record in &log.records {
        let _ = write!(out, "{:<CYCLE_COL$}{:<TIME_COL$}", record.cycle, record.timestamp);
        for &port in &log.targets {
            match record.state_of(port) {
                Some(state) => {
                    let _ = write!(out, "{:<PORT_COL$}", state.as_str());
                }
                None => {
                    let _ = write!(out, "{NOT_FOUND:<PORT_COL$}");
                }
            }
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Total {} records", log.records.len());
    let _ = writeln!(out);
    let _ = writeln!(out, "Port statistics:");
    for stats in log.stats.iter() {
        let _ = writeln!(
            out,
            "  {:<8} up: {:<5} down: {:<5} not found: {:<5} normal rate: {:.1}%",
            stats.port.to_string(),
            stats.up,
            stats.down,
            stats.not_found,
            stats.normal_rate(),
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::Port;
    use crate::reader::CycleLogReader;
    use crate::stats::StatsTable;
    use std::path::PathBuf;

    #[test]
    fn report_lists_records_and_stats() {
        let targets = vec![Port::new(0, 24), Port::new(0, 25)];
        let text = "Cycle: 1\nTime: 2024-05-01 10:00:00\nDev/Port: 0/24\nLink:     Up \n\n";
        let records = CycleLogReader::new(targets.clone()).parse_str(text);
        let stats = StatsTable::from_records(&records, &targets);
        let log = ParsedLog {
            path: PathBuf::from("test.log"),
            targets,
            records,
            stats,
        };

        let report = render_report(&log);
        let row = report
            .lines()
            .find(|l| l.starts_with('1'))
            .expect("record row");
        assert!(row.contains("2024-05-01 10:00:00"));
        assert!(row.contains("Up"));
        assert!(row.contains(NOT_FOUND));
        assert!(report.contains("Total 1 records"));
        assert!(report.contains("normal rate: 100.0%"));
        assert!(report.contains("normal rate: 0.0%"));
    }
}
