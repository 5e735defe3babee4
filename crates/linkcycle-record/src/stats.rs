//! Per-port aggregation over a read pass

use crate::port::{LinkState, Port};
use crate::record::CycleRecord;

/// Up/down/not-found counts of one target port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortStats {
    pub port: Port,
    pub up: usize,
    pub down: usize,
    pub not_found: usize,
}

impl PortStats {
    #[inline]
    #[must_use]
    pub fn new(port: Port) -> Self {
        Self {
            port,
            up: 0,
            down: 0,
            not_found: 0,
        }
    }

    /// Records seen, whether or not they listed the port
    #[inline]
    #[must_use]
    pub fn total(&self) -> usize {
        self.up + self.down + self.not_found
    }

    /// `up / total` as a percentage; 0 when nothing was seen
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn normal_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.up as f64 / total as f64 * 100.0,
        }
    }

    fn observe(&mut self, state: Option<LinkState>) {
        match state {
            Some(LinkState::Up) => self.up += 1,
            Some(LinkState::Down) => self.down += 1,
            None => self.not_found += 1,
        }
    }
}

/// Stats for every target port, in target order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsTable {
    entries: Vec<PortStats>,
}

impl StatsTable {
    /// Aggregate `records` for each port in `targets`
    #[must_use]
    pub fn from_records(records: &[CycleRecord], targets: &[Port]) -> Self {
        let entries = targets
            .iter()
            .map(|&port| {
                records.iter().fold(PortStats::new(port), |mut stats, record| {
                    stats.observe(record.state_of(port));
                    stats
                })
            })
            .collect();
        Self { entries }
    }

    #[must_use]
    pub fn get(&self, port: Port) -> Option<&PortStats> {
        self.entries.iter().find(|s| s.port == port)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PortStats> {
        self.entries.iter()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::PortStatus;

    fn rec(cycle: u32, pairs: &[(Port, LinkState)]) -> CycleRecord {
        CycleRecord::new(
            cycle,
            "t",
            pairs.iter().map(|&p| PortStatus::from(p)).collect(),
        )
    }

    #[test]
    fn counts_up_down_and_absent() {
        let p24 = Port::new(0, 24);
        let p25 = Port::new(0, 25);
        let records = vec![
            rec(1, &[(p24, LinkState::Up)]),
            rec(2, &[(p24, LinkState::Up), (p25, LinkState::Down)]),
            rec(3, &[(p24, LinkState::Down), (p25, LinkState::Down)]),
        ];

        let table = StatsTable::from_records(&records, &[p24, p25]);

        let s24 = table.get(p24).unwrap();
        assert_eq!((s24.up, s24.down, s24.not_found), (2, 1, 0));
        assert_eq!(format!("{:.1}", s24.normal_rate()), "66.7");

        let s25 = table.get(p25).unwrap();
        assert_eq!((s25.up, s25.down, s25.not_found), (0, 2, 1));
        assert_eq!(format!("{:.1}", s25.normal_rate()), "0.0");
    }

    #[test]
    fn empty_input_has_zero_rate() {
        let table = StatsTable::from_records(&[], &[Port::new(0, 1)]);
        assert_eq!(table.len(), 1);
        assert!(table.get(Port::new(0, 1)).unwrap().normal_rate().abs() < f64::EPSILON);
    }
}
