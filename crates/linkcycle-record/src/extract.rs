//! Link status extraction from raw console text
//!
//! A data line starts with `<int>/<int>`, has at least one further token, and
//! then a whole-word `Up` or `Down`:
//!
//! ```text
//! 0/24     Eth   Up    1G Full  ...
//! ```
//!
//! Header, separator and prompt lines never match. Output is sorted by
//! `(device, port)`; duplicate ports are resolved by [`DuplicatePolicy`].

use crate::port::{LinkState, Port, PortStatus};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::OnceLock;

const DATA_LINE: &str = r"^(\d+)/(\d+)\s+(?:\S+\s+)+?(Up|Down)\b";

fn data_line() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(DATA_LINE).expect("data line pattern is valid"))
}

/// Which entry survives when one capture lists a port twice
///
/// A page boundary can make the switch reprint a line; both copies normally
/// carry the same state, but when they differ the policy decides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep the first occurrence in encounter order
    #[default]
    FirstWins,
    /// Keep the last occurrence in encounter order
    LastWins,
}

/// Parser from terminal text to canonical `(port, state)` pairs
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkStatusExtractor {
    policy: DuplicatePolicy,
}

impl LinkStatusExtractor {
    #[inline]
    #[must_use]
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self { policy }
    }

    #[inline]
    #[must_use]
    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Data lines in encounter order, duplicates included
    #[must_use]
    pub fn scan(&self, text: &str) -> Vec<PortStatus> {
        text.lines()
            .filter_map(|line| parse_data_line(line.trim()))
            .collect()
    }

    /// Sorted, de-duplicated pairs ready for a [`crate::CycleRecord`]
    #[must_use]
    pub fn extract(&self, text: &str) -> Vec<PortStatus> {
        let scanned = self.scan(text);
        let total = scanned.len();

        let mut by_port: BTreeMap<Port, LinkState> = BTreeMap::new();
        for PortStatus { port, state } in scanned {
            match (by_port.entry(port), self.policy) {
                (Entry::Vacant(slot), _) => {
                    slot.insert(state);
                }
                (Entry::Occupied(mut slot), DuplicatePolicy::LastWins) => {
                    slot.insert(state);
                }
                (Entry::Occupied(_), DuplicatePolicy::FirstWins) => {}
            }
        }

        if by_port.len() != total {
            tracing::debug!(
                scanned = total,
                kept = by_port.len(),
                policy = ?self.policy,
                "duplicate port entries resolved"
            );
        }

        by_port.into_iter().map(PortStatus::from).collect()
    }
}

fn parse_data_line(line: &str) -> Option<PortStatus> {
    let caps = data_line().captures(line)?;
    let device = caps[1].parse().ok()?;
    let index = caps[2].parse().ok()?;
    let state = if &caps[3] == "Up" { LinkState::Up } else { LinkState::Down };
    Some(PortStatus::new(Port::new(device, index), state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SAMPLE: &str = "show interfaces status all\r\n\
        Information of Eth 0\r\n\
        Dev/Port  Name     Link  Speed  Duplex\r\n\
        --------  -------  ----  -----  ------\r\n\
        0/25      Eth      Up    10G    Full\r\n\
        0/3       Eth      Down  1G     Half\r\n\
        0/24      Eth      Up    10G    Full\r\n\
        Console#";

    fn status(device: u32, index: u32, state: LinkState) -> PortStatus {
        PortStatus::new(Port::new(device, index), state)
    }

    #[test]
    fn scan_keeps_encounter_order() {
        let scanned = LinkStatusExtractor::default().scan(SAMPLE);
        assert_eq!(
            scanned,
            vec![
                status(0, 25, LinkState::Up),
                status(0, 3, LinkState::Down),
                status(0, 24, LinkState::Up),
            ]
        );
    }

    #[test]
    fn extract_sorts_by_device_then_port() {
        let ports = LinkStatusExtractor::default().extract(SAMPLE);
        let rendered: Vec<String> = ports.iter().map(|p| p.port.to_string()).collect();
        assert_eq!(rendered, ["0/3", "0/24", "0/25"]);
    }

    #[test]
    fn state_must_be_a_whole_word() {
        let text = "0/1 Eth Upstream 1G\n0/2 Eth Downlink\n0/3 Eth Down";
        let ports = LinkStatusExtractor::default().extract(text);
        assert_eq!(ports, vec![status(0, 3, LinkState::Down)]);
    }

    #[test]
    fn state_may_end_the_line() {
        let ports = LinkStatusExtractor::default().extract("  1/7  trunk-a  Up\r");
        assert_eq!(ports, vec![status(1, 7, LinkState::Up)]);
    }

    #[test]
    fn state_needs_a_token_before_it() {
        assert!(LinkStatusExtractor::default().extract("0/1 Up").is_empty());
    }

    #[test]
    fn duplicate_policy_first_wins() {
        let text = "0/5 Eth Up\n0/5 Eth Down";
        let ports = LinkStatusExtractor::new(DuplicatePolicy::FirstWins).extract(text);
        assert_eq!(ports, vec![status(0, 5, LinkState::Up)]);
    }

    #[test]
    fn duplicate_policy_last_wins() {
        let text = "0/5 Eth Up\n0/5 Eth Down";
        let ports = LinkStatusExtractor::new(DuplicatePolicy::LastWins).extract(text);
        assert_eq!(ports, vec![status(0, 5, LinkState::Down)]);
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(LinkStatusExtractor::default().extract("").is_empty());
        assert!(LinkStatusExtractor::default().extract("Console#\r\n").is_empty());
    }

    proptest! {
        #[test]
        fn prop_extract_is_sorted_and_unique(
            entries in proptest::collection::vec((0u32..4, 0u32..64, any::<bool>()), 0..40)
        ) {
            let text: String = entries
                .iter()
                .map(|(d, p, up)| format!("{d}/{p}  Eth  {}  1G\n", if *up { "Up" } else { "Down" }))
                .collect();
            let ports = LinkStatusExtractor::default().extract(&text);
            for pair in ports.windows(2) {
                prop_assert!(pair[0].port < pair[1].port);
            }
        }
    }
}
