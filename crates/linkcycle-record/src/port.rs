//! Port and link state types
//!
//! A [`Port`] is the `device/port` pair printed by the switch. Ordering is
//! numeric on `(device, index)`, so `0/3` sorts before `0/24`.

use crate::error::RecordError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Switch interface address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Port {
    /// Unit / device index
    pub device: u32,
    /// Port index within the device
    pub index: u32,
}

impl Port {
    /// Create a port address
    #[inline]
    #[must_use]
    pub const fn new(device: u32, index: u32) -> Self {
        Self { device, index }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Routed through `pad` so width/alignment flags apply to the whole token.
        f.pad(&format!("{}/{}", self.device, self.index))
    }
}

impl FromStr for Port {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RecordError::InvalidPort(s.to_string());
        let (device, index) = s.trim().split_once('/').ok_or_else(invalid)?;
        let device = device.parse().map_err(|_| invalid())?;
        let index = index.parse().map_err(|_| invalid())?;
        Ok(Self { device, index })
    }
}

impl TryFrom<String> for Port {
    type Error = RecordError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Port> for String {
    fn from(port: Port) -> Self {
        port.to_string()
    }
}

/// Link status of one interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkState {
    Up,
    Down,
}

impl LinkState {
    /// Canonical spelling as printed by the switch
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            LinkState::Up => "Up",
            LinkState::Down => "Down",
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_up(&self) -> bool {
        matches!(self, LinkState::Up)
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for LinkState {
    type Err = RecordError;

    /// Case-insensitive: `up`, `UP` and `Up` are all accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        if token.eq_ignore_ascii_case("up") {
            Ok(LinkState::Up)
        } else if token.eq_ignore_ascii_case("down") {
            Ok(LinkState::Down)
        } else {
            Err(RecordError::InvalidLinkState(token.to_string()))
        }
    }
}

/// One `(port, state)` pair of a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortStatus {
    pub port: Port,
    pub state: LinkState,
}

impl PortStatus {
    #[inline]
    #[must_use]
    pub const fn new(port: Port, state: LinkState) -> Self {
        Self { port, state }
    }
}

impl From<(Port, LinkState)> for PortStatus {
    fn from((port, state): (Port, LinkState)) -> Self {
        Self { port, state }
    }
}
