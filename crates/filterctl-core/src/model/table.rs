// ── Filter tables and binding slots ──

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// One of the router's independent numbered filter tables.
///
/// Each table has its own number space; the same number in two tables names
/// two unrelated entries.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FilterTable {
    Ip,
    Ipv6,
    Ethernet,
}

impl FilterTable {
    /// Command keyword that prefixes every line for this table.
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Ip => "ip",
            Self::Ipv6 => "ipv6",
            Self::Ethernet => "ethernet",
        }
    }

    /// Largest filter number the router accepts in this table.
    pub const fn max_number(self) -> u32 {
        match self {
            Self::Ip | Self::Ipv6 => 2_147_483_647,
            Self::Ethernet => 512,
        }
    }

    pub const fn contains(self, number: u32) -> bool {
        number >= 1 && number <= self.max_number()
    }
}

/// Traffic direction of an interface binding.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

/// An `(interface, direction)` pair that holds one ordered filter list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BindingSlot {
    pub interface: String,
    pub direction: Direction,
}

impl BindingSlot {
    pub fn new(interface: impl Into<String>, direction: Direction) -> Self {
        Self {
            interface: interface.into(),
            direction,
        }
    }
}

impl fmt::Display for BindingSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.interface, self.direction)
    }
}

/// Parses the `interface:direction` identity used by standalone bindings.
impl FromStr for BindingSlot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (interface, direction) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("expected `interface:direction`, got `{s}`"))?;
        if interface.is_empty() {
            return Err(format!("missing interface in `{s}`"));
        }
        let direction = Direction::from_str(direction)
            .map_err(|_| format!("direction must be `in` or `out`, got `{direction}`"))?;
        Ok(Self::new(interface, direction))
    }
}
