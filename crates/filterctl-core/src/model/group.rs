// ── Groups, entries, and bindings ──

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::table::{BindingSlot, Direction, FilterTable};
use crate::identity::GroupId;

/// Default step between automatically assigned numbers.
pub const DEFAULT_SEQUENCE_STEP: u32 = 10;

/// One declared rule of a group.
///
/// `sequence` is the manual-mode number and is ignored in auto mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry<P> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u32>,
    #[serde(flatten)]
    pub rule: P,
}

impl<P> Entry<P> {
    pub fn new(rule: P) -> Self {
        Self {
            sequence: None,
            rule,
        }
    }

    pub fn numbered(sequence: u32, rule: P) -> Self {
        Self {
            sequence: Some(sequence),
            rule,
        }
    }
}

/// How a group's entries receive their device numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SequencingMode {
    /// `start + index * step`.
    Auto { start: u32, step: u32 },
    /// Each entry carries its own number.
    Manual,
}

impl SequencingMode {
    pub const fn is_auto(&self) -> bool {
        matches!(self, Self::Auto { .. })
    }

    /// Whether `other` is the same variant, ignoring auto parameters.
    pub const fn same_variant(&self, other: &Self) -> bool {
        self.is_auto() == other.is_auto()
    }
}

impl fmt::Display for SequencingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto { start, step } => write!(f, "auto (start {start}, step {step})"),
            Self::Manual => f.write_str("manual"),
        }
    }
}

/// Sequencing fields as written by the operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredSequencing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_start: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_step: Option<u32>,
}

/// Binds an ordered filter list to an interface direction.
///
/// Without `filter_ids` the binding follows every number of its owning
/// group, in entry order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyBinding {
    pub interface: String,
    pub direction: Direction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_ids: Option<Vec<u32>>,
}

impl ApplyBinding {
    pub fn new(interface: impl Into<String>, direction: Direction) -> Self {
        Self {
            interface: interface.into(),
            direction,
            filter_ids: None,
        }
    }

    pub fn with_filter_ids(mut self, ids: Vec<u32>) -> Self {
        self.filter_ids = Some(ids);
        self
    }

    pub fn slot(&self) -> BindingSlot {
        BindingSlot::new(self.interface.clone(), self.direction)
    }
}

/// A top-level binding that is not owned by any group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandaloneBinding {
    pub table: FilterTable,
    pub interface: String,
    pub direction: Direction,
    pub filter_ids: Vec<u32>,
}

impl StandaloneBinding {
    pub fn slot(&self) -> BindingSlot {
        BindingSlot::new(self.interface.clone(), self.direction)
    }

    /// Identity used to key stored standalone bindings: `table/interface:direction`.
    pub fn id(&self) -> String {
        format!("{}/{}", self.table, self.slot())
    }

    pub fn as_binding(&self) -> ApplyBinding {
        ApplyBinding::new(self.interface.clone(), self.direction)
            .with_filter_ids(self.filter_ids.clone())
    }
}

/// A rule as it exists on the device, under its realized number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealizedEntry<P> {
    pub number: u32,
    #[serde(flatten)]
    pub rule: P,
}

/// Declared input for one named group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDecl<P> {
    pub name: String,
    pub table: FilterTable,
    pub mode: SequencingMode,
    pub entries: Vec<Entry<P>>,
    pub bindings: Vec<ApplyBinding>,
}

impl<P> GroupDecl<P> {
    pub fn id(&self) -> GroupId {
        GroupId::new(self.table, self.name.clone())
    }
}

/// Observable state of a group after a lifecycle operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupState<P> {
    pub name: String,
    pub table: FilterTable,
    pub mode: SequencingMode,
    pub entries: Vec<RealizedEntry<P>>,
    #[serde(default)]
    pub bindings: Vec<ApplyBinding>,
}

impl<P> GroupState<P> {
    pub fn id(&self) -> GroupId {
        GroupId::new(self.table, self.name.clone())
    }

    /// Realized numbers in entry order.
    pub fn numbers(&self) -> Vec<u32> {
        self.entries.iter().map(|e| e.number).collect()
    }

    pub fn number_set(&self) -> BTreeSet<u32> {
        self.entries.iter().map(|e| e.number).collect()
    }
}

impl<P: Clone> GroupState<P> {
    /// Convert back into a declaration that reproduces this state.
    pub fn to_decl(&self) -> GroupDecl<P> {
        let entries = self
            .entries
            .iter()
            .map(|e| match self.mode {
                SequencingMode::Auto { .. } => Entry::new(e.rule.clone()),
                SequencingMode::Manual => Entry::numbered(e.number, e.rule.clone()),
            })
            .collect();
        GroupDecl {
            name: self.name.clone(),
            table: self.table,
            mode: self.mode,
            entries,
            bindings: self.bindings.clone(),
        }
    }
}
