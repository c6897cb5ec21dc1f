// ── Core error types ──
//
// Validation errors are raised before any device call and leave the router
// untouched. Device errors are returned after the prefix of operations that
// already succeeded; re-running the same lifecycle call converges.

use std::fmt;

use thiserror::Error;

use crate::device::DeviceError;
use crate::model::{BindingSlot, Direction, FilterTable};

/// One interface slot that could not be reconciled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingFailure {
    pub table: FilterTable,
    pub slot: BindingSlot,
    pub message: String,
}

impl fmt::Display for BindingFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.table, self.slot, self.message)
    }
}

fn join_failures(failures: &[BindingFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Validation errors ────────────────────────────────────────────
    #[error("Group {group} has no entries")]
    EmptyGroup { group: String },

    #[error("Entry {index} has no positive sequence number (manual numbering)")]
    MissingSequence { index: usize },

    #[error(
        "Entry {index} sets an explicit sequence but the group uses automatic numbering (sequence_start)"
    )]
    MixedSequencing { index: usize },

    #[error("Invalid sequencing: {message}")]
    InvalidSequencing { message: String },

    #[error("Filter number {number} is outside the valid range 1..={max}")]
    SequenceOutOfRange { number: u64, max: u32 },

    #[error("Filter number {number} is used by entries {first} and {second}")]
    DuplicateSequence {
        number: u32,
        first: usize,
        second: usize,
    },

    #[error("Entry {index} is invalid: {reason}")]
    InvalidRule { index: usize, reason: String },

    #[error("Rules of this family cannot be written to the {table} filter table")]
    UnsupportedTable { table: FilterTable },

    #[error("Binding {table} {interface}:{direction} is declared by both {first} and {second}")]
    BindingConflict {
        table: FilterTable,
        interface: String,
        direction: Direction,
        first: String,
        second: String,
    },

    #[error("Filter numbers {numbers:?} in the {table} table are already used by {holder}")]
    SequenceCollision {
        table: FilterTable,
        numbers: Vec<u32>,
        holder: String,
    },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Group {group} cannot switch numbering from {from} to {to} in place")]
    ModeChange {
        group: String,
        from: String,
        to: String,
    },

    #[error("Invalid group identity `{input}`: {reason}")]
    InvalidIdentity { input: String, reason: String },

    #[error("Group {group} is not present")]
    GroupAbsent { group: String },

    #[error("None of the filter numbers {probed:?} exist on the router")]
    ImportEmpty { group: String, probed: Vec<u32> },

    #[error("Found filter numbers {found:?} do not match the requested sequence {expected:?}")]
    ImportMismatch {
        group: String,
        expected: Vec<u32>,
        found: Vec<u32>,
    },

    // ── Device errors ────────────────────────────────────────────────
    #[error("Device operation failed ({operation}): {source}")]
    Device {
        operation: String,
        #[source]
        source: DeviceError,
    },

    #[error("{} interface binding(s) failed: {}", .failures.len(), join_failures(.failures))]
    BindingsFailed { failures: Vec<BindingFailure> },
}

impl CoreError {
    pub(crate) fn device(operation: impl Into<String>, source: DeviceError) -> Self {
        Self::Device {
            operation: operation.into(),
            source,
        }
    }

    /// Returns `true` for errors raised before any device traffic.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyGroup { .. }
                | Self::MissingSequence { .. }
                | Self::MixedSequencing { .. }
                | Self::InvalidSequencing { .. }
                | Self::SequenceOutOfRange { .. }
                | Self::DuplicateSequence { .. }
                | Self::InvalidRule { .. }
                | Self::UnsupportedTable { .. }
                | Self::BindingConflict { .. }
                | Self::InvalidIdentity { .. }
        )
    }

    /// The underlying gateway error, if a device call failed in transport.
    pub fn api_error(&self) -> Option<&filterctl_api::Error> {
        match self {
            Self::Device {
                source: DeviceError::Transport(err),
                ..
            } => Some(err),
            _ => None,
        }
    }
}
