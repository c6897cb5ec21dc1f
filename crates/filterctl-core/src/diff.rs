// ── Sequence diff ──

use std::collections::BTreeSet;

/// Device work needed to move from one assignment to the next.
///
/// Deletes may run in any order. Upserts keep entry order, which is the
/// order the router evaluates the filters in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceDiff {
    pub to_delete: BTreeSet<u32>,
    pub to_upsert: Vec<u32>,
}

impl SequenceDiff {
    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty() && self.to_upsert.is_empty()
    }
}

/// Compare the previously realized numbers with the current assignment.
///
/// Every current number is re-issued: the router has no cheap way to tell
/// whether a define would change anything. Reused numbers are upserted,
/// never deleted.
pub fn diff(previous: &BTreeSet<u32>, current: &[u32]) -> SequenceDiff {
    let current_set: BTreeSet<u32> = current.iter().copied().collect();
    SequenceDiff {
        to_delete: previous.difference(&current_set).copied().collect(),
        to_upsert: current.to_vec(),
    }
}
