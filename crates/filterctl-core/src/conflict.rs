// ── Number collision checks ──
//
// Filter numbers are global per table. A group must not claim a number that
// some other group, or an unmanaged router entry, already uses.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::device::FilterDevice;
use crate::error::CoreError;
use crate::identity::GroupId;
use crate::model::FilterTable;

/// Planned numbers that already exist on the device and are not `owned`.
///
/// The result is sorted and free of duplicates.
pub fn check_collisions(
    planned: &[u32],
    existing: &BTreeSet<u32>,
    owned: &BTreeSet<u32>,
) -> Vec<u32> {
    planned
        .iter()
        .copied()
        .filter(|n| existing.contains(n) && !owned.contains(n))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Compare `planned` against the router's current table.
///
/// Best effort: when the table cannot be listed the check is skipped with a
/// warning rather than blocking the operation.
pub async fn preflight<D: FilterDevice>(
    device: &D,
    table: FilterTable,
    planned: &[u32],
    owned: &BTreeSet<u32>,
) -> Result<(), CoreError> {
    let existing = match device.list_entry_numbers(table).await {
        Ok(existing) => existing,
        Err(err) => {
            warn!(table = %table, error = %err, "cannot list filter table, skipping collision check");
            return Ok(());
        }
    };
    let numbers = check_collisions(planned, &existing, owned);
    if numbers.is_empty() {
        debug!(table = %table, planned = planned.len(), "no filter number collisions");
        Ok(())
    } else {
        Err(CoreError::SequenceCollision {
            table,
            numbers,
            holder: "existing router entries".into(),
        })
    }
}

/// Reject numbers claimed by two groups of the same table.
pub fn check_across_groups<'a>(
    groups: impl IntoIterator<Item = (&'a GroupId, &'a [u32])>,
) -> Result<(), CoreError> {
    let mut claimed: BTreeMap<(FilterTable, u32), &GroupId> = BTreeMap::new();
    for (id, numbers) in groups {
        let mut clashes: BTreeMap<&GroupId, Vec<u32>> = BTreeMap::new();
        for &number in numbers {
            match claimed.get(&(id.table, number)) {
                Some(other) if *other != id => clashes.entry(*other).or_default().push(number),
                Some(_) => {}
                None => {
                    claimed.insert((id.table, number), id);
                }
            }
        }
        if let Some((other, numbers)) = clashes.into_iter().next() {
            return Err(CoreError::SequenceCollision {
                table: id.table,
                numbers,
                holder: format!("groups {other} and {id}"),
            });
        }
    }
    Ok(())
}
