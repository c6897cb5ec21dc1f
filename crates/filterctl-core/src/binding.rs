// ── Interface binding reconciliation ──
//
// A binding names an ordered filter list for one interface direction. Each
// slot is reconciled on its own: a failure on one slot never prevents the
// others from being attempted, and all failures are reported together.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, warn};

use crate::device::{DeviceError, FilterDevice};
use crate::error::{BindingFailure, CoreError};
use crate::model::{ApplyBinding, BindingSlot, FilterTable};
use crate::sequence::validate_range;

/// Effective filter list: the declared non-empty list, else `fallback`.
pub fn resolve(binding: &ApplyBinding, fallback: &[u32]) -> Vec<u32> {
    match &binding.filter_ids {
        Some(ids) if !ids.is_empty() => ids.clone(),
        _ => fallback.to_vec(),
    }
}

/// Resolve every binding, keyed by slot.
pub fn resolve_all(bindings: &[ApplyBinding], fallback: &[u32]) -> BTreeMap<BindingSlot, Vec<u32>> {
    bindings
        .iter()
        .map(|b| (b.slot(), resolve(b, fallback)))
        .collect()
}

/// Reject two bindings that claim the same slot.
///
/// `sources` pairs each binding with a label for its owner (a group id or
/// `apply`), used in the error.
pub fn check_conflicts<'a>(
    table: FilterTable,
    sources: impl IntoIterator<Item = (&'a str, &'a ApplyBinding)>,
) -> Result<(), CoreError> {
    let mut claimed: HashMap<BindingSlot, &str> = HashMap::new();
    for (owner, binding) in sources {
        if let Some(first) = claimed.insert(binding.slot(), owner) {
            return Err(CoreError::BindingConflict {
                table,
                interface: binding.interface.clone(),
                direction: binding.direction,
                first: first.to_owned(),
                second: owner.to_owned(),
            });
        }
    }
    Ok(())
}

/// Range-check every explicitly declared filter number.
pub fn validate_filter_ids(table: FilterTable, bindings: &[ApplyBinding]) -> Result<(), CoreError> {
    bindings
        .iter()
        .filter_map(|b| b.filter_ids.as_deref())
        .try_for_each(|ids| validate_range(table, ids))
}

/// Slots bound and unbound by a reconcile pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingReport {
    pub bound: Vec<BindingSlot>,
    pub unbound: Vec<BindingSlot>,
}

async fn unbind_slot<D: FilterDevice>(
    device: &D,
    table: FilterTable,
    slot: &BindingSlot,
) -> Result<(), DeviceError> {
    match device
        .unbind_interface_filters(table, &slot.interface, slot.direction)
        .await
    {
        Err(err) if err.is_not_found() => {
            debug!(table = %table, interface = %slot.interface, direction = %slot.direction, "slot already unbound");
            Ok(())
        }
        other => other,
    }
}

/// Move the router's bindings from `old` to `new`.
///
/// Slots only in `old` are unbound. Every slot in `new` is fully replaced
/// with its resolved list, or unbound when that list is empty.
pub async fn reconcile<D: FilterDevice>(
    device: &D,
    table: FilterTable,
    old: &[ApplyBinding],
    new: &[ApplyBinding],
    fallback: &[u32],
) -> Result<BindingReport, CoreError> {
    let desired = resolve_all(new, fallback);
    let stale: BTreeSet<BindingSlot> = old
        .iter()
        .map(ApplyBinding::slot)
        .filter(|slot| !desired.contains_key(slot))
        .collect();

    let mut report = BindingReport::default();
    let mut failures = Vec::new();
    let mut fail = |slot: &BindingSlot, err: &DeviceError| {
        warn!(table = %table, interface = %slot.interface, direction = %slot.direction, error = %err, "binding update failed");
        failures.push(BindingFailure {
            table,
            slot: slot.clone(),
            message: err.to_string(),
        });
    };

    for slot in stale {
        match unbind_slot(device, table, &slot).await {
            Ok(()) => report.unbound.push(slot),
            Err(err) => fail(&slot, &err),
        }
    }

    for (slot, numbers) in desired {
        let result = if numbers.is_empty() {
            unbind_slot(device, table, &slot).await
        } else {
            device
                .bind_interface_filters(table, &slot.interface, slot.direction, &numbers)
                .await
        };
        match result {
            Ok(()) if numbers.is_empty() => report.unbound.push(slot),
            Ok(()) => report.bound.push(slot),
            Err(err) => fail(&slot, &err),
        }
    }

    if failures.is_empty() {
        Ok(report)
    } else {
        Err(CoreError::BindingsFailed { failures })
    }
}

/// Remove every listed binding, attempting all slots.
pub async fn unbind_all<D: FilterDevice>(
    device: &D,
    table: FilterTable,
    bindings: &[ApplyBinding],
) -> Result<BindingReport, CoreError> {
    reconcile(device, table, bindings, &[], &[]).await
}
