// ── Device sync ──
//
// Applies a `SequenceDiff` to the router. Deletes run first, then every
// current entry is defined in entry order. The first hard failure stops the
// pass; operations that already succeeded stay applied.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::device::FilterDevice;
use crate::diff::SequenceDiff;
use crate::error::CoreError;
use crate::model::{FilterTable, RealizedEntry};

/// What a sync pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub deleted: Vec<u32>,
    /// Deletes the router answered with "not found".
    pub already_absent: Vec<u32>,
    pub defined: Vec<u32>,
}

/// Apply `diff` to `table`, taking payloads from `entries`.
///
/// Every number in `diff.to_upsert` must have a matching entry.
pub async fn sync<D: FilterDevice>(
    device: &D,
    table: FilterTable,
    diff: &SequenceDiff,
    entries: &[RealizedEntry<D::Payload>],
) -> Result<SyncReport, CoreError> {
    let by_number: HashMap<u32, &D::Payload> =
        entries.iter().map(|e| (e.number, &e.rule)).collect();
    let mut report = SyncReport::default();

    for &number in &diff.to_delete {
        match device.delete_entry(table, number).await {
            Ok(()) => report.deleted.push(number),
            Err(err) if err.is_not_found() => {
                debug!(table = %table, number, "filter already absent");
                report.already_absent.push(number);
            }
            Err(err) => return Err(CoreError::device(format!("delete {table} filter {number}"), err)),
        }
    }

    for &number in &diff.to_upsert {
        let Some(payload) = by_number.get(&number) else {
            return Err(CoreError::InvalidSequencing {
                message: format!("no entry carries filter number {number}"),
            });
        };
        device
            .define_entry(table, number, payload)
            .await
            .map_err(|err| CoreError::device(format!("define {table} filter {number}"), err))?;
        report.defined.push(number);
    }

    info!(
        table = %table,
        deleted = report.deleted.len() + report.already_absent.len(),
        defined = report.defined.len(),
        "filter table synced"
    );
    Ok(report)
}
