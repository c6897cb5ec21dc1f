// ── Sequence assignment ──
//
// Turns declared entries into device numbers. Everything here is pure: the
// same entries and mode always give the same numbers, and nothing touches
// the device.

use std::collections::HashMap;

use crate::error::CoreError;
use crate::model::{DEFAULT_SEQUENCE_STEP, DeclaredSequencing, Entry, FilterTable, SequencingMode};

/// Compute the device number of every entry, in entry order.
///
/// Auto mode yields `start + index * step` and ignores per-entry numbers.
/// Manual mode takes each entry's own number, which must be positive.
/// Duplicates are not checked here; see [`check_unique`].
pub fn assign<P>(entries: &[Entry<P>], mode: &SequencingMode) -> Result<Vec<u32>, CoreError> {
    match *mode {
        SequencingMode::Auto { start, step } => auto_numbers(start, step, entries.len()),
        SequencingMode::Manual => entries
            .iter()
            .enumerate()
            .map(|(index, entry)| match entry.sequence {
                Some(number) if number > 0 => Ok(number),
                _ => Err(CoreError::MissingSequence { index }),
            })
            .collect(),
    }
}

/// The first `count` numbers of the series `start, start + step, ...`.
pub fn auto_numbers(start: u32, step: u32, count: usize) -> Result<Vec<u32>, CoreError> {
    if start == 0 || step == 0 {
        return Err(CoreError::InvalidSequencing {
            message: format!("start and step must be at least 1 (got {start}, {step})"),
        });
    }
    let mut numbers = Vec::with_capacity(count);
    let mut next = u64::from(start);
    for _ in 0..count {
        let number = u32::try_from(next).map_err(|_| CoreError::SequenceOutOfRange {
            number: next,
            max: u32::MAX,
        })?;
        numbers.push(number);
        // Both terms fit in u32, so the sum fits in u64.
        next = u64::from(number) + u64::from(step);
    }
    Ok(numbers)
}

/// Derive the numbering mode from the operator's sequencing fields.
///
/// A positive `sequence_start` selects auto mode (step defaults to 10);
/// otherwise the group is manually numbered. Auto mode must not be mixed
/// with explicit per-entry numbers.
pub fn from_declared<P>(
    declared: &DeclaredSequencing,
    entries: &[Entry<P>],
) -> Result<SequencingMode, CoreError> {
    match declared.sequence_start {
        Some(start) if start > 0 => {
            let step = declared.sequence_step.unwrap_or(DEFAULT_SEQUENCE_STEP);
            if step == 0 {
                return Err(CoreError::InvalidSequencing {
                    message: "sequence_step must be at least 1".into(),
                });
            }
            if let Some(index) = entries.iter().position(|e| e.sequence.is_some()) {
                return Err(CoreError::MixedSequencing { index });
            }
            Ok(SequencingMode::Auto { start, step })
        }
        _ => Ok(SequencingMode::Manual),
    }
}

/// Check that every number fits the table's valid range.
pub fn validate_range(table: FilterTable, numbers: &[u32]) -> Result<(), CoreError> {
    match numbers.iter().find(|n| !table.contains(**n)) {
        Some(&number) => Err(CoreError::SequenceOutOfRange {
            number: u64::from(number),
            max: table.max_number(),
        }),
        None => Ok(()),
    }
}

/// Reject assignments that give two entries the same number.
pub fn check_unique(numbers: &[u32]) -> Result<(), CoreError> {
    let mut seen: HashMap<u32, usize> = HashMap::with_capacity(numbers.len());
    for (index, &number) in numbers.iter().enumerate() {
        if let Some(&first) = seen.get(&number) {
            return Err(CoreError::DuplicateSequence {
                number,
                first,
                second: index,
            });
        }
        seen.insert(number, index);
    }
    Ok(())
}
