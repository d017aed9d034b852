use std::cmp::Ordering;

use crate::models::{RankedEntry, ScoredEntry};

/// Order standings entries by primary metric descending, secondary metric
/// descending, then name ascending. The sort is stable, so entries equal on
/// the whole composite key keep their incoming relative order.
pub fn sort_standings(entries: &mut [ScoredEntry]) {
    entries.sort_by(|a, b| {
        b.primary
            .partial_cmp(&a.primary)
            .unwrap_or(Ordering::Equal)
            .then(
                b.secondary
                    .partial_cmp(&a.secondary)
                    .unwrap_or(Ordering::Equal),
            )
            .then_with(|| a.record.full_name.cmp(&b.record.full_name))
    });
}

/// Assign dense ranks to an already sorted sequence, starting at 1. Entries
/// tied on the primary metric share a rank and the next distinct value is
/// exactly one higher (9.00, 9.00, 8.50 becomes 1, 1, 2). Ties look at the
/// primary metric alone; the secondary key only influenced ordering.
///
/// Equality is exact: every primary value was rounded by the deriver before
/// it got here, so equal logical values are already identical.
pub fn assign_dense_ranks(entries: Vec<ScoredEntry>) -> Vec<RankedEntry> {
    let mut ranked = Vec::with_capacity(entries.len());
    let mut rank = 0u32;
    let mut previous: Option<f64> = None;

    for entry in entries {
        if previous != Some(entry.primary) {
            rank += 1;
            previous = Some(entry.primary);
        }

        ranked.push(RankedEntry {
            rank,
            score: entry.primary,
            record: entry.record,
        });
    }

    ranked
}
