use std::cmp::Ordering;

use crate::query::ResultEntry;

/// Default result order: nearest first, then higher rating, then merchant id.
///
/// The id tie-break makes the order total, so equal inputs always sort the
/// same way.
#[must_use]
pub fn compare_entries(a: &ResultEntry, b: &ResultEntry) -> Ordering {
    a.distance_meters
        .total_cmp(&b.distance_meters)
        .then_with(|| b.rating.total_cmp(&a.rating))
        .then_with(|| a.merchant_id.cmp(&b.merchant_id))
}

pub fn rank(entries: &mut [ResultEntry]) {
    entries.sort_by(compare_entries);
}

/// Keep `[offset, offset + limit)`. An offset past the end yields nothing.
#[must_use]
pub fn paginate(entries: Vec<ResultEntry>, offset: usize, limit: usize) -> Vec<ResultEntry> {
    entries.into_iter().skip(offset).take(limit).collect()
}
