//! Merging of upstream number lists into one ascending, duplicate-free list.
//!
//! Both operations are commutative in the order lists are supplied and
//! idempotent: merging a list that is already included changes nothing.

/// Merges `incoming` into `existing`, which must already be sorted and unique.
pub fn merge(mut existing: Vec<i64>, incoming: Vec<i64>) -> Vec<i64> {
    existing.extend(incoming);
    existing.sort_unstable();
    existing.dedup();
    existing
}

/// Merges any number of unsorted lists in one pass.
pub fn merge_all<I>(lists: I) -> Vec<i64>
where
    I: IntoIterator<Item = Vec<i64>>,
{
    let mut merged: Vec<i64> = lists.into_iter().flatten().collect();
    merged.sort_unstable();
    merged.dedup();
    merged
}
