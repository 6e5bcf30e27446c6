//! Deterministic nearest-candidate selection.

use std::cmp::Ordering;

/// Pick the candidate with the smallest distance, breaking ties on `key`.
///
/// A later candidate only replaces the current best when it compares
/// strictly less, so the result does not depend on iteration order.
pub(crate) fn nearest<T, K: Ord>(
    candidates: impl IntoIterator<Item = T>,
    rank: impl Fn(&T) -> (f32, K),
) -> Option<T> {
    let mut best: Option<(T, f32, K)> = None;
    for candidate in candidates {
        let (distance, key) = rank(&candidate);
        let better = best.as_ref().is_none_or(|(_, best_distance, best_key)| {
            compare(distance, &key, *best_distance, best_key) == Ordering::Less
        });
        if better {
            best = Some((candidate, distance, key));
        }
    }
    best.map(|(candidate, _, _)| candidate)
}

/// Total order on `(distance, key)` pairs.
pub(crate) fn compare<K: Ord>(a_distance: f32, a_key: &K, b_distance: f32, b_key: &K) -> Ordering {
    a_distance.total_cmp(&b_distance).then_with(|| a_key.cmp(b_key))
}
