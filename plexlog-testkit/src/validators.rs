//! Assertions over consumed per-stream sequences.

use plexlog_core::LogIndex;

/// Assert the entries carry strictly increasing log indexes.
///
/// # Panics
/// Panics if any adjacent pair is out of order or duplicated.
pub fn assert_strictly_increasing<T>(entries: &[(LogIndex, T)]) {
    for window in entries.windows(2) {
        assert!(
            window[0].0 < window[1].0,
            "indexes not strictly increasing: {} then {}",
            window[0].0,
            window[1].0
        );
    }
}

/// Assert the values arrived exactly in the order they were produced.
///
/// # Panics
/// Panics on any loss, duplication, or reordering.
pub fn assert_values_in_order<T: PartialEq + std::fmt::Debug>(
    entries: &[(LogIndex, T)],
    expected: &[T],
) {
    let got: Vec<&T> = entries.iter().map(|(_, v)| v).collect();
    let want: Vec<&T> = expected.iter().collect();
    assert_eq!(got, want, "stream values lost, duplicated, or reordered");
}

/// Assert the per-stream index sets are disjoint and together cover
/// `1..=total` exactly once.
///
/// # Panics
/// Panics if any index is missing, repeated, or out of range.
pub fn assert_disjoint_full_cover(index_sets: &[Vec<LogIndex>], total: u64) {
    let mut all: Vec<u64> = index_sets.iter().flatten().map(|i| i.value()).collect();
    all.sort_unstable();
    let expected: Vec<u64> = (1..=total).collect();
    assert_eq!(all, expected, "streams do not partition the log exactly");
}
