//! Deterministic value sequences for soak-style tests.
//!
//! Sequences are pure functions of their parameters so a replayed consumer
//! can be checked against regenerated expectations instead of captured
//! output.

/// `count` distinct integers for one producer, offset so that sequences
/// from different producers never collide.
#[must_use]
pub fn int_sequence(producer: u64, count: usize) -> Vec<i64> {
    (0..count as i64).map(|n| (producer as i64) * 1_000_000 + n).collect()
}

/// `count` distinct labeled strings for one producer.
#[must_use]
pub fn string_sequence(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|n| format!("{prefix}-{n}")).collect()
}
