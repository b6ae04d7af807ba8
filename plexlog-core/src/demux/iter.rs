//! Single-pass typed iterator over a drained range.

use super::buffer::ErasedRange;
use crate::types::LogIndex;
use std::marker::PhantomData;

/// Forward-only view over a contiguous sequence of `(LogIndex, T)` pairs.
///
/// Produced by resolving a wait request; consuming it to exhaustion
/// acknowledges the covered range. It cannot be rewound — issue a new wait
/// for later content.
pub struct RangeIter<T> {
    start: LogIndex,
    stop: LogIndex,
    entries: std::collections::VecDeque<(LogIndex, crate::codec::ErasedValue)>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> RangeIter<T> {
    pub(crate) fn new(range: ErasedRange) -> Self {
        Self { start: range.start, stop: range.stop, entries: range.entries, _marker: PhantomData }
    }

    /// The half-open `[start, stop)` index interval this iterator covers.
    #[must_use]
    pub fn range(&self) -> (LogIndex, LogIndex) {
        (self.start, self.stop)
    }

    /// Number of entries remaining.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the iterator is exhausted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> std::fmt::Debug for RangeIter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeIter")
            .field("start", &self.start)
            .field("stop", &self.stop)
            .field("remaining", &self.entries.len())
            .finish()
    }
}

impl<T: Send + 'static> Iterator for RangeIter<T> {
    type Item = (LogIndex, T);

    fn next(&mut self) -> Option<Self::Item> {
        let (index, value) = self.entries.pop_front()?;
        match value.downcast::<T>() {
            Ok(value) => Some((index, *value)),
            // Unreachable in practice: the handle's value type is checked
            // against the descriptor when the handle is obtained.
            Err(_) => None,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.entries.len(), Some(self.entries.len()))
    }
}

impl<T: Send + 'static> ExactSizeIterator for RangeIter<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ErasedValue;
    use std::collections::VecDeque;

    fn range_of(values: &[(u64, i64)]) -> ErasedRange {
        let entries: VecDeque<(LogIndex, ErasedValue)> = values
            .iter()
            .map(|&(i, v)| (LogIndex::new(i), Box::new(v) as ErasedValue))
            .collect();
        ErasedRange {
            start: LogIndex::new(values[0].0),
            stop: LogIndex::new(values[values.len() - 1].0 + 1),
            entries,
        }
    }

    #[test]
    fn test_yields_in_index_order() {
        let iter = RangeIter::<i64>::new(range_of(&[(1, 10), (3, 20), (4, 30)]));
        assert_eq!(iter.range(), (LogIndex::new(1), LogIndex::new(5)));

        let collected: Vec<_> = iter.collect();
        assert_eq!(
            collected,
            vec![
                (LogIndex::new(1), 10),
                (LogIndex::new(3), 20),
                (LogIndex::new(4), 30),
            ]
        );
    }

    #[test]
    fn test_exhaustion() {
        let mut iter = RangeIter::<i64>::new(range_of(&[(2, 5)]));
        assert_eq!(iter.len(), 1);
        assert!(iter.next().is_some());
        assert!(iter.next().is_none());
        assert!(iter.is_empty());
    }
}
