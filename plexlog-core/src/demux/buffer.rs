//! Per-stream buffering and pending-wait bookkeeping.
//!
//! Each logical stream owns one [`StreamBuffer`] holding decoded values
//! keyed by physical log index plus the stream's pending wait requests.
//! Two writer roles touch a buffer: the listen loop dispatches new entries,
//! consumers register waits and drain ranges. Both are serialized through
//! the buffer's lock in the demultiplexer; streams are independent, so no
//! cross-stream locking exists.

use crate::codec::ErasedValue;
use crate::error::{LogError, StreamError};
use crate::types::{LogIndex, StreamId};
use smallvec::SmallVec;
use std::collections::{BTreeMap, VecDeque};
use tokio::sync::oneshot;
use tracing::warn;

/// A contiguous drained span, ready to be wrapped by a typed iterator.
pub(crate) struct ErasedRange {
    pub(crate) start: LogIndex,
    pub(crate) stop: LogIndex,
    pub(crate) entries: VecDeque<(LogIndex, ErasedValue)>,
}

impl std::fmt::Debug for ErasedRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErasedRange")
            .field("start", &self.start)
            .field("stop", &self.stop)
            .field("len", &self.entries.len())
            .finish()
    }
}

/// One pending "notify me when an iterator from `from` is available".
struct Waiter {
    from: LogIndex,
    tx: oneshot::Sender<Result<ErasedRange, StreamError>>,
}

pub(crate) struct StreamBuffer {
    stream_id: StreamId,
    entries: BTreeMap<LogIndex, ErasedValue>,
    /// Highest index ever dispatched to this stream; guards ordering.
    highest: Option<LogIndex>,
    waiters: SmallVec<[Waiter; 2]>,
    high_watermark: usize,
}

impl StreamBuffer {
    pub(crate) fn new(stream_id: StreamId, high_watermark: usize) -> Self {
        Self {
            stream_id,
            entries: BTreeMap::new(),
            highest: None,
            waiters: SmallVec::new(),
            high_watermark,
        }
    }

    /// Append one decoded value at its log index.
    ///
    /// Indexes must arrive strictly increasing per stream; anything else
    /// means the log violated its `read_after` contract.
    pub(crate) fn dispatch(
        &mut self,
        index: LogIndex,
        value: ErasedValue,
    ) -> Result<(), StreamError> {
        if let Some(highest) = self.highest {
            if index <= highest {
                return Err(StreamError::Log(LogError::Corruption {
                    index,
                    detail: format!(
                        "out-of-order dispatch for stream {}: already at {highest}",
                        self.stream_id
                    ),
                }));
            }
        }

        self.entries.insert(index, value);
        self.highest = Some(index);

        if self.entries.len() == self.high_watermark {
            warn!(
                stream_id = %self.stream_id,
                buffered = self.entries.len(),
                "stream buffer reached high watermark; consumer is not draining"
            );
        }
        Ok(())
    }

    /// Drain everything at or after `from` into a range, if anything is
    /// buffered there.
    ///
    /// Entries below `from` are released as well: the consumer's wait point
    /// acknowledges everything before it, and with one consumer per stream
    /// nothing will ask for them again.
    pub(crate) fn take_from(&mut self, from: LogIndex) -> Option<ErasedRange> {
        let tail = self.entries.split_off(&from);
        let (start, stop) = match (tail.keys().next(), tail.keys().next_back()) {
            (Some(first), Some(last)) => (*first, last.next()),
            _ => {
                // Nothing at or after `from`; put nothing back, keep the
                // prefix until a wait point actually covers it.
                return None;
            },
        };

        self.entries.clear();
        Some(ErasedRange { start, stop, entries: tail.into_iter().collect() })
    }

    /// Queue a wait for content at or after `from`.
    pub(crate) fn register_waiter(
        &mut self,
        from: LogIndex,
    ) -> oneshot::Receiver<Result<ErasedRange, StreamError>> {
        let (tx, rx) = oneshot::channel();
        self.waiters.push(Waiter { from, tx });
        rx
    }

    /// Resolve every waiter whose requested index is now covered.
    ///
    /// Called from the listen loop after a batch has been dispatched, so a
    /// waiter observes the whole newly contiguous span at once rather than
    /// entry-by-entry fragments.
    pub(crate) fn resolve_ready(&mut self) {
        let waiters = std::mem::take(&mut self.waiters);
        for waiter in waiters {
            if waiter.tx.is_closed() {
                // Caller dropped the wait future; forget it.
                continue;
            }
            if self.entries.range(waiter.from..).next().is_none() {
                self.waiters.push(waiter);
                continue;
            }
            if let Some(range) = self.take_from(waiter.from) {
                if waiter.tx.send(Ok(range)).is_err() {
                    warn!(
                        stream_id = %self.stream_id,
                        "waiter vanished during resolution; drained range dropped"
                    );
                }
            }
        }
    }

    /// Fail every pending waiter with `err`. Used on shutdown and on fatal
    /// decode errors; nothing may be left pending forever.
    pub(crate) fn fail_all(&mut self, err: &StreamError) {
        for waiter in self.waiters.drain(..) {
            let _ = waiter.tx.send(Err(err.clone()));
        }
    }

    #[cfg(test)]
    pub(crate) fn buffered(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub(crate) fn pending_waits(&self) -> usize {
        self.waiters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(value: i64) -> ErasedValue {
        Box::new(value)
    }

    fn buffer() -> StreamBuffer {
        StreamBuffer::new(StreamId::new(1), 1024)
    }

    #[test]
    fn test_take_from_drains_tail_and_prefix() {
        let mut buf = buffer();
        buf.dispatch(LogIndex::new(1), boxed(10)).unwrap();
        buf.dispatch(LogIndex::new(3), boxed(20)).unwrap();
        buf.dispatch(LogIndex::new(4), boxed(30)).unwrap();

        let range = buf.take_from(LogIndex::new(3)).unwrap();
        assert_eq!((range.start, range.stop), (LogIndex::new(3), LogIndex::new(5)));
        assert_eq!(range.entries.len(), 2);
        // The acknowledged prefix below the wait point is released too.
        assert_eq!(buf.buffered(), 0);
    }

    #[test]
    fn test_take_from_empty_tail() {
        let mut buf = buffer();
        buf.dispatch(LogIndex::new(1), boxed(10)).unwrap();

        assert!(buf.take_from(LogIndex::new(5)).is_none());
        // Prefix stays until a wait point covers it.
        assert_eq!(buf.buffered(), 1);
    }

    #[test]
    fn test_out_of_order_dispatch_rejected() {
        let mut buf = buffer();
        buf.dispatch(LogIndex::new(5), boxed(1)).unwrap();

        let err = buf.dispatch(LogIndex::new(5), boxed(2)).unwrap_err();
        assert!(matches!(err, StreamError::Log(LogError::Corruption { .. })));
        let err = buf.dispatch(LogIndex::new(3), boxed(3)).unwrap_err();
        assert!(matches!(err, StreamError::Log(LogError::Corruption { .. })));
    }

    #[tokio::test]
    async fn test_waiter_resolution() {
        let mut buf = buffer();
        let rx = buf.register_waiter(LogIndex::new(2));

        buf.dispatch(LogIndex::new(1), boxed(10)).unwrap();
        buf.resolve_ready();
        assert_eq!(buf.pending_waits(), 1); // index 1 < requested 2

        buf.dispatch(LogIndex::new(2), boxed(20)).unwrap();
        buf.resolve_ready();
        assert_eq!(buf.pending_waits(), 0);

        let range = rx.await.unwrap().unwrap();
        assert_eq!((range.start, range.stop), (LogIndex::new(2), LogIndex::new(3)));
    }

    #[tokio::test]
    async fn test_dropped_waiter_is_discarded() {
        let mut buf = buffer();
        let rx = buf.register_waiter(LogIndex::new(1));
        drop(rx);

        buf.dispatch(LogIndex::new(1), boxed(10)).unwrap();
        buf.resolve_ready();

        assert_eq!(buf.pending_waits(), 0);
        // Data survives for the next waiter instead of being lost.
        assert_eq!(buf.buffered(), 1);
    }

    #[tokio::test]
    async fn test_fail_all() {
        let mut buf = buffer();
        let rx = buf.register_waiter(LogIndex::new(1));

        buf.fail_all(&StreamError::Cancelled);
        assert_eq!(rx.await.unwrap().unwrap_err(), StreamError::Cancelled);
        assert_eq!(buf.pending_waits(), 0);
    }
}
