//! Producer side: typed inserts become physical log appends.
//!
//! The multiplexer owns nothing persistent beyond its references to the
//! stream specification and the append-capable log; next-index bookkeeping
//! is the log's own. Each insert performs exactly one append and no
//! cross-stream coordination, so concurrent inserts on different streams
//! interleave in whatever order the log assigns.

use crate::entry::LogRecord;
use crate::error::{Result, StreamError};
use crate::log::ReplicatedLog;
use crate::spec::StreamSpec;
use crate::types::{LogIndex, StreamId, StreamTag};
use std::marker::PhantomData;
use std::sync::{Arc, Weak};
use tracing::trace;

struct MuxInner {
    spec: Arc<StreamSpec>,
    log: Arc<dyn ReplicatedLog>,
}

/// Producer-side multiplexer over one physical log.
pub struct Multiplexer {
    inner: Arc<MuxInner>,
}

impl Multiplexer {
    /// Create a multiplexer for the given specification and log.
    #[must_use]
    pub fn new(spec: Arc<StreamSpec>, log: Arc<dyn ReplicatedLog>) -> Self {
        Self { inner: Arc::new(MuxInner { spec, log }) }
    }

    /// The specification this multiplexer writes under.
    #[must_use]
    pub fn spec(&self) -> &StreamSpec {
        &self.inner.spec
    }

    /// Obtain a typed producer handle for one stream.
    ///
    /// Handles are cheap, stateless views and may be obtained repeatedly.
    /// They hold a non-owning back-reference: a handle that outlives its
    /// multiplexer fails with [`StreamError::Detached`] instead of dangling.
    ///
    /// # Errors
    /// [`StreamError::UnknownStream`] if the id is not in the specification,
    /// [`StreamError::TypeMismatch`] if `T` is not the stream's value type.
    pub fn get_stream<T: Send + 'static>(
        &self,
        stream_id: StreamId,
    ) -> Result<ProducerHandle<T>> {
        let descriptor = self.inner.spec.resolve(stream_id)?;
        if !descriptor.is_value_type::<T>() {
            return Err(StreamError::TypeMismatch { stream_id });
        }

        Ok(ProducerHandle {
            stream_id,
            write_tag: descriptor.write_tag(),
            inner: Arc::downgrade(&self.inner),
            _marker: PhantomData,
        })
    }
}

/// Typed handle for inserting values into one logical stream.
pub struct ProducerHandle<T> {
    stream_id: StreamId,
    write_tag: StreamTag,
    inner: Weak<MuxInner>,
    _marker: PhantomData<fn(&T)>,
}

impl<T> std::fmt::Debug for ProducerHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProducerHandle")
            .field("stream_id", &self.stream_id)
            .field("write_tag", &self.write_tag)
            .finish()
    }
}

impl<T: Send + 'static> ProducerHandle<T> {
    /// The stream this handle writes to.
    #[must_use]
    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    /// Serialize `value` under the stream's write tag and append it to the
    /// physical log, returning the index the log assigned.
    ///
    /// Suspends only as long as the log's own append does. Log failures are
    /// propagated verbatim; nothing is persisted on the error path.
    ///
    /// # Errors
    /// [`StreamError::Detached`] if the multiplexer is gone,
    /// [`StreamError::Codec`] if serialization fails (rejected before any
    /// append), or [`StreamError::Log`] from the log itself.
    pub async fn insert(&self, value: &T) -> Result<LogIndex> {
        let inner = self.inner.upgrade().ok_or(StreamError::Detached)?;

        let codec = inner.spec.resolve_tag(self.stream_id, self.write_tag)?;
        let payload = codec.encode_value(value).map_err(|e| StreamError::Codec {
            stream_id: self.stream_id,
            tag: self.write_tag,
            detail: e.to_string(),
        })?;

        let record = LogRecord::new(self.stream_id, self.write_tag, payload);
        let index = inner.log.append(record).await?;

        trace!(stream_id = %self.stream_id, %index, "inserted entry");
        Ok(index)
    }
}

impl<T> Clone for ProducerHandle<T> {
    fn clone(&self) -> Self {
        Self {
            stream_id: self.stream_id,
            write_tag: self.write_tag,
            inner: Weak::clone(&self.inner),
            _marker: PhantomData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::BincodeCodec;
    use crate::error::LogError;
    use crate::log::MemoryLog;
    use crate::spec::StreamDef;

    fn int_spec() -> Arc<StreamSpec> {
        Arc::new(
            StreamSpec::builder()
                .stream(
                    StreamDef::<i64>::new(StreamId::new(1), "ints")
                        .tag(StreamTag::new(1), BincodeCodec::new()),
                )
                .build()
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_insert_returns_assigned_index() {
        let log = Arc::new(MemoryLog::new());
        let mux = Multiplexer::new(int_spec(), log.clone());
        let ints = mux.get_stream::<i64>(StreamId::new(1)).unwrap();

        assert_eq!(ints.insert(&10).await.unwrap(), LogIndex::new(1));
        assert_eq!(ints.insert(&20).await.unwrap(), LogIndex::new(2));
        assert_eq!(log.last_index(), Some(LogIndex::new(2)));
    }

    #[tokio::test]
    async fn test_unknown_stream_rejected_before_append() {
        let log = Arc::new(MemoryLog::new());
        let mux = Multiplexer::new(int_spec(), log.clone());

        let err = mux.get_stream::<i64>(StreamId::new(9)).unwrap_err();
        assert_eq!(err, StreamError::UnknownStream { stream_id: StreamId::new(9) });
        assert_eq!(log.last_index(), None);
    }

    #[tokio::test]
    async fn test_wrong_value_type_rejected() {
        let mux = Multiplexer::new(int_spec(), Arc::new(MemoryLog::new()));

        let err = mux.get_stream::<String>(StreamId::new(1)).unwrap_err();
        assert_eq!(err, StreamError::TypeMismatch { stream_id: StreamId::new(1) });
    }

    #[tokio::test]
    async fn test_log_errors_propagate_verbatim() {
        let log = Arc::new(MemoryLog::new());
        let mux = Multiplexer::new(int_spec(), log.clone());
        let ints = mux.get_stream::<i64>(StreamId::new(1)).unwrap();

        log.demote();
        assert_eq!(ints.insert(&1).await.unwrap_err(), StreamError::Log(LogError::NotLeader));
    }

    #[tokio::test]
    async fn test_detached_handle() {
        let mux = Multiplexer::new(int_spec(), Arc::new(MemoryLog::new()));
        let ints = mux.get_stream::<i64>(StreamId::new(1)).unwrap();
        drop(mux);

        assert_eq!(ints.insert(&1).await.unwrap_err(), StreamError::Detached);
    }
}
