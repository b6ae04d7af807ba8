//! Consumer side: reconstruct per-stream ordered sequences from the log.
//!
//! The demultiplexer tails the physical log through a single listen-loop
//! task, decodes each entry by its own embedded `(StreamId, StreamTag)`
//! pair, and republishes values into per-stream buffers that typed consumer
//! handles drain through wait-for-iterator requests. Because decoding
//! consults nothing beyond the entry itself and the immutable spec, a fresh
//! demultiplexer replaying the same log always reproduces the same
//! per-stream sequences — the property leader failover and follower restart
//! depend on.
//!
//! # Listen loop
//!
//! `Idle -> Listening -> (Decoding -> Dispatching)* -> Listening -> Stopped`.
//! The loop long-polls `read_after(cursor)`, dispatches the returned batch
//! in order, resolves any satisfied waits, advances the cursor, and polls
//! again. An entry the stream specification cannot interpret is fatal:
//! skipping it would
//! silently desynchronize stream ordering, so the loop stops and every
//! pending and future wait fails instead.

mod buffer;
mod iter;

pub use iter::RangeIter;

use self::buffer::StreamBuffer;
use crate::config::DemuxConfig;
use crate::entry::LogEntry;
use crate::error::{Result, StreamError};
use crate::log::ReplicatedLog;
use crate::spec::StreamSpec;
use crate::types::{LogIndex, StreamId};
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

struct DemuxShared {
    spec: Arc<StreamSpec>,
    log: Arc<dyn ReplicatedLog>,
    config: DemuxConfig,
    streams: HashMap<StreamId, Mutex<StreamBuffer>>,
    /// First fatal error or cancellation; set exactly once.
    failure: Mutex<Option<StreamError>>,
    running: AtomicBool,
}

impl DemuxShared {
    fn failure(&self) -> Option<StreamError> {
        self.failure.lock().clone()
    }

    /// Record `err` (first writer wins) and fail every pending wait.
    fn fail(&self, err: StreamError) {
        let effective = {
            let mut failure = self.failure.lock();
            failure.get_or_insert(err).clone()
        };
        for buffer in self.streams.values() {
            buffer.lock().fail_all(&effective);
        }
    }

    fn dispatch_entry(&self, entry: &LogEntry) -> Result<()> {
        let record = &entry.record;
        let codec = self.spec.resolve_tag(record.stream_id, record.tag)?;
        let value = codec.decode_value(&record.payload).map_err(|e| StreamError::Codec {
            stream_id: record.stream_id,
            tag: record.tag,
            detail: e.to_string(),
        })?;

        let buffer = self
            .streams
            .get(&record.stream_id)
            .ok_or(StreamError::UnknownStream { stream_id: record.stream_id })?;
        buffer.lock().dispatch(entry.index, value)?;

        trace!(stream_id = %record.stream_id, index = %entry.index, "dispatched entry");
        Ok(())
    }

    fn resolve_ready(&self, stream_id: StreamId) {
        if let Some(buffer) = self.streams.get(&stream_id) {
            buffer.lock().resolve_ready();
        }
    }
}

/// Consumer-side demultiplexer over one physical log.
pub struct Demultiplexer {
    shared: Arc<DemuxShared>,
    task: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: Mutex<Option<mpsc::Sender<()>>>,
    shutdown_rx: Mutex<Option<mpsc::Receiver<()>>>,
}

impl Demultiplexer {
    /// Create a demultiplexer with default configuration.
    ///
    /// One empty buffer is created per stream in the specification. Nothing
    /// is read from the log until [`Demultiplexer::listen`] is called.
    #[must_use]
    pub fn new(spec: Arc<StreamSpec>, log: Arc<dyn ReplicatedLog>) -> Self {
        // The default configuration always validates.
        Self::with_config(spec, log, DemuxConfig::default())
            .unwrap_or_else(|_| unreachable!("default DemuxConfig is valid"))
    }

    /// Create a demultiplexer with an explicit configuration.
    ///
    /// # Errors
    /// Returns [`StreamError::Configuration`] if the configuration is
    /// invalid.
    pub fn with_config(
        spec: Arc<StreamSpec>,
        log: Arc<dyn ReplicatedLog>,
        config: DemuxConfig,
    ) -> Result<Self> {
        config.validate()?;

        let streams = spec
            .stream_ids()
            .map(|id| (id, Mutex::new(StreamBuffer::new(id, config.buffer_high_watermark))))
            .collect();

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        Ok(Self {
            shared: Arc::new(DemuxShared {
                spec,
                log,
                config,
                streams,
                failure: Mutex::new(None),
                running: AtomicBool::new(false),
            }),
            task: Mutex::new(None),
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            shutdown_rx: Mutex::new(Some(shutdown_rx)),
        })
    }

    /// Start the listen loop. Idempotent: a second call is a no-op.
    pub fn listen(&self) {
        if self.shared.running.swap(true, Ordering::AcqRel) {
            return;
        }
        let Some(shutdown_rx) = self.shutdown_rx.lock().take() else {
            return;
        };

        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(listen_loop(shared, shutdown_rx));
        *self.task.lock() = Some(handle);
    }

    /// Whether `listen` has been called.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// The fatal error or cancellation that stopped this demultiplexer, if
    /// one has occurred.
    #[must_use]
    pub fn fault(&self) -> Option<StreamError> {
        self.shared.failure()
    }

    /// Obtain a typed consumer handle for one stream.
    ///
    /// Same resolution contract as the producer side: the stream must exist
    /// and `T` must be its value type. Handles hold a non-owning
    /// back-reference and fail with [`StreamError::Detached`] once the
    /// demultiplexer is gone.
    ///
    /// # Errors
    /// [`StreamError::UnknownStream`] or [`StreamError::TypeMismatch`].
    pub fn get_stream<T: Send + 'static>(
        &self,
        stream_id: StreamId,
    ) -> Result<ConsumerHandle<T>> {
        let descriptor = self.shared.spec.resolve(stream_id)?;
        if !descriptor.is_value_type::<T>() {
            return Err(StreamError::TypeMismatch { stream_id });
        }

        Ok(ConsumerHandle {
            stream_id,
            shared: Arc::downgrade(&self.shared),
            _marker: PhantomData,
        })
    }

    /// Stop the listen loop and fail every pending wait with
    /// [`StreamError::Cancelled`]. Idempotent.
    pub async fn shutdown(&self) {
        // Dropping the sender closes the channel; the loop's recv() arm
        // observes it and exits.
        drop(self.shutdown_tx.lock().take());

        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        // Covers the never-listened case, where no loop exists to do it.
        self.shared.fail(StreamError::Cancelled);
    }
}

impl Drop for Demultiplexer {
    fn drop(&mut self) {
        drop(self.shutdown_tx.lock().take());
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        self.shared.fail(StreamError::Cancelled);
    }
}

async fn listen_loop(shared: Arc<DemuxShared>, mut shutdown_rx: mpsc::Receiver<()>) {
    // Resume from the log's own content: one below its first index. A
    // compacted log (snapshot-bounded) therefore replays exactly what it
    // still retains.
    let mut cursor = shared.log.first_index().prev();
    debug!(label = %shared.config.label, %cursor, "listen loop started");

    loop {
        let batch = tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!(label = %shared.config.label, "listen loop shutting down");
                shared.fail(StreamError::Cancelled);
                return;
            },
            result = shared.log.read_after(cursor) => match result {
                Ok(batch) => batch,
                Err(err) => {
                    debug!(label = %shared.config.label, %err, "log read failed; stopping");
                    shared.fail(StreamError::Log(err));
                    return;
                },
            },
        };

        let mut touched: SmallVec<[StreamId; 4]> = SmallVec::new();
        for entry in &batch {
            if let Err(err) = shared.dispatch_entry(entry) {
                error!(
                    label = %shared.config.label,
                    index = %entry.index,
                    %err,
                    "fatal decode failure; stopping listen loop"
                );
                shared.fail(err);
                return;
            }
            if !touched.contains(&entry.record.stream_id) {
                touched.push(entry.record.stream_id);
            }
            cursor = entry.index;
        }

        // Resolve after the whole batch so a waiter sees the full newly
        // contiguous span, not entry-by-entry fragments.
        for stream_id in touched {
            shared.resolve_ready(stream_id);
        }
    }
}

/// Typed handle for consuming one logical stream.
pub struct ConsumerHandle<T> {
    stream_id: StreamId,
    shared: Weak<DemuxShared>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> ConsumerHandle<T> {
    /// The stream this handle reads from.
    #[must_use]
    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    /// Wait until the stream has buffered content at or after `from`, then
    /// return an iterator over the available contiguous span.
    ///
    /// Resolves immediately if matching content is already buffered.
    /// Otherwise the request is queued and fulfilled from the listen loop
    /// when matching data arrives. Exactly one outstanding wait per logical
    /// waiter is expected; overlapping waits on one stream have unspecified
    /// interleaving.
    ///
    /// # Errors
    /// [`StreamError::Cancelled`] if the demultiplexer shuts down first,
    /// [`StreamError::Detached`] if it is already gone, or the fatal error
    /// that stopped the listen loop.
    pub async fn wait_for_iterator(&self, from: LogIndex) -> Result<RangeIter<T>> {
        let shared = self.shared.upgrade().ok_or(StreamError::Detached)?;
        let buffer = shared
            .streams
            .get(&self.stream_id)
            .ok_or(StreamError::UnknownStream { stream_id: self.stream_id })?;

        let rx = {
            let mut buf = buffer.lock();
            // Checked under the buffer lock: `fail` records the error
            // before sweeping waiters, so either we see it here or our
            // waiter is registered in time to be swept.
            if let Some(err) = shared.failure() {
                return Err(err);
            }
            if let Some(range) = buf.take_from(from) {
                return Ok(RangeIter::new(range));
            }
            buf.register_waiter(from)
        };

        match rx.await {
            Ok(result) => result.map(RangeIter::new),
            // Sender dropped without resolving: owner tore down abruptly.
            Err(_) => Err(StreamError::Cancelled),
        }
    }
}

impl<T> Clone for ConsumerHandle<T> {
    fn clone(&self) -> Self {
        Self {
            stream_id: self.stream_id,
            shared: Weak::clone(&self.shared),
            _marker: PhantomData,
        }
    }
}
