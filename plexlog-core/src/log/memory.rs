//! In-memory reference implementation of [`ReplicatedLog`].
//!
//! Stores encoded frames rather than decoded records so the wire path is
//! exercised end to end. Intended for tests and local development; a real
//! deployment points the multiplexing layer at a consensus-backed log.

use super::ReplicatedLog;
use crate::entry::{LogEntry, LogRecord};
use crate::error::LogError;
use crate::types::{LogIndex, LogTerm};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::debug;

struct StoredFrame {
    term: LogTerm,
    frame: Bytes,
}

struct MemoryLogState {
    frames: Vec<StoredFrame>,
    closed: bool,
}

/// In-memory, frame-encoded replicated log.
pub struct MemoryLog {
    state: RwLock<MemoryLogState>,
    first_index: u64,
    term: AtomicU64,
    leader: AtomicBool,
    // Bumped on every append and on close; readers long-poll on it.
    version: watch::Sender<u64>,
}

impl MemoryLog {
    /// Create an empty log whose first index is one.
    #[must_use]
    pub fn new() -> Self {
        Self::with_first_index(1)
    }

    /// Create an empty log starting at `first_index`, as a compacted log
    /// resumed from a snapshot would.
    #[must_use]
    pub fn with_first_index(first_index: u64) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            state: RwLock::new(MemoryLogState { frames: Vec::new(), closed: false }),
            first_index,
            term: AtomicU64::new(1),
            leader: AtomicBool::new(true),
            version,
        }
    }

    /// Append a pre-encoded frame without going through [`LogRecord`].
    ///
    /// Test hook for injecting frames the writing specification would never
    /// produce, e.g. unknown streams or corrupt payloads.
    pub fn append_raw(&self, frame: Bytes) -> Result<LogIndex, LogError> {
        let term = LogTerm::new(self.term.load(Ordering::Acquire));
        let index = {
            let mut state = self.state.write();
            if state.closed {
                return Err(LogError::Closed);
            }
            state.frames.push(StoredFrame { term, frame });
            LogIndex::new(self.first_index + state.frames.len() as u64 - 1)
        };
        self.version.send_modify(|v| *v += 1);
        Ok(index)
    }

    /// Close the log. Pending and future reads and appends fail with
    /// [`LogError::Closed`].
    pub fn close(&self) {
        self.state.write().closed = true;
        self.version.send_modify(|v| *v += 1);
        debug!("memory log closed");
    }

    /// Whether the log has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.read().closed
    }

    /// Stop accepting appends, as a replica that lost leadership would.
    /// Reads continue to be served.
    pub fn demote(&self) {
        self.leader.store(false, Ordering::Release);
    }

    /// Resume accepting appends under a new term.
    pub fn promote(&self) {
        self.term.fetch_add(1, Ordering::AcqRel);
        self.leader.store(true, Ordering::Release);
    }

    fn entries_after(&self, cursor: LogIndex) -> Result<Vec<LogEntry>, LogError> {
        let state = self.state.read();
        if state.closed {
            return Err(LogError::Closed);
        }

        // Clamp to the first stored index; a cursor below a compacted
        // prefix simply starts at the earliest retained entry.
        let start = cursor.value().saturating_add(1).max(self.first_index);
        let skip = start - self.first_index;

        let mut entries = Vec::new();
        for (offset, stored) in state.frames.iter().enumerate().skip(skip as usize) {
            let index = LogIndex::new(self.first_index + offset as u64);
            let record = LogRecord::decode_frame(index, &stored.frame)?;
            entries.push(LogEntry::new(index, stored.term, record));
        }
        Ok(entries)
    }
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReplicatedLog for MemoryLog {
    async fn append(&self, record: LogRecord) -> Result<LogIndex, LogError> {
        if !self.leader.load(Ordering::Acquire) {
            return Err(LogError::NotLeader);
        }
        let frame = record
            .encode_frame()
            .map_err(|e| LogError::Io(format!("frame encoding failed: {e}")))?;
        self.append_raw(frame)
    }

    async fn read_after(&self, cursor: LogIndex) -> Result<Vec<LogEntry>, LogError> {
        let mut version = self.version.subscribe();
        loop {
            let entries = self.entries_after(cursor)?;
            if !entries.is_empty() {
                return Ok(entries);
            }
            if version.changed().await.is_err() {
                // Log instance dropped out from under the reader.
                return Err(LogError::Closed);
            }
        }
    }

    fn first_index(&self) -> LogIndex {
        LogIndex::new(self.first_index)
    }

    fn last_index(&self) -> Option<LogIndex> {
        let state = self.state.read();
        if state.frames.is_empty() {
            None
        } else {
            Some(LogIndex::new(self.first_index + state.frames.len() as u64 - 1))
        }
    }
}
