//! The physical replicated log seam.
//!
//! The log itself — consensus, durability, replication — is an external
//! collaborator. This module defines the minimum surface the multiplexing
//! layer consumes from it, plus [`MemoryLog`], an in-process reference
//! implementation used by tests and local development.

mod memory;

pub use memory::MemoryLog;

use crate::entry::{LogEntry, LogRecord};
use crate::error::LogError;
use crate::types::LogIndex;
use async_trait::async_trait;

/// Minimum surface required from the physical replicated log.
///
/// # Contract
///
/// - `append` assigns the next index in the log's total order and returns
///   it once the entry is durably accepted. Failures (`NotLeader`, `Closed`,
///   I/O) are surfaced as-is; the multiplexing layer never retries.
/// - `read_after` is a long-poll: it suspends until at least one entry with
///   an index strictly greater than `cursor` exists, then returns all such
///   entries currently available, in index order. It must never return an
///   entry at or below the cursor, never skip an index, and never reorder.
/// - Entries must carry the `(StreamId, StreamTag, payload)` triple
///   losslessly; the exact storage layout is the log's business.
#[async_trait]
pub trait ReplicatedLog: Send + Sync + 'static {
    /// Append a record, returning the index the log assigned.
    async fn append(&self, record: LogRecord) -> Result<LogIndex, LogError>;

    /// Return all entries with index strictly greater than `cursor`,
    /// suspending until at least one exists.
    async fn read_after(&self, cursor: LogIndex) -> Result<Vec<LogEntry>, LogError>;

    /// First index present in the log.
    ///
    /// May be greater than one for a log whose prefix has been compacted
    /// away behind a snapshot.
    fn first_index(&self) -> LogIndex;

    /// Highest index present in the log, if any entry exists.
    fn last_index(&self) -> Option<LogIndex>;
}
