//! Identifier newtypes shared across the multiplexing layer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of an entry in the physical replicated log.
///
/// Indexes are strictly increasing and gap-free from this layer's point of
/// view: each index maps to exactly one entry for the lifetime of the log.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct LogIndex(pub u64);

impl LogIndex {
    /// Index zero, one below the first index of a freshly created log.
    pub const ZERO: Self = Self(0);

    /// Create a new log index.
    #[must_use]
    pub const fn new(index: u64) -> Self {
        Self(index)
    }

    /// Get the next index.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Get the previous index, saturating at zero.
    #[must_use]
    pub const fn prev(self) -> Self {
        Self(self.0.saturating_sub(1))
    }

    /// Get the raw index value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LogIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for LogIndex {
    fn from(index: u64) -> Self {
        Self(index)
    }
}

/// Term (epoch) of a physical log entry.
///
/// Assigned by the external log's consensus protocol and carried through
/// this layer without interpretation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct LogTerm(pub u64);

impl LogTerm {
    /// Create a new log term.
    #[must_use]
    pub const fn new(term: u64) -> Self {
        Self(term)
    }

    /// Get the raw term value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LogTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for LogTerm {
    fn from(term: u64) -> Self {
        Self(term)
    }
}

/// Identifier of one logical stream within a [`StreamSpec`].
///
/// Unique within a specification and stable across the lifetime of the log;
/// changing a stream's id is a schema migration, which this layer does not
/// attempt to support.
///
/// [`StreamSpec`]: crate::spec::StreamSpec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId(pub u32);

impl StreamId {
    /// Create a new stream id.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw id value.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for StreamId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Identifier of one versioned serialization strategy bound to a stream.
///
/// Multiple tags may exist per stream over time for schema evolution. A tag
/// that has been used to write an entry must keep decoding with the same
/// semantic meaning; backward compatibility across tag versions is the
/// caller's responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamTag(pub u32);

impl StreamTag {
    /// Create a new stream tag.
    #[must_use]
    pub const fn new(tag: u32) -> Self {
        Self(tag)
    }

    /// Get the raw tag value.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for StreamTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for StreamTag {
    fn from(tag: u32) -> Self {
        Self(tag)
    }
}
