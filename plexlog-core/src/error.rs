//! Error types for the multiplexing layer.
//!
//! Errors are split by origin: [`LogError`] is the failure surface of the
//! external replicated log and is propagated verbatim (no retries at this
//! layer), [`SpecError`] covers stream specification construction, and
//! [`StreamError`] is the unified error surfaced to producers and consumers.

use crate::types::{LogIndex, StreamId, StreamTag};
use thiserror::Error;

/// Result type alias for stream operations.
pub type Result<T> = std::result::Result<T, StreamError>;

/// Failures originating in the external replicated log.
///
/// This layer has no basis for deciding whether a retry is safe (after a
/// leadership change the whole log may be gone), so these are handed to the
/// caller unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LogError {
    /// The local node is not the leader for this log.
    #[error("not the leader for this log")]
    NotLeader,

    /// The log has been closed or torn down.
    #[error("log is closed")]
    Closed,

    /// An I/O or transport failure inside the log.
    #[error("log I/O error: {0}")]
    Io(String),

    /// An entry could not be decoded from its stored frame, or the log
    /// violated its ordering contract.
    #[error("corrupt entry at index {index}: {detail}")]
    Corruption {
        /// Index of the offending entry.
        index: LogIndex,
        /// What was wrong with it.
        detail: String,
    },
}

/// Failure to encode or decode a payload under a registered tag.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct CodecError(pub String);

/// Errors raised while building a [`StreamSpec`].
///
/// [`StreamSpec`]: crate::spec::StreamSpec
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    /// Two stream definitions used the same id.
    #[error("duplicate stream id: {stream_id}")]
    DuplicateStream {
        /// The id registered twice.
        stream_id: StreamId,
    },

    /// One stream definition registered the same tag twice.
    #[error("duplicate tag {tag} for stream {stream_id}")]
    DuplicateTag {
        /// Stream the tag belongs to.
        stream_id: StreamId,
        /// The tag registered twice.
        tag: StreamTag,
    },

    /// A stream definition carried no tags at all.
    #[error("stream {stream_id} has no registered tags")]
    NoTags {
        /// The tagless stream.
        stream_id: StreamId,
    },

    /// The selected write tag is not among the stream's registered tags.
    #[error("write tag {tag} is not registered for stream {stream_id}")]
    UnknownWriteTag {
        /// Stream the tag was selected for.
        stream_id: StreamId,
        /// The unregistered tag.
        tag: StreamTag,
    },
}

/// Unified error type for multiplexer and demultiplexer operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The stream id is not present in the stream specification.
    ///
    /// Fail-fast on the write path; fatal for the demultiplexer on the
    /// read path, since skipping the entry would corrupt stream ordering.
    #[error("unknown stream: {stream_id}")]
    UnknownStream {
        /// The unresolvable id.
        stream_id: StreamId,
    },

    /// The tag is not registered for the given stream.
    ///
    /// Same contract as [`StreamError::UnknownStream`]: reject before any
    /// append on the write path, fatal on the read path.
    #[error("unknown tag {tag} for stream {stream_id}")]
    UnknownTag {
        /// Stream the tag was looked up on.
        stream_id: StreamId,
        /// The unresolvable tag.
        tag: StreamTag,
    },

    /// A typed handle was requested with a value type that does not match
    /// the stream's descriptor.
    #[error("value type mismatch for stream {stream_id}")]
    TypeMismatch {
        /// The mismatched stream.
        stream_id: StreamId,
    },

    /// A payload failed to encode or decode under its registered tag.
    #[error("codec failure for stream {stream_id} tag {tag}: {detail}")]
    Codec {
        /// Stream the payload belongs to.
        stream_id: StreamId,
        /// Tag the payload was written under.
        tag: StreamTag,
        /// Underlying codec failure.
        detail: String,
    },

    /// An invalid runtime configuration value.
    #[error("configuration error: {detail}")]
    Configuration {
        /// What was invalid.
        detail: String,
    },

    /// A failure from the physical log, propagated verbatim.
    #[error(transparent)]
    Log(#[from] LogError),

    /// A pending wait was resolved because the demultiplexer shut down.
    ///
    /// Distinct from [`StreamError::Log`] so callers can tell "the reader
    /// went away" apart from "the log itself failed".
    #[error("wait cancelled: demultiplexer shut down")]
    Cancelled,

    /// The handle outlived the multiplexer or demultiplexer it was
    /// obtained from.
    #[error("handle detached: owner has been dropped")]
    Detached,
}

impl StreamError {
    /// Whether this error is fatal for a demultiplexer's listen loop.
    ///
    /// Fatal errors indicate the reader's specification cannot interpret
    /// what was written; continuing would silently desynchronize stream
    /// ordering.
    #[must_use]
    pub fn is_fatal_decode(&self) -> bool {
        matches!(
            self,
            Self::UnknownStream { .. } | Self::UnknownTag { .. } | Self::Codec { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_error_conversion() {
        let err: StreamError = LogError::NotLeader.into();
        assert_eq!(err, StreamError::Log(LogError::NotLeader));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(StreamError::UnknownStream { stream_id: StreamId::new(9) }.is_fatal_decode());
        assert!(StreamError::UnknownTag {
            stream_id: StreamId::new(1),
            tag: StreamTag::new(2)
        }
        .is_fatal_decode());
        assert!(StreamError::Codec {
            stream_id: StreamId::new(1),
            tag: StreamTag::new(1),
            detail: "truncated".into()
        }
        .is_fatal_decode());

        assert!(!StreamError::Cancelled.is_fatal_decode());
        assert!(!StreamError::Log(LogError::NotLeader).is_fatal_decode());
    }

    #[test]
    fn test_display() {
        let err = StreamError::UnknownTag { stream_id: StreamId::new(1), tag: StreamTag::new(4) };
        assert_eq!(err.to_string(), "unknown tag 4 for stream 1");
    }
}
