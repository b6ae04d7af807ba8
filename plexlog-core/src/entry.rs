//! Physical log entry model and wire framing.
//!
//! The wire contract between multiplexer and demultiplexer is the lossless
//! triple `(StreamId, StreamTag, payload bytes)`. [`LogRecord`] carries that
//! triple; [`LogEntry`] is a record as handed back by the log, annotated
//! with the index and term the log assigned. The frame layout here is what
//! the in-memory reference log stores; an external log is free to embed the
//! triple in its own entry format as long as all three fields survive.

use crate::error::{CodecError, LogError};
use crate::types::{LogIndex, LogTerm, StreamId, StreamTag};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use crc32fast::Hasher;

/// Frame header: stream id, tag, payload length, payload checksum.
pub const FRAME_HEADER_LEN: usize = 16;

/// The multiplexed triple appended to the physical log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Logical stream the payload belongs to.
    pub stream_id: StreamId,
    /// Serialization tag the payload was written under.
    pub tag: StreamTag,
    /// Opaque serialized payload.
    pub payload: Bytes,
}

impl LogRecord {
    /// Create a new record.
    #[must_use]
    pub fn new(stream_id: StreamId, tag: StreamTag, payload: Bytes) -> Self {
        Self { stream_id, tag, payload }
    }

    /// Encode the record into a self-describing binary frame.
    ///
    /// Layout: `[stream_id: u32][tag: u32][payload_len: u32][crc32: u32][payload]`,
    /// all integers big-endian.
    ///
    /// # Errors
    /// Returns [`CodecError`] if the payload length does not fit the
    /// header's `u32` length field.
    pub fn encode_frame(&self) -> Result<Bytes, CodecError> {
        let payload_len = frame_payload_len(self.payload.len())?;
        let mut frame = BytesMut::with_capacity(FRAME_HEADER_LEN + self.payload.len());
        frame.put_u32(self.stream_id.value());
        frame.put_u32(self.tag.value());
        frame.put_u32(payload_len);
        frame.put_u32(checksum(&self.payload));
        frame.extend_from_slice(&self.payload);
        Ok(frame.freeze())
    }

    /// Decode a binary frame back into a record.
    ///
    /// # Errors
    /// Returns [`LogError::Corruption`] for truncated frames, length
    /// mismatches, or checksum failures. `index` is only used to report
    /// where the corruption was found.
    pub fn decode_frame(index: LogIndex, frame: &[u8]) -> Result<Self, LogError> {
        if frame.len() < FRAME_HEADER_LEN {
            return Err(LogError::Corruption {
                index,
                detail: format!("frame truncated: {} bytes", frame.len()),
            });
        }

        let mut header = &frame[..FRAME_HEADER_LEN];
        let stream_id = StreamId::new(header.get_u32());
        let tag = StreamTag::new(header.get_u32());
        let payload_len = header.get_u32() as usize;
        let expected_checksum = header.get_u32();

        let payload = &frame[FRAME_HEADER_LEN..];
        if payload.len() != payload_len {
            return Err(LogError::Corruption {
                index,
                detail: format!(
                    "payload length mismatch: header says {payload_len}, got {}",
                    payload.len()
                ),
            });
        }

        if checksum(payload) != expected_checksum {
            return Err(LogError::Corruption {
                index,
                detail: "payload checksum mismatch".to_string(),
            });
        }

        Ok(Self { stream_id, tag, payload: Bytes::copy_from_slice(payload) })
    }
}

/// A record as read back from the physical log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Index the log assigned on append.
    pub index: LogIndex,
    /// Term/epoch the log assigned on append; opaque to this layer.
    pub term: LogTerm,
    /// The multiplexed record.
    pub record: LogRecord,
}

impl LogEntry {
    /// Create a new entry.
    #[must_use]
    pub fn new(index: LogIndex, term: LogTerm, record: LogRecord) -> Self {
        Self { index, term, record }
    }
}

fn frame_payload_len(len: usize) -> Result<u32, CodecError> {
    u32::try_from(len).map_err(|_| CodecError(format!("payload too large for frame: {len} bytes")))
}

fn checksum(payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(payload);
    hasher.finalize()
}
