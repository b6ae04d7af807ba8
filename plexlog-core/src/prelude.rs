//! # Prelude
//!
//! Convenient access to the types most users of this crate need.

pub use crate::{
    codec::{BincodeCodec, JsonCodec, TagCodec},
    config::DemuxConfig,
    demux::{ConsumerHandle, Demultiplexer, RangeIter},
    error::{CodecError, LogError, Result, SpecError, StreamError},
    log::{MemoryLog, ReplicatedLog},
    mux::{Multiplexer, ProducerHandle},
    spec::{StreamDef, StreamSpec},
    types::{LogIndex, LogTerm, StreamId, StreamTag},
};

pub use bytes::Bytes;
