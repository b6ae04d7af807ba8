//! # Plexlog Core
//!
//! Typed logical streams multiplexed over a single replicated log.
//!
//! A consensus-replicated log gives a cluster one totally ordered,
//! durable sequence of entries. Plexlog lets many independent components
//! share that sequence: each declares a logical stream with its own value
//! type and serialization, producers append typed values through a
//! [`Multiplexer`], and consumers recover per-stream ordered sequences
//! through a [`Demultiplexer`] without ever observing each other's
//! entries.
//!
//! ## Quick Start
//!
//! ```rust
//! use plexlog_core::codec::BincodeCodec;
//! use plexlog_core::log::MemoryLog;
//! use plexlog_core::spec::{StreamDef, StreamSpec};
//! use plexlog_core::types::{LogIndex, StreamId, StreamTag};
//! use plexlog_core::{Demultiplexer, Multiplexer};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let spec = Arc::new(
//!         StreamSpec::builder()
//!             .stream(
//!                 StreamDef::<i64>::new(StreamId::new(1), "counters")
//!                     .tag(StreamTag::new(1), BincodeCodec::new()),
//!             )
//!             .build()?,
//!     );
//!
//!     let log = Arc::new(MemoryLog::new());
//!     let mux = Multiplexer::new(Arc::clone(&spec), log.clone());
//!     let demux = Demultiplexer::new(spec, log);
//!     demux.listen();
//!
//!     let producer = mux.get_stream::<i64>(StreamId::new(1))?;
//!     let index = producer.insert(&42).await?;
//!
//!     let consumer = demux.get_stream::<i64>(StreamId::new(1))?;
//!     let mut iter = consumer.wait_for_iterator(LogIndex::new(1)).await?;
//!     assert_eq!(iter.next(), Some((index, 42)));
//!
//!     demux.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`]: index, term, and stream identifier newtypes
//! - [`spec`]: immutable stream specifications and their builder
//! - [`codec`]: per-tag serialization, typed and type-erased
//! - [`entry`]: the physical frame format written to the log
//! - [`log`]: the replicated-log abstraction and an in-memory implementation
//! - [`mux`]: the producer side
//! - [`demux`]: the consumer side and its range iterators
//! - [`config`]: demultiplexer tunables
//! - [`error`]: the error taxonomy shared by both sides

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod config;
pub mod demux;
pub mod entry;
pub mod error;
pub mod log;
pub mod mux;
pub mod prelude;
pub mod spec;
pub mod types;

pub use config::DemuxConfig;
pub use demux::{ConsumerHandle, Demultiplexer, RangeIter};
pub use error::{CodecError, LogError, Result, SpecError, StreamError};
pub use mux::{Multiplexer, ProducerHandle};
pub use spec::{StreamDef, StreamSpec, StreamSpecBuilder};
pub use types::{LogIndex, LogTerm, StreamId, StreamTag};
