//! End-to-end harness wiring a multiplexer and demultiplexer over one
//! in-memory log.

use plexlog_core::log::MemoryLog;
use plexlog_core::spec::StreamSpec;
use plexlog_core::{Demultiplexer, Multiplexer};
use std::sync::Arc;
use tracing::info;

/// A fully wired produce-replicate-consume pipeline over [`MemoryLog`].
///
/// The demultiplexer is already listening when the harness is returned.
/// Additional consumers over the same log (for replay and failover
/// scenarios) come from [`Harness::attach_consumer`].
pub struct Harness {
    spec: Arc<StreamSpec>,
    /// The shared physical log; exposed for leadership and closure control.
    pub log: Arc<MemoryLog>,
    /// Producer side.
    pub mux: Multiplexer,
    /// Consumer side, listening.
    pub demux: Demultiplexer,
}

impl Harness {
    /// Build a harness over the canonical two-stream fixture spec.
    #[must_use]
    pub fn new() -> Self {
        Self::with_spec(crate::fixtures::two_stream_spec())
    }

    /// Build a harness over an explicit specification.
    #[must_use]
    pub fn with_spec(spec: Arc<StreamSpec>) -> Self {
        let log = Arc::new(MemoryLog::new());
        let mux = Multiplexer::new(Arc::clone(&spec), log.clone());
        let demux = Demultiplexer::new(Arc::clone(&spec), log.clone());
        demux.listen();
        info!(streams = spec.len(), "harness wired over in-memory log");
        Self { spec, log, mux, demux }
    }

    /// The specification both sides were built from.
    #[must_use]
    pub fn spec(&self) -> &Arc<StreamSpec> {
        &self.spec
    }

    /// Attach a fresh, listening demultiplexer to the same log.
    ///
    /// Models a restarted or additional follower: it replays the log from
    /// its first retained index and must reconstruct the same per-stream
    /// sequences as the original consumer.
    #[must_use]
    pub fn attach_consumer(&self) -> Demultiplexer {
        let demux = Demultiplexer::new(Arc::clone(&self.spec), self.log.clone());
        demux.listen();
        demux
    }

    /// Shut down the primary consumer.
    pub async fn shutdown(&self) {
        self.demux.shutdown().await;
        info!("harness consumer shut down");
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
