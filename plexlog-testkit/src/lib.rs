//! # Plexlog Testkit
//!
//! Testing infrastructure for the plexlog stream multiplexing layer:
//! shared stream specifications, a wired-up end-to-end harness over the
//! in-memory log, and tracing setup for test binaries.
//!
//! The integration suites under `tests/` exercise the whole
//! produce-replicate-consume path: per-stream ordering under concurrent
//! producers, cross-stream independence, wait liveness, cancellation,
//! and deterministic replay.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod fixtures;
pub mod generators;
pub mod harness;
pub mod validators;

/// Install a tracing subscriber for test output.
///
/// Honors `RUST_LOG`; repeated calls are no-ops so every test can call it
/// unconditionally.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
