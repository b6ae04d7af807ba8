//! Shared stream specifications for test scenarios.

use plexlog_core::codec::{BincodeCodec, JsonCodec};
use plexlog_core::spec::{StreamDef, StreamSpec};
use plexlog_core::types::{StreamId, StreamTag};
use std::sync::Arc;

/// Integer-valued stream present in every fixture spec.
pub const INT_STREAM: StreamId = StreamId::new(1);
/// String-valued stream present in every fixture spec.
pub const STRING_STREAM: StreamId = StreamId::new(8);

/// Write tag used by both fixture streams.
pub const DEFAULT_TAG: StreamTag = StreamTag::new(1);
/// Secondary tag on the string stream, for multi-tag decode scenarios.
pub const JSON_TAG: StreamTag = StreamTag::new(2);

/// The canonical two-stream specification: bincode-framed integers on
/// stream 1 and strings on stream 8 with both a bincode write tag and a
/// JSON read tag.
///
/// # Panics
/// Never; the definition is statically well-formed.
pub fn two_stream_spec() -> Arc<StreamSpec> {
    let spec = StreamSpec::builder()
        .stream(StreamDef::<i64>::new(INT_STREAM, "ints").tag(DEFAULT_TAG, BincodeCodec::new()))
        .stream(
            StreamDef::<String>::new(STRING_STREAM, "strings")
                .tag(DEFAULT_TAG, BincodeCodec::new())
                .tag(JSON_TAG, JsonCodec::new()),
        )
        .build();
    match spec {
        Ok(spec) => Arc::new(spec),
        Err(err) => unreachable!("fixture spec is statically well-formed: {err}"),
    }
}

/// A single-stream variant for tests that only need integers.
///
/// # Panics
/// Never; the definition is statically well-formed.
pub fn int_only_spec() -> Arc<StreamSpec> {
    let spec = StreamSpec::builder()
        .stream(StreamDef::<i64>::new(INT_STREAM, "ints").tag(DEFAULT_TAG, BincodeCodec::new()))
        .build();
    match spec {
        Ok(spec) => Arc::new(spec),
        Err(err) => unreachable!("fixture spec is statically well-formed: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_specs_resolve() {
        let spec = two_stream_spec();
        assert!(spec.resolve(INT_STREAM).is_ok());
        assert!(spec.resolve(STRING_STREAM).is_ok());
        assert_eq!(spec.len(), 2);

        assert_eq!(int_only_spec().len(), 1);
    }
}
