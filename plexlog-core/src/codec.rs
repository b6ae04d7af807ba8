//! Tag-bound serialization strategies.
//!
//! Each [`StreamTag`] is bound to one `(serializer, deserializer)` pair for
//! its stream's value type. The pairs are registered as type-erased entries
//! in the stream specification and dispatched through a lookup table, which
//! preserves the fail-fast-on-unknown-tag contract: an entry written under
//! a tag the reader does not know cannot be partially interpreted.
//!
//! [`StreamTag`]: crate::types::StreamTag

use crate::error::CodecError;
use crate::types::StreamTag;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A value moving through the demultiplexer before it reaches a typed handle.
pub(crate) type ErasedValue = Box<dyn Any + Send>;

/// One versioned serialization strategy for a stream's value type.
///
/// Implementations must be pure: encoding the same value twice yields
/// equivalent bytes, and `decode(encode(v)) == v` for every value of `T`.
pub trait TagCodec<T>: Send + Sync + 'static {
    /// Serialize a value into payload bytes.
    ///
    /// # Errors
    /// Returns [`CodecError`] if the value cannot be serialized.
    fn encode(&self, value: &T) -> Result<Bytes, CodecError>;

    /// Deserialize a value from payload bytes.
    ///
    /// # Errors
    /// Returns [`CodecError`] if the bytes are not a valid encoding.
    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

/// Compact binary codec backed by `bincode`.
pub struct BincodeCodec<T>(PhantomData<fn() -> T>);

impl<T> BincodeCodec<T> {
    /// Create a new bincode codec.
    #[must_use]
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for BincodeCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TagCodec<T> for BincodeCodec<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn encode(&self, value: &T) -> Result<Bytes, CodecError> {
        bincode::serialize(value).map(Bytes::from).map_err(|e| CodecError(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError> {
        bincode::deserialize(bytes).map_err(|e| CodecError(e.to_string()))
    }
}

/// Human-readable codec backed by `serde_json`.
///
/// Useful as an evolution tag when payloads need to stay inspectable.
pub struct JsonCodec<T>(PhantomData<fn() -> T>);

impl<T> JsonCodec<T> {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TagCodec<T> for JsonCodec<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn encode(&self, value: &T) -> Result<Bytes, CodecError> {
        serde_json::to_vec(value).map(Bytes::from).map_err(|e| CodecError(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError(e.to_string()))
    }
}

/// Type-erased `(encode, decode)` pair built once at spec construction.
#[derive(Clone)]
pub(crate) struct ErasedCodec {
    tag: StreamTag,
    encode: Arc<dyn Fn(&dyn Any) -> Result<Bytes, CodecError> + Send + Sync>,
    decode: Arc<dyn Fn(&[u8]) -> Result<ErasedValue, CodecError> + Send + Sync>,
}

impl ErasedCodec {
    /// Erase a typed codec into closures over `dyn Any`.
    pub(crate) fn erase<T, C>(tag: StreamTag, codec: C) -> Self
    where
        T: Send + 'static,
        C: TagCodec<T>,
    {
        let codec = Arc::new(codec);
        let encoder = Arc::clone(&codec);

        Self {
            tag,
            encode: Arc::new(move |value| {
                let value = value
                    .downcast_ref::<T>()
                    .ok_or_else(|| CodecError("value type does not match codec".to_string()))?;
                encoder.encode(value)
            }),
            decode: Arc::new(move |bytes| {
                codec.decode(bytes).map(|value| Box::new(value) as ErasedValue)
            }),
        }
    }

    /// The tag this codec is registered under.
    pub(crate) fn tag(&self) -> StreamTag {
        self.tag
    }

    /// Encode an erased value into payload bytes.
    pub(crate) fn encode_value(&self, value: &dyn Any) -> Result<Bytes, CodecError> {
        (self.encode)(value)
    }

    /// Decode payload bytes into an erased value.
    pub(crate) fn decode_value(&self, bytes: &[u8]) -> Result<ErasedValue, CodecError> {
        (self.decode)(bytes)
    }
}

impl fmt::Debug for ErasedCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedCodec").field("tag", &self.tag).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_bincode_round_trip() {
        let codec = BincodeCodec::<i64>::new();
        let bytes = codec.encode(&-42).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), -42);
    }

    #[test]
    fn test_json_round_trip() {
        let codec = JsonCodec::<String>::new();
        let bytes = codec.encode(&"a".to_string()).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), "a");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let codec = JsonCodec::<String>::new();
        assert!(codec.decode(b"{not json").is_err());
    }

    #[test]
    fn test_erased_round_trip() {
        let erased = ErasedCodec::erase(StreamTag::new(1), BincodeCodec::<u32>::new());

        let bytes = erased.encode_value(&7u32).unwrap();
        let value = erased.decode_value(&bytes).unwrap();
        assert_eq!(*value.downcast::<u32>().unwrap(), 7);
    }

    #[test]
    fn test_erased_rejects_wrong_value_type() {
        let erased = ErasedCodec::erase(StreamTag::new(1), BincodeCodec::<u32>::new());
        assert!(erased.encode_value(&"oops".to_string()).is_err());
    }

    proptest! {
        #[test]
        fn prop_bincode_round_trips_ints(value in any::<i64>()) {
            let codec = BincodeCodec::<i64>::new();
            let bytes = codec.encode(&value).unwrap();
            prop_assert_eq!(codec.decode(&bytes).unwrap(), value);
        }

        #[test]
        fn prop_json_round_trips_strings(value in ".*") {
            let codec = JsonCodec::<String>::new();
            let bytes = codec.encode(&value).unwrap();
            prop_assert_eq!(codec.decode(&bytes).unwrap(), value);
        }
    }
}
