//! Stream specification: the config-time registry of logical streams.
//!
//! A [`StreamSpec`] maps each [`StreamId`] to a [`StreamDescriptor`]
//! describing the stream's value type and its table of versioned
//! serialization tags. The specification is immutable after construction
//! and shared read-only between the multiplexer and any number of
//! demultiplexers; writer and reader must agree on it for the log to be
//! interpretable.

use crate::codec::{ErasedCodec, TagCodec};
use crate::error::{SpecError, StreamError};
use crate::types::{StreamId, StreamTag};
use smallvec::SmallVec;
use std::any::TypeId;
use std::collections::HashMap;
use std::marker::PhantomData;

/// Typed definition of one logical stream, consumed by [`StreamSpecBuilder`].
///
/// The first registered tag becomes the write tag unless
/// [`StreamDef::write_tag`] selects another one.
pub struct StreamDef<T> {
    id: StreamId,
    name: &'static str,
    codecs: SmallVec<[ErasedCodec; 2]>,
    write_tag: Option<StreamTag>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> StreamDef<T> {
    /// Start defining a stream with the given id and diagnostic name.
    #[must_use]
    pub fn new(id: StreamId, name: &'static str) -> Self {
        Self { id, name, codecs: SmallVec::new(), write_tag: None, _marker: PhantomData }
    }

    /// Register a serialization tag for this stream.
    #[must_use]
    pub fn tag(mut self, tag: StreamTag, codec: impl TagCodec<T>) -> Self {
        self.codecs.push(ErasedCodec::erase(tag, codec));
        self
    }

    /// Select which registered tag new inserts are written under.
    #[must_use]
    pub fn write_tag(mut self, tag: StreamTag) -> Self {
        self.write_tag = Some(tag);
        self
    }

    fn into_descriptor(self) -> Result<StreamDescriptor, SpecError> {
        let Some(first) = self.codecs.first() else {
            return Err(SpecError::NoTags { stream_id: self.id });
        };

        let write_tag = self.write_tag.unwrap_or_else(|| first.tag());
        if !self.codecs.iter().any(|c| c.tag() == write_tag) {
            return Err(SpecError::UnknownWriteTag { stream_id: self.id, tag: write_tag });
        }

        for (i, codec) in self.codecs.iter().enumerate() {
            if self.codecs[..i].iter().any(|c| c.tag() == codec.tag()) {
                return Err(SpecError::DuplicateTag { stream_id: self.id, tag: codec.tag() });
            }
        }

        Ok(StreamDescriptor {
            id: self.id,
            name: self.name,
            value_type: TypeId::of::<T>(),
            value_type_name: std::any::type_name::<T>(),
            write_tag,
            codecs: self.codecs,
        })
    }
}

/// Immutable description of one logical stream.
#[derive(Debug)]
pub struct StreamDescriptor {
    id: StreamId,
    name: &'static str,
    value_type: TypeId,
    value_type_name: &'static str,
    write_tag: StreamTag,
    codecs: SmallVec<[ErasedCodec; 2]>,
}

impl StreamDescriptor {
    /// The stream's id.
    #[must_use]
    pub fn id(&self) -> StreamId {
        self.id
    }

    /// The stream's diagnostic name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The tag new inserts are written under.
    #[must_use]
    pub fn write_tag(&self) -> StreamTag {
        self.write_tag
    }

    /// Name of the stream's value type, for diagnostics.
    #[must_use]
    pub fn value_type_name(&self) -> &'static str {
        self.value_type_name
    }

    /// Whether `T` is the stream's value type.
    #[must_use]
    pub fn is_value_type<T: 'static>(&self) -> bool {
        self.value_type == TypeId::of::<T>()
    }

    pub(crate) fn codec_for(&self, tag: StreamTag) -> Option<&ErasedCodec> {
        self.codecs.iter().find(|c| c.tag() == tag)
    }
}

/// Builder for a [`StreamSpec`].
#[derive(Default)]
pub struct StreamSpecBuilder {
    descriptors: Vec<StreamDescriptor>,
    error: Option<SpecError>,
}

impl StreamSpecBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stream definition.
    #[must_use]
    pub fn stream<T: Send + 'static>(mut self, def: StreamDef<T>) -> Self {
        if self.error.is_some() {
            return self;
        }
        match def.into_descriptor() {
            Ok(descriptor) => self.descriptors.push(descriptor),
            Err(err) => self.error = Some(err),
        }
        self
    }

    /// Finalize the specification.
    ///
    /// # Errors
    /// Returns [`SpecError`] on duplicate stream ids, duplicate tags,
    /// tagless streams, or an unregistered write tag.
    pub fn build(self) -> Result<StreamSpec, SpecError> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let mut streams = HashMap::with_capacity(self.descriptors.len());
        for descriptor in self.descriptors {
            let id = descriptor.id();
            if streams.insert(id, descriptor).is_some() {
                return Err(SpecError::DuplicateStream { stream_id: id });
            }
        }
        Ok(StreamSpec { streams })
    }
}

/// The registry of logical streams multiplexed over one physical log.
#[derive(Debug)]
pub struct StreamSpec {
    streams: HashMap<StreamId, StreamDescriptor>,
}

impl StreamSpec {
    /// Start building a specification.
    #[must_use]
    pub fn builder() -> StreamSpecBuilder {
        StreamSpecBuilder::new()
    }

    /// Look up a stream descriptor.
    ///
    /// # Errors
    /// Returns [`StreamError::UnknownStream`] if the id is not registered.
    pub fn resolve(&self, stream_id: StreamId) -> Result<&StreamDescriptor, StreamError> {
        self.streams.get(&stream_id).ok_or(StreamError::UnknownStream { stream_id })
    }

    /// Look up the codec registered under `(stream_id, tag)`.
    ///
    /// # Errors
    /// Returns [`StreamError::UnknownStream`] or [`StreamError::UnknownTag`].
    pub(crate) fn resolve_tag(
        &self,
        stream_id: StreamId,
        tag: StreamTag,
    ) -> Result<&ErasedCodec, StreamError> {
        self.resolve(stream_id)?
            .codec_for(tag)
            .ok_or(StreamError::UnknownTag { stream_id, tag })
    }

    /// Iterate over all registered stream ids.
    pub fn stream_ids(&self) -> impl Iterator<Item = StreamId> + '_ {
        self.streams.keys().copied()
    }

    /// Number of registered streams.
    #[must_use]
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Whether the specification is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}
