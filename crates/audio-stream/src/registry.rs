//! Publication of chunks under fetch locators.
//!
//! A host that can serve bytes (an HTTP layer, a test harness) implements
//! [`ResourceRegistry`]. Registration is lazy: the registry stores a handle to
//! the stream and the chunk, and bytes are encoded only when fetched.

use std::collections::HashMap;

use audio_stream_types::ChunkDescriptor;
use parking_lot::RwLock;

use crate::error::StreamError;
use crate::stream::{ChunkResult, PendingChunk, Stream};

/// One publishable chunk: the stream that owns it plus its descriptor.
#[derive(Clone, Debug)]
pub struct ChunkResource {
    stream: Stream,
    chunk: ChunkDescriptor,
}

impl ChunkResource {
    pub fn new(stream: Stream, chunk: ChunkDescriptor) -> Self {
        Self { stream, chunk }
    }

    pub fn chunk(&self) -> &ChunkDescriptor {
        &self.chunk
    }

    pub fn mime_type(&self) -> &'static str {
        self.stream.mime_type()
    }

    /// Start (or join) the chunk's encode and return a readiness handle.
    pub fn fetch(&self) -> Result<PendingChunk, StreamError> {
        self.stream.fetch(self.chunk.id)
    }

    /// Deliver the chunk's bytes to `callback` once they are ready.
    pub fn write_to<F>(&self, callback: F) -> Result<(), StreamError>
    where
        F: FnOnce(ChunkResult) + Send + 'static,
    {
        self.stream.get_chunk_data(&self.chunk, callback)
    }
}

/// Host-provided store that maps locators to chunk resources.
pub trait ResourceRegistry: Send + Sync {
    /// Publish `resource` and return its locator.
    fn register(&self, resource: ChunkResource) -> String;

    /// Withdraw a locator. Returns `false` if it was not registered.
    fn unregister(&self, locator: &str) -> bool;
}

/// In-process registry with `{base}/{uuid}` locators.
pub struct LocalRegistry {
    base: String,
    entries: RwLock<HashMap<String, ChunkResource>>,
}

impl LocalRegistry {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve a locator and fetch its chunk.
    pub fn fetch(&self, locator: &str) -> Result<PendingChunk, StreamError> {
        let resource = self
            .resolve(locator)
            .ok_or_else(|| StreamError::UnknownLocator(locator.to_string()))?;
        resource.fetch()
    }

    pub fn resolve(&self, locator: &str) -> Option<ChunkResource> {
        self.entries.read().get(locator).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LocalRegistry {
    fn default() -> Self {
        Self::new("/audio-chunk")
    }
}

impl ResourceRegistry for LocalRegistry {
    fn register(&self, resource: ChunkResource) -> String {
        let locator = format!("{}/{}", self.base, uuid::Uuid::new_v4());
        tracing::trace!(chunk_id = resource.chunk.id, locator = %locator, "chunk registered");
        self.entries.write().insert(locator.clone(), resource);
        locator
    }

    fn unregister(&self, locator: &str) -> bool {
        self.entries.write().remove(locator).is_some()
    }
}
