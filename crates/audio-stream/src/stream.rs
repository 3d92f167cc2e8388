//! Chunked PCM stream with lazy, cached per-chunk encoding.
//!
//! A [`Stream`] computes its chunk table once, at construction. Encoded bytes are
//! produced on the first request for a chunk and cached for the stream's
//! lifetime, failures included. Each chunk has its own guard, so distinct
//! chunks encode independently while concurrent requests for the same chunk
//! share a single encode.

use std::borrow::Cow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use audio_stream_types::{ChunkDescriptor, StreamStatus};
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use parking_lot::{Mutex, RwLock};

use crate::chunk;
use crate::compress::compress_in_place;
use crate::config::StreamConfig;
use crate::encoder::{Encoder, EncoderError, EncoderKind};
use crate::error::StreamError;
use crate::format::PcmFormat;
use crate::listeners::Subscription;
use crate::status::{StatusTracker, StatusTransition};

/// Encoded chunk payload shared between the cache and every caller.
pub type ChunkBytes = Arc<[u8]>;

/// Result delivered to chunk data callbacks.
pub type ChunkResult = Result<ChunkBytes, StreamError>;

type ChunkCallback = Box<dyn FnOnce(ChunkResult) + Send>;

enum ChunkSlot {
    Empty,
    /// Encode in flight; callbacks waiting for its result.
    Encoding(Vec<ChunkCallback>),
    Ready(ChunkBytes),
    Failed(StreamError),
}

struct StreamInner {
    pcm: Arc<[u8]>,
    format: PcmFormat,
    encoder: Arc<dyn Encoder>,
    config: StreamConfig,
    total_frames: u64,
    duration_ms: u64,
    chunks: RwLock<Vec<ChunkDescriptor>>,
    slots: Vec<Mutex<ChunkSlot>>,
    status: StatusTracker,
}

/// Handle to a chunked audio source. Cloning shares the same buffer and cache.
#[derive(Clone)]
pub struct Stream {
    inner: Arc<StreamInner>,
}

impl Stream {
    /// Build a stream with `chunk_length_ms` windows and the default overlap.
    pub fn new(
        pcm: impl Into<Arc<[u8]>>,
        format: PcmFormat,
        encoder: Arc<dyn Encoder>,
        chunk_length_ms: u64,
    ) -> Result<Self, StreamError> {
        let config = StreamConfig {
            chunk_length_ms,
            ..StreamConfig::default()
        };
        Self::with_config(pcm, format, encoder, config)
    }

    /// Build a stream and compute its chunk table.
    pub fn with_config(
        pcm: impl Into<Arc<[u8]>>,
        format: PcmFormat,
        encoder: Arc<dyn Encoder>,
        config: StreamConfig,
    ) -> Result<Self, StreamError> {
        let pcm: Arc<[u8]> = pcm.into();
        if pcm.is_empty() {
            return Err(StreamError::EmptyBuffer);
        }
        if format.bytes_per_frame() == 0 {
            return Err(StreamError::InvalidFormat("frame size is zero".to_string()));
        }
        if !encoder.is_supported() {
            return Err(StreamError::UnsupportedCodec(encoder.kind()));
        }

        let total_frames = format.frames_in(pcm.len());
        let trailing = pcm.len() - format.frame_to_byte(total_frames);
        if trailing > 0 {
            tracing::warn!(
                trailing_bytes = trailing,
                "PCM buffer ends with a partial frame; ignoring it"
            );
        }

        let chunks = chunk::partition(
            &format,
            total_frames,
            config.chunk_length_ms,
            config.overlap_ms,
        )?;
        let slots = chunks.iter().map(|_| Mutex::new(ChunkSlot::Empty)).collect();
        let duration_ms = format.frames_to_ms(total_frames);

        tracing::info!(
            chunks = chunks.len(),
            duration_ms,
            chunk_length_ms = config.chunk_length_ms,
            overlap_ms = config.overlap_ms,
            codec = %encoder.kind(),
            "stream created"
        );

        Ok(Self {
            inner: Arc::new(StreamInner {
                pcm,
                format,
                encoder,
                config,
                total_frames,
                duration_ms,
                chunks: RwLock::new(chunks),
                slots,
                status: StatusTracker::new(),
            }),
        })
    }

    /// Chunk table ordered by id.
    pub fn chunks(&self) -> Vec<ChunkDescriptor> {
        self.inner.chunks.read().clone()
    }

    pub fn chunk(&self, id: u32) -> Option<ChunkDescriptor> {
        self.inner.chunks.read().get(id as usize).cloned()
    }

    pub fn chunk_count(&self) -> usize {
        self.inner.slots.len()
    }

    pub fn duration_ms(&self) -> u64 {
        self.inner.duration_ms
    }

    /// Nominal chunk length in milliseconds.
    pub fn chunk_length_ms(&self) -> u64 {
        self.inner.config.chunk_length_ms
    }

    pub fn overlap_ms(&self) -> u64 {
        self.inner.config.overlap_ms
    }

    pub fn format(&self) -> &PcmFormat {
        &self.inner.format
    }

    pub fn total_frames(&self) -> u64 {
        self.inner.total_frames
    }

    pub fn encoder_kind(&self) -> EncoderKind {
        self.inner.encoder.kind()
    }

    /// MIME type of the bytes returned for every chunk.
    pub fn mime_type(&self) -> &'static str {
        self.inner.encoder.mime_type()
    }

    /// Current coarse processing status.
    pub fn status(&self) -> StreamStatus {
        self.inner.status.current()
    }

    /// Observe every status transition, in order.
    pub fn add_state_change_listener<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&StatusTransition) + Send + Sync + 'static,
    {
        self.inner.status.subscribe(callback)
    }

    /// Deliver the encoded bytes of `descriptor` to `callback`, exactly once.
    ///
    /// Cached results (including cached failures) are delivered before this
    /// returns. Otherwise the callback runs when the chunk's single encode
    /// finishes, which may be on another thread. Unknown or stale descriptors
    /// fail immediately and the callback is never invoked.
    pub fn get_chunk_data<F>(&self, descriptor: &ChunkDescriptor, callback: F) -> Result<(), StreamError>
    where
        F: FnOnce(ChunkResult) + Send + 'static,
    {
        let index = self.resolve(descriptor)?;
        let mut slot = self.inner.slots[index].lock();

        let cached = match &*slot {
            ChunkSlot::Ready(bytes) => Some(Ok(bytes.clone())),
            ChunkSlot::Failed(err) => Some(Err(err.clone())),
            ChunkSlot::Empty | ChunkSlot::Encoding(_) => None,
        };
        if let Some(result) = cached {
            drop(slot);
            callback(result);
            return Ok(());
        }

        if let ChunkSlot::Encoding(waiters) = &mut *slot {
            tracing::trace!(chunk_id = descriptor.id, "joining in-flight encode");
            waiters.push(Box::new(callback));
            return Ok(());
        }

        *slot = ChunkSlot::Encoding(vec![Box::new(callback)]);
        drop(slot);
        self.start_encode(index);
        Ok(())
    }

    /// Request chunk `id` and get a handle that completes when its bytes are ready.
    pub fn fetch(&self, id: u32) -> Result<PendingChunk, StreamError> {
        let descriptor = self.chunk(id).ok_or(StreamError::ChunkNotFound { id })?;
        let (tx, rx) = crossbeam_channel::bounded(1);
        self.get_chunk_data(&descriptor, move |result| {
            let _ = tx.send(result);
        })?;
        Ok(PendingChunk { id, rx })
    }

    /// Drop every callback still waiting on an in-flight encode.
    ///
    /// The encodes themselves finish and populate the cache. Returns the number
    /// of callbacks discarded.
    pub fn cancel_pending(&self) -> usize {
        let mut dropped = 0;
        for slot in &self.inner.slots {
            if let ChunkSlot::Encoding(waiters) = &mut *slot.lock() {
                dropped += waiters.len();
                waiters.clear();
            }
        }
        if dropped > 0 {
            tracing::debug!(dropped, "pending chunk callbacks discarded");
        }
        dropped
    }

    pub(crate) fn set_locator(&self, id: u32, locator: Option<String>) {
        if let Some(chunk) = self.inner.chunks.write().get_mut(id as usize) {
            chunk.locator = locator;
        }
    }

    pub(crate) fn clear_locators(&self) {
        for chunk in self.inner.chunks.write().iter_mut() {
            chunk.locator = None;
        }
    }

    fn resolve(&self, descriptor: &ChunkDescriptor) -> Result<usize, StreamError> {
        let chunks = self.inner.chunks.read();
        chunks
            .get(descriptor.id as usize)
            .filter(|known| known.same_region(descriptor))
            .map(|_| descriptor.id as usize)
            .ok_or(StreamError::ChunkNotFound { id: descriptor.id })
    }

    fn start_encode(&self, index: usize) {
        if !self.inner.encoder.runs_async() {
            self.run_encode(index);
            return;
        }

        let stream = self.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("encode-chunk-{index}"))
            .spawn(move || stream.run_encode(index));
        if let Err(e) = spawned {
            tracing::warn!(chunk_id = index, "encode worker spawn failed, encoding inline: {e}");
            self.run_encode(index);
        }
    }

    fn run_encode(&self, index: usize) {
        let chunk = self.inner.chunks.read()[index].clone();
        let result = self.encode_chunk(&chunk);

        let waiters = {
            let mut slot = self.inner.slots[index].lock();
            let settled = match &result {
                Ok(bytes) => ChunkSlot::Ready(bytes.clone()),
                Err(err) => ChunkSlot::Failed(err.clone()),
            };
            match std::mem::replace(&mut *slot, settled) {
                ChunkSlot::Encoding(waiters) => waiters,
                _ => Vec::new(),
            }
        };

        for waiter in waiters {
            waiter(result.clone());
        }
    }

    fn encode_chunk(&self, chunk: &ChunkDescriptor) -> ChunkResult {
        let inner = &self.inner;
        let id = chunk.id;

        inner.status.set(id, StreamStatus::Reading);
        let start = inner.format.frame_to_byte(chunk.start_sample_offset);
        let end = inner.format.frame_to_byte(chunk.end_sample_offset);
        let mut pcm = Cow::Borrowed(&inner.pcm[start..end]);

        if let Some(compression) = &inner.config.compression {
            inner.status.set(id, StreamStatus::Compressing);
            compress_in_place(pcm.to_mut(), &inner.format, compression);
        }

        inner.status.set(id, StreamStatus::Encoding);
        let encoded = panic::catch_unwind(AssertUnwindSafe(|| {
            inner.encoder.encode(&pcm, &inner.format)
        }))
        .unwrap_or_else(|_| Err(EncoderError::Failed("encoder panicked".to_string())));

        match encoded {
            Ok(bytes) => {
                inner.status.set(id, StreamStatus::Serializing);
                let bytes: ChunkBytes = bytes.into();
                inner.status.set(id, StreamStatus::Idle);
                tracing::debug!(
                    chunk_id = id,
                    pcm_bytes = end - start,
                    encoded_bytes = bytes.len(),
                    "chunk encoded"
                );
                Ok(bytes)
            }
            Err(err) => {
                inner.status.set(id, StreamStatus::Idle);
                tracing::warn!(chunk_id = id, codec = %inner.encoder.kind(), "chunk encode failed: {err}");
                Err(match err {
                    EncoderError::Unsupported(kind) => StreamError::UnsupportedCodec(kind),
                    EncoderError::Failed(message) => StreamError::Encoding {
                        chunk_id: id,
                        message,
                    },
                })
            }
        }
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("format", &self.inner.format)
            .field("chunks", &self.inner.slots.len())
            .field("duration_ms", &self.inner.duration_ms)
            .field("codec", &self.inner.encoder.kind())
            .finish()
    }
}

/// Readiness handle for one chunk fetch.
///
/// Completes once with the chunk's bytes or error; reports
/// [`StreamError::Cancelled`] if the stream discarded the request.
#[derive(Debug)]
pub struct PendingChunk {
    id: u32,
    rx: Receiver<ChunkResult>,
}

impl PendingChunk {
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Block until the chunk is ready.
    pub fn wait(self) -> ChunkResult {
        self.rx
            .recv()
            .unwrap_or(Err(StreamError::Cancelled { id: self.id }))
    }

    /// Block for at most `timeout`; `None` if the chunk is still encoding.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<ChunkResult> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(StreamError::Cancelled { id: self.id })),
        }
    }

    /// Non-blocking check.
    pub fn try_get(&self) -> Option<ChunkResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(StreamError::Cancelled { id: self.id })),
        }
    }
}
