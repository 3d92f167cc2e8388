//! Error types for stream construction, chunk delivery and playback sync.

use audio_stream_types::PlaybackState;

use crate::encoder::EncoderKind;

/// Failures surfaced by [`Stream`](crate::stream::Stream) and the chunk registry.
///
/// `Clone` so a failed encode can be cached and handed to every later caller.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// PCM description cannot be used to address frames.
    #[error("invalid PCM format: {0}")]
    InvalidFormat(String),

    /// Source buffer holds no complete frame.
    #[error("PCM buffer is empty")]
    EmptyBuffer,

    /// Chunk length/overlap settings cannot produce a valid partition.
    #[error("invalid stream configuration: {0}")]
    InvalidConfig(String),

    /// Descriptor is unknown or stale for this stream.
    #[error("chunk {id} not found")]
    ChunkNotFound { id: u32 },

    /// No resource is registered under the locator.
    #[error("no chunk registered at {0}")]
    UnknownLocator(String),

    /// Encoder is not available in this runtime.
    #[error("codec {0} is not supported")]
    UnsupportedCodec(EncoderKind),

    /// Encoder failed for a chunk. Not retried.
    #[error("encoding chunk {chunk_id} failed: {message}")]
    Encoding { chunk_id: u32, message: String },

    /// Pending fetch was dropped before completion (stream detached).
    #[error("chunk {id} fetch cancelled")]
    Cancelled { id: u32 },
}

/// Failures of a controller command.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    /// Command is not valid from the current authoritative state.
    #[error("cannot {command} while {state:?}")]
    InvalidTransition {
        command: &'static str,
        state: PlaybackState,
    },

    /// Command argument is out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Engine side of the command channel is gone.
    #[error("engine channel disconnected")]
    Disconnected,
}
