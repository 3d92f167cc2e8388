//! Chunked audio streams with lazy encoding and controller-side playback sync.
//!
//! A [`Stream`] splits a PCM buffer into overlapping chunks and encodes each one
//! on first request. An [`AudioPlayer`] publishes those chunks through a
//! [`ResourceRegistry`] and keeps a [`PlaybackStateSync`] in step with the
//! playback engine's reports.

pub mod chunk;
pub mod compress;
pub mod config;
pub mod decode;
pub mod effects;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod format;
pub mod listeners;
pub mod player;
pub mod registry;
pub mod status;
pub mod stream;
pub mod sync;
pub mod timefmt;

pub use config::{CompressionConfig, PlayerConfig, StreamConfig};
pub use encoder::{Encoder, EncoderKind, FeatureSupport, choose_encoder};
pub use engine::{EngineLink, command_channel, report_channel};
pub use error::{StreamError, SyncError};
pub use format::PcmFormat;
pub use listeners::Subscription;
pub use player::AudioPlayer;
pub use registry::{ChunkResource, LocalRegistry, ResourceRegistry};
pub use stream::{ChunkBytes, ChunkResult, PendingChunk, Stream};
pub use sync::{PlaybackStateSync, VolumeChange, spawn_report_listener};
