use serde::Deserialize;

/// Chunking parameters applied when a stream is built.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Nominal chunk window in milliseconds.
    pub chunk_length_ms: u64,
    /// Lead-in replayed from the previous chunk, in milliseconds.
    pub overlap_ms: u64,
    /// Optional dynamic range compression before encoding.
    pub compression: Option<CompressionConfig>,
}

impl Default for StreamConfig {
    /// Five second chunks with a 100ms lead-in and no compression.
    fn default() -> Self {
        Self {
            chunk_length_ms: 5000,
            overlap_ms: 100,
            compression: None,
        }
    }
}

/// Hard-knee compressor settings.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompressionConfig {
    /// Level above which gain reduction starts, as a ratio of full scale.
    pub threshold: f32,
    /// Input/output slope above the threshold (`4.0` means 4:1).
    pub ratio: f32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            ratio: 4.0,
        }
    }
}

/// Per-player parameters shared with the engine in the handshake.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Interval at which the engine reports its position.
    pub position_report_interval_ms: u64,
    /// Chunks fetched ahead of the one currently playing.
    pub preload_chunks: u32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            position_report_interval_ms: 500,
            preload_chunks: 1,
        }
    }
}
