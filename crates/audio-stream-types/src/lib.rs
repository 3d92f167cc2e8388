use serde::{Deserialize, Serialize};

/// Authoritative playback state held by the controller.
///
/// The engine keeps a replica; the controller only changes this value when the
/// engine reports a transition.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// Nothing is playing and the position is at the start.
    #[default]
    Stopped,
    /// The engine is rendering audio.
    Playing,
    /// Playback is suspended at the current position.
    Paused,
}

/// Coarse processing status of a stream while it prepares chunk data.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StreamStatus {
    /// No chunk is being prepared.
    #[default]
    Idle,
    /// Slicing raw PCM for a chunk.
    Reading,
    /// Running the optional compression pass.
    Compressing,
    /// Running the encoder.
    Encoding,
    /// Preparing encoded output for delivery.
    Serializing,
}

/// Time and sample boundaries of one independently fetchable chunk.
///
/// Sample offsets count frames (one sample per channel). Time offsets describe
/// the nominal window; the lead-in region precedes `start_time_offset_ms`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkDescriptor {
    /// Position of the chunk in the stream, starting at zero.
    pub id: u32,
    /// Nominal window start in milliseconds.
    pub start_time_offset_ms: u64,
    /// Nominal window end in milliseconds.
    pub end_time_offset_ms: u64,
    /// Length of the replayed tail of the previous chunk.
    pub lead_in_duration_ms: u64,
    /// Length of this chunk's tail replayed by the next chunk.
    pub lead_out_duration_ms: u64,
    /// Configured overlap between neighbouring chunks.
    pub overlap_time_ms: u64,
    /// First frame included in the chunk (inclusive).
    pub start_sample_offset: u64,
    /// End frame of the chunk (exclusive).
    pub end_sample_offset: u64,
    /// Fetch handle, present once the chunk is published.
    pub locator: Option<String>,
}

impl ChunkDescriptor {
    /// Number of frames covered by the chunk, lead-in included.
    pub fn frame_count(&self) -> u64 {
        self.end_sample_offset.saturating_sub(self.start_sample_offset)
    }

    /// Whether two descriptors describe the same region, ignoring the locator.
    pub fn same_region(&self, other: &ChunkDescriptor) -> bool {
        self.id == other.id
            && self.start_sample_offset == other.start_sample_offset
            && self.end_sample_offset == other.end_sample_offset
    }
}

/// Payload sent to the engine when a stream is attached to a player.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Handshake {
    /// Chunk table ordered by id.
    pub chunks: Vec<ChunkDescriptor>,
    /// Total stream duration in milliseconds.
    pub duration_ms: u64,
    /// Nominal chunk length in milliseconds.
    pub chunk_length_ms: u64,
    /// How often the engine should report its position.
    pub position_report_interval_ms: u64,
    /// Chunks the engine should fetch ahead of the playing one.
    pub preload_chunks: u32,
}

/// Effect kinds understood by the engine.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EffectName {
    Volume,
    Filter,
}

/// Effect parameter names.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PropertyName {
    Gain,
    Type,
    Frequency,
}

/// One named effect parameter in its flat string form.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EffectProperty {
    pub name: PropertyName,
    pub value: String,
}

/// Flat effect model pushed to the engine.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SharedEffect {
    /// Stable effect identity.
    pub id: String,
    pub name: EffectName,
    /// Ordered parameter list.
    pub properties: Vec<EffectProperty>,
}

/// Requests sent from the controller to the playback engine.
///
/// Commands never change controller state on their own; the engine answers with
/// an [`EngineReport`] when (and if) it acts on them.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum EngineCommand {
    /// Replace the engine's chunk table and timing parameters.
    LoadStream { handshake: Handshake },
    StartPlayback,
    PausePlayback,
    ResumePlayback,
    StopPlayback,
    SetPlaybackPosition { position_ms: u64 },
    /// Master volume ratio, `1.0` is unity gain.
    SetVolume { volume: f64 },
    SetVolumeOnChannel { volume: f64, channel: usize },
    /// Playback rate ratio, `1.0` is normal speed.
    SetPlaybackSpeed { speed: f64 },
    /// Left/right gain spread in `[-1.0, 1.0]`.
    SetBalance { balance: f64 },
    /// Full replacement of the effect chain.
    SetEffects { effects: Vec<SharedEffect> },
}

/// Status reports sent from the playback engine to the controller.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "report", rename_all = "snake_case")]
pub enum EngineReport {
    PlaybackStarted,
    PlaybackPaused,
    PlaybackStopped,
    PlaybackPosition { position_ms: u64 },
    VolumeChange { volume: f64, channel_volumes: Vec<f64> },
    PlaybackSpeedChange { speed: f64 },
    BalanceChange { balance: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_serialize_with_snake_case_tag() {
        let json = serde_json::to_value(EngineCommand::SetVolumeOnChannel {
            volume: 0.5,
            channel: 1,
        })
        .unwrap();
        assert_eq!(json["command"], "set_volume_on_channel");
        assert_eq!(json["channel"], 1);

        let json = serde_json::to_value(EngineCommand::StartPlayback).unwrap();
        assert_eq!(json["command"], "start_playback");
    }

    #[test]
    fn reports_parse_from_engine_json() {
        let report: EngineReport = serde_json::from_str(
            r#"{"report":"volume_change","volume":0.5,"channel_volumes":[0.5,0.25]}"#,
        )
        .unwrap();
        assert_eq!(
            report,
            EngineReport::VolumeChange {
                volume: 0.5,
                channel_volumes: vec![0.5, 0.25],
            }
        );

        let report: EngineReport =
            serde_json::from_str(r#"{"report":"playback_position","position_ms":1200}"#).unwrap();
        assert_eq!(report, EngineReport::PlaybackPosition { position_ms: 1200 });
    }

    #[test]
    fn descriptor_region_ignores_locator() {
        let a = ChunkDescriptor {
            id: 1,
            start_sample_offset: 10,
            end_sample_offset: 20,
            ..Default::default()
        };
        let mut b = a.clone();
        b.locator = Some("/audio-chunk/x".to_string());
        assert!(a.same_region(&b));
        assert_eq!(a.frame_count(), 10);

        b.end_sample_offset = 21;
        assert!(!a.same_region(&b));
    }

    #[test]
    fn handshake_carries_chunk_table() {
        let handshake = Handshake {
            chunks: vec![ChunkDescriptor::default()],
            duration_ms: 10_000,
            chunk_length_ms: 5_000,
            position_report_interval_ms: 500,
            preload_chunks: 1,
        };
        let json = serde_json::to_value(EngineCommand::LoadStream {
            handshake: handshake.clone(),
        })
        .unwrap();
        assert_eq!(json["command"], "load_stream");
        assert_eq!(json["handshake"]["duration_ms"], 10_000);
        assert_eq!(json["handshake"]["chunks"].as_array().unwrap().len(), 1);
    }
}
