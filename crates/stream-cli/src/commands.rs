//! Subcommand implementations.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use audio_stream::decode::load_pcm;
use audio_stream::encoder::{PassthroughEncoder, WaveEncoder};
use audio_stream::timefmt::player_timestamp;
use audio_stream::{
    AudioPlayer, Encoder, FeatureSupport, LocalRegistry, PlayerConfig, Stream, command_channel,
    report_channel, spawn_report_listener,
};
use audio_stream_types::{Handshake, PlaybackState};

use crate::cli::Codec;
use crate::config::CliConfig;
use crate::sim_engine::SimEngine;

/// Decode `path` and build a stream with the configured chunking and codec.
pub fn open_stream(path: &Path, cfg: &CliConfig, codec: Codec) -> Result<Stream> {
    let decoded = load_pcm(path)?;
    tracing::info!(
        path = %path.display(),
        codec = decoded.info.codec.as_deref().unwrap_or("unknown"),
        bit_depth = ?decoded.info.bit_depth,
        "source opened"
    );

    let encoder: Arc<dyn Encoder> = match codec {
        Codec::Auto => FeatureSupport::builtin().choose(),
        Codec::Wave => Arc::new(WaveEncoder),
        Codec::Pcm => Arc::new(PassthroughEncoder),
    };
    Stream::with_config(decoded.pcm, decoded.format, encoder, cfg.stream.clone())
        .with_context(|| format!("build stream for {:?}", path))
}

pub fn inspect(stream: &Stream, player: &PlayerConfig, json: bool) -> Result<()> {
    if json {
        let handshake = Handshake {
            chunks: stream.chunks(),
            duration_ms: stream.duration_ms(),
            chunk_length_ms: stream.chunk_length_ms(),
            position_report_interval_ms: player.position_report_interval_ms,
            preload_chunks: player.preload_chunks,
        };
        println!("{}", serde_json::to_string_pretty(&handshake)?);
        return Ok(());
    }

    let format = stream.format();
    println!(
        "{} Hz, {} ch, {} bit | {} | {} chunks of {} ms (+{} ms overlap) | codec {}",
        format.sample_rate(),
        format.channels(),
        format.bits_per_sample(),
        player_timestamp(stream.duration_ms()),
        stream.chunk_count(),
        stream.chunk_length_ms(),
        stream.overlap_ms(),
        stream.encoder_kind(),
    );
    println!(
        "{:>4}  {:>9}  {:>9}  {:>7}  {:>8}  {:>12}  {:>12}",
        "id", "start_ms", "end_ms", "lead_in", "lead_out", "first_frame", "end_frame"
    );
    for chunk in stream.chunks() {
        println!(
            "{:>4}  {:>9}  {:>9}  {:>7}  {:>8}  {:>12}  {:>12}",
            chunk.id,
            chunk.start_time_offset_ms,
            chunk.end_time_offset_ms,
            chunk.lead_in_duration_ms,
            chunk.lead_out_duration_ms,
            chunk.start_sample_offset,
            chunk.end_sample_offset,
        );
    }
    Ok(())
}

pub fn export(stream: &Stream, out: &Path) -> Result<()> {
    std::fs::create_dir_all(out).with_context(|| format!("create {:?}", out))?;
    let ext = extension_for(stream.mime_type());

    let _status = stream.add_state_change_listener(|t| {
        tracing::trace!(chunk_id = t.chunk_id, from = ?t.from, to = ?t.to, "status");
    });

    let mut total = 0usize;
    for chunk in stream.chunks() {
        let bytes = stream
            .fetch(chunk.id)?
            .wait()
            .with_context(|| format!("encode chunk {}", chunk.id))?;
        let path = out.join(format!("chunk-{:04}.{ext}", chunk.id));
        std::fs::write(&path, &bytes).with_context(|| format!("write {:?}", path))?;
        tracing::info!(chunk_id = chunk.id, bytes = bytes.len(), path = %path.display(), "chunk written");
        total += bytes.len();
    }
    tracing::info!(chunks = stream.chunk_count(), bytes = total, "export complete");
    Ok(())
}

/// Play `stream` to the end through the simulated engine.
pub fn playthrough(stream: Stream, player_cfg: PlayerConfig, from_ms: u64, realtime: bool) -> Result<()> {
    let registry = Arc::new(LocalRegistry::default());
    let (link, commands) = command_channel();
    let (report_tx, reports) = report_channel();

    let engine = SimEngine::new(registry.clone(), report_tx, realtime).spawn(commands);
    let player = AudioPlayer::new(stream, registry, link, player_cfg)?;
    let sync = player.sync().clone();
    let listener = spawn_report_listener(sync.clone(), reports);

    let duration = sync.duration_string();
    let _state = sync.on_state_change(|state| tracing::info!(?state, "playback state"));
    let _position = sync.on_position_change(move |ms| {
        tracing::info!(position = %player_timestamp(*ms), duration = %duration, "position");
    });

    sync.play_from(from_ms)?;

    let result = engine
        .join()
        .map_err(|_| anyhow!("engine thread panicked"))?;
    listener
        .join()
        .map_err(|_| anyhow!("report listener panicked"))?;
    result?;

    if sync.state() != PlaybackState::Stopped {
        return Err(anyhow!("engine exited while {:?}", sync.state()));
    }
    Ok(())
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "audio/wav" => "wav",
        "audio/pcm" => "pcm",
        "audio/mpeg" => "mp3",
        "audio/ogg" => "ogg",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_follows_mime_type() {
        assert_eq!(extension_for("audio/wav"), "wav");
        assert_eq!(extension_for("application/octet-stream"), "bin");
    }
}
