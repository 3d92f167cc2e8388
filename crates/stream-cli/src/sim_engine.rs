//! In-process stand-in for a playback engine.
//!
//! Consumes [`EngineCommand`]s, fetches chunks through the registry as the
//! virtual playhead reaches them and answers with [`EngineReport`]s. Runs a
//! single playthrough: it exits after reporting `playback_stopped`.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use audio_stream::LocalRegistry;
use audio_stream_types::{EngineCommand, EngineReport, Handshake};
use crossbeam_channel::{Receiver, Sender, TryRecvError};

pub struct SimEngine {
    registry: Arc<LocalRegistry>,
    reports: Sender<EngineReport>,
    handshake: Option<Handshake>,
    fetched: HashSet<u32>,
    position_ms: u64,
    speed: f64,
    channel_volumes: Vec<f64>,
    realtime: bool,
}

impl SimEngine {
    pub fn new(registry: Arc<LocalRegistry>, reports: Sender<EngineReport>, realtime: bool) -> Self {
        Self {
            registry,
            reports,
            handshake: None,
            fetched: HashSet::new(),
            position_ms: 0,
            speed: 1.0,
            channel_volumes: vec![1.0; 2],
            realtime,
        }
    }

    pub fn spawn(self, commands: Receiver<EngineCommand>) -> JoinHandle<Result<()>> {
        thread::spawn(move || self.run(commands))
    }

    fn run(mut self, commands: Receiver<EngineCommand>) -> Result<()> {
        let mut playing = false;
        loop {
            let next = if playing {
                match commands.try_recv() {
                    Ok(cmd) => Some(cmd),
                    Err(TryRecvError::Empty) => None,
                    Err(TryRecvError::Disconnected) => break,
                }
            } else {
                match commands.recv() {
                    Ok(cmd) => Some(cmd),
                    Err(_) => break,
                }
            };

            if let Some(cmd) = next {
                match cmd {
                    EngineCommand::LoadStream { handshake } => {
                        tracing::debug!(chunks = handshake.chunks.len(), "engine: stream loaded");
                        self.handshake = Some(handshake);
                        self.fetched.clear();
                        self.position_ms = 0;
                    }
                    EngineCommand::StartPlayback | EngineCommand::ResumePlayback => {
                        if self.handshake.is_none() {
                            tracing::warn!("engine: play requested before a stream was loaded");
                            continue;
                        }
                        playing = true;
                        self.report(EngineReport::PlaybackStarted)?;
                    }
                    EngineCommand::PausePlayback => {
                        playing = false;
                        self.report(EngineReport::PlaybackPaused)?;
                    }
                    EngineCommand::StopPlayback => {
                        self.report(EngineReport::PlaybackStopped)?;
                        return Ok(());
                    }
                    EngineCommand::SetPlaybackPosition { position_ms } => {
                        self.position_ms = position_ms;
                        self.report(EngineReport::PlaybackPosition { position_ms })?;
                    }
                    EngineCommand::SetVolume { volume } => {
                        self.channel_volumes.iter_mut().for_each(|v| *v = volume);
                        self.report_volume(volume)?;
                    }
                    EngineCommand::SetVolumeOnChannel { volume, channel } => {
                        if channel >= self.channel_volumes.len() {
                            self.channel_volumes.resize(channel + 1, 1.0);
                        }
                        self.channel_volumes[channel] = volume;
                        let master = self.channel_volumes.iter().cloned().fold(0.0, f64::max);
                        self.report_volume(master)?;
                    }
                    EngineCommand::SetPlaybackSpeed { speed } => {
                        self.speed = speed;
                        self.report(EngineReport::PlaybackSpeedChange { speed })?;
                    }
                    EngineCommand::SetBalance { balance } => {
                        self.report(EngineReport::BalanceChange { balance })?;
                    }
                    EngineCommand::SetEffects { effects } => {
                        tracing::info!(effects = effects.len(), "engine: effect chain replaced");
                    }
                }
            }

            if playing && self.advance()? {
                self.report(EngineReport::PlaybackStopped)?;
                return Ok(());
            }
        }
        Ok(())
    }

    /// Move the playhead one report interval. Returns `true` at end of stream.
    fn advance(&mut self) -> Result<bool> {
        let handshake = self
            .handshake
            .clone()
            .ok_or_else(|| anyhow!("no stream loaded"))?;
        let interval = handshake.position_report_interval_ms.max(1);
        if self.realtime {
            thread::sleep(Duration::from_millis(interval));
        }

        self.ensure_fetched(&handshake)?;
        let step = (interval as f64 * self.speed).round() as u64;
        self.position_ms = (self.position_ms + step.max(1)).min(handshake.duration_ms);
        self.report(EngineReport::PlaybackPosition {
            position_ms: self.position_ms,
        })?;
        Ok(self.position_ms >= handshake.duration_ms)
    }

    /// Fetch the chunk under the playhead plus the preload window.
    fn ensure_fetched(&mut self, handshake: &Handshake) -> Result<()> {
        let Some(last) = handshake.chunks.len().checked_sub(1) else {
            return Ok(());
        };
        let current = (self.position_ms / handshake.chunk_length_ms.max(1)) as usize;
        let end = (current + handshake.preload_chunks as usize).min(last);
        for chunk in &handshake.chunks[current.min(last)..=end] {
            if self.fetched.contains(&chunk.id) {
                continue;
            }
            let locator = chunk
                .locator
                .as_deref()
                .ok_or_else(|| anyhow!("chunk {} has no locator", chunk.id))?;
            let bytes = self
                .registry
                .fetch(locator)?
                .wait()
                .with_context(|| format!("fetch chunk {}", chunk.id))?;
            tracing::debug!(chunk_id = chunk.id, bytes = bytes.len(), "engine: chunk buffered");
            self.fetched.insert(chunk.id);
        }
        Ok(())
    }

    fn report_volume(&self, volume: f64) -> Result<()> {
        self.report(EngineReport::VolumeChange {
            volume,
            channel_volumes: self.channel_volumes.clone(),
        })
    }

    fn report(&self, report: EngineReport) -> Result<()> {
        self.reports
            .send(report)
            .map_err(|_| anyhow!("report channel closed"))
    }
}
