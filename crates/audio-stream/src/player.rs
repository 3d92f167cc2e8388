//! Player: ties a [`Stream`] to a resource registry, the engine link and the
//! playback state sync.

use std::sync::Arc;

use audio_stream_types::{ChunkDescriptor, EngineCommand, Handshake, SharedEffect};

use crate::config::PlayerConfig;
use crate::effects::{Effect, EffectChain};
use crate::engine::EngineLink;
use crate::error::SyncError;
use crate::registry::{ChunkResource, ResourceRegistry};
use crate::stream::Stream;
use crate::sync::PlaybackStateSync;

/// Owns the attached stream and publishes its chunks to the engine.
///
/// While attached, every chunk is registered with the registry and its
/// descriptor carries the resulting locator. Dropping the player detaches it.
pub struct AudioPlayer {
    stream: Stream,
    registry: Arc<dyn ResourceRegistry>,
    link: EngineLink,
    config: PlayerConfig,
    sync: Arc<PlaybackStateSync>,
    effects: EffectChain,
    locators: Vec<String>,
}

impl AudioPlayer {
    /// Register `stream`'s chunks and hand the chunk table to the engine.
    pub fn new(
        stream: Stream,
        registry: Arc<dyn ResourceRegistry>,
        link: EngineLink,
        config: PlayerConfig,
    ) -> Result<Self, SyncError> {
        let sync = Arc::new(PlaybackStateSync::new(link.clone(), stream.duration_ms()));
        let mut player = Self {
            stream,
            registry,
            link,
            config,
            sync,
            effects: EffectChain::new(),
            locators: Vec::new(),
        };
        player.attach()?;
        Ok(player)
    }

    /// Replace the attached stream. The old stream's locators are withdrawn
    /// first and playback state starts over at `Stopped`, position 0.
    pub fn set_stream(&mut self, stream: Stream) -> Result<(), SyncError> {
        self.detach();
        self.sync.reset_for_stream(stream.duration_ms());
        self.stream = stream;
        self.attach()
    }

    /// Publish the chunks and send the handshake. No-op while already attached.
    pub fn attach(&mut self) -> Result<(), SyncError> {
        if self.is_attached() {
            return Ok(());
        }
        for chunk in self.stream.chunks() {
            let id = chunk.id;
            let locator = self
                .registry
                .register(ChunkResource::new(self.stream.clone(), chunk));
            self.stream.set_locator(id, Some(locator.clone()));
            self.locators.push(locator);
        }
        self.sync.set_duration(self.stream.duration_ms());
        tracing::info!(
            chunks = self.locators.len(),
            duration_ms = self.stream.duration_ms(),
            "stream attached"
        );

        self.link.send(EngineCommand::LoadStream {
            handshake: self.handshake(),
        })?;
        if !self.effects.is_empty() {
            self.push_effects()?;
        }
        Ok(())
    }

    /// Withdraw every locator and discard callbacks still waiting on encodes.
    pub fn detach(&mut self) {
        if !self.is_attached() {
            return;
        }
        let count = self.locators.len();
        for locator in self.locators.drain(..) {
            if !self.registry.unregister(&locator) {
                tracing::warn!(locator = %locator, "locator was already unregistered");
            }
        }
        self.stream.clear_locators();
        let dropped = self.stream.cancel_pending();
        tracing::info!(locators = count, dropped_callbacks = dropped, "stream detached");
    }

    pub fn is_attached(&self) -> bool {
        !self.locators.is_empty()
    }

    /// Payload describing the attached stream to the engine.
    pub fn handshake(&self) -> Handshake {
        Handshake {
            chunks: self.stream.chunks(),
            duration_ms: self.stream.duration_ms(),
            chunk_length_ms: self.stream.chunk_length_ms(),
            position_report_interval_ms: self.config.position_report_interval_ms,
            preload_chunks: self.config.preload_chunks,
        }
    }

    pub fn chunk_descriptor(&self, id: u32) -> Option<ChunkDescriptor> {
        self.stream.chunk(id)
    }

    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    pub fn sync(&self) -> &Arc<PlaybackStateSync> {
        &self.sync
    }

    pub fn preload_chunks(&self) -> u32 {
        self.config.preload_chunks
    }

    /// Takes effect with the next handshake.
    pub fn set_preload_chunks(&mut self, chunks: u32) {
        self.config.preload_chunks = chunks;
    }

    pub fn effects(&self) -> &[SharedEffect] {
        self.effects.effects()
    }

    pub fn add_effect(&mut self, effect: &dyn Effect) -> Result<(), SyncError> {
        if self.effects.add(effect) {
            self.push_effects()?;
        }
        Ok(())
    }

    pub fn remove_effect(&mut self, id: &str) -> Result<(), SyncError> {
        if self.effects.remove(id) {
            self.push_effects()?;
        }
        Ok(())
    }

    pub fn update_effect(&mut self, effect: &dyn Effect) -> Result<(), SyncError> {
        if self.effects.update(effect) {
            self.push_effects()?;
        }
        Ok(())
    }

    /// Engine always receives the whole ordered list.
    fn push_effects(&self) -> Result<(), SyncError> {
        tracing::debug!(effects = self.effects.len(), "pushing effect chain");
        self.link.send(EngineCommand::SetEffects {
            effects: self.effects.effects().to_vec(),
        })
    }
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{FilterEffect, FilterType, VolumeEffect};
    use crate::encoder::NullEncoder;
    use crate::engine::command_channel;
    use crate::format::PcmFormat;
    use crate::registry::LocalRegistry;
    use crossbeam_channel::Receiver;

    fn stream(seconds: usize) -> Stream {
        let format = PcmFormat::s16le(1000, 1).unwrap();
        Stream::new(vec![0u8; 2 * 1000 * seconds], format, Arc::new(NullEncoder), 1000).unwrap()
    }

    fn player(
        seconds: usize,
    ) -> (AudioPlayer, Arc<LocalRegistry>, Receiver<EngineCommand>) {
        let registry = Arc::new(LocalRegistry::default());
        let (link, rx) = command_channel();
        let player =
            AudioPlayer::new(stream(seconds), registry.clone(), link, PlayerConfig::default())
                .unwrap();
        (player, registry, rx)
    }

    fn next_handshake(rx: &Receiver<EngineCommand>) -> Handshake {
        match rx.try_recv().unwrap() {
            EngineCommand::LoadStream { handshake } => handshake,
            other => panic!("expected load_stream, got {other:?}"),
        }
    }

    #[test]
    fn new_registers_chunks_and_sends_handshake() {
        let (player, registry, rx) = player(3);
        let handshake = next_handshake(&rx);

        assert_eq!(handshake.chunks.len(), 3);
        assert_eq!(handshake.duration_ms, 3000);
        assert_eq!(handshake.chunk_length_ms, 1000);
        assert_eq!(handshake.position_report_interval_ms, 500);
        assert_eq!(handshake.preload_chunks, 1);
        assert_eq!(registry.len(), 3);
        assert_eq!(player.sync().duration_ms(), 3000);

        let locator = handshake.chunks[2].locator.clone().unwrap();
        let bytes = registry.fetch(&locator).unwrap().wait().unwrap();
        assert_eq!(bytes.len(), (1000 + 100) * 2);
        assert_eq!(player.chunk_descriptor(2).unwrap().locator, Some(locator));
    }

    #[test]
    fn detach_withdraws_locators_and_attach_restores_them() {
        let (mut player, registry, rx) = player(2);
        let first = next_handshake(&rx);

        player.detach();
        assert!(!player.is_attached());
        assert!(registry.is_empty());
        assert_eq!(player.chunk_descriptor(0).unwrap().locator, None);
        let stale = first.chunks[0].locator.clone().unwrap();
        assert!(registry.fetch(&stale).is_err());

        player.attach().unwrap();
        let second = next_handshake(&rx);
        assert_eq!(registry.len(), 2);
        assert_ne!(second.chunks[0].locator, first.chunks[0].locator);

        player.attach().unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn set_stream_replaces_registration_and_duration() {
        let (mut player, registry, rx) = player(2);
        next_handshake(&rx);

        player.set_stream(stream(5)).unwrap();
        let handshake = next_handshake(&rx);
        assert_eq!(handshake.chunks.len(), 5);
        assert_eq!(registry.len(), 5);
        assert_eq!(player.sync().duration_ms(), 5000);
    }

    #[test]
    fn set_stream_drops_previous_playback_position() {
        let (mut player, _registry, rx) = player(5);
        next_handshake(&rx);
        player.sync().report_playback_started();
        player.sync().report_playback_position(4500);

        player.set_stream(stream(2)).unwrap();
        next_handshake(&rx);

        assert!(player.sync().is_stopped());
        assert_eq!(player.sync().position_ms(), 0);
        assert_eq!(player.sync().duration_ms(), 2000);
    }

    #[test]
    fn drop_unregisters_everything() {
        let (player, registry, _rx) = player(2);
        drop(player);
        assert!(registry.is_empty());
    }

    #[test]
    fn effect_changes_push_full_list() {
        let (mut player, _registry, rx) = player(1);
        next_handshake(&rx);

        let mut volume = VolumeEffect::new(0.5);
        let filter = FilterEffect::new(FilterType::Lowpass, 2000.0);
        player.add_effect(&volume).unwrap();
        player.add_effect(&filter).unwrap();
        volume.set_gain(0.25);
        player.update_effect(&volume).unwrap();
        player.remove_effect(volume.id()).unwrap();

        let pushed: Vec<usize> = rx
            .try_iter()
            .map(|cmd| match cmd {
                EngineCommand::SetEffects { effects } => effects.len(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(pushed, vec![1, 2, 2, 1]);
        assert_eq!(player.effects()[0].id, filter.id());
    }

    #[test]
    fn unchanged_effect_operations_send_nothing() {
        let (mut player, _registry, rx) = player(1);
        next_handshake(&rx);

        let volume = VolumeEffect::new(0.5);
        player.remove_effect(volume.id()).unwrap();
        player.update_effect(&volume).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn reattach_resends_effects_and_preload() {
        let (mut player, _registry, rx) = player(1);
        next_handshake(&rx);
        player.add_effect(&VolumeEffect::new(0.5)).unwrap();
        rx.try_recv().unwrap();

        player.set_preload_chunks(3);
        player.detach();
        player.attach().unwrap();

        assert_eq!(next_handshake(&rx).preload_chunks, 3);
        assert!(matches!(
            rx.try_recv().unwrap(),
            EngineCommand::SetEffects { .. }
        ));
    }
}
