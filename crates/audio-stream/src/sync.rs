//! Controller-side playback state synchronization.
//!
//! Commands go to the engine as requests. The authoritative state held here
//! changes only when the engine reports back, so a lost or ignored command
//! simply leaves the state untouched until the next report. Reports are applied
//! in the order they are received; identical repeated reports are no-ops.

use std::sync::Arc;
use std::thread::JoinHandle;

use audio_stream_types::{EngineCommand, EngineReport, PlaybackState};
use crossbeam_channel::Receiver;
use parking_lot::Mutex;

use crate::engine::EngineLink;
use crate::error::SyncError;
use crate::listeners::{ListenerSet, Subscription};
use crate::timefmt::player_timestamp;

/// Volume values as last reported by the engine.
#[derive(Clone, Debug, PartialEq)]
pub struct VolumeChange {
    pub volume: f64,
    pub channel_volumes: Vec<f64>,
}

#[derive(Debug)]
struct SyncState {
    state: PlaybackState,
    position_ms: u64,
    duration_ms: u64,
    volume: f64,
    channel_volumes: Vec<f64>,
    speed: f64,
    balance: f64,
}

/// Authoritative playback state plus the listeners interested in it.
pub struct PlaybackStateSync {
    link: EngineLink,
    inner: Mutex<SyncState>,
    /// Serializes report application so notifications follow arrival order.
    report_order: Mutex<()>,
    state_listeners: ListenerSet<PlaybackState>,
    position_listeners: ListenerSet<u64>,
    volume_listeners: ListenerSet<VolumeChange>,
    speed_listeners: ListenerSet<f64>,
    balance_listeners: ListenerSet<f64>,
}

impl PlaybackStateSync {
    /// Start in `Stopped` at position 0 with unity volume and speed.
    pub fn new(link: EngineLink, duration_ms: u64) -> Self {
        Self {
            link,
            inner: Mutex::new(SyncState {
                state: PlaybackState::Stopped,
                position_ms: 0,
                duration_ms,
                volume: 1.0,
                channel_volumes: Vec::new(),
                speed: 1.0,
                balance: 0.0,
            }),
            report_order: Mutex::new(()),
            state_listeners: ListenerSet::new(),
            position_listeners: ListenerSet::new(),
            volume_listeners: ListenerSet::new(),
            speed_listeners: ListenerSet::new(),
            balance_listeners: ListenerSet::new(),
        }
    }

    // ---- commands ---------------------------------------------------------

    /// Ask the engine to start (or restart) playback. Valid from any state.
    pub fn play(&self) -> Result<(), SyncError> {
        tracing::info!("start or restart playback");
        self.link.send(EngineCommand::StartPlayback)
    }

    /// Seek to `position_ms`, then ask the engine to play.
    pub fn play_from(&self, position_ms: u64) -> Result<(), SyncError> {
        self.set_position(position_ms)?;
        self.play()
    }

    /// Ask the engine to pause. Only valid while playing.
    pub fn pause(&self) -> Result<(), SyncError> {
        self.require("pause", PlaybackState::Playing)?;
        tracing::info!("pause playback");
        self.link.send(EngineCommand::PausePlayback)
    }

    /// Ask the engine to continue from the paused position. Only valid while paused.
    pub fn resume(&self) -> Result<(), SyncError> {
        self.require("resume", PlaybackState::Paused)?;
        tracing::info!("resume playback");
        self.link.send(EngineCommand::ResumePlayback)
    }

    /// Ask the engine to stop and rewind. Valid from any state.
    pub fn stop(&self) -> Result<(), SyncError> {
        tracing::info!("stop playback");
        self.link.send(EngineCommand::StopPlayback)
    }

    /// Request a seek. Clamped to the stream duration.
    ///
    /// Requesting the position already known is not sent, which keeps a
    /// position report echoed back through a UI from bouncing to the engine.
    /// Otherwise the requested position is recorded and position listeners are
    /// notified once, so the engine's confirming report is a no-op.
    pub fn set_position(&self, position_ms: u64) -> Result<(), SyncError> {
        let position_ms = {
            let mut g = self.inner.lock();
            let target = if g.duration_ms > 0 {
                position_ms.min(g.duration_ms)
            } else {
                position_ms
            };
            if target == g.position_ms {
                return Ok(());
            }
            g.position_ms = target;
            target
        };
        tracing::info!(position_ms, "set playback position");
        let sent = self
            .link
            .send(EngineCommand::SetPlaybackPosition { position_ms });
        self.position_listeners.notify(&position_ms);
        sent
    }

    /// Seek relative to the current position, clamped to `[0, duration]`.
    pub fn skip(&self, delta_ms: i64) -> Result<(), SyncError> {
        let (position, duration) = {
            let g = self.inner.lock();
            (g.position_ms, g.duration_ms)
        };
        let mut target = position.saturating_add_signed(delta_ms);
        if duration > 0 {
            target = target.min(duration);
        }
        tracing::debug!(delta_ms, target, "skip");
        self.set_position(target)
    }

    /// Master volume ratio; `1.0` is unity, `2.0` doubles the gain.
    pub fn set_volume(&self, volume: f64) -> Result<(), SyncError> {
        check_volume(volume)?;
        tracing::info!(volume, "set volume");
        self.link.send(EngineCommand::SetVolume { volume })
    }

    pub fn set_volume_on_channel(&self, volume: f64, channel: usize) -> Result<(), SyncError> {
        check_volume(volume)?;
        tracing::info!(volume, channel, "set channel volume");
        self.link
            .send(EngineCommand::SetVolumeOnChannel { volume, channel })
    }

    /// Playback rate ratio; pitch is preserved by the engine.
    pub fn set_playback_speed(&self, speed: f64) -> Result<(), SyncError> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(SyncError::InvalidArgument(format!(
                "playback speed must be positive, got {speed}"
            )));
        }
        tracing::info!(speed, "set playback speed");
        self.link.send(EngineCommand::SetPlaybackSpeed { speed })
    }

    /// Gain spread between left (-1) and right (1); 0 is centered.
    pub fn set_balance(&self, balance: f64) -> Result<(), SyncError> {
        if !balance.is_finite() || !(-1.0..=1.0).contains(&balance) {
            return Err(SyncError::InvalidArgument(format!(
                "balance must be within [-1, 1], got {balance}"
            )));
        }
        tracing::info!(balance, "set balance");
        self.link.send(EngineCommand::SetBalance { balance })
    }

    fn require(&self, command: &'static str, expected: PlaybackState) -> Result<(), SyncError> {
        let state = self.inner.lock().state;
        if state != expected {
            tracing::debug!(command, ?state, "command ignored in current state");
            return Err(SyncError::InvalidTransition { command, state });
        }
        Ok(())
    }

    // ---- reports ----------------------------------------------------------

    /// Apply one engine report.
    pub fn apply_report(&self, report: EngineReport) {
        match report {
            EngineReport::PlaybackStarted => self.report_playback_started(),
            EngineReport::PlaybackPaused => self.report_playback_paused(),
            EngineReport::PlaybackStopped => self.report_playback_stopped(),
            EngineReport::PlaybackPosition { position_ms } => {
                self.report_playback_position(position_ms)
            }
            EngineReport::VolumeChange {
                volume,
                channel_volumes,
            } => self.report_volume_change(volume, channel_volumes),
            EngineReport::PlaybackSpeedChange { speed } => self.report_playback_speed(speed),
            EngineReport::BalanceChange { balance } => self.report_balance(balance),
        }
    }

    pub fn report_playback_started(&self) {
        let _ordered = self.report_order.lock();
        self.transition(PlaybackState::Playing);
    }

    pub fn report_playback_paused(&self) {
        let _ordered = self.report_order.lock();
        self.transition(PlaybackState::Paused);
    }

    /// Stopped also rewinds the authoritative position to 0.
    pub fn report_playback_stopped(&self) {
        let _ordered = self.report_order.lock();
        self.transition(PlaybackState::Stopped);
        self.update_position(0);
    }

    /// Identical positions are ignored; a new one notifies listeners once.
    pub fn report_playback_position(&self, position_ms: u64) {
        let _ordered = self.report_order.lock();
        tracing::trace!(position_ms, "position report");
        self.update_position(position_ms);
    }

    /// Identical volume reports are ignored.
    pub fn report_volume_change(&self, volume: f64, channel_volumes: Vec<f64>) {
        let _ordered = self.report_order.lock();
        let change = {
            let mut g = self.inner.lock();
            if g.volume == volume && g.channel_volumes == channel_volumes {
                return;
            }
            g.volume = volume;
            g.channel_volumes = channel_volumes.clone();
            VolumeChange {
                volume,
                channel_volumes,
            }
        };
        tracing::debug!(volume, channels = change.channel_volumes.len(), "volume change reported");
        self.volume_listeners.notify(&change);
    }

    pub fn report_playback_speed(&self, speed: f64) {
        let _ordered = self.report_order.lock();
        {
            let mut g = self.inner.lock();
            if g.speed == speed {
                return;
            }
            g.speed = speed;
        }
        tracing::debug!(speed, "playback speed reported");
        self.speed_listeners.notify(&speed);
    }

    pub fn report_balance(&self, balance: f64) {
        let _ordered = self.report_order.lock();
        {
            let mut g = self.inner.lock();
            if g.balance == balance {
                return;
            }
            g.balance = balance;
        }
        tracing::debug!(balance, "balance reported");
        self.balance_listeners.notify(&balance);
    }

    fn transition(&self, to: PlaybackState) {
        let from = std::mem::replace(&mut self.inner.lock().state, to);
        if from == to {
            tracing::trace!(state = ?to, "duplicate state report");
            return;
        }
        tracing::debug!(?from, ?to, "playback state reported");
        self.state_listeners.notify(&to);
    }

    fn update_position(&self, position_ms: u64) {
        {
            let mut g = self.inner.lock();
            if g.position_ms == position_ms {
                return;
            }
            g.position_ms = position_ms;
        }
        self.position_listeners.notify(&position_ms);
    }

    // ---- accessors --------------------------------------------------------

    pub fn state(&self) -> PlaybackState {
        self.inner.lock().state
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }

    pub fn is_paused(&self) -> bool {
        self.state() == PlaybackState::Paused
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == PlaybackState::Stopped
    }

    pub fn position_ms(&self) -> u64 {
        self.inner.lock().position_ms
    }

    pub fn duration_ms(&self) -> u64 {
        self.inner.lock().duration_ms
    }

    /// Replace the duration after a new stream is attached.
    pub fn set_duration(&self, duration_ms: u64) {
        self.inner.lock().duration_ms = duration_ms;
    }

    /// Forget the previous stream's playback: `Stopped` at position 0 with the
    /// new duration. Listeners hear about whatever actually changed.
    pub fn reset_for_stream(&self, duration_ms: u64) {
        let _ordered = self.report_order.lock();
        self.inner.lock().duration_ms = duration_ms;
        self.transition(PlaybackState::Stopped);
        self.update_position(0);
    }

    pub fn volume(&self) -> f64 {
        self.inner.lock().volume
    }

    /// Last reported volume of `channel`, if the engine has reported one.
    pub fn volume_on_channel(&self, channel: usize) -> Option<f64> {
        self.inner.lock().channel_volumes.get(channel).copied()
    }

    /// Number of channels in the last volume report.
    pub fn channel_count(&self) -> usize {
        self.inner.lock().channel_volumes.len()
    }

    pub fn playback_speed(&self) -> f64 {
        self.inner.lock().speed
    }

    pub fn balance(&self) -> f64 {
        self.inner.lock().balance
    }

    /// Current position as `m:ss`.
    pub fn position_string(&self) -> String {
        player_timestamp(self.position_ms())
    }

    /// Total duration as `m:ss`.
    pub fn duration_string(&self) -> String {
        player_timestamp(self.duration_ms())
    }

    // ---- listeners --------------------------------------------------------

    pub fn on_state_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&PlaybackState) + Send + Sync + 'static,
    {
        self.state_listeners.add(callback)
    }

    pub fn on_position_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&u64) + Send + Sync + 'static,
    {
        self.position_listeners.add(callback)
    }

    pub fn on_volume_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&VolumeChange) + Send + Sync + 'static,
    {
        self.volume_listeners.add(callback)
    }

    pub fn on_speed_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&f64) + Send + Sync + 'static,
    {
        self.speed_listeners.add(callback)
    }

    pub fn on_balance_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&f64) + Send + Sync + 'static,
    {
        self.balance_listeners.add(callback)
    }
}

fn check_volume(volume: f64) -> Result<(), SyncError> {
    if !volume.is_finite() || volume < 0.0 {
        return Err(SyncError::InvalidArgument(format!(
            "volume must be a non-negative ratio, got {volume}"
        )));
    }
    Ok(())
}

/// Apply reports from `reports` to `sync` on a worker thread, in arrival order.
///
/// The thread exits when every report sender is dropped.
pub fn spawn_report_listener(
    sync: Arc<PlaybackStateSync>,
    reports: Receiver<EngineReport>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        while let Ok(report) = reports.recv() {
            sync.apply_report(report);
        }
        tracing::debug!("report channel closed");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{command_channel, report_channel};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sync_with_engine() -> (PlaybackStateSync, Receiver<EngineCommand>) {
        let (link, rx) = command_channel();
        (PlaybackStateSync::new(link, 10_000), rx)
    }

    fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let c = Arc::new(AtomicUsize::new(0));
        (c.clone(), c)
    }

    #[test]
    fn commands_do_not_change_state_until_reported() {
        let (sync, rx) = sync_with_engine();
        sync.play().unwrap();
        assert_eq!(rx.try_recv().unwrap(), EngineCommand::StartPlayback);
        assert!(sync.is_stopped());

        sync.report_playback_started();
        assert!(sync.is_playing());
    }

    #[test]
    fn pause_while_stopped_is_rejected_and_not_sent() {
        let (sync, rx) = sync_with_engine();
        assert_eq!(
            sync.pause(),
            Err(SyncError::InvalidTransition {
                command: "pause",
                state: PlaybackState::Stopped
            })
        );
        assert!(rx.try_recv().is_err());
        assert!(sync.is_stopped());

        sync.report_playback_paused();
        assert!(sync.is_paused());
    }

    #[test]
    fn resume_requires_paused() {
        let (sync, rx) = sync_with_engine();
        assert!(sync.resume().is_err());

        sync.report_playback_started();
        sync.pause().unwrap();
        assert_eq!(rx.try_recv().unwrap(), EngineCommand::PausePlayback);
        sync.report_playback_paused();

        sync.resume().unwrap();
        assert_eq!(rx.try_recv().unwrap(), EngineCommand::ResumePlayback);
        sync.report_playback_started();
        assert!(sync.is_playing());
    }

    #[test]
    fn stop_report_rewinds_position() {
        let (sync, rx) = sync_with_engine();
        sync.report_playback_started();
        sync.report_playback_position(4200);
        let (positions, seen) = counter();
        let _sub = sync.on_position_change(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        sync.stop().unwrap();
        assert_eq!(rx.try_recv().unwrap(), EngineCommand::StopPlayback);
        sync.report_playback_stopped();

        assert!(sync.is_stopped());
        assert_eq!(sync.position_ms(), 0);
        assert_eq!(positions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn duplicate_position_reports_are_idempotent() {
        let (sync, _rx) = sync_with_engine();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let _sub = sync.on_position_change(move |p| s.lock().push(*p));

        sync.report_playback_position(0);
        sync.report_playback_position(500);
        sync.report_playback_position(500);
        sync.report_playback_position(1000);

        assert_eq!(*seen.lock(), vec![500, 1000]);
    }

    #[test]
    fn state_listeners_fire_once_per_change() {
        let (sync, _rx) = sync_with_engine();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let _sub = sync.on_state_change(move |st| s.lock().push(*st));

        sync.report_playback_started();
        sync.report_playback_started();
        sync.report_playback_paused();
        sync.report_playback_stopped();

        assert_eq!(
            *seen.lock(),
            vec![
                PlaybackState::Playing,
                PlaybackState::Paused,
                PlaybackState::Stopped
            ]
        );
    }

    #[test]
    fn volume_command_then_report_notifies_once() {
        let (sync, rx) = sync_with_engine();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let _sub = sync.on_volume_change(move |v| s.lock().push(v.clone()));

        sync.set_volume(0.5).unwrap();
        assert_eq!(rx.try_recv().unwrap(), EngineCommand::SetVolume { volume: 0.5 });
        assert_eq!(sync.volume(), 1.0);

        sync.report_volume_change(0.5, vec![0.5]);
        sync.report_volume_change(0.5, vec![0.5]);

        assert_eq!(
            *seen.lock(),
            vec![VolumeChange {
                volume: 0.5,
                channel_volumes: vec![0.5]
            }]
        );
        assert_eq!(sync.volume(), 0.5);
        assert_eq!(sync.volume_on_channel(0), Some(0.5));
        assert_eq!(sync.volume_on_channel(1), None);
        assert_eq!(sync.channel_count(), 1);
    }

    #[test]
    fn set_position_skips_known_position_and_clamps() {
        let (sync, rx) = sync_with_engine();
        sync.set_position(0).unwrap();
        assert!(rx.try_recv().is_err());

        sync.set_position(60_000).unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            EngineCommand::SetPlaybackPosition { position_ms: 10_000 }
        );
        assert_eq!(sync.position_ms(), 10_000);

        let (hits, seen) = counter();
        let _sub = sync.on_position_change(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        sync.report_playback_position(10_000);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn seek_notifies_position_listeners_once() {
        let (sync, rx) = sync_with_engine();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let _sub = sync.on_position_change(move |p| s.lock().push(*p));

        sync.set_position(2500).unwrap();
        sync.set_position(2500).unwrap();
        sync.report_playback_position(2500);

        assert_eq!(*seen.lock(), vec![2500]);
        assert_eq!(
            rx.try_iter().collect::<Vec<_>>(),
            vec![EngineCommand::SetPlaybackPosition { position_ms: 2500 }]
        );
    }

    #[test]
    fn reset_for_stream_stops_and_rewinds() {
        let (sync, _rx) = sync_with_engine();
        sync.report_playback_started();
        sync.report_playback_position(9000);
        let states = Arc::new(Mutex::new(Vec::new()));
        let s = states.clone();
        let _sub = sync.on_state_change(move |st| s.lock().push(*st));

        sync.reset_for_stream(4000);

        assert!(sync.is_stopped());
        assert_eq!(sync.position_ms(), 0);
        assert_eq!(sync.duration_ms(), 4000);
        assert_eq!(*states.lock(), vec![PlaybackState::Stopped]);
    }

    #[test]
    fn skip_is_relative_and_bounded() {
        let (sync, rx) = sync_with_engine();
        sync.report_playback_position(3000);
        sync.skip(-5000).unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            EngineCommand::SetPlaybackPosition { position_ms: 0 }
        );
        sync.skip(5000).unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            EngineCommand::SetPlaybackPosition { position_ms: 5000 }
        );
    }

    #[test]
    fn play_from_seeks_then_plays() {
        let (sync, rx) = sync_with_engine();
        sync.play_from(2500).unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            EngineCommand::SetPlaybackPosition { position_ms: 2500 }
        );
        assert_eq!(rx.try_recv().unwrap(), EngineCommand::StartPlayback);
    }

    #[test]
    fn scalar_arguments_are_validated() {
        let (sync, rx) = sync_with_engine();
        assert!(matches!(sync.set_volume(-0.1), Err(SyncError::InvalidArgument(_))));
        assert!(matches!(sync.set_volume(f64::NAN), Err(SyncError::InvalidArgument(_))));
        assert!(matches!(sync.set_playback_speed(0.0), Err(SyncError::InvalidArgument(_))));
        assert!(matches!(sync.set_balance(1.5), Err(SyncError::InvalidArgument(_))));
        assert!(rx.try_recv().is_err());

        sync.set_balance(-1.0).unwrap();
        sync.set_playback_speed(1.5).unwrap();
        sync.set_volume_on_channel(0.25, 1).unwrap();
        assert_eq!(rx.try_recv().unwrap(), EngineCommand::SetBalance { balance: -1.0 });
        assert_eq!(rx.try_recv().unwrap(), EngineCommand::SetPlaybackSpeed { speed: 1.5 });
        assert_eq!(
            rx.try_recv().unwrap(),
            EngineCommand::SetVolumeOnChannel {
                volume: 0.25,
                channel: 1
            }
        );
    }

    #[test]
    fn speed_and_balance_reports_have_their_own_listeners() {
        let (sync, _rx) = sync_with_engine();
        let (speeds, s) = counter();
        let (balances, b) = counter();
        let _s = sync.on_speed_change(move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        });
        let _b = sync.on_balance_change(move |_| {
            b.fetch_add(1, Ordering::SeqCst);
        });

        sync.apply_report(EngineReport::PlaybackSpeedChange { speed: 2.0 });
        sync.apply_report(EngineReport::PlaybackSpeedChange { speed: 2.0 });
        sync.apply_report(EngineReport::BalanceChange { balance: 0.5 });

        assert_eq!(speeds.load(Ordering::SeqCst), 1);
        assert_eq!(balances.load(Ordering::SeqCst), 1);
        assert_eq!(sync.playback_speed(), 2.0);
        assert_eq!(sync.balance(), 0.5);
    }

    #[test]
    fn dropped_subscription_stops_notifications() {
        let (sync, _rx) = sync_with_engine();
        let (hits, seen) = counter();
        let sub = sync.on_position_change(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        sync.report_playback_position(1);
        sub.cancel();
        sync.report_playback_position(2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn report_listener_applies_reports_in_order() {
        let (link, _rx) = command_channel();
        let sync = Arc::new(PlaybackStateSync::new(link, 10_000));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let _sub = sync.on_position_change(move |p| s.lock().push(*p));

        let (tx, reports) = report_channel();
        let handle = spawn_report_listener(sync.clone(), reports);
        tx.send(EngineReport::PlaybackStarted).unwrap();
        for position_ms in [500, 1000, 1000, 1500] {
            tx.send(EngineReport::PlaybackPosition { position_ms }).unwrap();
        }
        drop(tx);
        handle.join().unwrap();

        assert!(sync.is_playing());
        assert_eq!(*seen.lock(), vec![500, 1000, 1500]);
    }

    #[test]
    fn timestamps_follow_position_and_duration() {
        let (sync, _rx) = sync_with_engine();
        sync.report_playback_position(65_000);
        assert_eq!(sync.position_string(), "1:05");
        assert_eq!(sync.duration_string(), "0:10");
    }
}
