//! Command channel towards the playback engine.

use audio_stream_types::{EngineCommand, EngineReport};
use crossbeam_channel::{Receiver, Sender};

use crate::error::SyncError;

/// Sending half of the controller → engine command channel.
///
/// Delivery is fire-and-forget: a successful send only means the command was
/// queued, never that the engine acted on it.
#[derive(Clone, Debug)]
pub struct EngineLink {
    cmd_tx: Sender<EngineCommand>,
}

impl EngineLink {
    pub fn new(cmd_tx: Sender<EngineCommand>) -> Self {
        Self { cmd_tx }
    }

    pub fn send(&self, command: EngineCommand) -> Result<(), SyncError> {
        tracing::debug!(?command, "engine command");
        self.cmd_tx.send(command).map_err(|_| SyncError::Disconnected)
    }
}

/// Create a link plus the receiver the engine reads commands from.
pub fn command_channel() -> (EngineLink, Receiver<EngineCommand>) {
    let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
    (EngineLink::new(cmd_tx), cmd_rx)
}

/// Create the engine → controller report channel.
pub fn report_channel() -> (Sender<EngineReport>, Receiver<EngineReport>) {
    crossbeam_channel::unbounded()
}
