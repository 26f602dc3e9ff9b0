//! Broadcast-channel snapshot sink.
//!
//! Bridges the engine's synchronous [`SnapshotSink`] seam onto a tokio
//! broadcast channel so any number of listeners (or none) can follow the
//! game state. Send failures mean zero receivers, which is normal.

use rondo_core::SnapshotSink;
use rondo_types::GameSnapshot;
use tokio::sync::broadcast;

/// Fans snapshots out over a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: broadcast::Sender<GameSnapshot>,
}

impl ChannelSink {
    /// Create a sink with the given channel capacity, returning the first
    /// receiver alongside it. Further receivers come from
    /// [`subscribe`](Self::subscribe).
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<GameSnapshot>) {
        let (tx, rx) = broadcast::channel(capacity);
        (Self { tx }, rx)
    }

    /// A fresh receiver starting at the current stream position.
    pub fn subscribe(&self) -> broadcast::Receiver<GameSnapshot> {
        self.tx.subscribe()
    }
}

impl SnapshotSink for ChannelSink {
    fn deliver(&mut self, snapshot: &GameSnapshot) {
        // A send error means no receivers are subscribed right now.
        let _ = self.tx.send(snapshot.clone());
    }
}
