//! Snapshot fan-out seam.
//!
//! The engine emits a full [`GameSnapshot`] after every accepted mutation
//! and on the heartbeat cadence. Delivery is fire-and-forget: a sink with
//! no listeners is normal and never blocks or fails the engine.

use rondo_types::GameSnapshot;

/// Receives state snapshots from the engine.
///
/// Implementations must not block; the engine calls this from its single
/// serialized task.
pub trait SnapshotSink: Send + 'static {
    /// Deliver one snapshot. Errors and absent listeners are the sink's
    /// problem, not the engine's.
    fn deliver(&mut self, snapshot: &GameSnapshot);
}

/// A sink that drops every snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpSink;

impl SnapshotSink for NoOpSink {
    fn deliver(&mut self, _snapshot: &GameSnapshot) {}
}
