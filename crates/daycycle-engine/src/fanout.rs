//! Snapshot delivery over a tokio broadcast channel.
//!
//! Every send encodes the snapshot as JSON and publishes it as an
//! [`ObserverFrame`] addressed to one observer. Observer tasks subscribe
//! to the channel and keep only the frames addressed to them.

use std::collections::BTreeMap;

use daycycle_core::host::{ObserverFanout, TransportError};
use daycycle_types::{ParticipantId, TimeSnapshot, WorldId};
use tokio::sync::broadcast;

/// Capacity of the frame channel.
///
/// A subscriber that falls behind by more than this many frames receives
/// [`broadcast::error::RecvError::Lagged`] and skips to the newest frame.
const FRAME_CAPACITY: usize = 256;

/// One encoded snapshot addressed to one observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserverFrame {
    /// Recipient.
    pub observer: ParticipantId,
    /// JSON-encoded [`TimeSnapshot`].
    pub payload: String,
}

/// Fan-out backed by [`broadcast::Sender`].
#[derive(Debug)]
pub struct BroadcastFanout {
    tx: broadcast::Sender<ObserverFrame>,
    observers: BTreeMap<WorldId, Vec<ParticipantId>>,
}

impl BroadcastFanout {
    /// Create a fan-out with no observers attached.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FRAME_CAPACITY);
        Self {
            tx,
            observers: BTreeMap::new(),
        }
    }

    /// Subscribe to the frame channel.
    pub fn subscribe(&self) -> broadcast::Receiver<ObserverFrame> {
        self.tx.subscribe()
    }

    /// Register `observer` as watching `world`.
    pub fn attach(&mut self, world: WorldId, observer: ParticipantId) {
        let watching = self.observers.entry(world).or_default();
        if !watching.contains(&observer) {
            watching.push(observer);
        }
    }
}

impl Default for BroadcastFanout {
    fn default() -> Self {
        Self::new()
    }
}

impl ObserverFanout for BroadcastFanout {
    fn observers_of(&self, world: &WorldId) -> Vec<ParticipantId> {
        self.observers.get(world).cloned().unwrap_or_default()
    }

    fn send(&mut self, observer: ParticipantId, snapshot: &TimeSnapshot) -> Result<(), TransportError> {
        let payload = serde_json::to_string(snapshot).map_err(|e| TransportError::Encode {
            reason: e.to_string(),
        })?;

        // send fails only when no receiver is subscribed.
        self.tx
            .send(ObserverFrame { observer, payload })
            .map(|_| ())
            .map_err(|broadcast::error::SendError(_frame)| TransportError::Disconnected { observer })
    }
}
