use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::tracking::events::TrackingEvent;

/// Tracks which live connections belong to which delivery's broadcast group.
/// One room per delivery id; each member holds a `broadcast::Receiver`, so
/// fan-out, per-sender ordering, and slow-member isolation all come from the
/// channel. A member that lags or drops only loses its own subscription.
pub struct RoomRegistry {
    rooms: DashMap<Uuid, broadcast::Sender<TrackingEvent>>,
    buffer: usize,
}

impl RoomRegistry {
    pub fn new(buffer: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            buffer,
        }
    }

    /// Joins the room for a delivery, creating it on first join.
    pub fn join(&self, room_id: Uuid) -> broadcast::Receiver<TrackingEvent> {
        self.rooms
            .entry(room_id)
            .or_insert_with(|| broadcast::channel(self.buffer).0)
            .subscribe()
    }

    /// Drops the room once its last receiver is gone. Callers drop their
    /// receiver first, then call this; leaving an absent room is a no-op.
    pub fn leave(&self, room_id: Uuid) {
        self.rooms
            .remove_if(&room_id, |_, sender| sender.receiver_count() == 0);
    }

    /// Sends an event to every current member of the room, sender included.
    /// Returns the number of members reached; an empty or absent room is 0.
    pub fn broadcast(&self, room_id: Uuid, event: TrackingEvent) -> usize {
        match self.rooms.get(&room_id) {
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        }
    }

    pub fn member_count(&self, room_id: Uuid) -> usize {
        self.rooms
            .get(&room_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}
