use std::sync::Arc;
use std::time::Duration;

use ba_cay_core::{Chips, PlayerId, Room, RoomError, RoomId};
use dashmap::{mapref::entry::Entry, DashMap};
use parking_lot::RwLock;
use tokio::time::Instant;

use crate::room::Mailbox;

/// Registry entry of a live room: how to reach its actor and the state it
/// last published.
pub struct RoomHandle {
    pub mailbox: Mailbox,
    snapshot: Arc<RwLock<Room>>,
    created_at: Instant,
}

impl RoomHandle {
    pub fn new(mailbox: Mailbox, snapshot: Arc<RwLock<Room>>) -> Self {
        RoomHandle {
            mailbox,
            snapshot,
            created_at: Instant::now(),
        }
    }

    pub fn snapshot(&self) -> Room {
        self.snapshot.read().clone()
    }

    // A room empties for good only before its first join: the last leave
    // closes the actor. Until `grace` has passed since creation such a room is
    // still listed, empty, so that its creator can find it.
    fn is_abandoned(&self, grace: Duration) -> bool {
        self.mailbox.is_closed()
            || (self.snapshot.read().members.is_empty() && self.created_at.elapsed() >= grace)
    }
}

pub struct Registry {
    rooms: DashMap<RoomId, RoomHandle>,
}

fn fresh_room_id() -> RoomId {
    format!("{:010x}", rand::random::<u64>() & 0xff_ffff_ffff)
}

impl Registry {
    pub fn new() -> Self {
        Registry { rooms: DashMap::new() }
    }

    /// Registers a new room under a fresh id. `spawn` starts its actor.
    pub fn create<F>(&self, name: String, bet_amount: Chips, spawn: F) -> Result<RoomId, RoomError>
    where
        F: FnOnce(Room) -> RoomHandle,
    {
        if bet_amount == 0 {
            return Err(RoomError::InvalidBet);
        }
        let entry = loop {
            if let Entry::Vacant(entry) = self.rooms.entry(fresh_room_id()) {
                break entry;
            }
        };
        let room_id = entry.key().clone();
        entry.insert(spawn(Room::new(room_id.clone(), name, bet_amount)));
        Ok(room_id)
    }

    pub fn get(&self, room_id: &RoomId) -> Option<Mailbox> {
        self.rooms.get(room_id).map(|h| h.mailbox.clone())
    }

    /// Removes the room only if `snapshot` is the one its actor publishes to.
    pub fn remove(&self, room_id: &RoomId, snapshot: &Arc<RwLock<Room>>) {
        self.rooms.remove_if(room_id, |_, h| Arc::ptr_eq(&h.snapshot, snapshot));
    }

    /// Prunes abandoned rooms, then returns what is left. Rooms that were
    /// never joined count as abandoned once `grace` has passed.
    pub fn list(&self, grace: Duration) -> Vec<Room> {
        self.rooms.retain(|_, h| !h.is_abandoned(grace));
        let mut rooms: Vec<Room> = self.rooms.iter().map(|h| h.snapshot()).collect();
        rooms.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        rooms
    }

    /// Rooms in which `player_id` currently holds a seat.
    pub fn rooms_of(&self, player_id: &PlayerId) -> Vec<(RoomId, Mailbox)> {
        self.rooms
            .iter()
            .filter(|h| h.snapshot.read().is_member(player_id))
            .map(|h| (h.key().clone(), h.mailbox.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::Message;
    use tokio::sync::mpsc;

    // A handle with no actor behind it. The receiver keeps the mailbox open.
    fn detached(room: Room, keep: &mut Vec<mpsc::Receiver<Message>>) -> RoomHandle {
        let (sender, receiver) = mpsc::channel(4);
        keep.push(receiver);
        RoomHandle::new(Mailbox::new(sender), Arc::new(RwLock::new(room)))
    }

    #[tokio::test]
    async fn test_create_rejects_zero_bet() {
        let registry = Registry::new();
        let mut keep = Vec::new();
        let result = registry.create("free".into(), 0, |room| detached(room, &mut keep));
        assert_eq!(result, Err(RoomError::InvalidBet));
        assert!(registry.list(Duration::from_secs(30)).is_empty());
    }

    #[tokio::test]
    async fn test_create_assigns_unique_ids() {
        let registry = Registry::new();
        let mut keep = Vec::new();
        let mut ids = Vec::new();
        for _ in 0..50 {
            ids.push(registry.create("r".into(), 10, |room| detached(room, &mut keep)).unwrap());
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 50);
        assert!(ids.iter().all(|id| id.len() == 10));
        assert!(registry.get(&ids[0]).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_prunes_after_grace() {
        let registry = Registry::new();
        let mut keep = Vec::new();
        let grace = Duration::from_secs(30);
        let empty = registry.create("empty".into(), 10, |room| detached(room, &mut keep)).unwrap();
        let busy = registry
            .create("busy".into(), 10, |mut room| {
                room.join(&"u1".to_string()).unwrap();
                detached(room, &mut keep)
            })
            .unwrap();

        assert_eq!(registry.list(grace).len(), 2);
        tokio::time::advance(Duration::from_secs(31)).await;

        let rooms = registry.list(grace);
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].id, busy);
        assert!(registry.get(&empty).is_none());
        assert_eq!(registry.rooms_of(&"u1".to_string()).len(), 1);
    }

    #[tokio::test]
    async fn test_list_prunes_stopped_actors() {
        let registry = Registry::new();
        let mut keep = Vec::new();
        registry.create("gone".into(), 10, |room| detached(room, &mut keep)).unwrap();
        keep.clear();
        assert!(registry.list(Duration::from_secs(30)).is_empty());
    }
}
