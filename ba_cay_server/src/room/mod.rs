//! One actor per room. Every action on a room, including the ledger calls it
//! triggers, runs inside that room's task in mailbox order.

mod actor;
mod ingress;

use std::sync::Arc;

use ba_cay_core::{Chips, Room, RoomError, RoomId};
use parking_lot::RwLock;
use tokio::sync::mpsc;

pub use ingress::{LeaveReason, Mailbox, MailboxError, Message};

use crate::registry::RoomHandle;
use crate::state::SharedState;

const MAILBOX_SIZE: usize = 64;

/// Creates a room and starts its actor.
pub fn create_room(state: &SharedState, name: String, bet_amount: Chips) -> Result<RoomId, RoomError> {
    state.registry.create(name, bet_amount, |room| spawn(state, room))
}

fn spawn(state: &SharedState, room: Room) -> RoomHandle {
    let (sender, receiver) = mpsc::channel(MAILBOX_SIZE);
    let snapshot = Arc::new(RwLock::new(room.clone()));
    let actor = actor::Actor::new(state.clone(), room, snapshot.clone(), sender.downgrade(), receiver);
    tokio::spawn(actor.run());
    RoomHandle::new(Mailbox::new(sender), snapshot)
}
