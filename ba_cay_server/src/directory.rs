use ba_cay_core::{Chips, Player, PlayerId, ServerMessage};
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::ledger::Ledger;

pub type ConnectionId = Uuid;

// One open WebSocket.
struct Connection {
    player_id: Option<PlayerId>,
    // feeds the socket's writer task
    sender: mpsc::Sender<ServerMessage>,
}

/// Player profiles and the connections they are reachable on.
///
/// Guards are never held across an `.await`: senders are cloned out first.
pub struct Directory {
    players: DashMap<PlayerId, Player>,
    bindings: DashMap<PlayerId, ConnectionId>,
    connections: DashMap<ConnectionId, Connection>,
}

impl Directory {
    pub fn new() -> Self {
        Directory {
            players: DashMap::new(),
            bindings: DashMap::new(),
            connections: DashMap::new(),
        }
    }

    pub fn connect(&self, sender: mpsc::Sender<ServerMessage>) -> ConnectionId {
        let id = Uuid::new_v4();
        self.connections.insert(id, Connection { player_id: None, sender });
        id
    }

    /// Drops a connection. Returns the player it was serving, unless that
    /// player has since moved to another connection.
    pub fn disconnect(&self, connection: ConnectionId) -> Option<PlayerId> {
        let (_, conn) = self.connections.remove(&connection)?;
        let player_id = conn.player_id?;
        self.bindings.remove_if(&player_id, |_, bound| *bound == connection)?;
        self.players.remove(&player_id);
        Some(player_id)
    }

    /// Attaches a player to a connection, replacing any previous binding.
    pub fn bind(&self, connection: ConnectionId, player: Player) {
        let player_id = player.id.clone();
        self.upsert(player);
        if let Some(mut conn) = self.connections.get_mut(&connection) {
            conn.player_id = Some(player_id.clone());
        }
        self.bindings.insert(player_id, connection);
    }

    /// Inserts the profile if the player is unknown. Its wallet starts at
    /// zero until the ledger says otherwise.
    pub fn ensure(&self, mut player: Player) {
        player.wallet = 0;
        self.players.entry(player.id.clone()).or_insert(player);
    }

    /// Replaces the profile but keeps the cached wallet, which only the
    /// ledger may change.
    pub fn upsert(&self, mut player: Player) {
        player.wallet = self.wallet(&player.id).unwrap_or(0);
        self.players.insert(player.id.clone(), player);
    }

    pub fn by_id(&self, player_id: &PlayerId) -> Option<Player> {
        self.players.get(player_id).map(|p| p.clone())
    }

    pub fn by_connection(&self, connection: ConnectionId) -> Option<Player> {
        self.player_of(connection).and_then(|id| self.by_id(&id))
    }

    pub fn player_of(&self, connection: ConnectionId) -> Option<PlayerId> {
        self.connections.get(&connection).and_then(|c| c.player_id.clone())
    }

    pub fn wallet(&self, player_id: &PlayerId) -> Option<Chips> {
        self.players.get(player_id).map(|p| p.wallet)
    }

    pub fn set_wallet(&self, player_id: &PlayerId, wallet: Chips) {
        if let Some(mut player) = self.players.get_mut(player_id) {
            player.wallet = wallet;
        }
    }

    /// Asks the ledger for the player's balance and caches it. On failure the
    /// cache is left alone and the ledger's message is returned.
    pub async fn refresh_balance(&self, ledger: &dyn Ledger, player_id: &PlayerId) -> Result<Chips, String> {
        let reply = ledger.get_balance(player_id).await;
        match reply.settled_balance() {
            Some(balance) => {
                self.set_wallet(player_id, balance);
                Ok(balance)
            }
            None => {
                warn!("balance refresh for {} failed: {}", player_id, reply.message);
                Err(if reply.message.is_empty() {
                    "Could not fetch your balance".to_string()
                } else {
                    reply.message
                })
            }
        }
    }

    // --- Delivery ---
    //
    // Never waits on a socket. A connection whose queue is full loses the
    // message so that one slow reader cannot stall a room.

    pub fn send_to_connection(&self, connection: ConnectionId, message: ServerMessage) {
        let sender = self.connections.get(&connection).map(|c| c.sender.clone());
        if let Some(sender) = sender {
            deliver(connection, &sender, message);
        }
    }

    pub fn send_to(&self, player_id: &PlayerId, message: ServerMessage) {
        let connection = self.bindings.get(player_id).map(|c| *c);
        if let Some(connection) = connection {
            self.send_to_connection(connection, message);
        }
    }

    pub fn send_to_many(&self, player_ids: &[PlayerId], message: &ServerMessage) {
        for player_id in player_ids {
            self.send_to(player_id, message.clone());
        }
    }

    pub fn broadcast_all(&self, message: &ServerMessage) {
        let senders: Vec<_> = self.connections.iter().map(|c| (*c.key(), c.sender.clone())).collect();
        for (connection, sender) in senders {
            deliver(connection, &sender, message.clone());
        }
    }
}

fn deliver(connection: ConnectionId, sender: &mpsc::Sender<ServerMessage>, message: ServerMessage) {
    match sender.try_send(message) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => warn!("connection {} is not keeping up, dropped a message", connection),
        Err(TrySendError::Closed(_)) => debug!("connection {} is gone", connection),
    }
}
