use crate::card::Hand;
use crate::hand::HandRanking;
use crate::state::{Chips, Player, PlayerId, Room, RoomId, SessionId};
use serde::{Deserialize, Serialize};

// --- Client -> server ---
// Every frame is `{"event": "...", "data": {...}}`.

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Announces who is behind this connection. Sent once after connecting.
    UserInfo { user: Player },
    /// Asks for the current ledger balance.
    GetBalance,
    ListRoom,
    CreateRoom { name: String, bet_amount: Chips },
    JoinRoom { room_id: RoomId, user: Player },
    LeaveRoom { room_id: RoomId, user_id: PlayerId },
    AgreeGame { room_id: RoomId, user_id: PlayerId, agree: bool },
    StartGame { room_id: RoomId },
    UserConfirmBet { room_id: RoomId, user_id: PlayerId },
    UserCancelBet { room_id: RoomId },
    /// Dealer ends the round and triggers settlement.
    EndGame { room_id: RoomId, user_id: PlayerId },
}

// --- Server -> client ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Snapshot of every live room, taken after pruning abandoned ones.
    ListRoom { rooms: Vec<Room> },
    RoomCreated { room_id: RoomId },
    RoomJoined {
        room_id: RoomId,
        joined: bool,
        room_members: Vec<Player>,
        owner: Option<PlayerId>,
    },
    RoomLeft {
        room_id: RoomId,
        user_id: PlayerId,
        room_members: Vec<PlayerId>,
    },
    PlayerReady {
        owner: Option<PlayerId>,
        ready_player: Vec<PlayerId>,
    },
    /// Sent privately: the stake just withdrawn for this round.
    StartBet {
        game_id: RoomId,
        total_bet: Chips,
        session_id: SessionId,
    },
    UserConfirmed {
        user_id: Option<PlayerId>,
        message: String,
    },
    StartedGame {
        session_id: SessionId,
        /// Seat order, matching the room's member list at deal time.
        hands: Vec<Hand>,
        ranking: Vec<HandRanking>,
    },
    PlayerWalletUpdated { updates: Vec<WalletUpdate> },
    UpdateOwner {
        room_owner: Option<PlayerId>,
        room_members: Vec<PlayerId>,
    },
    Balance { balance: Chips },
    Status { message: String },
    /// Ledger trouble affecting this player. Cached balances were left alone.
    Warning { message: String },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WalletUpdate {
    pub user_id: PlayerId,
    /// Balance reported by the ledger after the change.
    pub wallet: Chips,
    /// Amount just credited (positive) or debited (negative).
    pub delta: i64,
}

impl ServerMessage {
    pub fn status(message: impl Into<String>) -> Self {
        ServerMessage::Status { message: message.into() }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        ServerMessage::Warning { message: message.into() }
    }
}
