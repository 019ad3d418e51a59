use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type RoomId = String;
pub type PlayerId = String;
pub type SessionId = Uuid;
pub type Chips = u64;

/// Fixed multiplier turning the base bet into the per-round stake ("K").
pub const STAKE_MULTIPLIER: Chips = 4;

/// Cached player profile. `wallet` mirrors the external ledger and is only
/// ever updated from ledger replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub wallet: Chips,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub email: String,
}

impl Player {
    pub fn new(id: impl Into<PlayerId>, username: impl Into<String>) -> Self {
        let username = username.into();
        Player {
            id: id.into(),
            display_name: username.clone(),
            username,
            wallet: 0,
            avatar_url: String::new(),
            email: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomPhase {
    /// Accepting joins, fewer than two members.
    Open,
    /// Enough members to play, waiting for everyone to be ready.
    AwaitingReady,
    /// Stakes withdrawn, confirmation window open.
    Staking,
    /// Cards are on the table, waiting for the dealer to end the round.
    Dealt,
    /// Payouts are being applied.
    Settled,
    /// No members left. Terminal.
    Closed,
}

impl RoomPhase {
    pub fn accepts_joins(self) -> bool {
        matches!(self, RoomPhase::Open | RoomPhase::AwaitingReady)
    }

    pub fn in_round(self) -> bool {
        matches!(self, RoomPhase::Staking | RoomPhase::Dealt | RoomPhase::Settled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    // insertion order is the seating and dealing order
    pub members: Vec<PlayerId>,
    pub owner: Option<PlayerId>,
    // the dealer, who stakes against every other member
    pub medal_holder: Option<PlayerId>,
    pub ready_player: Vec<PlayerId>,
    pub user_confirmed: Vec<PlayerId>,
    // cleared by any cancel during the confirmation window
    pub all_user_confirmed: bool,
    pub bet_amount: Chips,
    pub is_playing: bool,
    pub session_id: Option<SessionId>,
    pub phase: RoomPhase,
}
