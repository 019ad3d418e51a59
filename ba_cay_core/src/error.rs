use crate::state::{Chips, PlayerId, RoomPhase};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeckError {
    #[error("cannot deal {requested} cards, only {remaining} remain")]
    Capacity { requested: usize, remaining: usize },
}

/// Rejections produced by room operations. Every variant leaves the room
/// untouched; the message is what the player gets to see.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("Room not found")]
    RoomNotFound,
    #[error("Bet amount must be greater than zero")]
    InvalidBet,
    #[error("Game already in progress")]
    GameInProgress,
    #[error("No game in progress")]
    NotPlaying,
    #[error("Room is full ({max} players)")]
    RoomFull { max: usize },
    #[error("Player {0} is not a member of this room")]
    NotMember(PlayerId),
    #[error("Not enough players")]
    NotEnoughPlayers,
    #[error("Not all players are ready")]
    NotAllReady,
    #[error("Owner does not have enough tokens ({required} required)")]
    DealerInsufficientFunds { required: Chips },
    #[error("Player {player} does not have enough tokens ({required} required)")]
    InsufficientFunds { player: PlayerId, required: Chips },
    #[error("No bet is waiting for confirmation")]
    NoPendingBet,
    #[error("Only the dealer can end the round")]
    NotDealer,
    #[error("Action not allowed while the room is {0:?}")]
    InvalidPhase(RoomPhase),
    #[error(transparent)]
    Deck(#[from] DeckError),
}
