//! # Ba Cây core
//!
//! Everything about the game that does not need a network or a clock: the
//! 36-card deck, hand scoring and ranking, the room lifecycle state machine,
//! stake settlement, and the messages exchanged with clients. The server
//! crate drives these types from one actor per room.

mod card;
mod error;
mod hand;
mod logic;
mod message;
mod settlement;
mod state;

pub use card::*;

pub use error::*;

pub use hand::*;

pub use logic::*;

pub use message::*;

pub use settlement::*;

pub use state::*;
