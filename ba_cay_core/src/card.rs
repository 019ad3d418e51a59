use crate::error::DeckError;
use rand::Rng;
use rand::prelude::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;

// --- Core data structures ---

/// Suit of a card. Only used for tie-breaks, never for the score.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Suit {
    Diamond, // ♦️
    Heart,   // ♥️
    Club,    // ♣️
    Spade,   // ♠️
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Diamond, Suit::Heart, Suit::Club, Suit::Spade];

    /// Tie-break weight: Diamond > Heart > Club > Spade.
    pub fn weight(self) -> u8 {
        match self {
            Suit::Diamond => 4,
            Suit::Heart => 3,
            Suit::Club => 2,
            Suit::Spade => 1,
        }
    }
}

/// A single card. `point` is stored as dealt (1..=9); the ace-high weighting
/// only exists inside the comparator in `hand`.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct Card {
    pub suit: Suit,
    pub point: u8,
}

impl Card {
    pub fn new(suit: Suit, point: u8) -> Card {
        Card { suit, point }
    }
}

pub const MIN_POINT: u8 = 1;
pub const MAX_POINT: u8 = 9;
pub const DECK_SIZE: usize = Suit::ALL.len() * MAX_POINT as usize;
pub const CARDS_PER_HAND: usize = 3;
/// 36 cards cover at most 12 three-card hands.
pub const MAX_PLAYERS: usize = DECK_SIZE / CARDS_PER_HAND;

/// Three cards dealt to one seat.
pub type Hand = [Card; CARDS_PER_HAND];

// --- Display helpers ---

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            Suit::Diamond => "♦️",
            Suit::Heart => "♥️",
            Suit::Club => "♣️",
            Suit::Spade => "♠️",
        })
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.point {
            1 => write!(f, "{}A", self.suit),
            p => write!(f, "{}{}", self.suit, p),
        }
    }
}

// --- Deck ---

/// A 36-card deck that deals without replacement. A fresh deck is built for
/// every deal.
#[derive(Debug, Clone)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Default for Deck {
    fn default() -> Self {
        Self::new()
    }
}

impl Deck {
    /// Builds an ordered deck: each suit carries points 1 to 9 once.
    pub fn new() -> Self {
        let mut cards = Vec::with_capacity(DECK_SIZE);
        for &suit in &Suit::ALL {
            for point in MIN_POINT..=MAX_POINT {
                cards.push(Card { suit, point });
            }
        }
        Deck { cards }
    }

    /// Builds a deck and shuffles it with the thread-local generator.
    pub fn shuffled() -> Self {
        let mut rng = rand::rng();
        Self::shuffled_with(&mut rng)
    }

    pub fn shuffled_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut deck = Self::new();
        deck.shuffle(rng);
        deck
    }

    /// A deck that deals exactly `hands`, one per seat in the given order.
    pub fn stacked(hands: &[Hand]) -> Self {
        let cards = hands.iter().rev().flat_map(|hand| hand.iter().copied()).collect();
        Deck { cards }
    }

    /// Uniform Fisher-Yates permutation of the remaining cards.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.cards.shuffle(rng);
    }

    pub fn remaining(&self) -> usize {
        self.cards.len()
    }

    /// Deals one hand per player, in seat order.
    pub fn deal(&mut self, n_players: usize) -> Result<Vec<Hand>, DeckError> {
        let requested = n_players * CARDS_PER_HAND;
        if requested > self.cards.len() {
            return Err(DeckError::Capacity {
                requested,
                remaining: self.cards.len(),
            });
        }

        let mut hands = Vec::with_capacity(n_players);
        for _ in 0..n_players {
            let start = self.cards.len() - CARDS_PER_HAND;
            let dealt: Vec<Card> = self.cards.drain(start..).collect();
            hands.push([dealt[0], dealt[1], dealt[2]]);
        }
        Ok(hands)
    }
}

// --- Unit tests ---
