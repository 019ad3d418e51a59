use crate::card::Hand;
use crate::error::RoomError;
use crate::hand::{self, HandRanking, MAX_SCORE};
use crate::logic::Deal;
use crate::state::{Chips, PlayerId, STAKE_MULTIPLIER};
use serde::{Deserialize, Serialize};

pub const RUN_MULTIPLIER: Chips = 4;
pub const TRIPLE_MULTIPLIER: Chips = 3;
pub const MAX_SCORE_MULTIPLIER: Chips = 2;
pub const BASE_MULTIPLIER: Chips = 1;

/// Outcome of one player against the dealer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Duel {
    pub player_wins: bool,
    pub multiplier: Chips,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementEntry {
    pub player_id: PlayerId,
    pub duel: Duel,
    /// Change to the player's balance over the whole round.
    pub net: i64,
    /// Amount credited back after the stake was debited at start.
    pub payout: Chips,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub dealer_id: PlayerId,
    pub entries: Vec<SettlementEntry>,
    pub dealer_net: i64,
    pub dealer_payout: Chips,
    /// Non-dealer holding the best maximum score, who takes over the room.
    pub promoted: Option<PlayerId>,
}

/// A seat as seen by the settlement rules.
#[derive(Debug, Clone, Copy)]
pub struct SeatView<'a> {
    pub hand: &'a Hand,
    pub ranking: &'a HandRanking,
}

impl SeatView<'_> {
    fn beats(&self, other: &SeatView) -> bool {
        self.ranking.rank < other.ranking.rank
    }
}

/// Compares one player against the dealer.
///
/// Runs outrank triples, which outrank plain scores. When both sides hold
/// the same special shape the better rank takes it. A plain win pays double
/// when the winner scored the maximum.
pub fn duel(player: &SeatView, dealer: &SeatView) -> Duel {
    let (player_run, dealer_run) = (hand::has_run(player.hand), hand::has_run(dealer.hand));
    let (player_triple, dealer_triple) =
        (hand::has_triple(player.hand), hand::has_triple(dealer.hand));

    let (player_wins, multiplier) = match (player_run, dealer_run) {
        (true, false) => (true, RUN_MULTIPLIER),
        (false, true) => (false, RUN_MULTIPLIER),
        (true, true) => (player.beats(dealer), RUN_MULTIPLIER),
        (false, false) => match (player_triple, dealer_triple) {
            (true, false) => (true, TRIPLE_MULTIPLIER),
            (false, true) => (false, TRIPLE_MULTIPLIER),
            (true, true) => (player.beats(dealer), TRIPLE_MULTIPLIER),
            (false, false) => {
                let player_wins = player.beats(dealer);
                let winner = if player_wins { player } else { dealer };
                let multiplier = if winner.ranking.score == MAX_SCORE {
                    MAX_SCORE_MULTIPLIER
                } else {
                    BASE_MULTIPLIER
                };
                (player_wins, multiplier)
            }
        },
    };
    Duel { player_wins, multiplier }
}

fn seat_of<'a>(deal: &'a Deal, player_id: &PlayerId) -> Result<SeatView<'a>, RoomError> {
    match (deal.hand_of(player_id), deal.ranking_of(player_id)) {
        (Some(hand), Some(ranking)) => Ok(SeatView { hand, ranking }),
        _ => Err(RoomError::NotMember(player_id.clone())),
    }
}

/// Computes payouts for a finished deal. Pure: the ledger is not touched.
///
/// Each player staked `bet x K` and gets back `bet x (K + m)` on a win or
/// `bet x (K - m)` on a loss. The dealer staked `bet x K` per opponent and
/// collects the mirror image of every duel.
pub fn compute_settlement(
    deal: &Deal,
    dealer_id: &PlayerId,
    bet_amount: Chips,
) -> Result<Settlement, RoomError> {
    let dealer = seat_of(deal, dealer_id)?;
    let bet = bet_amount as i64;
    let stake = (bet_amount * STAKE_MULTIPLIER) as i64;

    let mut entries = Vec::with_capacity(deal.seats.len().saturating_sub(1));
    let mut dealer_net = 0i64;
    for ranking in deal.rankings.iter().filter(|r| &r.player_id != dealer_id) {
        let player = seat_of(deal, &ranking.player_id)?;
        let duel = duel(&player, &dealer);
        let units = duel.multiplier as i64;
        let net = if duel.player_wins { bet * units } else { -bet * units };
        dealer_net -= net;
        entries.push(SettlementEntry {
            player_id: ranking.player_id.clone(),
            duel,
            net,
            payout: (stake + net).max(0) as Chips,
        });
    }

    let dealer_stake = stake * entries.len() as i64;
    // the best maximum score at the table takes the medal, unless it is the dealer's
    let promoted = deal
        .rankings
        .iter()
        .find(|r| r.score == MAX_SCORE)
        .filter(|r| &r.player_id != dealer_id)
        .map(|r| r.player_id.clone());

    Ok(Settlement {
        dealer_id: dealer_id.clone(),
        entries,
        dealer_net,
        dealer_payout: (dealer_stake + dealer_net).max(0) as Chips,
        promoted,
    })
}

// --- Unit tests ---
