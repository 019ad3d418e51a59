use crate::card::{Card, Hand};
use crate::state::PlayerId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Best possible point score ("mười").
pub const MAX_SCORE: u8 = 10;

/// Ranking of one seat within a deal.
///
/// `rank` starts at 1 for the best hand. No two seats share a rank: equal
/// scores are split by `card`, and every card in the deck is distinct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandRanking {
    pub player_id: PlayerId,
    pub seat: usize,
    pub score: u8,
    pub card: Card,
    pub rank: usize,
}

// --- Scoring ---

/// Sum of the points modulo 10, with 0 read as 10. Always in `1..=10`.
pub fn score(hand: &Hand) -> u8 {
    let sum: u32 = hand.iter().map(|c| u32::from(c.point)).sum();
    match (sum % 10) as u8 {
        0 => MAX_SCORE,
        s => s,
    }
}

/// Ace-high point weight. Kept here so stored points are never rewritten.
fn point_weight(point: u8) -> u8 {
    match point {
        1 => 14,
        p => p,
    }
}

/// Card order used for tie-breaks: suit first, then ace-high point.
pub fn compare_cards(a: &Card, b: &Card) -> Ordering {
    a.suit
        .weight()
        .cmp(&b.suit.weight())
        .then_with(|| point_weight(a.point).cmp(&point_weight(b.point)))
}

/// The highest card of the hand under [`compare_cards`].
pub fn ranking_card(hand: &Hand) -> Card {
    hand[1..].iter().fold(hand[0], |best, card| {
        if compare_cards(card, &best) == Ordering::Greater { *card } else { best }
    })
}

// --- Special shapes ---

/// "Sáp": some point value shows up three times.
pub fn has_triple(hand: &Hand) -> bool {
    hand.iter()
        .any(|c| hand.iter().filter(|o| o.point == c.point).count() == 3)
}

/// "Đồng hoa": three cards of one suit with consecutive points.
pub fn has_run(hand: &Hand) -> bool {
    let mut cards = *hand;
    cards.sort_by_key(|c| c.point);
    let same_suit = cards.windows(2).all(|w| w[0].suit == w[1].suit);
    let consecutive = cards.windows(2).all(|w| w[0].point + 1 == w[1].point);
    same_suit && consecutive
}

// --- Ranking ---

/// Ranks every seat of a deal. `hands[i]` belongs to `players[i]`.
///
/// The result is ordered best first: score descending, then ranking card
/// descending.
pub fn rank(hands: &[Hand], players: &[PlayerId]) -> Vec<HandRanking> {
    let mut rankings: Vec<HandRanking> = hands
        .iter()
        .zip(players)
        .enumerate()
        .map(|(seat, (hand, player_id))| HandRanking {
            player_id: player_id.clone(),
            seat,
            score: score(hand),
            card: ranking_card(hand),
            rank: 0,
        })
        .collect();

    rankings.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| compare_cards(&b.card, &a.card))
    });

    for (i, ranking) in rankings.iter_mut().enumerate() {
        ranking.rank = i + 1;
    }
    rankings
}

// --- Unit tests ---

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{Deck, Suit::*};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn card(suit: crate::card::Suit, point: u8) -> Card {
        Card::new(suit, point)
    }

    #[test]
    fn test_score_wraps_to_ten() {
        assert_eq!(score(&[card(Spade, 9), card(Heart, 9), card(Club, 9)]), 7);
        assert_eq!(score(&[card(Spade, 1), card(Heart, 4), card(Club, 5)]), 10);
        assert_eq!(score(&[card(Spade, 2), card(Heart, 9), card(Club, 9)]), 10);
        assert_eq!(score(&[card(Spade, 1), card(Heart, 1), card(Club, 1)]), 3);
    }

    #[test]
    fn test_score_range_over_every_hand() {
        let mut deck = Deck::new();
        let all: Vec<Card> = deck.deal(12).unwrap().into_iter().flatten().collect();
        for a in 0..all.len() {
            for b in (a + 1)..all.len() {
                for c in (b + 1)..all.len() {
                    let s = score(&[all[a], all[b], all[c]]);
                    assert!((1..=10).contains(&s));
                }
            }
        }
    }

    #[test]
    fn test_ranking_card_prefers_suit_then_ace() {
        // Diamond beats any Heart regardless of point
        let hand = [card(Heart, 9), card(Diamond, 2), card(Club, 1)];
        assert_eq!(ranking_card(&hand), card(Diamond, 2));

        // within a suit the ace outranks the nine
        let hand = [card(Spade, 9), card(Spade, 1), card(Spade, 5)];
        assert_eq!(ranking_card(&hand), card(Spade, 1));

        let hand = [card(Club, 3), card(Club, 8), card(Spade, 1)];
        assert_eq!(ranking_card(&hand), card(Club, 8));
    }

    #[test]
    fn test_triple() {
        assert!(has_triple(&[card(Spade, 4), card(Heart, 4), card(Club, 4)]));
        assert!(!has_triple(&[card(Spade, 4), card(Heart, 4), card(Club, 5)]));
        assert!(!has_triple(&[card(Spade, 1), card(Spade, 2), card(Spade, 3)]));
    }

    #[test]
    fn test_run() {
        assert!(has_run(&[card(Heart, 5), card(Heart, 3), card(Heart, 4)]));
        assert!(has_run(&[card(Club, 1), card(Club, 2), card(Club, 3)]));
        // consecutive but mixed suits
        assert!(!has_run(&[card(Heart, 5), card(Club, 3), card(Heart, 4)]));
        // same suit, gap
        assert!(!has_run(&[card(Heart, 5), card(Heart, 3), card(Heart, 6)]));
        // no wrap-around from nine to ace
        assert!(!has_run(&[card(Heart, 8), card(Heart, 9), card(Heart, 1)]));
    }

    #[test]
    fn test_run_and_triple_are_independent_flags() {
        let hands = [
            [card(Heart, 5), card(Heart, 3), card(Heart, 4)],
            [card(Spade, 7), card(Heart, 7), card(Diamond, 7)],
            [card(Spade, 7), card(Heart, 2), card(Diamond, 4)],
        ];
        let flags: Vec<(bool, bool)> = hands.iter().map(|h| (has_run(h), has_triple(h))).collect();
        assert_eq!(flags, vec![(true, false), (false, true), (false, false)]);
    }

    #[test]
    fn test_rank_orders_by_score_then_card() {
        let players: Vec<PlayerId> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let hands = [
            [card(Spade, 2), card(Spade, 3), card(Club, 1)], // 6, Club A
            [card(Diamond, 9), card(Heart, 8), card(Spade, 1)], // 8
            [card(Diamond, 3), card(Heart, 2), card(Spade, 1)], // 6, Diamond 3
            [card(Club, 5), card(Heart, 5), card(Spade, 9)],   // 9
        ];
        let rankings = rank(&hands, &players);

        let order: Vec<&str> = rankings.iter().map(|r| r.player_id.as_str()).collect();
        assert_eq!(order, vec!["d", "b", "c", "a"]);
        assert_eq!(rankings.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert_eq!(rankings[2].card, card(Diamond, 3));
        assert_eq!(rankings[3].card, card(Club, 1));
        assert_eq!(rankings[3].seat, 0);
    }

    #[test]
    fn test_rank_is_a_permutation_for_random_deals() {
        let mut rng = StdRng::seed_from_u64(2024);
        for players in 2..=12 {
            let ids: Vec<PlayerId> = (0..players).map(|i| format!("p{i}")).collect();
            let hands = Deck::shuffled_with(&mut rng).deal(players).unwrap();
            let rankings = rank(&hands, &ids);

            let mut ranks: Vec<usize> = rankings.iter().map(|r| r.rank).collect();
            ranks.sort_unstable();
            assert_eq!(ranks, (1..=players).collect::<Vec<_>>());

            // strictly decreasing under the comparator
            for pair in rankings.windows(2) {
                let ord = pair[0]
                    .score
                    .cmp(&pair[1].score)
                    .then_with(|| compare_cards(&pair[0].card, &pair[1].card));
                assert_eq!(ord, Ordering::Greater);
            }
        }
    }
}
