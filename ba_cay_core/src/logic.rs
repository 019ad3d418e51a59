use crate::card::{Deck, Hand, MAX_PLAYERS};
use crate::error::RoomError;
use crate::hand::{self, HandRanking};
use crate::state::*;
use serde::{Deserialize, Serialize};

/// Cards and rankings of the current session. Replaced wholesale by the next
/// deal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    pub session_id: SessionId,
    /// Seat order used for `hands`.
    pub seats: Vec<PlayerId>,
    pub hands: Vec<Hand>,
    /// Best hand first.
    pub rankings: Vec<HandRanking>,
}

impl Deal {
    pub fn hand_of(&self, player_id: &PlayerId) -> Option<&Hand> {
        let seat = self.seats.iter().position(|p| p == player_id)?;
        self.hands.get(seat)
    }

    pub fn ranking_of(&self, player_id: &PlayerId) -> Option<&HandRanking> {
        self.rankings.iter().find(|r| &r.player_id == player_id)
    }
}

/// What happened to the room when a member left.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Departure {
    /// New owner, if the leaver owned the room.
    pub new_owner: Option<PlayerId>,
    /// The room has no members left and is now closed.
    pub closed: bool,
}

/// Decision taken when a confirmation window elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowVerdict {
    /// The window belongs to an older session or the room moved on.
    Stale,
    Deal,
    Cancel,
}

// --- Room lifecycle ---

impl Room {
    pub fn new(id: RoomId, name: String, bet_amount: Chips) -> Self {
        Room {
            id,
            name,
            members: Vec::new(),
            owner: None,
            medal_holder: None,
            ready_player: Vec::new(),
            user_confirmed: Vec::new(),
            all_user_confirmed: true,
            bet_amount,
            is_playing: false,
            session_id: None,
            phase: RoomPhase::Open,
        }
    }

    pub fn is_member(&self, player_id: &PlayerId) -> bool {
        self.members.contains(player_id)
    }

    pub fn is_dealer(&self, player_id: &PlayerId) -> bool {
        self.medal_holder.as_ref() == Some(player_id)
    }

    /// Stake the dealer puts up: one `bet x K` per opponent.
    pub fn dealer_stake(&self) -> Chips {
        let opponents = self.members.len().saturating_sub(1) as Chips;
        self.bet_amount * STAKE_MULTIPLIER * opponents
    }

    pub fn player_stake(&self) -> Chips {
        self.bet_amount * STAKE_MULTIPLIER
    }

    pub fn stake_for(&self, player_id: &PlayerId) -> Chips {
        if self.is_dealer(player_id) { self.dealer_stake() } else { self.player_stake() }
    }

    /// Adds a member. Returns `Ok(false)` when the player is already seated.
    ///
    /// The first member becomes owner and dealer.
    pub fn join(&mut self, player_id: &PlayerId) -> Result<bool, RoomError> {
        if !self.phase.accepts_joins() {
            return Err(RoomError::GameInProgress);
        }
        if self.is_member(player_id) {
            return Ok(false);
        }
        if self.members.len() >= MAX_PLAYERS {
            return Err(RoomError::RoomFull { max: MAX_PLAYERS });
        }

        self.members.push(player_id.clone());
        if self.owner.is_none() {
            self.owner = Some(player_id.clone());
        }
        if self.medal_holder.is_none() {
            self.medal_holder = Some(player_id.clone());
        }
        self.refresh_idle_phase();
        self.force_owner_ready();
        Ok(true)
    }

    /// Removes a member together with its readiness and confirmation.
    ///
    /// Ownership and the dealer role pass to the earliest remaining member.
    /// Round bookkeeping (refunds, voiding a deal) is the caller's business;
    /// this only keeps the membership fields consistent.
    pub fn leave(&mut self, player_id: &PlayerId) -> Result<Departure, RoomError> {
        if !self.is_member(player_id) {
            return Err(RoomError::NotMember(player_id.clone()));
        }

        self.members.retain(|p| p != player_id);
        self.ready_player.retain(|p| p != player_id);
        self.user_confirmed.retain(|p| p != player_id);

        let mut departure = Departure::default();
        if self.owner.as_ref() == Some(player_id) {
            self.owner = self.members.first().cloned();
            departure.new_owner = self.owner.clone();
        }
        if self.is_dealer(player_id) {
            self.medal_holder = self.members.first().cloned();
        }

        if self.members.is_empty() {
            self.close();
            departure.closed = true;
        } else if !self.phase.in_round() {
            self.refresh_idle_phase();
            self.force_owner_ready();
        }
        Ok(departure)
    }

    /// Toggles readiness. The owner can never drop out of the ready set.
    pub fn set_ready(&mut self, player_id: &PlayerId, agree: bool) -> Result<(), RoomError> {
        if !self.is_member(player_id) {
            return Err(RoomError::NotMember(player_id.clone()));
        }
        if self.phase.in_round() {
            return Err(RoomError::GameInProgress);
        }

        if agree {
            if !self.ready_player.contains(player_id) {
                self.ready_player.push(player_id.clone());
            }
        } else {
            self.ready_player.retain(|p| p != player_id);
        }
        self.force_owner_ready();
        Ok(())
    }

    pub fn all_ready(&self) -> bool {
        self.members.iter().all(|m| self.ready_player.contains(m))
    }

    /// Validates a start request against cached balances. `balance_of`
    /// returns `None` for players missing from the directory.
    pub fn check_start<F>(&self, balance_of: F) -> Result<(), RoomError>
    where
        F: Fn(&PlayerId) -> Option<Chips>,
    {
        if self.phase.in_round() {
            return Err(RoomError::GameInProgress);
        }
        if self.phase == RoomPhase::Closed {
            return Err(RoomError::RoomNotFound);
        }
        if self.members.len() < 2 {
            return Err(RoomError::NotEnoughPlayers);
        }
        if self.ready_player.len() != self.members.len() || !self.all_ready() {
            return Err(RoomError::NotAllReady);
        }

        let dealer_stake = self.dealer_stake();
        let dealer_ok = self
            .medal_holder
            .as_ref()
            .and_then(|d| balance_of(d))
            .is_some_and(|b| b >= dealer_stake);
        if !dealer_ok {
            return Err(RoomError::DealerInsufficientFunds { required: dealer_stake });
        }

        let player_stake = self.player_stake();
        for member in self.members.iter().filter(|m| !self.is_dealer(m)) {
            if balance_of(member).is_none_or(|b| b < player_stake) {
                return Err(RoomError::InsufficientFunds {
                    player: member.clone(),
                    required: player_stake,
                });
            }
        }
        Ok(())
    }

    /// Opens a new session and returns the stake owed by each member, in
    /// seat order. Call [`Room::check_start`] first.
    pub fn begin_staking(&mut self, session_id: SessionId) -> Vec<(PlayerId, Chips)> {
        self.session_id = Some(session_id);
        self.user_confirmed.clear();
        self.all_user_confirmed = true;
        self.phase = RoomPhase::Staking;
        self.members.iter().map(|m| (m.clone(), self.stake_for(m))).collect()
    }

    pub fn confirm_bet(&mut self, player_id: &PlayerId) -> Result<(), RoomError> {
        if self.phase != RoomPhase::Staking {
            return Err(RoomError::NoPendingBet);
        }
        if !self.is_member(player_id) {
            return Err(RoomError::NotMember(player_id.clone()));
        }
        if !self.user_confirmed.contains(player_id) {
            self.user_confirmed.push(player_id.clone());
        }
        Ok(())
    }

    pub fn cancel_bet(&mut self) -> Result<(), RoomError> {
        if self.phase != RoomPhase::Staking {
            return Err(RoomError::NoPendingBet);
        }
        self.all_user_confirmed = false;
        Ok(())
    }

    pub fn window_verdict(&self, session_id: SessionId) -> WindowVerdict {
        if self.phase != RoomPhase::Staking || self.session_id != Some(session_id) {
            return WindowVerdict::Stale;
        }
        let everyone_confirmed = self.members.iter().all(|m| self.user_confirmed.contains(m));
        if self.all_user_confirmed || everyone_confirmed {
            WindowVerdict::Deal
        } else {
            WindowVerdict::Cancel
        }
    }

    /// Deals one hand per member in seat order and ranks them.
    pub fn deal(&mut self, deck: &mut Deck) -> Result<Deal, RoomError> {
        if self.phase != RoomPhase::Staking {
            return Err(RoomError::InvalidPhase(self.phase));
        }
        let session_id = self.session_id.ok_or(RoomError::NoPendingBet)?;

        let hands = deck.deal(self.members.len())?;
        let rankings = hand::rank(&hands, &self.members);
        self.phase = RoomPhase::Dealt;
        self.is_playing = true;

        Ok(Deal {
            session_id,
            seats: self.members.clone(),
            hands,
            rankings,
        })
    }

    /// Checks that `player_id` may end the current round.
    pub fn check_settle(&self, player_id: &PlayerId) -> Result<(), RoomError> {
        if self.phase != RoomPhase::Dealt {
            return Err(RoomError::NotPlaying);
        }
        if !self.is_dealer(player_id) {
            return Err(RoomError::NotDealer);
        }
        Ok(())
    }

    pub fn begin_settlement(&mut self) {
        self.phase = RoomPhase::Settled;
    }

    /// Closes the round after settlement. `promoted` takes over as owner and
    /// dealer when present. Readiness restarts from the owner alone.
    ///
    /// Returns the new owner if ownership changed hands.
    pub fn finish_round(&mut self, promoted: Option<&PlayerId>) -> Option<PlayerId> {
        let mut new_owner = None;
        if let Some(winner) = promoted.filter(|w| self.is_member(w) && !self.is_dealer(w)) {
            self.owner = Some(winner.clone());
            self.medal_holder = Some(winner.clone());
            new_owner = Some(winner.clone());
        }
        self.ready_player.clear();
        self.end_session();
        new_owner
    }

    /// Drops the current session without settling it.
    pub fn abort_round(&mut self) {
        self.end_session();
    }

    fn end_session(&mut self) {
        self.is_playing = false;
        self.session_id = None;
        self.user_confirmed.clear();
        self.all_user_confirmed = true;
        if self.members.is_empty() {
            self.close();
        } else {
            self.refresh_idle_phase();
            self.force_owner_ready();
        }
    }

    fn close(&mut self) {
        self.owner = None;
        self.medal_holder = None;
        self.ready_player.clear();
        self.user_confirmed.clear();
        self.is_playing = false;
        self.session_id = None;
        self.phase = RoomPhase::Closed;
    }

    fn refresh_idle_phase(&mut self) {
        self.phase = if self.members.len() >= 2 {
            RoomPhase::AwaitingReady
        } else {
            RoomPhase::Open
        };
    }

    fn force_owner_ready(&mut self) {
        if let Some(owner) = &self.owner {
            if !self.ready_player.contains(owner) {
                self.ready_player.push(owner.clone());
            }
        }
    }

    /// Structural invariants that must hold between any two operations.
    pub fn is_consistent(&self) -> bool {
        let subset = |ids: &[PlayerId]| ids.iter().all(|p| self.members.contains(p));
        let seated = |id: &Option<PlayerId>| match id {
            Some(p) => self.members.contains(p),
            None => self.members.is_empty(),
        };
        let playing_ok = match self.phase {
            RoomPhase::Dealt => self.is_playing,
            RoomPhase::Open | RoomPhase::AwaitingReady => !self.is_playing,
            _ => true,
        };
        subset(&self.ready_player)
            && subset(&self.user_confirmed)
            && seated(&self.owner)
            && seated(&self.medal_holder)
            && playing_ok
    }
}

// --- Unit tests ---

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn id(s: &str) -> PlayerId {
        s.to_string()
    }

    fn room_with(members: &[&str]) -> Room {
        let mut room = Room::new("r1".into(), "table".into(), 10);
        for m in members {
            room.join(&id(m)).unwrap();
        }
        room
    }

    fn everyone_ready(room: &mut Room) {
        for m in room.members.clone() {
            room.set_ready(&m, true).unwrap();
        }
    }

    fn rich(_: &PlayerId) -> Option<Chips> {
        Some(1_000_000)
    }

    #[test]
    fn test_first_joiner_owns_and_deals() {
        let mut room = Room::new("r1".into(), "table".into(), 10);
        assert_eq!(room.phase, RoomPhase::Open);

        assert!(room.join(&id("alice")).unwrap());
        assert_eq!(room.owner, Some(id("alice")));
        assert_eq!(room.medal_holder, Some(id("alice")));
        assert_eq!(room.ready_player, vec![id("alice")]);
        assert_eq!(room.phase, RoomPhase::Open);

        assert!(room.join(&id("bob")).unwrap());
        assert_eq!(room.owner, Some(id("alice")));
        assert_eq!(room.phase, RoomPhase::AwaitingReady);
        assert!(room.is_consistent());
    }

    #[test]
    fn test_join_twice_is_noop() {
        let mut room = room_with(&["alice"]);
        assert!(!room.join(&id("alice")).unwrap());
        assert_eq!(room.members.len(), 1);
    }

    #[test]
    fn test_join_rejected_while_playing() {
        let mut room = room_with(&["alice", "bob"]);
        everyone_ready(&mut room);
        room.check_start(rich).unwrap();
        room.begin_staking(Uuid::new_v4());
        assert_eq!(room.join(&id("carol")), Err(RoomError::GameInProgress));
    }

    #[test]
    fn test_room_capacity() {
        let names: Vec<String> = (0..MAX_PLAYERS).map(|i| format!("p{i}")).collect();
        let mut room = Room::new("r1".into(), "table".into(), 10);
        for n in &names {
            room.join(n).unwrap();
        }
        assert_eq!(room.join(&id("late")), Err(RoomError::RoomFull { max: 12 }));
    }

    #[test]
    fn test_owner_leaves_transfers_to_next_member() {
        let mut room = room_with(&["alice", "bob", "carol"]);
        assert_eq!(room.ready_player, vec![id("alice")]);

        let departure = room.leave(&id("alice")).unwrap();
        assert_eq!(departure.new_owner, Some(id("bob")));
        assert!(!departure.closed);
        assert_eq!(room.owner, Some(id("bob")));
        assert_eq!(room.medal_holder, Some(id("bob")));
        // bob was never ready, the owner is forced in
        assert!(room.ready_player.contains(&id("bob")));
        assert!(!room.ready_player.contains(&id("alice")));
        assert_eq!(room.phase, RoomPhase::AwaitingReady);
        assert!(room.is_consistent());
    }

    #[test]
    fn test_last_member_closes_room() {
        let mut room = room_with(&["alice", "bob"]);
        room.leave(&id("bob")).unwrap();
        assert_eq!(room.phase, RoomPhase::Open);

        let departure = room.leave(&id("alice")).unwrap();
        assert!(departure.closed);
        assert_eq!(room.phase, RoomPhase::Closed);
        assert_eq!(room.owner, None);
        assert!(room.is_consistent());
        assert_eq!(room.join(&id("alice")), Err(RoomError::GameInProgress));
    }

    #[test]
    fn test_leave_non_member() {
        let mut room = room_with(&["alice"]);
        assert_eq!(room.leave(&id("bob")), Err(RoomError::NotMember(id("bob"))));
    }

    #[test]
    fn test_owner_cannot_unready() {
        let mut room = room_with(&["alice", "bob"]);
        room.set_ready(&id("alice"), false).unwrap();
        assert!(room.ready_player.contains(&id("alice")));

        room.set_ready(&id("bob"), true).unwrap();
        room.set_ready(&id("bob"), true).unwrap();
        assert_eq!(room.ready_player.len(), 2);
        room.set_ready(&id("bob"), false).unwrap();
        assert_eq!(room.ready_player, vec![id("alice")]);
    }

    #[test]
    fn test_start_preconditions() {
        let mut room = room_with(&["alice"]);
        assert_eq!(room.check_start(rich), Err(RoomError::NotEnoughPlayers));

        room.join(&id("bob")).unwrap();
        assert_eq!(room.check_start(rich), Err(RoomError::NotAllReady));

        everyone_ready(&mut room);
        assert_eq!(room.check_start(rich), Ok(()));

        // dealer needs 10 * 4 * 1 = 40
        let balances: HashMap<PlayerId, Chips> = [(id("alice"), 39), (id("bob"), 1000)].into();
        assert_eq!(
            room.check_start(|p| balances.get(p).copied()),
            Err(RoomError::DealerInsufficientFunds { required: 40 })
        );

        let balances: HashMap<PlayerId, Chips> = [(id("alice"), 40), (id("bob"), 39)].into();
        assert_eq!(
            room.check_start(|p| balances.get(p).copied()),
            Err(RoomError::InsufficientFunds { player: id("bob"), required: 40 })
        );

        // unknown profile counts as broke
        let balances: HashMap<PlayerId, Chips> = [(id("alice"), 40)].into();
        assert!(room.check_start(|p| balances.get(p).copied()).is_err());
    }

    #[test]
    fn test_stakes_per_member() {
        let mut room = room_with(&["alice", "bob", "carol"]);
        everyone_ready(&mut room);
        let stakes = room.begin_staking(Uuid::new_v4());
        assert_eq!(
            stakes,
            vec![(id("alice"), 80), (id("bob"), 40), (id("carol"), 40)]
        );
        assert_eq!(room.phase, RoomPhase::Staking);
        assert!(room.all_user_confirmed);
        assert!(room.user_confirmed.is_empty());
    }

    #[test]
    fn test_window_verdicts() {
        let mut room = room_with(&["alice", "bob"]);
        everyone_ready(&mut room);
        let session = Uuid::new_v4();
        room.begin_staking(session);

        assert_eq!(room.window_verdict(Uuid::new_v4()), WindowVerdict::Stale);
        assert_eq!(room.window_verdict(session), WindowVerdict::Deal);

        room.cancel_bet().unwrap();
        assert_eq!(room.window_verdict(session), WindowVerdict::Cancel);

        // explicit confirmation from everyone overrides a cancel
        room.confirm_bet(&id("alice")).unwrap();
        room.confirm_bet(&id("bob")).unwrap();
        room.confirm_bet(&id("bob")).unwrap();
        assert_eq!(room.user_confirmed.len(), 2);
        assert_eq!(room.window_verdict(session), WindowVerdict::Deal);
    }

    #[test]
    fn test_confirm_outside_staking() {
        let mut room = room_with(&["alice", "bob"]);
        assert_eq!(room.confirm_bet(&id("alice")), Err(RoomError::NoPendingBet));
        assert_eq!(room.cancel_bet(), Err(RoomError::NoPendingBet));
    }

    #[test]
    fn test_deal_and_finish_round() {
        let mut room = room_with(&["alice", "bob", "carol"]);
        everyone_ready(&mut room);
        let session = Uuid::new_v4();
        room.begin_staking(session);

        let mut deck = Deck::shuffled();
        let deal = room.deal(&mut deck).unwrap();
        assert_eq!(room.phase, RoomPhase::Dealt);
        assert!(room.is_playing);
        assert_eq!(deal.session_id, session);
        assert_eq!(deal.hands.len(), 3);
        assert_eq!(deal.seats, room.members);
        assert_eq!(deck.remaining(), 36 - 9);
        assert!(room.is_consistent());

        assert_eq!(room.check_settle(&id("bob")), Err(RoomError::NotDealer));
        room.check_settle(&id("alice")).unwrap();
        room.begin_settlement();

        let new_owner = room.finish_round(Some(&id("carol")));
        assert_eq!(new_owner, Some(id("carol")));
        assert_eq!(room.owner, Some(id("carol")));
        assert_eq!(room.medal_holder, Some(id("carol")));
        assert_eq!(room.ready_player, vec![id("carol")]);
        assert_eq!(room.phase, RoomPhase::AwaitingReady);
        assert!(!room.is_playing);
        assert_eq!(room.session_id, None);
        assert!(room.is_consistent());
    }

    #[test]
    fn test_finish_round_ignores_current_dealer() {
        let mut room = room_with(&["alice", "bob"]);
        everyone_ready(&mut room);
        room.begin_staking(Uuid::new_v4());
        room.deal(&mut Deck::shuffled()).unwrap();
        room.begin_settlement();
        assert_eq!(room.finish_round(Some(&id("alice"))), None);
        assert_eq!(room.owner, Some(id("alice")));
        assert_eq!(room.ready_player, vec![id("alice")]);
    }

    #[test]
    fn test_settle_outside_deal() {
        let room = room_with(&["alice", "bob"]);
        assert_eq!(room.check_settle(&id("alice")), Err(RoomError::NotPlaying));
    }

    #[test]
    fn test_leave_during_staking_keeps_phase() {
        let mut room = room_with(&["alice", "bob", "carol"]);
        everyone_ready(&mut room);
        room.begin_staking(Uuid::new_v4());
        room.confirm_bet(&id("carol")).unwrap();

        room.leave(&id("carol")).unwrap();
        assert_eq!(room.phase, RoomPhase::Staking);
        assert!(room.user_confirmed.is_empty());
        assert!(room.is_consistent());

        room.abort_round();
        assert_eq!(room.phase, RoomPhase::AwaitingReady);
        assert!(room.is_consistent());
    }
}
