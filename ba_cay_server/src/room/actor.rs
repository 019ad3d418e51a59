use std::collections::HashMap;
use std::sync::Arc;

use ba_cay_core::{
    compute_settlement, Chips, Deal, Player, PlayerId, Room, RoomError, RoomPhase, ServerMessage, SessionId,
    WalletUpdate, WindowVerdict,
};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::ingress::{LeaveReason, Message};
use crate::directory::ConnectionId;
use crate::state::SharedState;

/// Owns one room. Runs until the last member leaves or the registry drops
/// the room's mailbox.
pub struct Actor {
    state: SharedState,
    room: Room,
    // what the registry and listings see
    snapshot: Arc<RwLock<Room>>,
    deal: Option<Deal>,
    // stakes withdrawn for the current session, by player
    stakes: HashMap<PlayerId, Chips>,
    window: Option<AbortHandle>,
    // weak so that a room nobody can reach still shuts down
    myself: mpsc::WeakSender<Message>,
    mailbox: mpsc::Receiver<Message>,
}

impl Actor {
    pub fn new(
        state: SharedState,
        room: Room,
        snapshot: Arc<RwLock<Room>>,
        myself: mpsc::WeakSender<Message>,
        mailbox: mpsc::Receiver<Message>,
    ) -> Self {
        Actor {
            state,
            room,
            snapshot,
            deal: None,
            stakes: HashMap::new(),
            window: None,
            myself,
            mailbox,
        }
    }

    pub async fn run(mut self) {
        info!("room {} ({}) opened, bet {}", self.room.id, self.room.name, self.room.bet_amount);

        while let Some(message) = self.mailbox.recv().await {
            let members = self.room.members.clone();
            self.handle(message).await;
            self.publish();

            let closed = self.room.phase == RoomPhase::Closed;
            if closed {
                self.state.registry.remove(&self.room.id, &self.snapshot);
            }
            if self.room.members != members {
                self.broadcast_listing();
            }
            if closed {
                break;
            }
        }

        if let Some(window) = self.window.take() {
            window.abort();
        }
        self.state.registry.remove(&self.room.id, &self.snapshot);
        info!("room {} closed", self.room.id);
    }

    async fn handle(&mut self, message: Message) {
        let (origin, result) = match message {
            Message::Join { player, origin } => (origin, self.join(player, origin).await),
            Message::Leave { player_id, reason, origin } => (origin, self.leave(player_id, reason).await),
            Message::Agree { player_id, agree, origin } => (origin, self.agree(player_id, agree)),
            Message::Start { requester, origin } => (origin, self.start(requester).await),
            Message::ConfirmBet { player_id, origin } => (origin, self.confirm_bet(player_id)),
            Message::CancelBet { player_id, origin } => (origin, self.cancel_bet(player_id)),
            Message::EndGame { player_id, origin } => (origin, self.end_game(player_id).await),
            Message::WindowElapsed { session_id } => {
                self.window_elapsed(session_id).await;
                return;
            }
            Message::Snapshot { response } => {
                let _ = response.send(self.room.clone());
                return;
            }
        };

        if let Err(e) = result {
            debug!("room {} rejected a request: {}", self.room.id, e);
            self.state.directory.send_to_connection(origin, ServerMessage::status(e.to_string()));
        }
    }

    // --- Membership ---

    async fn join(&mut self, player: Player, origin: ConnectionId) -> Result<(), RoomError> {
        if self.room.is_member(&player.id) {
            let reply = ServerMessage::RoomJoined {
                room_id: self.room.id.clone(),
                joined: false,
                room_members: self.member_profiles(),
                owner: self.room.owner.clone(),
            };
            self.state.directory.send_to_connection(origin, reply);
            return Ok(());
        }
        if !self.room.phase.accepts_joins() {
            return Err(RoomError::GameInProgress);
        }

        let player_id = player.id.clone();
        self.state.directory.ensure(player);
        if let Err(message) = self
            .state
            .directory
            .refresh_balance(self.state.ledger.as_ref(), &player_id)
            .await
        {
            self.state.directory.send_to_connection(origin, ServerMessage::warning(message));
        }
        let wallet = self.state.directory.wallet(&player_id).unwrap_or(0);
        if wallet < self.room.bet_amount {
            return Err(RoomError::InsufficientFunds {
                player: player_id,
                required: self.room.bet_amount,
            });
        }

        self.room.join(&player_id)?;
        info!("player {} joined room {}", player_id, self.room.id);

        let joined = ServerMessage::RoomJoined {
            room_id: self.room.id.clone(),
            joined: true,
            room_members: self.member_profiles(),
            owner: self.room.owner.clone(),
        };
        self.broadcast(&joined);
        self.broadcast_readiness();
        Ok(())
    }

    async fn leave(&mut self, player_id: PlayerId, reason: LeaveReason) -> Result<(), RoomError> {
        if !self.room.is_member(&player_id) {
            return match reason {
                LeaveReason::Requested => Err(RoomError::NotMember(player_id)),
                LeaveReason::Disconnected => Ok(()),
            };
        }
        let phase = self.room.phase;
        if phase == RoomPhase::Dealt && reason == LeaveReason::Requested {
            return Err(RoomError::GameInProgress);
        }

        let departure = self.room.leave(&player_id)?;
        info!("player {} left room {} ({:?})", player_id, self.room.id, reason);

        let left = ServerMessage::RoomLeft {
            room_id: self.room.id.clone(),
            user_id: player_id.clone(),
            room_members: self.room.members.clone(),
        };
        self.broadcast(&left);
        self.state.directory.send_to(&player_id, left);

        if let Some(owner) = departure.new_owner {
            info!("room {} is now owned by {}", self.room.id, owner);
            self.broadcast(&ServerMessage::UpdateOwner {
                room_owner: Some(owner),
                room_members: self.room.members.clone(),
            });
        }

        match phase {
            RoomPhase::Staking => {
                let notice = format!("{} left the table, the round is cancelled", player_id);
                self.abandon_round(&notice).await;
            }
            RoomPhase::Dealt => {
                let notice = format!("{} disconnected, the round is void", player_id);
                self.abandon_round(&notice).await;
            }
            _ if !departure.closed => self.broadcast_readiness(),
            _ => {}
        }
        Ok(())
    }

    fn agree(&mut self, player_id: PlayerId, agree: bool) -> Result<(), RoomError> {
        self.room.set_ready(&player_id, agree)?;
        self.broadcast_readiness();
        Ok(())
    }

    // --- Round ---

    async fn start(&mut self, requester: PlayerId) -> Result<(), RoomError> {
        if !self.room.is_member(&requester) {
            return Err(RoomError::NotMember(requester));
        }
        self.room.check_start(|id| self.state.directory.wallet(id))?;

        if let Some(window) = self.window.take() {
            window.abort();
        }
        self.deal = None;
        self.stakes.clear();

        let session_id = Uuid::new_v4();
        let owed = self.room.begin_staking(session_id);
        info!("room {} started session {} at the request of {}", self.room.id, session_id, requester);

        let mut updates = Vec::with_capacity(owed.len());
        let mut collected = true;
        for (player_id, stake) in owed {
            let reply = self.state.ledger.deduct_balance(&player_id, stake).await;
            let Some(wallet) = reply.settled_balance() else {
                warn!("could not withdraw {} from {} in room {}: {}", stake, player_id, self.room.id, reply.message);
                self.warn_player(&player_id, &reply.message, "Could not withdraw your stake");
                // the window will find the flag cleared and refund whatever was collected
                let _ = self.room.cancel_bet();
                collected = false;
                break;
            };

            self.state.directory.set_wallet(&player_id, wallet);
            self.stakes.insert(player_id.clone(), stake);
            updates.push(WalletUpdate {
                user_id: player_id.clone(),
                wallet,
                delta: -(stake as i64),
            });
            let bet = ServerMessage::StartBet {
                game_id: self.room.id.clone(),
                total_bet: stake,
                session_id,
            };
            self.state.directory.send_to(&player_id, bet);
        }
        self.notify_wallets(updates);

        let window = self.state.settings.confirm_window;
        let notice = if collected {
            format!("Stakes are in, confirm or cancel within {} seconds", window.as_secs())
        } else {
            "Not every stake could be collected, the round will be cancelled".to_string()
        };
        self.broadcast(&ServerMessage::status(notice));
        self.schedule_window(session_id);
        Ok(())
    }

    fn schedule_window(&mut self, session_id: SessionId) {
        let myself = self.myself.clone();
        let window = self.state.settings.confirm_window;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if let Some(sender) = myself.upgrade() {
                let _ = sender.send(Message::WindowElapsed { session_id }).await;
            }
        });
        self.window = Some(timer.abort_handle());
    }

    fn confirm_bet(&mut self, player_id: PlayerId) -> Result<(), RoomError> {
        self.room.confirm_bet(&player_id)?;
        self.broadcast(&ServerMessage::UserConfirmed {
            user_id: Some(player_id),
            message: "Bet confirmed".to_string(),
        });
        Ok(())
    }

    fn cancel_bet(&mut self, player_id: PlayerId) -> Result<(), RoomError> {
        if !self.room.is_member(&player_id) {
            return Err(RoomError::NotMember(player_id));
        }
        self.room.cancel_bet()?;
        info!("player {} cancelled the bet in room {}", player_id, self.room.id);
        self.broadcast(&ServerMessage::UserConfirmed {
            message: format!("{} cancelled the bet", player_id),
            user_id: Some(player_id),
        });
        Ok(())
    }

    async fn window_elapsed(&mut self, session_id: SessionId) {
        let verdict = self.room.window_verdict(session_id);
        if verdict == WindowVerdict::Stale {
            debug!("room {} ignored the window of session {}", self.room.id, session_id);
            return;
        }
        self.window = None;

        let funded = self.room.members.iter().all(|m| self.stakes.contains_key(m));
        match verdict {
            WindowVerdict::Deal if funded => self.deal_cards().await,
            _ => self.abandon_round("The bet was not confirmed, stakes are refunded").await,
        }
    }

    async fn deal_cards(&mut self) {
        let mut deck = (self.state.decks)();
        match self.room.deal(&mut deck) {
            Ok(deal) => {
                info!("room {} dealt {} hands for session {}", self.room.id, deal.hands.len(), deal.session_id);
                let started = ServerMessage::StartedGame {
                    session_id: deal.session_id,
                    hands: deal.hands.clone(),
                    ranking: deal.rankings.clone(),
                };
                self.deal = Some(deal);
                self.broadcast(&started);
            }
            Err(e) => {
                warn!("room {} could not deal: {}", self.room.id, e);
                self.abandon_round(&e.to_string()).await;
            }
        }
    }

    async fn end_game(&mut self, player_id: PlayerId) -> Result<(), RoomError> {
        self.room.check_settle(&player_id)?;
        let deal = self.deal.take().ok_or(RoomError::NotPlaying)?;
        let settlement = match compute_settlement(&deal, &player_id, self.room.bet_amount) {
            Ok(settlement) => settlement,
            Err(e) => {
                warn!("room {} could not settle session {}: {}", self.room.id, deal.session_id, e);
                self.abandon_round("The round could not be settled, stakes are refunded").await;
                return Ok(());
            }
        };

        self.room.begin_settlement();
        self.publish();

        let mut updates = Vec::with_capacity(settlement.entries.len() + 1);
        for entry in &settlement.entries {
            updates.extend(self.credit(&entry.player_id, entry.payout).await);
        }
        updates.extend(self.credit(&settlement.dealer_id, settlement.dealer_payout).await);
        self.stakes.clear();
        info!(
            "room {} settled session {}, dealer {} net {}",
            self.room.id, deal.session_id, settlement.dealer_id, settlement.dealer_net
        );
        self.notify_wallets(updates);

        if let Some(owner) = self.room.finish_round(settlement.promoted.as_ref()) {
            info!("room {} passes the medal to {}", self.room.id, owner);
            self.broadcast(&ServerMessage::UpdateOwner {
                room_owner: Some(owner),
                room_members: self.room.members.clone(),
            });
        }
        self.broadcast(&ServerMessage::status("The round is settled"));
        self.broadcast_readiness();
        Ok(())
    }

    /// Refunds every stake collected this session and returns the room to
    /// idle.
    async fn abandon_round(&mut self, notice: &str) {
        if let Some(window) = self.window.take() {
            window.abort();
        }
        self.deal = None;

        let stakes = std::mem::take(&mut self.stakes);
        let mut updates = Vec::with_capacity(stakes.len());
        for (player_id, stake) in &stakes {
            updates.extend(self.credit(player_id, *stake).await);
        }
        self.room.abort_round();
        info!("room {} dropped its round: {}", self.room.id, notice);

        self.broadcast(&ServerMessage::status(notice));
        self.notify_wallets(updates);
        if self.room.phase != RoomPhase::Closed {
            self.broadcast_readiness();
        }
    }

    /// Pays `amount` back to a player. Zero amounts skip the ledger.
    async fn credit(&self, player_id: &PlayerId, amount: Chips) -> Option<WalletUpdate> {
        if amount == 0 {
            return self.state.directory.wallet(player_id).map(|wallet| WalletUpdate {
                user_id: player_id.clone(),
                wallet,
                delta: 0,
            });
        }

        let reply = self.state.ledger.add_balance(player_id, amount).await;
        match reply.settled_balance() {
            Some(wallet) => {
                self.state.directory.set_wallet(player_id, wallet);
                Some(WalletUpdate {
                    user_id: player_id.clone(),
                    wallet,
                    delta: amount as i64,
                })
            }
            None => {
                warn!("could not pay {} to {} in room {}: {}", amount, player_id, self.room.id, reply.message);
                self.warn_player(player_id, &reply.message, "Could not pay out your chips");
                None
            }
        }
    }

    // --- Outbound ---

    fn publish(&self) {
        *self.snapshot.write() = self.room.clone();
    }

    fn member_profiles(&self) -> Vec<Player> {
        self.room
            .members
            .iter()
            .map(|id| {
                self.state
                    .directory
                    .by_id(id)
                    .unwrap_or_else(|| Player::new(id.clone(), id.clone()))
            })
            .collect()
    }

    fn broadcast(&self, message: &ServerMessage) {
        self.state.directory.send_to_many(&self.room.members, message);
    }

    fn broadcast_readiness(&self) {
        self.broadcast(&ServerMessage::PlayerReady {
            owner: self.room.owner.clone(),
            ready_player: self.room.ready_player.clone(),
        });
    }

    fn broadcast_listing(&self) {
        let rooms = self.state.registry.list(self.state.settings.room_grace);
        self.state.directory.broadcast_all(&ServerMessage::ListRoom { rooms });
    }

    // Members plus anyone outside the room whose wallet changed.
    fn notify_wallets(&self, updates: Vec<WalletUpdate>) {
        if updates.is_empty() {
            return;
        }
        let mut recipients = self.room.members.clone();
        for update in &updates {
            if !recipients.contains(&update.user_id) {
                recipients.push(update.user_id.clone());
            }
        }
        self.state
            .directory
            .send_to_many(&recipients, &ServerMessage::PlayerWalletUpdated { updates });
    }

    fn warn_player(&self, player_id: &PlayerId, message: &str, fallback: &str) {
        let message = if message.is_empty() { fallback } else { message };
        self.state.directory.send_to(player_id, ServerMessage::warning(message));
    }
}
