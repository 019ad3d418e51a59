use ba_cay_core::{Player, PlayerId, Room, SessionId};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::directory::ConnectionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveReason {
    Requested,
    Disconnected,
}

/// Requests handled by a room actor, one at a time in arrival order.
///
/// `origin` is the connection that gets any rejection notice.
#[derive(Debug)]
pub enum Message {
    Join {
        player: Player,
        origin: ConnectionId,
    },
    Leave {
        player_id: PlayerId,
        reason: LeaveReason,
        origin: ConnectionId,
    },
    Agree {
        player_id: PlayerId,
        agree: bool,
        origin: ConnectionId,
    },
    Start {
        requester: PlayerId,
        origin: ConnectionId,
    },
    ConfirmBet {
        player_id: PlayerId,
        origin: ConnectionId,
    },
    CancelBet {
        player_id: PlayerId,
        origin: ConnectionId,
    },
    EndGame {
        player_id: PlayerId,
        origin: ConnectionId,
    },
    /// Sent by the confirmation timer of `session_id`.
    WindowElapsed {
        session_id: SessionId,
    },
    Snapshot {
        response: oneshot::Sender<Room>,
    },
}

#[derive(Clone)]
pub struct Mailbox {
    sender: mpsc::Sender<Message>,
}

#[derive(Debug, Error)]
pub enum MailboxError {
    #[error("room mailbox closed")]
    Closed,
    #[error("room request canceled")]
    Canceled,
}

impl Mailbox {
    pub(crate) fn new(sender: mpsc::Sender<Message>) -> Self {
        Self { sender }
    }

    /// The actor has stopped and will never read again.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn send(&self, message: Message) -> Result<(), MailboxError> {
        self.sender.send(message).await.map_err(|_| MailboxError::Closed)
    }

    pub async fn join(&self, player: Player, origin: ConnectionId) -> Result<(), MailboxError> {
        self.send(Message::Join { player, origin }).await
    }

    pub async fn leave(
        &self,
        player_id: PlayerId,
        reason: LeaveReason,
        origin: ConnectionId,
    ) -> Result<(), MailboxError> {
        self.send(Message::Leave { player_id, reason, origin }).await
    }

    pub async fn agree(&self, player_id: PlayerId, agree: bool, origin: ConnectionId) -> Result<(), MailboxError> {
        self.send(Message::Agree { player_id, agree, origin }).await
    }

    pub async fn start(&self, requester: PlayerId, origin: ConnectionId) -> Result<(), MailboxError> {
        self.send(Message::Start { requester, origin }).await
    }

    pub async fn confirm_bet(&self, player_id: PlayerId, origin: ConnectionId) -> Result<(), MailboxError> {
        self.send(Message::ConfirmBet { player_id, origin }).await
    }

    pub async fn cancel_bet(&self, player_id: PlayerId, origin: ConnectionId) -> Result<(), MailboxError> {
        self.send(Message::CancelBet { player_id, origin }).await
    }

    pub async fn end_game(&self, player_id: PlayerId, origin: ConnectionId) -> Result<(), MailboxError> {
        self.send(Message::EndGame { player_id, origin }).await
    }

    /// Waits until every earlier message is handled and returns the room.
    pub async fn snapshot(&self) -> Result<Room, MailboxError> {
        let (response, receiver) = oneshot::channel();
        self.send(Message::Snapshot { response }).await?;
        receiver.await.map_err(|_| MailboxError::Canceled)
    }
}
