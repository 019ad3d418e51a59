use ba_cay_core::{ClientMessage, PlayerId, RoomError, RoomId, ServerMessage};
use tracing::{debug, info};

use crate::directory::ConnectionId;
use crate::room::{self, LeaveReason, Mailbox, MailboxError};
use crate::state::SharedState;

const NOT_IDENTIFIED: &str = "Send your user info first";
const WRONG_IDENTITY: &str = "You can only act for yourself";

/// Handles one inbound frame of `connection`. Room actions are forwarded to
/// the room's actor; replies and rejections travel back over the directory.
pub async fn handle_client_message(state: &SharedState, connection: ConnectionId, msg: ClientMessage) {
    if let Err(message) = route(state, connection, msg).await {
        debug!("rejected request from connection {}: {}", connection, message);
        state.directory.send_to_connection(connection, ServerMessage::status(message));
    }
}

async fn route(state: &SharedState, connection: ConnectionId, msg: ClientMessage) -> Result<(), String> {
    match msg {
        ClientMessage::UserInfo { user } => {
            info!("connection {} is player {}", connection, user.id);
            let player_id = user.id.clone();
            state.directory.bind(connection, user);
            send_balance(state, connection, &player_id).await;
        }
        ClientMessage::GetBalance => {
            let player_id = identify(state, connection, None)?;
            send_balance(state, connection, &player_id).await;
        }
        ClientMessage::ListRoom => {
            let rooms = state.registry.list(state.settings.room_grace);
            state.directory.send_to_connection(connection, ServerMessage::ListRoom { rooms });
        }
        ClientMessage::CreateRoom { name, bet_amount } => {
            let room_id = room::create_room(state, name, bet_amount).map_err(|e| e.to_string())?;
            info!("connection {} created room {}", connection, room_id);
            state.directory.send_to_connection(connection, ServerMessage::RoomCreated { room_id });
            let rooms = state.registry.list(state.settings.room_grace);
            state.directory.broadcast_all(&ServerMessage::ListRoom { rooms });
        }
        ClientMessage::JoinRoom { room_id, user } => {
            match state.directory.player_of(connection) {
                Some(bound) if bound != user.id => return Err(WRONG_IDENTITY.to_string()),
                Some(_) => {}
                None => state.directory.bind(connection, user.clone()),
            }
            mailbox(state, &room_id)?.join(user, connection).await.map_err(room_gone)?;
        }
        ClientMessage::LeaveRoom { room_id, user_id } => {
            let player_id = identify(state, connection, Some(&user_id))?;
            mailbox(state, &room_id)?
                .leave(player_id, LeaveReason::Requested, connection)
                .await
                .map_err(room_gone)?;
        }
        ClientMessage::AgreeGame { room_id, user_id, agree } => {
            let player_id = identify(state, connection, Some(&user_id))?;
            mailbox(state, &room_id)?.agree(player_id, agree, connection).await.map_err(room_gone)?;
        }
        ClientMessage::StartGame { room_id } => {
            let player_id = identify(state, connection, None)?;
            mailbox(state, &room_id)?.start(player_id, connection).await.map_err(room_gone)?;
        }
        ClientMessage::UserConfirmBet { room_id, user_id } => {
            let player_id = identify(state, connection, Some(&user_id))?;
            mailbox(state, &room_id)?.confirm_bet(player_id, connection).await.map_err(room_gone)?;
        }
        ClientMessage::UserCancelBet { room_id } => {
            let player_id = identify(state, connection, None)?;
            mailbox(state, &room_id)?.cancel_bet(player_id, connection).await.map_err(room_gone)?;
        }
        ClientMessage::EndGame { room_id, user_id } => {
            let player_id = identify(state, connection, Some(&user_id))?;
            mailbox(state, &room_id)?.end_game(player_id, connection).await.map_err(room_gone)?;
        }
    }
    Ok(())
}

/// Makes every room the connection's player sits in forget them.
pub async fn handle_disconnect(state: &SharedState, connection: ConnectionId) {
    let Some(player_id) = state.directory.disconnect(connection) else {
        return;
    };
    for (room_id, mailbox) in state.registry.rooms_of(&player_id) {
        info!("player {} disconnected from room {}", player_id, room_id);
        if let Err(e) = mailbox.leave(player_id.clone(), LeaveReason::Disconnected, connection).await {
            debug!("room {} already gone: {}", room_id, e);
        }
    }
}

// The player bound to `connection`, checked against the id the client claims.
fn identify(state: &SharedState, connection: ConnectionId, claimed: Option<&PlayerId>) -> Result<PlayerId, &'static str> {
    let player_id = state.directory.player_of(connection).ok_or(NOT_IDENTIFIED)?;
    match claimed {
        Some(claimed) if *claimed != player_id => Err(WRONG_IDENTITY),
        _ => Ok(player_id),
    }
}

fn mailbox(state: &SharedState, room_id: &RoomId) -> Result<Mailbox, String> {
    state
        .registry
        .get(room_id)
        .ok_or_else(|| RoomError::RoomNotFound.to_string())
}

// The actor stopped between lookup and delivery.
fn room_gone(_: MailboxError) -> String {
    RoomError::RoomNotFound.to_string()
}

async fn send_balance(state: &SharedState, connection: ConnectionId, player_id: &PlayerId) {
    let message = match state.directory.refresh_balance(state.ledger.as_ref(), player_id).await {
        Ok(balance) => ServerMessage::Balance { balance },
        Err(message) => ServerMessage::warning(message),
    };
    state.directory.send_to_connection(connection, message);
}
