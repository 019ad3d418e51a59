use std::io::Write;

use anyhow::{Context, bail};
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use url::Url;
use uuid::Uuid;

use ba_cay_core::{Card, ClientMessage, Player, RoomId, ServerMessage};

#[derive(Parser, Debug)]
#[command(name = "ba_cay_client", about = "Terminal client for the Ba Cây server")]
struct Args {
    /// WebSocket endpoint of the server
    #[arg(long, default_value = "ws://127.0.0.1:25917/ws")]
    url: Url,

    /// Player id. A random one is generated when omitted.
    #[arg(long)]
    id: Option<String>,

    /// Display name
    #[arg(long, default_value = "player")]
    name: String,
}

enum Input {
    Send(ClientMessage),
    Help,
    Exit,
}

const HELP: &str = "\
Commands:
  me                      - show who you are
  balance                 - ask for your balance
  list                    - list rooms
  create <name> <bet>     - create a room
  join <room>             - join a room, it becomes the current room
  leave                   - leave the current room
  ready / unready         - toggle readiness
  start                   - start a round (everyone must be ready)
  confirm                 - confirm your stake
  cancel                  - cancel the stake of everyone
  end                     - settle the round (dealer only)
  exit                    - quit";

/// Turns one input line into a request. Room commands act on `room`.
fn parse_line(line: &str, me: &Player, room: Option<&RoomId>) -> Result<Input, String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let current_room = || room.cloned().ok_or_else(|| "join a room first".to_string());
    let user_id = me.id.clone();

    let msg = match parts.as_slice() {
        [] | ["help"] => return Ok(Input::Help),
        ["exit"] => return Ok(Input::Exit),
        ["me"] => ClientMessage::UserInfo { user: me.clone() },
        ["balance"] => ClientMessage::GetBalance,
        ["list"] => ClientMessage::ListRoom,
        ["create", name, bet] => {
            let bet_amount = bet.parse().map_err(|_| format!("invalid bet: {}", bet))?;
            ClientMessage::CreateRoom { name: name.to_string(), bet_amount }
        }
        ["join", room_id] => ClientMessage::JoinRoom { room_id: room_id.to_string(), user: me.clone() },
        ["leave"] => ClientMessage::LeaveRoom { room_id: current_room()?, user_id },
        ["ready"] => ClientMessage::AgreeGame { room_id: current_room()?, user_id, agree: true },
        ["unready"] => ClientMessage::AgreeGame { room_id: current_room()?, user_id, agree: false },
        ["start"] => ClientMessage::StartGame { room_id: current_room()? },
        ["confirm"] => ClientMessage::UserConfirmBet { room_id: current_room()?, user_id },
        ["cancel"] => ClientMessage::UserCancelBet { room_id: current_room()? },
        ["end"] => ClientMessage::EndGame { room_id: current_room()?, user_id },
        _ => return Err(format!("unknown command: {}", line.trim())),
    };
    Ok(Input::Send(msg))
}

fn render(msg: &ServerMessage) -> String {
    match msg {
        ServerMessage::StartedGame { hands, ranking, .. } => {
            let mut out = String::from("cards are dealt:\n");
            for (seat, hand) in hands.iter().enumerate() {
                let cards: Vec<String> = hand.iter().map(Card::to_string).collect();
                out.push_str(&format!("  seat {}: {}\n", seat, cards.join(" ")));
            }
            for r in ranking {
                out.push_str(&format!("  #{} {} scores {} ({})\n", r.rank, r.player_id, r.score, r.card));
            }
            out
        }
        ServerMessage::Status { message } => format!("status: {}", message),
        ServerMessage::Warning { message } => format!("warning: {}", message),
        ServerMessage::Balance { balance } => format!("balance: {}", balance),
        other => format!("{:#?}", other),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let id = args.id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let me = Player::new(id, args.name);

    println!("connecting to {}", args.url);
    let (ws_stream, _) = connect_async(args.url.as_str())
        .await
        .with_context(|| format!("cannot connect to {}", args.url))?;
    println!("connected as {} ({})", me.display_name, me.id);

    let (mut write, mut read) = ws_stream.split();

    tokio::spawn(async move {
        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(server_msg) => {
                        println!("\n<-- {}\n", render(&server_msg));
                        print!("> ");
                        let _ = std::io::stdout().flush();
                    }
                    Err(e) => eprintln!("unreadable server message: {}", e),
                },
                Ok(_) => {}
                Err(e) => {
                    eprintln!("connection error: {}", e);
                    break;
                }
            }
        }
    });

    let hello = serde_json::to_string(&ClientMessage::UserInfo { user: me.clone() })?;
    write.send(Message::Text(hello.into())).await?;

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut room: Option<RoomId> = None;
    println!("{}", HELP);

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = stdin.next_line().await? else {
            break;
        };
        let msg = match parse_line(&line, &me, room.as_ref()) {
            Ok(Input::Send(msg)) => msg,
            Ok(Input::Help) => {
                println!("{}", HELP);
                continue;
            }
            Ok(Input::Exit) => {
                println!("disconnecting");
                break;
            }
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        if let ClientMessage::JoinRoom { room_id, .. } = &msg {
            room = Some(room_id.clone());
        }
        let payload = serde_json::to_string(&msg)?;
        if write.send(Message::Text(payload.into())).await.is_err() {
            bail!("server closed the connection");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn me() -> Player {
        Player::new("u1", "an")
    }

    #[test]
    fn test_room_commands_need_a_room() {
        assert!(parse_line("ready", &me(), None).is_err());

        let room = "abc".to_string();
        match parse_line("ready", &me(), Some(&room)) {
            Ok(Input::Send(ClientMessage::AgreeGame { room_id, user_id, agree })) => {
                assert_eq!(room_id, "abc");
                assert_eq!(user_id, "u1");
                assert!(agree);
            }
            _ => panic!("expected agreeGame"),
        }
    }

    #[test]
    fn test_create_parses_bet() {
        match parse_line("create vip 25", &me(), None) {
            Ok(Input::Send(ClientMessage::CreateRoom { name, bet_amount })) => {
                assert_eq!(name, "vip");
                assert_eq!(bet_amount, 25);
            }
            _ => panic!("expected createRoom"),
        }
        assert!(parse_line("create vip lots", &me(), None).is_err());
        assert!(parse_line("dance", &me(), None).is_err());
        assert!(matches!(parse_line("  ", &me(), None), Ok(Input::Help)));
    }
}
