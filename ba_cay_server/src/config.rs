use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ba_cay_core::Chips;
use clap::Parser;

use crate::ledger::{HttpLedger, Ledger, MemoryLedger};
use crate::state::RoomSettings;

#[derive(Parser, Debug, Clone)]
#[command(name = "ba_cay_server", version, about = "Room and match server for Ba Cây")]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "BA_CAY_BIND", default_value = "0.0.0.0:25917")]
    pub bind: SocketAddr,

    /// Base URL of the balance service. Balances are kept in memory when unset.
    #[arg(long, env = "BA_CAY_LEDGER_URL")]
    pub ledger_url: Option<String>,

    /// Shared secret sent with every balance request
    #[arg(long, env = "BA_CAY_LEDGER_HASH", default_value = "")]
    pub ledger_hash: String,

    /// Starting balance of unknown players in the in-memory ledger
    #[arg(long, env = "BA_CAY_OPENING_BALANCE", default_value_t = 100_000)]
    pub opening_balance: Chips,

    /// Seconds players have to confirm their stakes
    #[arg(long, env = "BA_CAY_CONFIRM_WINDOW_SECS", default_value_t = 10)]
    pub confirm_window_secs: u64,

    /// Seconds an empty room is kept before listings drop it
    #[arg(long, env = "BA_CAY_ROOM_GRACE_SECS", default_value_t = 30)]
    pub room_grace_secs: u64,

    /// Log filter, e.g. `info` or `ba_cay_server=debug`. Overrides RUST_LOG.
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Config {
    pub fn settings(&self) -> RoomSettings {
        RoomSettings {
            confirm_window: Duration::from_secs(self.confirm_window_secs),
            room_grace: Duration::from_secs(self.room_grace_secs),
        }
    }

    pub fn ledger(&self) -> Arc<dyn Ledger> {
        match &self.ledger_url {
            Some(url) => Arc::new(HttpLedger::new(url.as_str(), self.ledger_hash.as_str())),
            None => Arc::new(MemoryLedger::new(self.opening_balance)),
        }
    }
}
