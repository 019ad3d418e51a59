use std::sync::Arc;
use std::time::Duration;

use ba_cay_core::Deck;

use crate::directory::Directory;
use crate::ledger::Ledger;
use crate::registry::Registry;

/// Timings shared by every room.
#[derive(Debug, Clone, Copy)]
pub struct RoomSettings {
    /// How long players have to confirm or cancel their stakes.
    pub confirm_window: Duration,
    /// How long an empty room survives before listings prune it.
    pub room_grace: Duration,
}

impl Default for RoomSettings {
    fn default() -> Self {
        RoomSettings {
            confirm_window: Duration::from_secs(10),
            room_grace: Duration::from_secs(30),
        }
    }
}

/// Builds the deck for each deal.
pub type DeckSource = Arc<dyn Fn() -> Deck + Send + Sync>;

// Process-wide state shared by the socket tasks and every room actor.
pub struct AppState {
    pub registry: Registry,
    pub directory: Directory,
    pub ledger: Arc<dyn Ledger>,
    pub settings: RoomSettings,
    pub decks: DeckSource,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(ledger: Arc<dyn Ledger>, settings: RoomSettings) -> SharedState {
        Self::with_decks(ledger, settings, Arc::new(Deck::shuffled))
    }

    pub fn with_decks(ledger: Arc<dyn Ledger>, settings: RoomSettings, decks: DeckSource) -> SharedState {
        Arc::new(AppState {
            registry: Registry::new(),
            directory: Directory::new(),
            ledger,
            settings,
            decks,
        })
    }
}
