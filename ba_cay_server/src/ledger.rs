use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use ba_cay_core::{Chips, PlayerId};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Outcome reported by the balance service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerStatus {
    Success,
    Fail,
    Warning,
}

impl TryFrom<u8> for LedgerStatus {
    type Error = LedgerError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(LedgerStatus::Success),
            1 => Ok(LedgerStatus::Fail),
            2 => Ok(LedgerStatus::Warning),
            other => Err(LedgerError::UnknownStatus(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerReply {
    pub status: LedgerStatus,
    /// Balance after the operation. Only meaningful on success.
    pub balance: Option<Chips>,
    pub message: String,
}

impl LedgerReply {
    pub fn success(balance: Chips) -> Self {
        LedgerReply {
            status: LedgerStatus::Success,
            balance: Some(balance),
            message: String::new(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        LedgerReply {
            status: LedgerStatus::Fail,
            balance: None,
            message: message.into(),
        }
    }

    /// The confirmed balance, if the call went through.
    pub fn settled_balance(&self) -> Option<Chips> {
        match self.status {
            LedgerStatus::Success => self.balance,
            _ => None,
        }
    }
}

/// External balance service. Calls never panic and are never retried; every
/// failure comes back as a non-success reply.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn get_balance(&self, user: &PlayerId) -> LedgerReply;
    async fn add_balance(&self, user: &PlayerId, amount: Chips) -> LedgerReply;
    async fn deduct_balance(&self, user: &PlayerId, amount: Chips) -> LedgerReply;
}

// --- In-memory ledger ---

/// Keeps balances in process. Unknown users start with the opening balance.
pub struct MemoryLedger {
    balances: DashMap<PlayerId, Chips>,
    opening_balance: Chips,
    failing: AtomicBool,
}

impl MemoryLedger {
    pub fn new(opening_balance: Chips) -> Self {
        MemoryLedger {
            balances: DashMap::new(),
            opening_balance,
            failing: AtomicBool::new(false),
        }
    }

    /// While set, every call fails without touching balances.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn balance_of(&self, user: &PlayerId) -> Chips {
        self.balances.get(user).map_or(self.opening_balance, |b| *b)
    }

    fn unavailable(&self) -> Option<LedgerReply> {
        self.failing
            .load(Ordering::SeqCst)
            .then(|| LedgerReply::fail("Balance service unavailable"))
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn get_balance(&self, user: &PlayerId) -> LedgerReply {
        if let Some(reply) = self.unavailable() {
            return reply;
        }
        LedgerReply::success(self.balance_of(user))
    }

    async fn add_balance(&self, user: &PlayerId, amount: Chips) -> LedgerReply {
        if let Some(reply) = self.unavailable() {
            return reply;
        }
        let mut entry = self.balances.entry(user.clone()).or_insert(self.opening_balance);
        *entry += amount;
        LedgerReply::success(*entry)
    }

    async fn deduct_balance(&self, user: &PlayerId, amount: Chips) -> LedgerReply {
        if let Some(reply) = self.unavailable() {
            return reply;
        }
        let mut entry = self.balances.entry(user.clone()).or_insert(self.opening_balance);
        if *entry < amount {
            return LedgerReply::fail("Not enough balance");
        }
        *entry -= amount;
        LedgerReply::success(*entry)
    }
}

// --- HTTP ledger ---

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("ledger replied with unknown status {0}")]
    UnknownStatus(u8),
}

#[derive(Serialize)]
struct WireRequest<'a> {
    user: &'a str,
    value: Chips,
    hash: &'a str,
}

#[derive(Deserialize)]
struct WireData {
    #[serde(default)]
    balance: Chips,
}

#[derive(Deserialize)]
struct WireReply {
    status: u8,
    #[serde(default)]
    data: Option<WireData>,
    #[serde(default)]
    message: String,
}

impl TryFrom<WireReply> for LedgerReply {
    type Error = LedgerError;

    fn try_from(wire: WireReply) -> Result<Self, Self::Error> {
        Ok(LedgerReply {
            status: LedgerStatus::try_from(wire.status)?,
            balance: wire.data.map(|d| d.balance),
            message: wire.message,
        })
    }
}

/// Talks to the balance service over JSON POSTs.
pub struct HttpLedger {
    client: reqwest::Client,
    base_url: String,
    hash: String,
}

impl HttpLedger {
    pub fn new(base_url: impl Into<String>, hash: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        HttpLedger {
            client: reqwest::Client::new(),
            base_url,
            hash: hash.into(),
        }
    }

    async fn call(&self, endpoint: &str, user: &PlayerId, value: Chips) -> Result<LedgerReply, LedgerError> {
        let body = WireRequest { user, value, hash: &self.hash };
        let wire: WireReply = self
            .client
            .post(format!("{}/{}", self.base_url, endpoint))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        LedgerReply::try_from(wire)
    }

    async fn call_or_fail(&self, endpoint: &str, user: &PlayerId, value: Chips) -> LedgerReply {
        match self.call(endpoint, user, value).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("{} for {} failed: {}", endpoint, user, e);
                LedgerReply::fail("Balance service unavailable")
            }
        }
    }
}

#[async_trait]
impl Ledger for HttpLedger {
    async fn get_balance(&self, user: &PlayerId) -> LedgerReply {
        self.call_or_fail("getBalance", user, 0).await
    }

    async fn add_balance(&self, user: &PlayerId, amount: Chips) -> LedgerReply {
        self.call_or_fail("addBalance", user, amount).await
    }

    async fn deduct_balance(&self, user: &PlayerId, amount: Chips) -> LedgerReply {
        self.call_or_fail("deductBalance", user, amount).await
    }
}
