//! Shared types for REELBANK.
//!
//! These types form the data model used across the engine, the ledger
//! boundary, storage and the dashboard. Amounts are always integer base
//! units (lamports); conversion to `Decimal` happens only for display.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Base units per whole unit of currency.
pub const LAMPORTS_PER_UNIT: u64 = 1_000_000_000;

/// Convert base units into a human-facing decimal amount.
pub fn to_currency(lamports: u64) -> Decimal {
    Decimal::from(lamports) / Decimal::from(LAMPORTS_PER_UNIT)
}

/// Convert a signed base-unit total (net principal, profit) for display.
pub fn signed_to_currency(lamports: i128) -> Decimal {
    match Decimal::try_from_i128_with_scale(lamports, 9) {
        Ok(d) => d.normalize(),
        Err(_) if lamports < 0 => Decimal::MIN,
        Err(_) => Decimal::MAX,
    }
}

// ---------------------------------------------------------------------------
// Reel symbols & display result
// ---------------------------------------------------------------------------

/// A reel symbol. Purely decorative; the multiplier is the economic fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Symbol {
    Cherry,
    Lemon,
    Orange,
    Diamond,
}

impl Symbol {
    /// The reel alphabet, in the order the ledger program indexes it.
    pub const ALL: [Symbol; 4] = [Symbol::Cherry, Symbol::Lemon, Symbol::Orange, Symbol::Diamond];
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Cherry => write!(f, "🍒"),
            Symbol::Lemon => write!(f, "🍋"),
            Symbol::Orange => write!(f, "🍊"),
            Symbol::Diamond => write!(f, "💎"),
        }
    }
}

/// What the reels show for one outcome code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayResult {
    pub code: u32,
    pub symbols: [Symbol; 3],
    /// Always `multiplier > 0`.
    pub win: bool,
    pub multiplier: u32,
}

impl DisplayResult {
    /// Whether the three symbols match.
    pub fn is_triple(&self) -> bool {
        self.symbols[0] == self.symbols[1] && self.symbols[1] == self.symbols[2]
    }

    /// Whether all three symbols differ.
    pub fn is_scatter(&self) -> bool {
        self.symbols[0] != self.symbols[1]
            && self.symbols[1] != self.symbols[2]
            && self.symbols[0] != self.symbols[2]
    }
}

impl fmt::Display for DisplayResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} {} {} ({}x{})",
            self.code,
            self.symbols[0],
            self.symbols[1],
            self.symbols[2],
            self.multiplier,
            if self.win { " WIN" } else { "" },
        )
    }
}

// ---------------------------------------------------------------------------
// Transfer history
// ---------------------------------------------------------------------------

/// Direction of a pool transfer, as observed from the pool account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferKind {
    Deposit,
    Withdraw,
    /// Transaction touched the share record but moved no pool funds.
    Unknown,
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferKind::Deposit => write!(f, "Deposit"),
            TransferKind::Withdraw => write!(f, "Withdraw"),
            TransferKind::Unknown => write!(f, "Unknown"),
        }
    }
}

/// One historical transfer against the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEvent {
    pub signature: String,
    pub kind: TransferKind,
    pub amount: u64,
    pub timestamp: Option<DateTime<Utc>>,
    pub success: bool,
}

/// A bounded batch of history as returned by the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPage {
    pub events: Vec<TransferEvent>,
    /// The source had more entries than were fetched.
    pub truncated: bool,
}

// ---------------------------------------------------------------------------
// Ledger boundary types
// ---------------------------------------------------------------------------

/// Identity of one participant: the wallet and its share record address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountRef {
    pub wallet: String,
    pub share_record: String,
}

impl AccountRef {
    pub fn new(wallet: impl Into<String>, share_record: impl Into<String>) -> Self {
        Self {
            wallet: wallet.into(),
            share_record: share_record.into(),
        }
    }

    /// Key used for per-account caches and single-flight slots.
    pub fn key(&self) -> &str {
        &self.wallet
    }
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wallet)
    }
}

/// One investor's share record as stored by the ledger program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareRecord {
    pub owner: String,
    pub shares: u64,
}

/// Transaction signature returned by the ledger on broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature(pub String);

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The three instruction kinds the ledger program accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    Wager { amount: u64 },
    Deposit { amount: u64 },
    Withdraw { shares: u64 },
}

impl Instruction {
    pub fn name(&self) -> &'static str {
        match self {
            Instruction::Wager { .. } => "wager",
            Instruction::Deposit { .. } => "deposit",
            Instruction::Withdraw { .. } => "withdraw",
        }
    }

    /// Deposits and withdrawals mutate the caller's share record.
    pub fn touches_shares(&self) -> bool {
        !matches!(self, Instruction::Wager { .. })
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Wager { amount } => write!(f, "wager({amount})"),
            Instruction::Deposit { amount } => write!(f, "deposit({amount})"),
            Instruction::Withdraw { shares } => write!(f, "withdraw({shares} shares)"),
        }
    }
}

/// A confirmed transaction as read back from the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub signature: String,
    pub slot: Option<u64>,
    pub logs: Vec<String>,
    /// Set when the transaction landed but the program rejected it.
    pub err: Option<String>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Error taxonomy shared by the engine and the ledger boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReelError {
    #[error("Invalid outcome code {code} (valid range 0..={max})")]
    InvalidCode { code: i64, max: u32 },

    #[error("Malformed ledger result: {0}")]
    MalformedResult(String),

    #[error("Action already in flight for {account}")]
    Busy { account: String },

    #[error("Cached history is stale")]
    StaleCache,

    #[error("Ledger unreachable: {0}")]
    Unreachable(String),

    #[error("Ledger timed out: {0}")]
    Timeout(String),

    #[error("State unknown, please verify on the ledger ({0})")]
    StateUnknown(String),

    #[error("Transaction rejected by ledger program: {0}")]
    Rejected(String),

    #[error("Illegal action transition: {from} -> {event}")]
    IllegalTransition { from: String, event: String },

    #[error("Inconsistent pool snapshot: {account_shares} account shares > {total_shares} total")]
    InconsistentSnapshot { account_shares: u64, total_shares: u64 },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Requested {requested} exceeds withdrawable {available}")]
    ExceedsWithdrawable { requested: u64, available: u64 },

    #[error("Withdrawal would leave the pool below its hard reserve of {hard_min}")]
    BelowHardReserve { hard_min: u64 },

    #[error("Deposit {amount} below minimum of {minimum}")]
    BelowMinimumDeposit { amount: u64, minimum: u64 },

    #[error("Wager {amount} below minimum wager {minimum}")]
    WagerTooSmall { amount: u64, minimum: u64 },

    #[error("Wager {amount} exceeds max wager {max}")]
    WagerTooLarge { amount: u64, max: u64 },

    #[error("Invalid outcome table: {0}")]
    InvalidTable(String),

    #[error("No wallet configured; ledger is read-only")]
    NoWallet,
}

impl ReelError {
    /// Availability failures that are safe to retry for idempotent reads.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReelError::Unreachable(_) | ReelError::Timeout(_))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
