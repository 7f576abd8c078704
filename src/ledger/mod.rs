//! Ledger boundary.
//!
//! Defines the `LedgerProgram` trait the engine talks to and the
//! `WalletSigner` capability used to authorize submissions:
//! - `rpc` — JSON-RPC implementation against a live cluster
//! - `codec` — instruction, account and log formats of the program

pub mod codec;
pub mod rpc;

use async_trait::async_trait;

use crate::engine::pool::PoolSnapshot;
use crate::types::{AccountRef, Confirmation, HistoryPage, Instruction, ReelError, ShareRecord, Signature};

/// The external ledger program that owns balances and outcomes.
///
/// Reads (`balances`, `history`, `lookup`, `share_records`) are idempotent and may be
/// retried. `send` broadcasts a transaction and must never be blindly
/// retried by callers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerProgram: Send + Sync {
    /// Sign and broadcast one instruction on behalf of `account`.
    async fn send(&self, account: &AccountRef, instruction: &Instruction) -> Result<Signature, ReelError>;

    /// Wait for a broadcast transaction to confirm and return its result.
    async fn confirm(&self, signature: &Signature) -> Result<Confirmation, ReelError>;

    /// Re-query a transaction. `None` means the ledger has no record of it.
    async fn lookup(&self, signature: &Signature) -> Result<Option<Confirmation>, ReelError>;

    /// Current pool balance, total shares and the account's shares.
    async fn balances(&self, account: &AccountRef) -> Result<PoolSnapshot, ReelError>;

    /// Most recent transfers touching the account's share record.
    async fn history(&self, account: &AccountRef, limit: usize) -> Result<HistoryPage, ReelError>;

    /// Every investor share record held by the program.
    async fn share_records(&self) -> Result<Vec<ShareRecord>, ReelError>;
}

/// Account passed to the program, in instruction order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountMeta {
    pub pubkey: String,
    pub is_signer: bool,
    pub is_writable: bool,
}

/// Everything a wallet needs to build and sign one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningRequest {
    pub program_id: String,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
    pub recent_blockhash: String,
}

/// Signing capability supplied by the wallet layer. Keys never enter this
/// crate; the signer returns a serialized, signed transaction (base64).
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// Public key of the signing wallet.
    fn pubkey(&self) -> String;

    async fn sign(&self, request: &SigningRequest) -> Result<String, ReelError>;
}
