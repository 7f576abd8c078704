//! JSON-RPC ledger client.
//!
//! Talks to a cluster node over HTTP JSON-RPC. Reads use `getBalance`,
//! `getAccountInfo` (base64 data), `getSignaturesForAddress`,
//! `getTransaction` and `getProgramAccounts`; submissions go through the configured `WalletSigner`
//! and `sendTransaction`, then `getSignatureStatuses` is polled until the
//! transaction reaches `confirmed`.
//!
//! This client performs no retries of its own. Read retries belong to the
//! orchestrator; submissions are never retried.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine as _;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::codec::{encode_instruction, parse_bankroll, parse_share_record, SHARE_RECORD_LEN};
use super::{AccountMeta, LedgerProgram, SigningRequest, WalletSigner};
use crate::config::{HistoryConfig, LedgerConfig};
use crate::engine::pool::PoolSnapshot;
use crate::types::{
    AccountRef, Confirmation, HistoryPage, Instruction, ReelError, ShareRecord, Signature, TransferEvent,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const SYSTEM_PROGRAM_ID: &str = "11111111111111111111111111111111";
const COMMITMENT: &str = "confirmed";

// ---------------------------------------------------------------------------
// API response types (JSON-RPC → Rust)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// `{ "context": {...}, "value": T }`
#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct RpcAccount {
    /// `[data, encoding]`
    data: (String, String),
}

impl RpcAccount {
    fn decode(&self, address: &str) -> Result<Vec<u8>, ReelError> {
        base64::engine::general_purpose::STANDARD
            .decode(self.data.0.as_bytes())
            .map_err(|e| ReelError::MalformedResult(format!("account {address}: {e}")))
    }
}

/// One entry of `getProgramAccounts`.
#[derive(Debug, Deserialize)]
struct ProgramAccount {
    pubkey: String,
    account: RpcAccount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureInfo {
    signature: String,
    #[serde(default)]
    block_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTransaction {
    #[serde(default)]
    slot: Option<u64>,
    #[serde(default)]
    block_time: Option<i64>,
    #[serde(default)]
    meta: Option<RpcTransactionMeta>,
    transaction: RpcTransactionBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTransactionMeta {
    #[serde(default)]
    err: Option<Value>,
    #[serde(default)]
    pre_balances: Vec<u64>,
    #[serde(default)]
    post_balances: Vec<u64>,
    #[serde(default)]
    log_messages: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RpcTransactionBody {
    message: RpcMessage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcMessage {
    account_keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Blockhash {
    blockhash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureStatus {
    #[serde(default)]
    confirmation_status: Option<String>,
    #[serde(default)]
    err: Option<Value>,
}

impl RpcTransaction {
    fn into_confirmation(self, signature: &str) -> Confirmation {
        let (logs, err) = match self.meta {
            Some(meta) => (meta.log_messages.unwrap_or_default(), meta.err.map(|e| e.to_string())),
            None => (Vec::new(), None),
        };
        Confirmation {
            signature: signature.to_string(),
            slot: self.slot,
            logs,
            err,
        }
    }

    /// Interpret this transaction as a pool transfer, judged by the pool
    /// account's balance change. `None` if it never invoked the program.
    fn transfer_event(
        &self,
        signature: &str,
        program_id: &str,
        bankroll: &str,
        fallback_time: Option<i64>,
    ) -> Option<TransferEvent> {
        let keys = &self.transaction.message.account_keys;
        if !keys.iter().any(|k| k == program_id) {
            return None;
        }
        let meta = self.meta.as_ref()?;
        let timestamp = self
            .block_time
            .or(fallback_time)
            .and_then(|t| Utc.timestamp_opt(t, 0).single());
        let success = meta.err.is_none();

        let (pre, post) = keys
            .iter()
            .position(|k| k == bankroll)
            .and_then(|idx| Some((*meta.pre_balances.get(idx)?, *meta.post_balances.get(idx)?)))
            .unwrap_or((0, 0));

        Some(TransferEvent::from_balance_delta(signature, pre, post, timestamp, success))
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Ledger client over JSON-RPC.
pub struct RpcLedger {
    http: Client,
    url: SecretString,
    program_id: String,
    bankroll: String,
    signer: Option<Arc<dyn WalletSigner>>,
    confirm_poll: Duration,
    confirm_attempts: u32,
    parse_limit: usize,
    fetch_delay: Duration,
    next_id: AtomicU64,
}

impl RpcLedger {
    /// Create a read-only client. Attach a wallet with `with_signer`.
    pub fn new(url: SecretString, ledger: &LedgerConfig, history: &HistoryConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(ledger.request_timeout_secs))
            .user_agent("REELBANK/0.1.0")
            .build()
            .context("Failed to build HTTP client for ledger RPC")?;

        let confirm_poll = Duration::from_millis(ledger.confirm_poll_ms.max(1));
        let confirm_attempts = confirm_attempts(ledger.confirm_timeout_secs, ledger.confirm_poll_ms);

        info!(
            program_id = %ledger.program_id,
            bankroll = %ledger.bankroll_address,
            "Ledger RPC client ready"
        );

        Ok(Self {
            http,
            url,
            program_id: ledger.program_id.clone(),
            bankroll: ledger.bankroll_address.clone(),
            signer: None,
            confirm_poll,
            confirm_attempts,
            parse_limit: history.parse_limit,
            fetch_delay: Duration::from_millis(history.fetch_delay_ms),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn with_signer(mut self, signer: Arc<dyn WalletSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn is_read_only(&self) -> bool {
        self.signer.is_none()
    }

    // -- Internal helpers ------------------------------------------------

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, ReelError> {
        self.call_nullable(method, params)
            .await?
            .ok_or_else(|| ReelError::MalformedResult(format!("{method}: response has no result")))
    }

    /// Like `call`, but a `null` result is `Ok(None)` rather than an error.
    async fn call_nullable<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Option<T>, ReelError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });

        debug!(method, id, "Ledger RPC request");

        let resp = self
            .http
            .post(self.url.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport(method, &e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ReelError::Unreachable(format!("{method}: HTTP {status}: {text}")));
        }

        let envelope: RpcEnvelope<T> = resp
            .json()
            .await
            .map_err(|e| ReelError::MalformedResult(format!("{method}: {e}")))?;

        if let Some(err) = envelope.error {
            return Err(if method == "sendTransaction" {
                ReelError::Rejected(format!("{} (code {})", err.message, err.code))
            } else {
                ReelError::Unreachable(format!("{method}: {} (code {})", err.message, err.code))
            });
        }

        Ok(envelope.result)
    }

    async fn get_balance(&self, address: &str) -> Result<u64, ReelError> {
        let r: WithContext<u64> = self
            .call("getBalance", json!([address, { "commitment": COMMITMENT }]))
            .await?;
        Ok(r.value)
    }

    /// Raw account data, or `None` when the account doesn't exist.
    async fn get_account_data(&self, address: &str) -> Result<Option<Vec<u8>>, ReelError> {
        let r: WithContext<Option<RpcAccount>> = self
            .call(
                "getAccountInfo",
                json!([address, { "encoding": "base64", "commitment": COMMITMENT }]),
            )
            .await?;
        r.value.map(|acct| acct.decode(address)).transpose()
    }

    async fn get_transaction(&self, signature: &str) -> Result<Option<RpcTransaction>, ReelError> {
        self.call_nullable(
            "getTransaction",
            json!([signature, {
                "encoding": "json",
                "commitment": COMMITMENT,
                "maxSupportedTransactionVersion": 0
            }]),
        )
        .await
    }

    async fn latest_blockhash(&self) -> Result<String, ReelError> {
        let r: WithContext<Blockhash> = self
            .call("getLatestBlockhash", json!([{ "commitment": COMMITMENT }]))
            .await?;
        Ok(r.value.blockhash)
    }

    fn account_metas(&self, account: &AccountRef, instruction: &Instruction) -> Vec<AccountMeta> {
        let meta = |pubkey: &str, is_signer, is_writable| AccountMeta {
            pubkey: pubkey.to_string(),
            is_signer,
            is_writable,
        };
        let mut metas = vec![meta(&account.wallet, true, true), meta(&self.bankroll, false, true)];
        if instruction.touches_shares() {
            metas.push(meta(&account.share_record, false, true));
        }
        if !matches!(instruction, Instruction::Withdraw { .. }) {
            metas.push(meta(SYSTEM_PROGRAM_ID, false, false));
        }
        metas
    }
}

/// Status polls that fit in the confirmation window, at least one.
fn confirm_attempts(timeout_secs: u64, poll_ms: u64) -> u32 {
    let window_ms = timeout_secs.saturating_mul(1_000);
    u32::try_from(window_ms / poll_ms.max(1)).unwrap_or(u32::MAX).max(1)
}

fn classify_transport(method: &str, e: &reqwest::Error) -> ReelError {
    if e.is_timeout() {
        ReelError::Timeout(format!("{method}: {e}"))
    } else {
        ReelError::Unreachable(format!("{method}: {e}"))
    }
}

#[async_trait]
impl LedgerProgram for RpcLedger {
    async fn send(&self, account: &AccountRef, instruction: &Instruction) -> Result<Signature, ReelError> {
        let signer = self.signer.as_ref().ok_or(ReelError::NoWallet)?;

        let request = SigningRequest {
            program_id: self.program_id.clone(),
            accounts: self.account_metas(account, instruction),
            data: encode_instruction(instruction),
            recent_blockhash: self.latest_blockhash().await?,
        };
        let signed = signer.sign(&request).await?;

        let sig: String = self
            .call(
                "sendTransaction",
                json!([signed, { "encoding": "base64", "preflightCommitment": COMMITMENT }]),
            )
            .await?;

        info!(signature = %sig, instruction = %instruction, "Transaction broadcast");
        Ok(Signature(sig))
    }

    async fn confirm(&self, signature: &Signature) -> Result<Confirmation, ReelError> {
        for attempt in 0..self.confirm_attempts {
            let statuses: WithContext<Vec<Option<SignatureStatus>>> = self
                .call(
                    "getSignatureStatuses",
                    json!([[signature.0], { "searchTransactionHistory": true }]),
                )
                .await?;

            if let Some(Some(status)) = statuses.value.into_iter().next() {
                let level = status.confirmation_status.as_deref().unwrap_or("processed");
                if status.err.is_some() || level == "confirmed" || level == "finalized" {
                    debug!(signature = %signature, attempt, level, "Transaction settled");
                    return match self.get_transaction(&signature.0).await? {
                        Some(tx) => Ok(tx.into_confirmation(&signature.0)),
                        None => Ok(Confirmation {
                            signature: signature.0.clone(),
                            err: status.err.map(|e| e.to_string()),
                            ..Default::default()
                        }),
                    };
                }
            }

            tokio::time::sleep(self.confirm_poll).await;
        }

        Err(ReelError::Timeout(format!(
            "{signature} not confirmed after {} polls",
            self.confirm_attempts
        )))
    }

    async fn lookup(&self, signature: &Signature) -> Result<Option<Confirmation>, ReelError> {
        Ok(self
            .get_transaction(&signature.0)
            .await?
            .map(|tx| tx.into_confirmation(&signature.0)))
    }

    async fn balances(&self, account: &AccountRef) -> Result<PoolSnapshot, ReelError> {
        let (pool_balance, bankroll_data, record_data) = futures::try_join!(
            self.get_balance(&self.bankroll),
            self.get_account_data(&self.bankroll),
            self.get_account_data(&account.share_record),
        )?;

        let total_shares = match bankroll_data {
            Some(data) => parse_bankroll(&data)?.total_shares,
            None => {
                warn!(bankroll = %self.bankroll, "Bankroll account not found, treating pool as empty");
                0
            }
        };
        let account_shares = match record_data {
            Some(data) => parse_share_record(&data)?.shares,
            None => 0,
        };

        PoolSnapshot::new(pool_balance, total_shares, account_shares)
    }

    async fn history(&self, account: &AccountRef, limit: usize) -> Result<HistoryPage, ReelError> {
        let sigs: Vec<SignatureInfo> = self
            .call(
                "getSignaturesForAddress",
                json!([account.share_record, { "limit": limit, "commitment": COMMITMENT }]),
            )
            .await?;

        let mut truncated = sigs.len() >= limit || sigs.len() > self.parse_limit;
        let mut events = Vec::new();

        for (i, info) in sigs.iter().take(self.parse_limit).enumerate() {
            if i > 0 && !self.fetch_delay.is_zero() {
                tokio::time::sleep(self.fetch_delay).await;
            }
            match self.get_transaction(&info.signature).await {
                Ok(Some(tx)) => {
                    if let Some(ev) =
                        tx.transfer_event(&info.signature, &self.program_id, &self.bankroll, info.block_time)
                    {
                        events.push(ev);
                    }
                }
                // A listed signature we could not read leaves a gap in the
                // window, so the page must not claim to be complete.
                Ok(None) => {
                    debug!(signature = %info.signature, "Transaction not found, skipping");
                    truncated = true;
                }
                Err(e) => {
                    warn!(signature = %info.signature, error = %e, "Failed to parse transaction");
                    truncated = true;
                }
            }
        }

        debug!(fetched = events.len(), truncated, "History page assembled");
        Ok(HistoryPage { events, truncated })
    }

    async fn share_records(&self) -> Result<Vec<ShareRecord>, ReelError> {
        let accounts: Vec<ProgramAccount> = self
            .call(
                "getProgramAccounts",
                json!([self.program_id, {
                    "encoding": "base64",
                    "commitment": COMMITMENT,
                    "filters": [{ "dataSize": SHARE_RECORD_LEN }]
                }]),
            )
            .await?;

        let mut records = Vec::with_capacity(accounts.len());
        for entry in accounts {
            match entry.account.decode(&entry.pubkey).and_then(|data| parse_share_record(&data)) {
                Ok(record) => records.push(record),
                Err(e) => warn!(address = %entry.pubkey, error = %e, "Skipping unreadable share record"),
            }
        }
        debug!(records = records.len(), "Share records fetched");
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
