//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! The RPC endpoint may carry an API key, so it is referenced by env-var
//! name and held as a `SecretString` once resolved.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;

use crate::engine::outcome::{Bucket, OutcomeTable};
use crate::engine::pool::{
    ReserveFloor, DEFAULT_HARD_MIN_RESERVE, DEFAULT_MAX_WAGER_DIVISOR, DEFAULT_MIN_DEPOSIT,
    DEFAULT_MIN_WAGER, DEFAULT_RENT_RESERVE, DEFAULT_SAFE_RESERVE,
};
use crate::storage::DEFAULT_CACHE_FILE;
use crate::types::AccountRef;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub ledger: LedgerConfig,
    pub account: AccountConfig,
    #[serde(default)]
    pub reserve: ReserveConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub poll: PollConfig,
    pub dashboard: DashboardConfig,
    /// Overrides the built-in outcome table when present.
    #[serde(default)]
    pub outcome: Option<OutcomeConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    /// Env var holding the RPC URL (may embed an API key).
    pub rpc_url_env: String,
    /// Used when the env var is unset.
    #[serde(default)]
    pub rpc_url: Option<String>,
    pub program_id: String,
    pub bankroll_address: String,
    pub request_timeout_secs: u64,
    pub confirm_timeout_secs: u64,
    pub confirm_poll_ms: u64,
    pub read_retries: u32,
    pub read_backoff_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AccountConfig {
    pub wallet: String,
    pub share_record: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ReserveConfig {
    pub safe_reserve: u64,
    pub hard_min_reserve: u64,
    pub rent_reserve: u64,
    pub max_wager_divisor: u64,
    pub min_wager: u64,
    pub min_deposit: u64,
}

impl Default for ReserveConfig {
    fn default() -> Self {
        Self {
            safe_reserve: DEFAULT_SAFE_RESERVE,
            hard_min_reserve: DEFAULT_HARD_MIN_RESERVE,
            rent_reserve: DEFAULT_RENT_RESERVE,
            max_wager_divisor: DEFAULT_MAX_WAGER_DIVISOR,
            min_wager: DEFAULT_MIN_WAGER,
            min_deposit: DEFAULT_MIN_DEPOSIT,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HistoryConfig {
    /// Signatures requested per history fetch.
    pub signature_limit: usize,
    /// Of those, how many transactions are fetched and parsed.
    pub parse_limit: usize,
    /// Pause between transaction fetches (rate limiting).
    pub fetch_delay_ms: u64,
    pub cache_ttl_secs: u64,
    pub cache_path: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            signature_limit: 20,
            parse_limit: 10,
            fetch_delay_ms: 100,
            cache_ttl_secs: 300,
            cache_path: DEFAULT_CACHE_FILE.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollConfig {
    pub interval_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { interval_secs: 5 }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutcomeConfig {
    pub buckets: Vec<Bucket>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// RPC URL from the configured env var, else the file's fallback.
    pub fn rpc_url(&self) -> Result<SecretString> {
        match Self::resolve_env(&self.ledger.rpc_url_env) {
            Ok(url) => Ok(SecretString::new(url)),
            Err(e) => self
                .ledger
                .rpc_url
                .clone()
                .map(SecretString::new)
                .ok_or(e),
        }
    }

    pub fn account_ref(&self) -> AccountRef {
        AccountRef::new(&self.account.wallet, &self.account.share_record)
    }

    pub fn reserve_floor(&self) -> Result<ReserveFloor> {
        ReserveFloor::new(self.reserve.safe_reserve, self.reserve.hard_min_reserve)
            .context("Invalid [reserve] section")
    }

    /// The configured outcome table, or the ledger's default one.
    pub fn outcome_table(&self) -> Result<OutcomeTable> {
        match &self.outcome {
            Some(cfg) => OutcomeTable::new(cfg.buckets.clone()).context("Invalid [outcome] table"),
            None => Ok(OutcomeTable::default()),
        }
    }
}
