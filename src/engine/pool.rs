//! Pool snapshot reader — proportional ownership of the shared bankroll.
//!
//! Everything here is a pure function of a balance snapshot read from the
//! ledger. Products of two base-unit quantities are taken in `u128` before
//! dividing, and every share conversion floors so a request never asks the
//! ledger for more than the shares actually redeem.

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

use crate::types::{ReelError, ShareRecord};

/// Pool balance kept back from withdrawals by the client (1.0 unit).
pub const DEFAULT_SAFE_RESERVE: u64 = 1_000_000_000;
/// Minimum pool balance enforced by the ledger program (0.01 unit).
pub const DEFAULT_HARD_MIN_RESERVE: u64 = 10_000_000;
/// Rent the ledger leaves untouched when sizing the max wager.
pub const DEFAULT_RENT_RESERVE: u64 = 1_500_000;
/// Max wager is the available pool divided by this.
pub const DEFAULT_MAX_WAGER_DIVISOR: u64 = 67;
/// Smallest wager the game accepts (0.001 unit).
pub const DEFAULT_MIN_WAGER: u64 = 1_000_000;
/// Smallest deposit the ledger accepts (0.1 unit).
pub const DEFAULT_MIN_DEPOSIT: u64 = 100_000_000;

// ---------------------------------------------------------------------------
// Reserve floor
// ---------------------------------------------------------------------------

/// Minimum pool balances that withdrawals must respect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveFloor {
    /// Floor used to size the max withdrawal shown to investors.
    pub safe: u64,
    /// Floor below which the ledger rejects a withdrawal outright.
    pub hard_min: u64,
}

impl Default for ReserveFloor {
    fn default() -> Self {
        Self {
            safe: DEFAULT_SAFE_RESERVE,
            hard_min: DEFAULT_HARD_MIN_RESERVE,
        }
    }
}

impl ReserveFloor {
    pub fn new(safe: u64, hard_min: u64) -> Result<Self, ReelError> {
        if safe < hard_min {
            return Err(ReelError::InvalidAmount(format!(
                "safe reserve {safe} is below the hard minimum {hard_min}"
            )));
        }
        Ok(Self { safe, hard_min })
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Raw balances for one account against the pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub pool_balance: u64,
    pub total_shares: u64,
    pub account_shares: u64,
}

/// Derived figures for one snapshot under a reserve floor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolReading {
    pub snapshot: PoolSnapshot,
    pub value: u64,
    pub ownership_pct: Decimal,
    pub max_withdrawable_value: u64,
    pub max_withdrawable_shares: u64,
}

impl PoolSnapshot {
    pub fn new(pool_balance: u64, total_shares: u64, account_shares: u64) -> Result<Self, ReelError> {
        if account_shares > total_shares {
            return Err(ReelError::InconsistentSnapshot {
                account_shares,
                total_shares,
            });
        }
        Ok(Self {
            pool_balance,
            total_shares,
            account_shares,
        })
    }

    /// Value of `shares` at the current share price. Zero for an empty pool.
    pub fn value_of(&self, shares: u64) -> u64 {
        if self.total_shares == 0 {
            return 0;
        }
        let v = u128::from(shares) * u128::from(self.pool_balance) / u128::from(self.total_shares);
        u64::try_from(v).unwrap_or(u64::MAX)
    }

    /// Value of the account's own shares.
    pub fn value(&self) -> u64 {
        self.value_of(self.account_shares)
    }

    /// Account ownership as a percentage (0–100).
    pub fn ownership_pct(&self) -> Decimal {
        if self.total_shares == 0 {
            return Decimal::ZERO;
        }
        Decimal::from(self.account_shares) * Decimal::ONE_HUNDRED / Decimal::from(self.total_shares)
    }

    /// Shares that redeem for at most `amount`, never more than held.
    pub fn shares_for_value(&self, amount: u64) -> u64 {
        if self.pool_balance == 0 || self.total_shares == 0 {
            return 0;
        }
        let s = u128::from(amount) * u128::from(self.total_shares) / u128::from(self.pool_balance);
        u64::try_from(s).unwrap_or(u64::MAX).min(self.account_shares)
    }

    /// Largest amount the account may withdraw while leaving the safe
    /// reserve in the pool.
    pub fn max_withdrawable_value(&self, reserve: &ReserveFloor) -> u64 {
        let available = self.pool_balance.saturating_sub(reserve.safe);
        self.value().min(available)
    }

    pub fn read(&self, reserve: &ReserveFloor) -> PoolReading {
        let max_value = self.max_withdrawable_value(reserve);
        PoolReading {
            snapshot: *self,
            value: self.value(),
            ownership_pct: self.ownership_pct(),
            max_withdrawable_value: max_value,
            max_withdrawable_shares: self.shares_for_value(max_value),
        }
    }

    /// Validate a withdrawal of `amount` and convert it to a share count.
    pub fn check_withdrawal(&self, amount: u64, reserve: &ReserveFloor) -> Result<u64, ReelError> {
        if amount == 0 {
            return Err(ReelError::InvalidAmount("withdrawal must be positive".into()));
        }
        let available = self.max_withdrawable_value(reserve);
        if amount > available {
            return Err(ReelError::ExceedsWithdrawable {
                requested: amount,
                available,
            });
        }
        if self.pool_balance.saturating_sub(amount) < reserve.hard_min {
            return Err(ReelError::BelowHardReserve {
                hard_min: reserve.hard_min,
            });
        }
        let shares = self.shares_for_value(amount);
        if shares == 0 {
            return Err(ReelError::InvalidAmount(format!(
                "{amount} is too small to redeem a whole share"
            )));
        }
        Ok(shares)
    }
}

// ---------------------------------------------------------------------------
// Wager & deposit limits
// ---------------------------------------------------------------------------

/// The ledger's max wager for a pool balance.
pub fn max_wager(pool_balance: u64, rent_reserve: u64, divisor: u64) -> u64 {
    if divisor == 0 {
        return 0;
    }
    pool_balance.saturating_sub(rent_reserve) / divisor
}

pub fn check_wager(amount: u64, minimum: u64, max: u64) -> Result<(), ReelError> {
    if amount == 0 {
        return Err(ReelError::InvalidAmount("wager must be positive".into()));
    }
    if amount < minimum {
        return Err(ReelError::WagerTooSmall { amount, minimum });
    }
    if amount > max {
        return Err(ReelError::WagerTooLarge { amount, max });
    }
    Ok(())
}

pub fn check_deposit(amount: u64, minimum: u64) -> Result<(), ReelError> {
    if amount < minimum {
        return Err(ReelError::BelowMinimumDeposit { amount, minimum });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Leaderboard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvestorRank {
    pub owner: String,
    pub shares: u64,
    pub ownership_pct: Decimal,
}

/// All share records ranked by ownership, largest first.
pub fn rank_investors(records: &[ShareRecord], total_shares: u64) -> Vec<InvestorRank> {
    let mut ranked: Vec<InvestorRank> = records
        .iter()
        .map(|r| InvestorRank {
            owner: r.owner.clone(),
            shares: r.shares,
            ownership_pct: if total_shares > 0 {
                Decimal::from(r.shares) * Decimal::ONE_HUNDRED / Decimal::from(total_shares)
            } else {
                Decimal::ZERO
            },
        })
        .collect();
    ranked.sort_by(|a, b| b.shares.cmp(&a.shares));
    ranked
}

/// Compact share count: `21500000000` -> `21.5B`.
pub fn format_shares(shares: u64) -> String {
    let scaled = |div: u64| {
        (Decimal::from(shares) / Decimal::from(div))
            .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
    };
    if shares >= 1_000_000_000 {
        format!("{:.1}B", scaled(1_000_000_000))
    } else if shares >= 1_000_000 {
        format!("{:.1}M", scaled(1_000_000))
    } else if shares >= 1_000 {
        format!("{:.1}K", scaled(1_000))
    } else {
        shares.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
