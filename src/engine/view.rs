//! Investor view — the read-only projection shown to an investor.
//!
//! Always rebuilt from a fresh snapshot plus the reconciled history; never
//! updated in place, so it cannot drift from the ledger.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

use super::pool::{PoolSnapshot, ReserveFloor};
use super::reconciler::reconcile;
use crate::types::{signed_to_currency, to_currency, HistoryPage};

/// Which slice of history the principal/profit figures cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistoryWindow {
    pub events_observed: usize,
    /// The ledger had more history than was fetched; totals are partial.
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvestorView {
    pub snapshot: PoolSnapshot,
    pub value: u64,
    pub ownership_pct: Decimal,
    pub total_invested: i128,
    pub profit: i128,
    pub max_withdrawable_value: u64,
    pub max_withdrawable_shares: u64,
    pub window: HistoryWindow,
    pub computed_at: DateTime<Utc>,
}

impl InvestorView {
    pub fn project(snapshot: &PoolSnapshot, history: &HistoryPage, reserve: &ReserveFloor) -> Self {
        let reading = snapshot.read(reserve);
        let rec = reconcile(&history.events, reading.value);

        Self {
            snapshot: *snapshot,
            value: reading.value,
            ownership_pct: reading.ownership_pct,
            total_invested: rec.total_invested,
            profit: rec.profit,
            max_withdrawable_value: reading.max_withdrawable_value,
            max_withdrawable_shares: reading.max_withdrawable_shares,
            window: HistoryWindow {
                events_observed: history.events.len(),
                truncated: history.truncated,
            },
            computed_at: Utc::now(),
        }
    }
}

impl fmt::Display for InvestorView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "value={} | ownership={:.2}% | invested={} | profit={}{} | max_withdraw={} ({} shares)",
            to_currency(self.value),
            self.ownership_pct,
            signed_to_currency(self.total_invested),
            signed_to_currency(self.profit),
            if self.window.truncated { " (partial history)" } else { "" },
            to_currency(self.max_withdrawable_value),
            self.max_withdrawable_shares,
        )
    }
}
