//! Reconciler — net principal and profit/loss from transfer history.
//!
//! Sums successful deposits and withdrawals over whatever window of
//! history the ledger returned and compares the net against the current
//! value of the account's shares. The result says nothing about events
//! outside the observed window; callers carry that flag to consumers.

use serde::Serialize;
use tracing::debug;

use crate::types::{TransferEvent, TransferKind};

/// Principal and profit over one observed window of history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub deposited: u128,
    pub withdrawn: u128,
    /// `deposited - withdrawn`; negative when more came out than went in.
    pub total_invested: i128,
    /// `current_value - total_invested`.
    pub profit: i128,
    /// Successful deposit/withdraw events that contributed.
    pub counted: usize,
    /// Failed or unclassified events that were skipped.
    pub ignored: usize,
}

/// Reconcile `events` against the current value of the account.
pub fn reconcile(events: &[TransferEvent], current_value: u64) -> Reconciliation {
    let mut rec = Reconciliation::default();

    for ev in events {
        if !ev.success {
            rec.ignored += 1;
            continue;
        }
        match ev.kind {
            TransferKind::Deposit => {
                rec.deposited += u128::from(ev.amount);
                rec.counted += 1;
            }
            TransferKind::Withdraw => {
                rec.withdrawn += u128::from(ev.amount);
                rec.counted += 1;
            }
            TransferKind::Unknown => rec.ignored += 1,
        }
    }

    // Each side is a sum of u64s over a bounded window, so it fits in i128.
    rec.total_invested = rec.deposited as i128 - rec.withdrawn as i128;
    rec.profit = i128::from(current_value) - rec.total_invested;

    debug!(
        counted = rec.counted,
        ignored = rec.ignored,
        total_invested = rec.total_invested,
        profit = rec.profit,
        "History reconciled"
    );

    rec
}

/// Display order for history: most recent first, undated entries last.
/// Ties keep their original relative order.
pub fn chronological(events: &[TransferEvent]) -> Vec<TransferEvent> {
    let mut sorted = events.to_vec();
    sorted.sort_by(|a, b| match (a.timestamp, b.timestamp) {
        (Some(ta), Some(tb)) => tb.cmp(&ta),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    sorted
}

// ---------------------------------------------------------------------------
// TransferEvent helpers
// ---------------------------------------------------------------------------

impl TransferEvent {
    /// Classify a transaction by the pool account's balance change.
    pub fn from_balance_delta(
        signature: impl Into<String>,
        pre: u64,
        post: u64,
        timestamp: Option<chrono::DateTime<chrono::Utc>>,
        success: bool,
    ) -> Self {
        let (kind, amount) = if post > pre {
            (TransferKind::Deposit, post - pre)
        } else if post < pre {
            (TransferKind::Withdraw, pre - post)
        } else {
            (TransferKind::Unknown, 0)
        };
        Self {
            signature: signature.into(),
            kind,
            amount,
            timestamp,
            success,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
