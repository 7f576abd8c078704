//! Dashboard API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<DashboardState>`.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::engine::orchestrator::SpinResolution;
use crate::engine::outcome::{BucketOdds, OutcomeTable};
use crate::engine::pool::{format_shares, InvestorRank};
use crate::engine::reconciler::chronological;
use crate::engine::view::InvestorView;
use crate::types::{signed_to_currency, to_currency, HistoryPage, TransferKind};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub account: String,
    pub table: OutcomeTable,
    pub investor: RwLock<Option<InvestorView>>,
    pub history: RwLock<HistoryPage>,
    pub last_spin: RwLock<Option<SpinResolution>>,
    pub investors: RwLock<Vec<InvestorRank>>,
    pub started_at: DateTime<Utc>,
}

impl DashboardState {
    pub fn new(account: impl Into<String>, table: OutcomeTable) -> Self {
        Self {
            account: account.into(),
            table,
            investor: RwLock::new(None),
            history: RwLock::new(HistoryPage::default()),
            last_spin: RwLock::new(None),
            investors: RwLock::new(Vec::new()),
            started_at: Utc::now(),
        }
    }

    /// Replace the investor view and the history it was computed from.
    pub async fn publish_view(&self, view: InvestorView, history: HistoryPage) {
        *self.investor.write().await = Some(view);
        *self.history.write().await = history;
    }

    pub async fn record_spin(&self, spin: SpinResolution) {
        *self.last_spin.write().await = Some(spin);
    }

    pub async fn publish_investors(&self, ranked: Vec<InvestorRank>) {
        *self.investors.write().await = ranked;
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct InvestorResponse {
    pub account: String,
    pub pool_balance: Decimal,
    pub total_shares: u64,
    pub account_shares: u64,
    pub account_shares_display: String,
    pub value: Decimal,
    pub ownership_pct: Decimal,
    pub total_invested: Decimal,
    pub profit: Decimal,
    pub max_withdrawable_value: Decimal,
    pub max_withdrawable_shares: u64,
    /// Principal and profit cover only the fetched history window.
    pub partial_history: bool,
    pub computed_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub signature: String,
    pub kind: TransferKind,
    pub amount: Decimal,
    pub timestamp: Option<String>,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvestorEntry {
    pub owner: String,
    pub shares: u64,
    pub shares_display: String,
    pub ownership_pct: Decimal,
    /// The watched account's own record.
    pub is_you: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutcomesResponse {
    pub code_space: u64,
    pub return_to_player_pct: Decimal,
    pub buckets: Vec<BucketOdds>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: i64,
    pub has_view: bool,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

pub type AppState = Arc<DashboardState>;

/// GET /api/investor
///
/// 503 until the first poll has landed.
pub async fn get_investor(
    State(state): State<AppState>,
) -> Result<Json<InvestorResponse>, StatusCode> {
    let investor = state.investor.read().await;
    let view = investor.as_ref().ok_or(StatusCode::SERVICE_UNAVAILABLE)?;

    Ok(Json(InvestorResponse {
        account: state.account.clone(),
        pool_balance: to_currency(view.snapshot.pool_balance),
        total_shares: view.snapshot.total_shares,
        account_shares: view.snapshot.account_shares,
        account_shares_display: format_shares(view.snapshot.account_shares),
        value: to_currency(view.value),
        ownership_pct: view.ownership_pct.round_dp(4),
        total_invested: signed_to_currency(view.total_invested),
        profit: signed_to_currency(view.profit),
        max_withdrawable_value: to_currency(view.max_withdrawable_value),
        max_withdrawable_shares: view.max_withdrawable_shares,
        partial_history: view.window.truncated,
        computed_at: view.computed_at.to_rfc3339(),
    }))
}

/// GET /api/history, most recent first.
pub async fn get_history(State(state): State<AppState>) -> Json<Vec<HistoryEntry>> {
    let history = state.history.read().await;
    let entries = chronological(&history.events)
        .into_iter()
        .map(|e| HistoryEntry {
            signature: e.signature,
            kind: e.kind,
            amount: to_currency(e.amount),
            timestamp: e.timestamp.map(|t| t.to_rfc3339()),
            success: e.success,
        })
        .collect();
    Json(entries)
}

/// GET /api/investors, largest holder first.
pub async fn get_investors(State(state): State<AppState>) -> Json<Vec<InvestorEntry>> {
    let investors = state.investors.read().await;
    let entries = investors
        .iter()
        .map(|r| InvestorEntry {
            owner: r.owner.clone(),
            shares: r.shares,
            shares_display: format_shares(r.shares),
            ownership_pct: r.ownership_pct.round_dp(2),
            is_you: r.owner == state.account,
        })
        .collect();
    Json(entries)
}

/// GET /api/outcomes
pub async fn get_outcomes(State(state): State<AppState>) -> Json<OutcomesResponse> {
    Json(OutcomesResponse {
        code_space: state.table.code_space(),
        return_to_player_pct: state.table.return_to_player() * Decimal::ONE_HUNDRED,
        buckets: state.table.probabilities(),
    })
}

/// GET /api/last-spin
pub async fn get_last_spin(State(state): State<AppState>) -> Json<Option<SpinResolution>> {
    Json(state.last_spin.read().await.clone())
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
        has_view: state.investor.read().await.is_some(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
