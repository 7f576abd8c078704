//! End-to-end action flows against the in-memory ledger.
//!
//! Exercises the orchestrator, poller and dashboard together, including
//! the ambiguous-failure paths that unit mocks cannot drive with real
//! timeouts.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use reelbank::dashboard::{build_router, follow_spins, routes::DashboardState};
use reelbank::engine::orchestrator::{ActionState, Orchestrator, OrchestratorSettings, SettledVia};
use reelbank::engine::outcome::OutcomeTable;
use reelbank::engine::poller::{poll_once, RefreshBoard};
use reelbank::engine::pool::{ReserveFloor, DEFAULT_MIN_WAGER};
use reelbank::storage::HistoryCache;
use reelbank::types::*;

use crate::mock_ledger::{Faults, MockLedger};

const UNIT: u64 = 1_000_000_000;
const WAGER: u64 = DEFAULT_MIN_WAGER;

fn alice() -> AccountRef {
    AccountRef::new("alice", "alice-record")
}

fn settings() -> OrchestratorSettings {
    OrchestratorSettings {
        confirm_timeout: Duration::from_millis(100),
        read_backoff: Duration::from_millis(1),
        reserve: ReserveFloor::new(UNIT, 10_000_000).unwrap(),
        ..Default::default()
    }
}

fn setup(pool: u64) -> (Arc<MockLedger>, Arc<Orchestrator>) {
    let ledger = Arc::new(MockLedger::new(pool));
    let orch = Arc::new(Orchestrator::new(
        ledger.clone(),
        OutcomeTable::default(),
        settings(),
        HistoryCache::in_memory(300),
    ));
    (ledger, orch)
}

// ---------------------------------------------------------------------------
// Spins
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_spin_jackpot_pays_from_ledger() {
    let (ledger, orch) = setup(10 * UNIT);
    ledger.queue_rolls(&[0]);

    let spin = orch.spin(&alice(), 1_000_000).await.unwrap();
    assert_eq!(spin.display.multiplier, 20);
    assert!(spin.display.is_triple());
    assert_eq!(spin.payout, 20_000_000);
    assert!(spin.ledger_win);
    assert_eq!(ledger.pool_balance(), 10 * UNIT + 1_000_000 - 20_000_000);
}

#[tokio::test]
async fn test_losing_spins_always_scatter() {
    let (ledger, orch) = setup(10 * UNIT);
    let rolls: Vec<i64> = (69..200).step_by(13).collect();
    ledger.queue_rolls(&rolls);

    for _ in &rolls {
        let spin = orch.spin(&alice(), WAGER).await.unwrap();
        assert!(!spin.display.win);
        assert!(spin.display.is_scatter());
        assert_eq!(spin.payout, 0);
    }
}

#[tokio::test]
async fn test_second_action_while_submitted_is_busy() {
    let (ledger, orch) = setup(10 * UNIT);
    let gate = ledger.gate_confirms();
    ledger.queue_rolls(&[19]);

    let first = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.spin(&alice(), WAGER).await })
    };
    ledger.sent.notified().await;
    assert_eq!(orch.state(&alice()), ActionState::Submitted);

    let err = orch.spin(&alice(), WAGER).await.unwrap_err();
    assert!(matches!(err, ReelError::Busy { .. }));
    let err = orch.withdraw_shares(&alice(), 1).await.unwrap_err();
    assert!(matches!(err, ReelError::Busy { .. }));
    assert_eq!(ledger.sent_instructions().len(), 1);

    gate.notify_one();
    let spin = first.await.unwrap().unwrap();
    assert_eq!(spin.display.multiplier, 2);
    assert_eq!(orch.state(&alice()), ActionState::Idle);
}

#[tokio::test]
async fn test_confirm_timeout_then_lookup_resolves() {
    let (ledger, orch) = setup(10 * UNIT);
    // Never released: confirmation always times out.
    let _gate = ledger.gate_confirms();
    ledger.queue_rolls(&[5]);

    let spin = orch.spin(&alice(), WAGER).await.unwrap();
    assert_eq!(spin.settled_via, SettledVia::Lookup);
    assert_eq!(spin.display.multiplier, 5);
    assert_eq!(spin.payout, 5_000);
    assert_eq!(ledger.sent_instructions().len(), 1);
}

#[tokio::test]
async fn test_lost_confirmation_settled_by_lookup() {
    let (ledger, orch) = setup(10 * UNIT);
    ledger.set_faults(Faults {
        drop_confirms: true,
        ..Default::default()
    });
    ledger.queue_rolls(&[39]);

    let spin = orch.spin(&alice(), WAGER).await.unwrap();
    assert_eq!(spin.settled_via, SettledVia::Lookup);
    assert_eq!(spin.display.multiplier, 1);
    assert_eq!(spin.payout, WAGER);
    assert_eq!(ledger.sent_instructions().len(), 1);
}

#[tokio::test]
async fn test_wager_below_minimum_never_reaches_ledger() {
    let (ledger, orch) = setup(10 * UNIT);
    let err = orch.spin(&alice(), WAGER - 1).await.unwrap_err();
    assert!(matches!(err, ReelError::WagerTooSmall { .. }));
    assert!(ledger.sent_instructions().is_empty());
}

#[tokio::test]
async fn test_unresolvable_wager_is_state_unknown_without_resend() {
    let (ledger, orch) = setup(10 * UNIT);
    let _gate = ledger.gate_confirms();
    ledger.set_faults(Faults {
        forget_transactions: true,
        ..Default::default()
    });

    let err = orch.spin(&alice(), WAGER).await.unwrap_err();
    assert!(matches!(err, ReelError::StateUnknown(_)));
    assert!(err.to_string().contains("please verify"));
    assert_eq!(ledger.sent_instructions().len(), 1);
    assert_eq!(orch.state(&alice()), ActionState::Idle);
}

#[tokio::test]
async fn test_malformed_logs_fail_instead_of_guessing() {
    let (ledger, orch) = setup(10 * UNIT);
    ledger.set_faults(Faults {
        malformed_logs: true,
        ..Default::default()
    });
    let err = orch.spin(&alice(), WAGER).await.unwrap_err();
    assert!(matches!(err, ReelError::MalformedResult(_)));
}

// ---------------------------------------------------------------------------
// Investment
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_deposit_then_refresh_sees_new_principal() {
    let (ledger, orch) = setup(9 * UNIT);
    ledger.seed_investor(&alice(), UNIT);

    let before = orch.refresh(&alice()).await.unwrap();
    assert_eq!(before.total_invested, i128::from(UNIT));
    assert_eq!(before.value, 10 * UNIT);
    assert_eq!(ledger.history_fetches(), 1);

    let receipt = orch.deposit(&alice(), UNIT).await.unwrap();
    assert_eq!(receipt.settled_via, SettledVia::Confirmation);
    assert!(receipt.signature.is_some());

    // The deposit invalidated the cached history, so it is refetched.
    let after = orch.refresh(&alice()).await.unwrap();
    assert_eq!(ledger.history_fetches(), 2);
    assert_eq!(after.total_invested, 2 * i128::from(UNIT));
    assert_eq!(after.value, 11 * UNIT);
    assert_eq!(after.profit, i128::from(9 * UNIT));

    // Unchanged history is served from cache.
    orch.refresh(&alice()).await.unwrap();
    assert_eq!(ledger.history_fetches(), 2);
}

#[tokio::test]
async fn test_lost_deposit_response_settled_by_share_record() {
    let (ledger, orch) = setup(9 * UNIT);
    ledger.seed_investor(&alice(), UNIT);
    let held = ledger.shares_of(&alice());
    ledger.set_faults(Faults {
        lose_send_response: true,
        ..Default::default()
    });

    let receipt = orch.deposit(&alice(), UNIT).await.unwrap();
    assert_eq!(receipt.settled_via, SettledVia::ShareDelta);
    assert!(receipt.signature.is_none());
    assert!(receipt.snapshot.unwrap().account_shares > held);
    assert_eq!(ledger.sent_instructions().len(), 1);
}

#[tokio::test]
async fn test_withdraw_respects_safe_reserve() {
    // Alice owns the whole 2-unit pool but 1 unit must stay behind.
    let (ledger, orch) = setup(0);
    ledger.seed_investor(&alice(), 2 * UNIT);

    let view = orch.refresh(&alice()).await.unwrap();
    assert_eq!(view.max_withdrawable_value, UNIT);
    assert!(view.max_withdrawable_shares <= view.snapshot.account_shares);

    let err = orch.withdraw(&alice(), UNIT + 1).await.unwrap_err();
    assert!(matches!(err, ReelError::ExceedsWithdrawable { .. }));
    assert!(ledger.sent_instructions().is_empty());

    let receipt = orch.withdraw(&alice(), UNIT).await.unwrap();
    assert_eq!(receipt.instruction, Instruction::Withdraw { shares: UNIT });
    assert_eq!(ledger.pool_balance(), UNIT);
}

#[tokio::test]
async fn test_refresh_unreachable_ledger_errors_after_retries() {
    let (ledger, orch) = setup(UNIT);
    ledger.set_faults(Faults {
        read_error: Some(ReelError::Unreachable("503".into())),
        ..Default::default()
    });
    let err = orch.refresh(&alice()).await.unwrap_err();
    assert!(err.is_retryable());
}

// ---------------------------------------------------------------------------
// Polling & dashboard
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_superseded_poll_is_discarded() {
    let (ledger, orch) = setup(9 * UNIT);
    ledger.seed_investor(&alice(), UNIT);
    let board = RefreshBoard::new();

    let stale = board.issue();
    let stale_view = orch.refresh_with_history(&alice()).await.unwrap();
    let fresh = poll_once(&orch, &board, &alice()).await.unwrap();
    assert!(fresh.is_some());
    assert!(!board.publish(stale, stale_view));
}

#[tokio::test]
async fn test_dashboard_serves_polled_view() {
    let (ledger, orch) = setup(9 * UNIT);
    ledger.seed_investor(&alice(), UNIT);

    let state = Arc::new(DashboardState::new("alice", OutcomeTable::default()));
    let board = RefreshBoard::new();
    let refreshed = poll_once(&orch, &board, &alice()).await.unwrap().unwrap();
    state.publish_view(refreshed.view, refreshed.history).await;

    let resp = build_router(state)
        .oneshot(Request::builder().uri("/api/investor").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["account"], "alice");
    assert_eq!(json["ownership_pct"].as_f64().unwrap(), 100.0);
    assert_eq!(json["value"].as_f64().unwrap(), 10.0);
    assert_eq!(json["partial_history"], false);
}

#[tokio::test]
async fn test_dashboard_ranks_investors() {
    let (ledger, orch) = setup(0);
    let bob = AccountRef::new("bob", "bob-record");
    ledger.seed_investor(&alice(), UNIT);
    ledger.seed_investor(&bob, 3 * UNIT);

    let state = Arc::new(DashboardState::new("alice", OutcomeTable::default()));
    let view = orch.refresh(&alice()).await.unwrap();
    let ranked = orch.leaderboard(view.snapshot.total_shares).await.unwrap();
    state.publish_investors(ranked).await;

    let resp = build_router(state)
        .oneshot(Request::builder().uri("/api/investors").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let rows = json.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["owner"], "bob");
    assert_eq!(rows[0]["ownership_pct"].as_f64().unwrap(), 75.0);
    assert_eq!(rows[1]["is_you"], true);
}

#[tokio::test]
async fn test_dashboard_shows_last_spin() {
    let (ledger, orch) = setup(10 * UNIT);
    let state = Arc::new(DashboardState::new("alice", OutcomeTable::default()));
    tokio::spawn(follow_spins(state.clone(), orch.subscribe_spins()));
    ledger.queue_rolls(&[1]);

    let spin = orch.spin(&alice(), WAGER).await.unwrap();
    assert!(spin.jackpot);

    let recorded = tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            if let Some(last) = state.last_spin.read().await.clone() {
                return last;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(recorded.action_id, spin.action_id);
    assert_eq!(recorded.display.multiplier, 10);
}
