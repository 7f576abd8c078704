//! Spin and investment orchestrator.
//!
//! Sequences wager, deposit and withdraw actions against the ledger
//! program, one in flight per account. Submissions are never retried: on
//! an ambiguous failure the ledger is re-queried before any conclusion is
//! drawn, and if that cannot settle it the caller gets `StateUnknown`.
//! Reads (balances, history) are idempotent and retried with backoff.

use anyhow::Result as AnyResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

use super::outcome::OutcomeTable;
use super::pool::{
    check_deposit, check_wager, max_wager, rank_investors, InvestorRank, PoolSnapshot, ReserveFloor, DEFAULT_MAX_WAGER_DIVISOR,
    DEFAULT_MIN_DEPOSIT, DEFAULT_MIN_WAGER, DEFAULT_RENT_RESERVE,
};
use super::view::InvestorView;
use crate::config::AppConfig;
use crate::ledger::codec::parse_wager_logs;
use crate::ledger::LedgerProgram;
use crate::storage::HistoryCache;
use crate::types::{AccountRef, Confirmation, DisplayResult, HistoryPage, Instruction, ReelError, Signature};

// ---------------------------------------------------------------------------
// Action state machine
// ---------------------------------------------------------------------------

/// Lifecycle of the single in-flight action for one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ActionState {
    Idle,
    /// Pre-flight checks and broadcast.
    Submitted,
    Confirmed,
    Resolved,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionEvent {
    Submit,
    Confirm,
    Resolve,
    Fail,
    Reset,
}

impl ActionState {
    /// Apply `event`, rejecting any transition outside
    /// `Idle → Submitted → Confirmed → Resolved → Idle` and
    /// `Idle → Submitted → Failed → Idle`. A confirmed result with
    /// missing fields may also fail.
    pub fn advance(self, event: ActionEvent) -> Result<ActionState, ReelError> {
        use ActionEvent::*;
        use ActionState::*;
        match (self, event) {
            (Idle, Submit) => Ok(Submitted),
            (Submitted, Confirm) => Ok(Confirmed),
            (Submitted, Fail) | (Confirmed, Fail) => Ok(Failed),
            (Confirmed, Resolve) => Ok(Resolved),
            (Resolved, Reset) | (Failed, Reset) => Ok(Idle),
            (from, event) => Err(ReelError::IllegalTransition {
                from: format!("{from:?}"),
                event: format!("{event:?}"),
            }),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, ActionState::Idle)
    }
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// How a submitted action was found to have landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SettledVia {
    /// Confirmed directly after broadcast.
    Confirmation,
    /// Confirmation was lost; a later lookup of the signature found it.
    Lookup,
    /// No confirmation at all; the share record moved the expected way.
    ShareDelta,
}

/// A resolved wager, ready for the reveal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpinResolution {
    pub action_id: String,
    pub signature: Signature,
    pub amount: u64,
    pub display: DisplayResult,
    pub jackpot: bool,
    /// Authoritative payout as reported by the ledger program.
    pub payout: u64,
    pub ledger_win: bool,
    pub settled_via: SettledVia,
    pub resolved_at: DateTime<Utc>,
}

/// A landed deposit or withdrawal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferReceipt {
    pub action_id: String,
    pub instruction: Instruction,
    pub signature: Option<Signature>,
    pub settled_via: SettledVia,
    /// Balances read after the action, when the read succeeded.
    pub snapshot: Option<PoolSnapshot>,
}

/// A refreshed investor view with the history it was computed from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Refreshed {
    pub view: InvestorView,
    pub history: HistoryPage,
}

/// Outcome of a submission that is known to have landed.
#[derive(Debug)]
struct Settlement {
    signature: Option<Signature>,
    confirmation: Option<Confirmation>,
    via: SettledVia,
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub reserve: ReserveFloor,
    pub rent_reserve: u64,
    pub max_wager_divisor: u64,
    pub min_wager: u64,
    pub min_deposit: u64,
    /// Bound on each of broadcast and confirmation.
    pub confirm_timeout: Duration,
    pub read_retries: u32,
    pub read_backoff: Duration,
    pub history_limit: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            reserve: ReserveFloor::default(),
            rent_reserve: DEFAULT_RENT_RESERVE,
            max_wager_divisor: DEFAULT_MAX_WAGER_DIVISOR,
            min_wager: DEFAULT_MIN_WAGER,
            min_deposit: DEFAULT_MIN_DEPOSIT,
            confirm_timeout: Duration::from_secs(60),
            read_retries: 3,
            read_backoff: Duration::from_millis(250),
            history_limit: 20,
        }
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &AppConfig) -> AnyResult<Self> {
        Ok(Self {
            reserve: config.reserve_floor()?,
            rent_reserve: config.reserve.rent_reserve,
            max_wager_divisor: config.reserve.max_wager_divisor,
            min_wager: config.reserve.min_wager,
            min_deposit: config.reserve.min_deposit,
            confirm_timeout: Duration::from_secs(config.ledger.confirm_timeout_secs),
            read_retries: config.ledger.read_retries,
            read_backoff: Duration::from_millis(config.ledger.read_backoff_ms),
            history_limit: config.history.signature_limit,
        })
    }
}

// ---------------------------------------------------------------------------
// Single-flight slots
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct ActionSlot {
    action_id: String,
    instruction: Option<Instruction>,
    state: ActionState,
}

type Slots = Mutex<HashMap<String, ActionSlot>>;

fn lock_slots(slots: &Slots) -> std::sync::MutexGuard<'_, HashMap<String, ActionSlot>> {
    slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Exclusive hold on one account's slot. Dropping it returns the slot to
/// `Idle`, including when the action future is abandoned mid-flight.
struct SlotGuard<'a> {
    slots: &'a Slots,
    key: String,
    action_id: String,
}

impl SlotGuard<'_> {
    fn advance(&self, event: ActionEvent) -> Result<ActionState, ReelError> {
        let mut slots = lock_slots(self.slots);
        let slot = slots.get_mut(&self.key).ok_or_else(|| ReelError::IllegalTransition {
            from: "Idle".into(),
            event: format!("{event:?}"),
        })?;
        let next = slot.state.advance(event)?;
        debug!(action_id = %self.action_id, from = %slot.state, to = %next, "Action transition");
        slot.state = next;
        Ok(next)
    }

    fn set_instruction(&self, ix: Instruction) {
        if let Some(slot) = lock_slots(self.slots).get_mut(&self.key) {
            slot.instruction = Some(ix);
        }
    }

    /// Mark the action failed and hand the error back.
    fn fail(&self, err: ReelError) -> ReelError {
        if let Err(e) = self.advance(ActionEvent::Fail) {
            warn!(action_id = %self.action_id, error = %e, "Could not mark action failed");
        }
        err
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        let mut slots = lock_slots(self.slots);
        if let Some(slot) = slots.remove(&self.key) {
            if slot.state.advance(ActionEvent::Reset).is_err() {
                warn!(
                    action_id = %slot.action_id,
                    state = %slot.state,
                    instruction = ?slot.instruction,
                    "Action abandoned before settling"
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator {
    ledger: Arc<dyn LedgerProgram>,
    table: OutcomeTable,
    settings: OrchestratorSettings,
    cache: Arc<RwLock<HistoryCache>>,
    slots: Slots,
    spins: watch::Sender<Option<SpinResolution>>,
}

impl Orchestrator {
    pub fn new(
        ledger: Arc<dyn LedgerProgram>,
        table: OutcomeTable,
        settings: OrchestratorSettings,
        cache: HistoryCache,
    ) -> Self {
        Self {
            ledger,
            table,
            settings,
            cache: Arc::new(RwLock::new(cache)),
            slots: Mutex::new(HashMap::new()),
            spins: watch::channel(None).0,
        }
    }

    pub fn table(&self) -> &OutcomeTable {
        &self.table
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Follow resolved spins. The receiver starts with the latest one, if any.
    pub fn subscribe_spins(&self) -> watch::Receiver<Option<SpinResolution>> {
        self.spins.subscribe()
    }

    /// Current state of the account's action slot.
    pub fn state(&self, account: &AccountRef) -> ActionState {
        lock_slots(&self.slots)
            .get(account.key())
            .map(|s| s.state)
            .unwrap_or(ActionState::Idle)
    }

    /// Claim the account's slot (`Idle → Submitted`) or fail with `Busy`.
    fn claim(&self, account: &AccountRef) -> Result<SlotGuard<'_>, ReelError> {
        let mut slots = lock_slots(&self.slots);
        if let Some(existing) = slots.get(account.key()) {
            debug!(account = %account, in_flight = %existing.action_id, state = %existing.state, "Rejecting concurrent action");
            return Err(ReelError::Busy {
                account: account.key().to_string(),
            });
        }
        let action_id = uuid::Uuid::new_v4().to_string();
        let state = ActionState::Idle.advance(ActionEvent::Submit)?;
        slots.insert(
            account.key().to_string(),
            ActionSlot {
                action_id: action_id.clone(),
                instruction: None,
                state,
            },
        );
        Ok(SlotGuard {
            slots: &self.slots,
            key: account.key().to_string(),
            action_id,
        })
    }

    // -- Actions -----------------------------------------------------------

    /// Place a wager and resolve its outcome code for display.
    pub async fn spin(&self, account: &AccountRef, amount: u64) -> Result<SpinResolution, ReelError> {
        let guard = self.claim(account)?;

        let pre = match self.preflight_wager(account, amount).await {
            Ok(pre) => pre,
            Err(e) => return Err(guard.fail(e)),
        };
        let ix = Instruction::Wager { amount };
        let settlement = self.submit(&guard, account, &ix, &pre).await?;
        guard.advance(ActionEvent::Confirm)?;

        let (signature, confirmation) = match (settlement.signature, settlement.confirmation) {
            (Some(sig), Some(conf)) => (sig, conf),
            _ => {
                return Err(guard.fail(ReelError::MalformedResult(
                    "wager settled without a readable transaction".into(),
                )))
            }
        };

        let log = match parse_wager_logs(&confirmation.logs) {
            Ok(log) => log,
            Err(e) => {
                warn!(action_id = %guard.action_id, signature = %signature, error = %e, "Wager result unreadable");
                return Err(guard.fail(e));
            }
        };
        let shown = match self.table.resolve(log.roll) {
            Ok(d) => d,
            Err(e) => {
                warn!(action_id = %guard.action_id, roll = log.roll, error = %e, "Outcome code out of range");
                return Err(guard.fail(e));
            }
        };
        if shown.win != log.win {
            warn!(
                action_id = %guard.action_id,
                roll = log.roll,
                local_win = shown.win,
                ledger_win = log.win,
                "Outcome table disagrees with ledger win flag; reporting ledger payout"
            );
        }
        guard.advance(ActionEvent::Resolve)?;
        let jackpot = OutcomeTable::is_jackpot(&shown);

        info!(
            action_id = %guard.action_id,
            account = %account,
            amount,
            roll = log.roll,
            multiplier = shown.multiplier,
            jackpot,
            payout = log.payout,
            "Spin resolved"
        );

        let resolution = SpinResolution {
            action_id: guard.action_id.clone(),
            signature,
            amount,
            display: shown,
            jackpot,
            payout: log.payout,
            ledger_win: log.win,
            settled_via: settlement.via,
            resolved_at: Utc::now(),
        };
        self.spins.send_replace(Some(resolution.clone()));
        Ok(resolution)
    }

    /// Deposit `amount` into the pool in exchange for shares.
    pub async fn deposit(&self, account: &AccountRef, amount: u64) -> Result<TransferReceipt, ReelError> {
        let guard = self.claim(account)?;
        let pre = match self.preflight_deposit(account, amount).await {
            Ok(pre) => pre,
            Err(e) => return Err(guard.fail(e)),
        };
        self.transfer(&guard, account, Instruction::Deposit { amount }, &pre).await
    }

    /// Withdraw roughly `amount` of value; converted to whole shares against
    /// a fresh snapshot, rounding down.
    pub async fn withdraw(&self, account: &AccountRef, amount: u64) -> Result<TransferReceipt, ReelError> {
        let guard = self.claim(account)?;
        let (pre, shares) = match self.preflight_withdraw_value(account, amount).await {
            Ok(v) => v,
            Err(e) => return Err(guard.fail(e)),
        };
        self.transfer(&guard, account, Instruction::Withdraw { shares }, &pre).await
    }

    /// Withdraw an exact share count.
    pub async fn withdraw_shares(&self, account: &AccountRef, shares: u64) -> Result<TransferReceipt, ReelError> {
        let guard = self.claim(account)?;
        let pre = match self.preflight_withdraw_shares(account, shares).await {
            Ok(pre) => pre,
            Err(e) => return Err(guard.fail(e)),
        };
        self.transfer(&guard, account, Instruction::Withdraw { shares }, &pre).await
    }

    /// Rebuild the investor view from fresh balances and (cached) history.
    pub async fn refresh(&self, account: &AccountRef) -> Result<InvestorView, ReelError> {
        Ok(self.refresh_with_history(account).await?.view)
    }

    /// Like `refresh`, also returning the history page the view covers.
    pub async fn refresh_with_history(&self, account: &AccountRef) -> Result<Refreshed, ReelError> {
        let snapshot = self.read_balances(account).await?;
        let history = self.read_history(account).await?;
        let view = InvestorView::project(&snapshot, &history, &self.settings.reserve);
        debug!(account = %account, view = %view, "Investor view refreshed");
        Ok(Refreshed { view, history })
    }

    /// Every investor ranked by ownership of `total_shares`, largest first.
    pub async fn leaderboard(&self, total_shares: u64) -> Result<Vec<InvestorRank>, ReelError> {
        let ledger = self.ledger.as_ref();
        let records = self.with_read_retry("share_records", move || ledger.share_records()).await?;
        let held: u128 = records.iter().map(|r| u128::from(r.shares)).sum();
        if held > u128::from(total_shares) {
            warn!(held = %held, total_shares, "Share records exceed the pool's total shares");
        }
        Ok(rank_investors(&records, total_shares))
    }

    // -- Pre-flight --------------------------------------------------------

    async fn preflight_wager(&self, account: &AccountRef, amount: u64) -> Result<PoolSnapshot, ReelError> {
        if amount == 0 {
            return Err(ReelError::InvalidAmount("wager must be positive".into()));
        }
        let pre = self.read_balances(account).await?;
        let max = max_wager(pre.pool_balance, self.settings.rent_reserve, self.settings.max_wager_divisor);
        check_wager(amount, self.settings.min_wager, max)?;
        Ok(pre)
    }

    async fn preflight_deposit(&self, account: &AccountRef, amount: u64) -> Result<PoolSnapshot, ReelError> {
        check_deposit(amount, self.settings.min_deposit)?;
        self.read_balances(account).await
    }

    async fn preflight_withdraw_value(
        &self,
        account: &AccountRef,
        amount: u64,
    ) -> Result<(PoolSnapshot, u64), ReelError> {
        let pre = self.read_balances(account).await?;
        let shares = pre.check_withdrawal(amount, &self.settings.reserve)?;
        Ok((pre, shares))
    }

    async fn preflight_withdraw_shares(&self, account: &AccountRef, shares: u64) -> Result<PoolSnapshot, ReelError> {
        if shares == 0 {
            return Err(ReelError::InvalidAmount("share count must be positive".into()));
        }
        let pre = self.read_balances(account).await?;
        if shares > pre.account_shares {
            return Err(ReelError::ExceedsWithdrawable {
                requested: shares,
                available: pre.account_shares,
            });
        }
        pre.check_withdrawal(pre.value_of(shares), &self.settings.reserve)?;
        Ok(pre)
    }

    // -- Submission --------------------------------------------------------

    async fn transfer(
        &self,
        guard: &SlotGuard<'_>,
        account: &AccountRef,
        ix: Instruction,
        pre: &PoolSnapshot,
    ) -> Result<TransferReceipt, ReelError> {
        let result = self.submit(guard, account, &ix, pre).await;

        // Anything that may have reached the ledger invalidates the history.
        if let Err(e) = self.cache.write().await.invalidate(account.key()) {
            warn!(account = %account, error = %e, "Failed to invalidate history cache");
        }

        let settlement = result?;
        guard.advance(ActionEvent::Confirm)?;

        let snapshot = match self.read_balances(account).await {
            Ok(s) => Some(s),
            Err(e) => {
                warn!(action_id = %guard.action_id, error = %e, "Post-action balance read failed");
                None
            }
        };
        guard.advance(ActionEvent::Resolve)?;

        info!(
            action_id = %guard.action_id,
            account = %account,
            instruction = %ix,
            settled_via = ?settlement.via,
            "Transfer settled"
        );

        Ok(TransferReceipt {
            action_id: guard.action_id.clone(),
            instruction: ix,
            signature: settlement.signature,
            settled_via: settlement.via,
            snapshot,
        })
    }

    /// Broadcast once and wait for confirmation. Never resubmits.
    async fn submit(
        &self,
        guard: &SlotGuard<'_>,
        account: &AccountRef,
        ix: &Instruction,
        pre: &PoolSnapshot,
    ) -> Result<Settlement, ReelError> {
        guard.set_instruction(*ix);
        let limit = self.settings.confirm_timeout;
        info!(action_id = %guard.action_id, account = %account, instruction = %ix, "Submitting");

        let signature = match tokio::time::timeout(limit, self.ledger.send(account, ix)).await {
            Ok(Ok(sig)) => sig,
            Ok(Err(e)) if e.is_retryable() => {
                warn!(action_id = %guard.action_id, error = %e, "Broadcast outcome ambiguous");
                return self.requery(guard, account, ix, pre, None).await;
            }
            Ok(Err(e)) => {
                warn!(action_id = %guard.action_id, error = %e, "Broadcast refused");
                return Err(guard.fail(e));
            }
            Err(_) => {
                warn!(action_id = %guard.action_id, timeout_ms = limit.as_millis() as u64, "Broadcast timed out");
                return self.requery(guard, account, ix, pre, None).await;
            }
        };

        debug!(action_id = %guard.action_id, signature = %signature, "Broadcast accepted");

        match tokio::time::timeout(limit, self.ledger.confirm(&signature)).await {
            Ok(Ok(conf)) => self.settle(guard, signature, conf, SettledVia::Confirmation),
            Ok(Err(e)) if e.is_retryable() => {
                warn!(action_id = %guard.action_id, signature = %signature, error = %e, "Confirmation lost");
                self.requery(guard, account, ix, pre, Some(signature)).await
            }
            Ok(Err(e)) => Err(guard.fail(e)),
            Err(_) => {
                warn!(action_id = %guard.action_id, signature = %signature, "Confirmation timed out");
                self.requery(guard, account, ix, pre, Some(signature)).await
            }
        }
    }

    fn settle(
        &self,
        guard: &SlotGuard<'_>,
        signature: Signature,
        conf: Confirmation,
        via: SettledVia,
    ) -> Result<Settlement, ReelError> {
        if let Some(err) = conf.err {
            return Err(guard.fail(ReelError::Rejected(err)));
        }
        Ok(Settlement {
            signature: Some(signature),
            confirmation: Some(conf),
            via,
        })
    }

    /// Decide whether an ambiguous submission landed, from reads only.
    async fn requery(
        &self,
        guard: &SlotGuard<'_>,
        account: &AccountRef,
        ix: &Instruction,
        pre: &PoolSnapshot,
        signature: Option<Signature>,
    ) -> Result<Settlement, ReelError> {
        if let Some(sig) = &signature {
            let ledger = self.ledger.as_ref();
            match self.with_read_retry("lookup", move || ledger.lookup(sig)).await {
                Ok(Some(conf)) => {
                    info!(action_id = %guard.action_id, signature = %sig, "Lookup found the transaction");
                    return self.settle(guard, sig.clone(), conf, SettledVia::Lookup);
                }
                Ok(None) => debug!(action_id = %guard.action_id, signature = %sig, "Lookup found nothing"),
                Err(e) => warn!(action_id = %guard.action_id, error = %e, "Lookup failed"),
            }
        }

        if ix.touches_shares() {
            match self.read_balances(account).await {
                Ok(after) if shares_moved(ix, pre, &after) => {
                    info!(
                        action_id = %guard.action_id,
                        before = pre.account_shares,
                        after = after.account_shares,
                        "Share record shows the action landed"
                    );
                    return Ok(Settlement {
                        signature,
                        confirmation: None,
                        via: SettledVia::ShareDelta,
                    });
                }
                Ok(_) => debug!(action_id = %guard.action_id, "Share record unchanged"),
                Err(e) => warn!(action_id = %guard.action_id, error = %e, "Share re-read failed"),
            }
        }

        let detail = match &signature {
            Some(sig) => format!("{ix} with signature {sig}"),
            None => format!("{ix}, no signature received"),
        };
        warn!(action_id = %guard.action_id, account = %account, detail = %detail, "Action state unknown");
        Err(guard.fail(ReelError::StateUnknown(detail)))
    }

    // -- Reads -------------------------------------------------------------

    async fn read_balances(&self, account: &AccountRef) -> Result<PoolSnapshot, ReelError> {
        let ledger = self.ledger.as_ref();
        self.with_read_retry("balances", move || ledger.balances(account)).await
    }

    /// History from the cache when fresh, otherwise from the ledger.
    async fn read_history(&self, account: &AccountRef) -> Result<HistoryPage, ReelError> {
        match self.cache.read().await.fresh(account.key()) {
            Ok(page) => {
                debug!(account = %account, events = page.events.len(), "History served from cache");
                return Ok(page);
            }
            Err(ReelError::StaleCache) => {}
            Err(e) => return Err(e),
        }

        let ledger = self.ledger.as_ref();
        let limit = self.settings.history_limit;
        let page = self.with_read_retry("history", move || ledger.history(account, limit)).await?;
        if let Err(e) = self.cache.write().await.put(account.key(), page.clone()) {
            warn!(account = %account, error = %e, "Failed to persist history cache");
        }
        Ok(page)
    }

    /// Run an idempotent read, retrying availability failures with
    /// exponential backoff.
    async fn with_read_retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, ReelError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ReelError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && attempt < self.settings.read_retries => {
                    attempt += 1;
                    let backoff = self.settings.read_backoff * 2u32.saturating_pow(attempt - 1);
                    warn!(
                        read = what,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Ledger read failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Whether the share record moved in the direction `ix` would move it.
fn shares_moved(ix: &Instruction, before: &PoolSnapshot, after: &PoolSnapshot) -> bool {
    match ix {
        Instruction::Deposit { .. } => after.account_shares > before.account_shares,
        Instruction::Withdraw { .. } => after.account_shares < before.account_shares,
        Instruction::Wager { .. } => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
