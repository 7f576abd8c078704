//! Mock ledger program for integration testing.
//!
//! Provides a deterministic `LedgerProgram` implementation that keeps the
//! pool, share records and transactions in memory. Failure modes (lost
//! responses, stalled confirmations, forgotten transactions) are
//! switchable from test code.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use reelbank::engine::outcome::OutcomeTable;
use reelbank::engine::pool::PoolSnapshot;
use reelbank::ledger::LedgerProgram;
use reelbank::types::*;

#[derive(Debug, Default)]
struct LedgerState {
    pool_balance: u64,
    total_shares: u64,
    shares: HashMap<String, u64>,
    transactions: HashMap<String, Confirmation>,
    history: HashMap<String, Vec<TransferEvent>>,
    sent: Vec<Instruction>,
    rolls: VecDeque<i64>,
    history_fetches: usize,
}

/// Switchable failure modes.
#[derive(Debug, Default, Clone)]
pub struct Faults {
    /// Apply the instruction but report the broadcast as unreachable.
    pub lose_send_response: bool,
    /// `confirm` reports the ledger as unreachable.
    pub drop_confirms: bool,
    /// `lookup` finds nothing, even for landed transactions.
    pub forget_transactions: bool,
    /// Wager logs omit `PAYOUT=`.
    pub malformed_logs: bool,
    /// Every read fails with this error.
    pub read_error: Option<ReelError>,
}

/// An in-memory ledger program for deterministic testing.
pub struct MockLedger {
    table: OutcomeTable,
    state: Arc<Mutex<LedgerState>>,
    faults: Arc<Mutex<Faults>>,
    /// When set, `confirm` waits for a notification before answering.
    confirm_gate: Arc<Mutex<Option<Arc<Notify>>>>,
    /// Signalled on every broadcast.
    pub sent: Arc<Notify>,
}

impl MockLedger {
    /// A pool holding `pool_balance` with no investors yet.
    pub fn new(pool_balance: u64) -> Self {
        Self {
            table: OutcomeTable::default(),
            state: Arc::new(Mutex::new(LedgerState {
                pool_balance,
                ..Default::default()
            })),
            faults: Arc::new(Mutex::new(Faults::default())),
            confirm_gate: Arc::new(Mutex::new(None)),
            sent: Arc::new(Notify::new()),
        }
    }

    /// Seed an investor position directly, as if deposited earlier.
    pub fn seed_investor(&self, account: &AccountRef, deposit: u64) {
        let mut st = self.state.lock().unwrap();
        let minted = mint_shares(st.pool_balance, st.total_shares, deposit);
        st.pool_balance += deposit;
        st.total_shares += minted;
        *st.shares.entry(account.wallet.clone()).or_default() += minted;
        st.history.entry(account.wallet.clone()).or_default().push(TransferEvent {
            signature: format!("seed-{}", account.wallet),
            kind: TransferKind::Deposit,
            amount: deposit,
            timestamp: Some(Utc::now()),
            success: true,
        });
    }

    /// Queue outcome codes for upcoming wagers.
    pub fn queue_rolls(&self, rolls: &[i64]) {
        self.state.lock().unwrap().rolls.extend(rolls.iter().copied());
    }

    pub fn set_faults(&self, faults: Faults) {
        *self.faults.lock().unwrap() = faults;
    }

    /// Hold every confirmation until the returned handle is notified.
    pub fn gate_confirms(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.confirm_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn sent_instructions(&self) -> Vec<Instruction> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn pool_balance(&self) -> u64 {
        self.state.lock().unwrap().pool_balance
    }

    pub fn shares_of(&self, account: &AccountRef) -> u64 {
        self.state.lock().unwrap().shares.get(&account.wallet).copied().unwrap_or(0)
    }

    pub fn history_fetches(&self) -> usize {
        self.state.lock().unwrap().history_fetches
    }

    fn read_fault(&self) -> Result<(), ReelError> {
        match &self.faults.lock().unwrap().read_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    /// Apply an instruction to the in-memory pool and record it.
    fn apply(&self, account: &AccountRef, ix: &Instruction) -> Result<Signature, ReelError> {
        let malformed = self.faults.lock().unwrap().malformed_logs;
        let mut st = self.state.lock().unwrap();
        let signature = format!("mock-sig-{}", st.sent.len() + 1);
        st.sent.push(*ix);

        let mut logs = vec!["Program BKRe invoke [1]".to_string()];
        match *ix {
            Instruction::Wager { amount } => {
                let roll = st.rolls.pop_front().unwrap_or(150);
                let multiplier = self.table.resolve(roll).map(|d| d.multiplier).unwrap_or(0);
                let payout = amount * u64::from(multiplier);
                st.pool_balance = st.pool_balance + amount - payout;
                let win = u8::from(payout > 0);
                if malformed {
                    logs.push(format!("Program log: ROLL={roll} WIN={win}"));
                } else {
                    logs.push(format!("Program log: ROLL={roll} WIN={win} PAYOUT={payout}"));
                }
            }
            Instruction::Deposit { amount } => {
                let minted = mint_shares(st.pool_balance, st.total_shares, amount);
                st.pool_balance += amount;
                st.total_shares += minted;
                *st.shares.entry(account.wallet.clone()).or_default() += minted;
                push_event(&mut st, account, &signature, TransferKind::Deposit, amount);
            }
            Instruction::Withdraw { shares } => {
                let held = st.shares.get(&account.wallet).copied().unwrap_or(0);
                if shares > held {
                    return Err(ReelError::Rejected("insufficient shares".into()));
                }
                let value = shares * st.pool_balance / st.total_shares;
                st.pool_balance -= value;
                st.total_shares -= shares;
                st.shares.insert(account.wallet.clone(), held - shares);
                push_event(&mut st, account, &signature, TransferKind::Withdraw, value);
            }
        }
        logs.push("Program BKRe success".to_string());

        let slot = st.sent.len() as u64;
        st.transactions.insert(
            signature.clone(),
            Confirmation {
                signature: signature.clone(),
                slot: Some(slot),
                logs,
                err: None,
            },
        );
        Ok(Signature(signature))
    }
}

fn mint_shares(pool_balance: u64, total_shares: u64, amount: u64) -> u64 {
    if total_shares == 0 || pool_balance == 0 {
        amount
    } else {
        amount * total_shares / pool_balance
    }
}

fn push_event(st: &mut LedgerState, account: &AccountRef, sig: &str, kind: TransferKind, amount: u64) {
    st.history.entry(account.wallet.clone()).or_default().push(TransferEvent {
        signature: sig.to_string(),
        kind,
        amount,
        timestamp: Some(Utc::now()),
        success: true,
    });
}

#[async_trait]
impl LedgerProgram for MockLedger {
    async fn send(&self, account: &AccountRef, instruction: &Instruction) -> Result<Signature, ReelError> {
        let sig = self.apply(account, instruction);
        self.sent.notify_one();
        let lose = self.faults.lock().unwrap().lose_send_response;
        match sig {
            Ok(_) if lose => Err(ReelError::Unreachable("connection reset".into())),
            other => other,
        }
    }

    async fn confirm(&self, signature: &Signature) -> Result<Confirmation, ReelError> {
        let gate = self.confirm_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.faults.lock().unwrap().drop_confirms {
            return Err(ReelError::Unreachable("confirmation lost".into()));
        }
        self.state
            .lock()
            .unwrap()
            .transactions
            .get(&signature.0)
            .cloned()
            .ok_or_else(|| ReelError::MalformedResult(format!("unknown signature {signature}")))
    }

    async fn lookup(&self, signature: &Signature) -> Result<Option<Confirmation>, ReelError> {
        self.read_fault()?;
        if self.faults.lock().unwrap().forget_transactions {
            return Ok(None);
        }
        Ok(self.state.lock().unwrap().transactions.get(&signature.0).cloned())
    }

    async fn balances(&self, account: &AccountRef) -> Result<PoolSnapshot, ReelError> {
        self.read_fault()?;
        let st = self.state.lock().unwrap();
        let held = st.shares.get(&account.wallet).copied().unwrap_or(0);
        PoolSnapshot::new(st.pool_balance, st.total_shares, held)
    }

    async fn history(&self, account: &AccountRef, limit: usize) -> Result<HistoryPage, ReelError> {
        self.read_fault()?;
        let mut st = self.state.lock().unwrap();
        st.history_fetches += 1;
        let all = st.history.get(&account.wallet).cloned().unwrap_or_default();
        let events: Vec<_> = all.iter().rev().take(limit).cloned().collect();
        Ok(HistoryPage {
            truncated: all.len() > limit,
            events,
        })
    }

    async fn share_records(&self) -> Result<Vec<ShareRecord>, ReelError> {
        self.read_fault()?;
        let st = self.state.lock().unwrap();
        Ok(st
            .shares
            .iter()
            .map(|(owner, shares)| ShareRecord {
                owner: owner.clone(),
                shares: *shares,
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> AccountRef {
        AccountRef::new("alice", "alice-record")
    }

    #[tokio::test]
    async fn test_mock_seeded_investor() {
        let ledger = MockLedger::new(9_000_000_000);
        ledger.seed_investor(&alice(), 1_000_000_000);
        let snap = ledger.balances(&alice()).await.unwrap();
        assert_eq!(snap.pool_balance, 10_000_000_000);
        assert_eq!(snap.account_shares, snap.total_shares);
    }

    #[tokio::test]
    async fn test_mock_wager_logs() {
        let ledger = MockLedger::new(10_000_000_000);
        ledger.queue_rolls(&[0]);
        let sig = ledger.send(&alice(), &Instruction::Wager { amount: 1_000 }).await.unwrap();
        let conf = ledger.confirm(&sig).await.unwrap();
        assert!(conf.logs.iter().any(|l| l.contains("ROLL=0 WIN=1 PAYOUT=20000")));
        assert_eq!(ledger.pool_balance(), 10_000_000_000 + 1_000 - 20_000);
    }

    #[tokio::test]
    async fn test_mock_forced_read_error() {
        let ledger = MockLedger::new(0);
        ledger.set_faults(Faults {
            read_error: Some(ReelError::Unreachable("down".into())),
            ..Default::default()
        });
        assert!(ledger.balances(&alice()).await.is_err());
        assert!(ledger.history(&alice(), 20).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_history_truncates() {
        let ledger = MockLedger::new(1_000_000_000);
        for _ in 0..3 {
            ledger.seed_investor(&alice(), 100_000_000);
        }
        let page = ledger.history(&alice(), 2).await.unwrap();
        assert_eq!(page.events.len(), 2);
        assert!(page.truncated);
    }
}
