//! Outcome table — maps a published outcome code to what the reels show.
//!
//! The code space `[0, N)` is partitioned into contiguous buckets with
//! inclusive upper bounds, evaluated in ascending order. Each bucket carries
//! the multiplier the ledger program pays and a rule that picks a symbol
//! triple from the code. The multiplier mirrors the ledger's payout table;
//! the payout amount itself is always read from the ledger, never computed
//! here.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{DisplayResult, ReelError, Symbol};

/// Multipliers the ledger program can pay.
pub const ALLOWED_MULTIPLIERS: [u32; 7] = [0, 1, 2, 4, 5, 10, 20];

/// Multiplier at or above which the display layer celebrates.
pub const JACKPOT_MULTIPLIER: u32 = 10;

// ---------------------------------------------------------------------------
// Symbol rules
// ---------------------------------------------------------------------------

/// How a bucket turns a code into three symbols.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SymbolRule {
    /// Three of a kind. Reserved for the two highest-paying buckets.
    Triple { symbol: Symbol },
    /// `[pair, pair, kicker]`, kicker chosen by `code % kickers.len()`.
    PairWithKicker { pair: Symbol, kickers: Vec<Symbol> },
    /// Three pairwise-distinct symbols. Required for losing buckets.
    Scatter,
}

impl SymbolRule {
    fn symbols(&self, code: u32) -> [Symbol; 3] {
        match self {
            SymbolRule::Triple { symbol } => [*symbol; 3],
            SymbolRule::PairWithKicker { pair, kickers } => {
                let kicker = kickers[code as usize % kickers.len()];
                [*pair, *pair, kicker]
            }
            SymbolRule::Scatter => scatter(code),
        }
    }
}

/// Distinct triple: first from `code % 4`, second from the remaining three
/// by `(code + 1) % 3`, third is the first leftover that isn't the second.
fn scatter(code: u32) -> [Symbol; 3] {
    let first = Symbol::ALL[code as usize % Symbol::ALL.len()];
    let rest: Vec<Symbol> = Symbol::ALL.iter().copied().filter(|s| *s != first).collect();
    let second = rest[(code as usize % rest.len() + 1) % rest.len()];
    let third = rest
        .iter()
        .copied()
        .find(|s| *s != second)
        .unwrap_or(first);
    [first, second, third]
}

// ---------------------------------------------------------------------------
// Buckets
// ---------------------------------------------------------------------------

/// One contiguous range of outcome codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    /// Inclusive upper bound.
    pub upper: u32,
    pub multiplier: u32,
    pub rule: SymbolRule,
}

impl Bucket {
    pub fn new(upper: u32, multiplier: u32, rule: SymbolRule) -> Self {
        Self {
            upper,
            multiplier,
            rule,
        }
    }
}

/// Share of the code space covered by one bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketOdds {
    pub lower: u32,
    pub upper: u32,
    pub width: u32,
    pub multiplier: u32,
    /// Percentage of the code space (0–100).
    pub probability_pct: Decimal,
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Immutable, validated outcome table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeTable {
    buckets: Vec<Bucket>,
}

impl Default for OutcomeTable {
    /// The ledger program's payout table over a 200-code space.
    fn default() -> Self {
        use Symbol::*;
        Self {
            buckets: vec![
                Bucket::new(0, 20, SymbolRule::Triple { symbol: Diamond }),
                Bucket::new(2, 10, SymbolRule::Triple { symbol: Cherry }),
                Bucket::new(
                    8,
                    5,
                    SymbolRule::PairWithKicker { pair: Lemon, kickers: vec![Cherry, Orange, Diamond] },
                ),
                Bucket::new(
                    18,
                    4,
                    SymbolRule::PairWithKicker { pair: Orange, kickers: vec![Cherry, Lemon, Diamond] },
                ),
                Bucket::new(
                    38,
                    2,
                    SymbolRule::PairWithKicker { pair: Diamond, kickers: vec![Cherry, Lemon, Orange] },
                ),
                Bucket::new(
                    68,
                    1,
                    SymbolRule::PairWithKicker { pair: Cherry, kickers: vec![Lemon, Orange, Diamond] },
                ),
                Bucket::new(199, 0, SymbolRule::Scatter),
            ],
        }
    }
}

impl OutcomeTable {
    /// Build a table, rejecting anything that breaks coverage or the
    /// display rules the win/lose visuals rely on.
    pub fn new(buckets: Vec<Bucket>) -> Result<Self, ReelError> {
        if buckets.is_empty() {
            return Err(ReelError::InvalidTable("table has no buckets".into()));
        }

        for pair in buckets.windows(2) {
            if pair[1].upper <= pair[0].upper {
                return Err(ReelError::InvalidTable(format!(
                    "bucket bounds must be strictly ascending ({} then {})",
                    pair[0].upper, pair[1].upper
                )));
            }
        }

        let mut paying: Vec<u32> = buckets
            .iter()
            .map(|b| b.multiplier)
            .filter(|m| *m > 0)
            .collect();
        paying.sort_unstable_by(|a, b| b.cmp(a));
        paying.dedup();
        let triple_floor = paying.get(1).or(paying.first()).copied().unwrap_or(u32::MAX);

        let mut triples_seen: Vec<Symbol> = Vec::new();
        for bucket in &buckets {
            if !ALLOWED_MULTIPLIERS.contains(&bucket.multiplier) {
                return Err(ReelError::InvalidTable(format!(
                    "multiplier {} is not paid by the ledger",
                    bucket.multiplier
                )));
            }
            match &bucket.rule {
                SymbolRule::Triple { symbol } => {
                    if bucket.multiplier == 0 || bucket.multiplier < triple_floor {
                        return Err(ReelError::InvalidTable(format!(
                            "triple {symbol} only allowed in the two highest-paying buckets (bucket ending {})",
                            bucket.upper
                        )));
                    }
                    if triples_seen.contains(symbol) {
                        return Err(ReelError::InvalidTable(format!(
                            "triple {symbol} claimed by more than one bucket"
                        )));
                    }
                    triples_seen.push(*symbol);
                }
                SymbolRule::PairWithKicker { pair, kickers } => {
                    if bucket.multiplier == 0 {
                        return Err(ReelError::InvalidTable(format!(
                            "losing bucket ending {} must show distinct symbols",
                            bucket.upper
                        )));
                    }
                    if kickers.is_empty() || kickers.contains(pair) {
                        return Err(ReelError::InvalidTable(format!(
                            "pair {pair} needs kickers that differ from it"
                        )));
                    }
                }
                SymbolRule::Scatter => {}
            }
        }

        Ok(Self { buckets })
    }

    /// Resolve an outcome code. Codes outside the table are an error, never
    /// a silent loss.
    pub fn resolve(&self, code: i64) -> Result<DisplayResult, ReelError> {
        let max = self.max_code();
        if code < 0 || code > i64::from(max) {
            return Err(ReelError::InvalidCode { code, max });
        }
        let code = code as u32;

        let idx = self.buckets.partition_point(|b| b.upper < code);
        let bucket = &self.buckets[idx];

        Ok(DisplayResult {
            code,
            symbols: bucket.rule.symbols(code),
            win: bucket.multiplier > 0,
            multiplier: bucket.multiplier,
        })
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    /// Highest valid code.
    pub fn max_code(&self) -> u32 {
        self.buckets.last().map(|b| b.upper).unwrap_or(0)
    }

    /// Number of codes `N` in `[0, N)`.
    pub fn code_space(&self) -> u64 {
        u64::from(self.max_code()) + 1
    }

    /// Per-bucket share of the code space.
    pub fn probabilities(&self) -> Vec<BucketOdds> {
        let space = Decimal::from(self.code_space());
        let mut lower = 0u32;
        self.buckets
            .iter()
            .map(|b| {
                let width = b.upper - lower + 1;
                let odds = BucketOdds {
                    lower,
                    upper: b.upper,
                    width,
                    multiplier: b.multiplier,
                    probability_pct: Decimal::from(width) * Decimal::ONE_HUNDRED / space,
                };
                lower = b.upper.saturating_add(1);
                odds
            })
            .collect()
    }

    /// Expected payout per unit wagered (`Σ p·m`).
    pub fn return_to_player(&self) -> Decimal {
        let weighted: u64 = self
            .probabilities()
            .iter()
            .map(|o| u64::from(o.width) * u64::from(o.multiplier))
            .sum();
        Decimal::from(weighted) / Decimal::from(self.code_space())
    }

    pub fn is_jackpot(result: &DisplayResult) -> bool {
        result.multiplier >= JACKPOT_MULTIPLIER
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
