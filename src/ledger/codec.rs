//! Wire formats shared with the ledger program.
//!
//! Instruction data is a one-byte tag followed by a little-endian `u64`.
//! Account layouts are fixed-offset little-endian fields. Wager results are
//! published as `KEY=value` tokens in the program logs.

use crate::types::{Instruction, ReelError, ShareRecord};

pub const TAG_WAGER: u8 = 1;
pub const TAG_DEPOSIT: u8 = 2;
pub const TAG_WITHDRAW: u8 = 3;

/// Size of an encoded instruction.
pub const INSTRUCTION_LEN: usize = 9;

/// `total_pool: u64` + `total_shares: u64`.
pub const BANKROLL_LAYOUT_LEN: usize = 16;

/// `owner: [u8; 32]` + `shares: u64`.
pub const SHARE_RECORD_LEN: usize = 40;

// ---------------------------------------------------------------------------
// Instructions
// ---------------------------------------------------------------------------

pub fn encode_instruction(ix: &Instruction) -> Vec<u8> {
    let (tag, arg) = match *ix {
        Instruction::Wager { amount } => (TAG_WAGER, amount),
        Instruction::Deposit { amount } => (TAG_DEPOSIT, amount),
        Instruction::Withdraw { shares } => (TAG_WITHDRAW, shares),
    };
    let mut data = Vec::with_capacity(INSTRUCTION_LEN);
    data.push(tag);
    data.extend_from_slice(&arg.to_le_bytes());
    data
}

// ---------------------------------------------------------------------------
// Account layouts
// ---------------------------------------------------------------------------

/// Bookkeeping stored in the bankroll account's data. The spendable pool
/// balance is the account's lamport balance, not `total_pool`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankrollAccount {
    pub total_pool: u64,
    pub total_shares: u64,
}

pub fn parse_bankroll(data: &[u8]) -> Result<BankrollAccount, ReelError> {
    if data.len() < BANKROLL_LAYOUT_LEN {
        return Err(ReelError::MalformedResult(format!(
            "bankroll account is {} bytes, expected at least {BANKROLL_LAYOUT_LEN}",
            data.len()
        )));
    }
    Ok(BankrollAccount {
        total_pool: read_u64(data, 0)?,
        total_shares: read_u64(data, 8)?,
    })
}

pub fn parse_share_record(data: &[u8]) -> Result<ShareRecord, ReelError> {
    if data.len() < SHARE_RECORD_LEN {
        return Err(ReelError::MalformedResult(format!(
            "share record is {} bytes, expected {SHARE_RECORD_LEN}",
            data.len()
        )));
    }
    Ok(ShareRecord {
        owner: bs58::encode(&data[..32]).into_string(),
        shares: read_u64(data, 32)?,
    })
}

fn read_u64(data: &[u8], offset: usize) -> Result<u64, ReelError> {
    let bytes: [u8; 8] = data
        .get(offset..offset + 8)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| ReelError::MalformedResult(format!("no u64 at offset {offset}")))?;
    Ok(u64::from_le_bytes(bytes))
}

// ---------------------------------------------------------------------------
// Program logs
// ---------------------------------------------------------------------------

/// Wager result as published by the ledger program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WagerLog {
    pub roll: i64,
    pub win: bool,
    pub payout: u64,
}

/// Pull `ROLL=`, `WIN=` and `PAYOUT=` out of the transaction logs.
pub fn parse_wager_logs(logs: &[String]) -> Result<WagerLog, ReelError> {
    let roll = log_field(logs, "ROLL=")
        .ok_or_else(|| ReelError::MalformedResult("ROLL missing from program logs".into()))?;
    let win = log_field(logs, "WIN=")
        .ok_or_else(|| ReelError::MalformedResult("WIN missing from program logs".into()))?;
    let payout = log_field(logs, "PAYOUT=")
        .ok_or_else(|| ReelError::MalformedResult("PAYOUT missing from program logs".into()))?;

    let roll: i64 = roll
        .parse()
        .map_err(|_| ReelError::MalformedResult(format!("ROLL is not an integer: {roll}")))?;
    let win = match win {
        "0" => false,
        "1" => true,
        other => return Err(ReelError::MalformedResult(format!("WIN must be 0 or 1, got {other}"))),
    };
    let payout: u64 = payout
        .parse()
        .map_err(|_| ReelError::MalformedResult(format!("PAYOUT is not an amount: {payout}")))?;

    Ok(WagerLog { roll, win, payout })
}

/// First value following `key` in any log line: an optional sign and digits.
fn log_field<'a>(logs: &'a [String], key: &str) -> Option<&'a str> {
    logs.iter().find_map(|line| {
        let start = line.find(key)? + key.len();
        let rest = &line[start..];
        let end = rest
            .char_indices()
            .find(|(i, c)| !(c.is_ascii_digit() || (*i == 0 && *c == '-')))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if end == 0 {
            None
        } else {
            Some(&rest[..end])
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
