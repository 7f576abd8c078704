//! Integration test harness.

mod flows;
mod mock_ledger;
