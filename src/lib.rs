//! REELBANK — slot outcome display and bankroll-pool accounting client
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod engine;
pub mod ledger;
pub mod storage;
pub mod dashboard;
