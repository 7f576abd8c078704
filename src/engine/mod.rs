//! Core engine.
//!
//! `outcome`, `pool`, `reconciler` and `view` are pure and synchronous.
//! `orchestrator` drives actions against the ledger; `poller` keeps only
//! the newest background refresh.

pub mod outcome;
pub mod pool;
pub mod reconciler;
pub mod view;
pub mod orchestrator;
pub mod poller;
