//! Background balance/history polling.
//!
//! Polls may overlap and finish out of order. Each poll takes a ticket
//! before it starts; a result is published only if its ticket is still
//! the newest one issued, so a slow, superseded poll is dropped on arrival
//! instead of overwriting fresher data. The watch loop runs polls through
//! a `PollSlot`, which skips a tick while the previous poll is running, so
//! a ledger slower than the interval still gets every result published.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use super::orchestrator::{Orchestrator, Refreshed};
use crate::types::{AccountRef, ReelError};

/// Identifies one poll. Later tickets compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

impl Ticket {
    pub fn value(&self) -> u64 {
        self.0
    }
}

#[derive(Debug)]
struct Published<T> {
    ticket: u64,
    value: Option<T>,
}

/// Latest-wins holder for poll results.
#[derive(Debug)]
pub struct RefreshBoard<T> {
    issued: AtomicU64,
    published: Mutex<Published<T>>,
}

impl<T: Clone> Default for RefreshBoard<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> RefreshBoard<T> {
    pub fn new() -> Self {
        Self {
            issued: AtomicU64::new(0),
            published: Mutex::new(Published {
                ticket: 0,
                value: None,
            }),
        }
    }

    /// Start a poll.
    pub fn issue(&self) -> Ticket {
        Ticket(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Offer a poll result. Returns `false` (and drops `value`) when a newer
    /// poll has been issued since `ticket`.
    pub fn publish(&self, ticket: Ticket, value: T) -> bool {
        let mut published = self.published.lock().unwrap_or_else(|p| p.into_inner());
        let latest = self.issued.load(Ordering::SeqCst);
        if ticket.0 != latest || ticket.0 <= published.ticket {
            debug!(ticket = ticket.0, latest, "Discarding superseded poll result");
            return false;
        }
        published.ticket = ticket.0;
        published.value = Some(value);
        true
    }

    /// The most recently accepted result.
    pub fn latest(&self) -> Option<T> {
        self.published
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .value
            .clone()
    }

    pub fn latest_ticket(&self) -> Ticket {
        Ticket(self.issued.load(Ordering::SeqCst))
    }
}

// ---------------------------------------------------------------------------
// Poll slot
// ---------------------------------------------------------------------------

/// Holds at most one background poll.
#[derive(Debug, Default)]
pub struct PollSlot {
    running: Option<JoinHandle<()>>,
}

impl PollSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Spawn `poll` unless the previous one is still running. Returns
    /// whether it was started.
    pub fn start<F>(&mut self, poll: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_running() {
            return false;
        }
        self.running = Some(tokio::spawn(poll));
        true
    }

    /// Cancel the running poll. Polls are pure reads, so nothing is left
    /// half done.
    pub fn abort(&mut self) {
        if let Some(handle) = self.running.take() {
            handle.abort();
        }
    }
}

/// Run one refresh for `account` and publish it if still current.
/// `Ok(None)` means the result was superseded.
pub async fn poll_once(
    orchestrator: &Orchestrator,
    board: &RefreshBoard<Refreshed>,
    account: &AccountRef,
) -> Result<Option<Refreshed>, ReelError> {
    let ticket = board.issue();
    let refreshed = orchestrator.refresh_with_history(account).await?;
    if board.publish(ticket, refreshed.clone()) {
        Ok(Some(refreshed))
    } else {
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
