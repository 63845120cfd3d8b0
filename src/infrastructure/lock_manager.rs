//! Row lock table for the in-memory store.

use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Most recent acquisitions kept by [`LockManager::history`].
pub const HISTORY_LIMIT: usize = 1024;

/// How often a blocked waiter re-checks its cancellation token.
const CANCEL_POLL: Duration = Duration::from_millis(10);

/// One successful lock acquisition, in the order it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockEvent {
    pub txn_id: u64,
    pub account_id: i64,
}

/// How a call to [`LockManager::acquire`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    Acquired,
    TimedOut,
    Cancelled,
}

impl LockOutcome {
    pub fn is_acquired(self) -> bool {
        self == LockOutcome::Acquired
    }
}

/// Exclusive per-row locks owned by transaction ids.
///
/// A lock is re-entrant for its owner and is held until
/// [`release_all`](LockManager::release_all) runs for that owner. Waiters
/// give up after `timeout`, which is how a lock-order violation surfaces
/// instead of hanging forever, or as soon as their token is cancelled.
pub struct LockManager {
    owners: Mutex<HashMap<i64, u64>>,
    released: Condvar,
    history: Mutex<VecDeque<LockEvent>>,
    timeout: Duration,
}

impl LockManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            owners: Mutex::new(HashMap::new()),
            released: Condvar::new(),
            history: Mutex::new(VecDeque::new()),
            timeout,
        }
    }

    /// Blocks until `txn_id` owns `account_id`, the timeout passes, or
    /// `cancel` fires while the row is held by someone else.
    pub fn acquire(
        &self,
        txn_id: u64,
        account_id: i64,
        cancel: Option<&CancellationToken>,
    ) -> LockOutcome {
        let deadline = Instant::now() + self.timeout;
        let mut owners = self.owners.lock();
        let mut logged_wait = false;
        loop {
            match owners.get(&account_id).copied() {
                Some(owner) if owner == txn_id => return LockOutcome::Acquired,
                Some(owner) => {
                    if cancel.is_some_and(CancellationToken::is_cancelled) {
                        debug!(txn_id, account_id, holder = owner, "row lock wait cancelled");
                        return LockOutcome::Cancelled;
                    }
                    let now = Instant::now();
                    if now >= deadline {
                        warn!(txn_id, account_id, "row lock wait timed out");
                        return LockOutcome::TimedOut;
                    }
                    if !logged_wait {
                        debug!(txn_id, account_id, holder = owner, "waiting for row lock");
                        logged_wait = true;
                    }
                    let wake_at = match cancel {
                        Some(_) => deadline.min(now + CANCEL_POLL),
                        None => deadline,
                    };
                    self.released.wait_until(&mut owners, wake_at);
                }
                None => {
                    owners.insert(account_id, txn_id);
                    self.record(LockEvent { txn_id, account_id });
                    return LockOutcome::Acquired;
                }
            }
        }
    }

    fn record(&self, event: LockEvent) {
        let mut history = self.history.lock();
        if history.len() == HISTORY_LIMIT {
            history.pop_front();
        }
        history.push_back(event);
    }

    pub fn release_all(&self, txn_id: u64) {
        let mut owners = self.owners.lock();
        let before = owners.len();
        owners.retain(|_, owner| *owner != txn_id);
        if owners.len() != before {
            self.released.notify_all();
        }
    }

    /// The last [`HISTORY_LIMIT`] acquisitions, oldest first.
    pub fn history(&self) -> Vec<LockEvent> {
        self.history.lock().iter().copied().collect()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
