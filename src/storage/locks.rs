//! Per-account write locks
//!
//! A unit of work holds exclusive access to the accounts it mutates for its
//! whole lifetime. Locks are always taken one account at a time in ascending
//! `AccountId` order, so two transfers over the same pair of accounts can
//! never wait on each other in a cycle, whichever direction each one moves
//! money in.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{LedgerError, LedgerResult};
use crate::models::AccountId;

/// Table of accounts currently held by in-flight units of work
#[derive(Debug, Default)]
pub struct LockTable {
    held: Mutex<HashSet<AccountId>>,
    released: Condvar,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire every account in `ids`, waiting at most `timeout` overall
    ///
    /// Duplicates are ignored. On timeout every lock taken so far is released
    /// and a retryable `Conflict` is returned.
    pub fn acquire(&self, ids: &[AccountId], timeout: Duration) -> LedgerResult<AccountLocks<'_>> {
        let mut ordered = ids.to_vec();
        ordered.sort();
        ordered.dedup();

        let deadline = Instant::now() + timeout;
        let mut guard = AccountLocks {
            table: self,
            ids: Vec::with_capacity(ordered.len()),
        };

        for id in ordered {
            let mut held = self.held.lock();
            while held.contains(&id) {
                let wait = self.released.wait_until(&mut held, deadline);
                if wait.timed_out() && held.contains(&id) {
                    drop(held);
                    tracing::debug!(account = %id, "timed out waiting for account lock");
                    return Err(LedgerError::Conflict(format!(
                        "Timed out after {}ms waiting for account {}",
                        timeout.as_millis(),
                        id
                    )));
                }
            }
            held.insert(id);
            guard.ids.push(id);
        }

        Ok(guard)
    }

    /// Whether any unit of work currently holds the account
    pub fn is_held(&self, id: AccountId) -> bool {
        self.held.lock().contains(&id)
    }
}

/// Locks held by one unit of work; released on drop
#[derive(Debug)]
pub struct AccountLocks<'a> {
    table: &'a LockTable,
    ids: Vec<AccountId>,
}

impl AccountLocks<'_> {
    /// Accounts held, in acquisition order
    pub fn ids(&self) -> &[AccountId] {
        &self.ids
    }

    pub fn holds(&self, id: AccountId) -> bool {
        self.ids.contains(&id)
    }
}

impl Drop for AccountLocks<'_> {
    fn drop(&mut self) {
        if self.ids.is_empty() {
            return;
        }

        let mut held = self.table.held.lock();
        for id in &self.ids {
            held.remove(id);
        }
        drop(held);
        self.table.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use uuid::Uuid;

    fn id(n: u128) -> AccountId {
        AccountId::from_uuid(Uuid::from_u128(n))
    }

    #[test]
    fn test_acquires_in_ascending_order() {
        let table = LockTable::new();
        let locks = table
            .acquire(&[id(3), id(1), id(2), id(1)], Duration::from_millis(10))
            .unwrap();

        assert_eq!(locks.ids(), &[id(1), id(2), id(3)]);
        assert!(table.is_held(id(2)));

        drop(locks);
        assert!(!table.is_held(id(1)));
        assert!(!table.is_held(id(3)));
    }

    #[test]
    fn test_timeout_releases_partial_locks() {
        let table = LockTable::new();
        let _blocker = table.acquire(&[id(2)], Duration::from_millis(10)).unwrap();

        let err = table
            .acquire(&[id(1), id(2)], Duration::from_millis(20))
            .unwrap_err();

        assert!(matches!(err, LedgerError::Conflict(_)));
        assert!(err.is_retryable());
        assert!(!table.is_held(id(1)));
        assert!(table.is_held(id(2)));
    }

    #[test]
    fn test_waiter_proceeds_after_release() {
        let table = Arc::new(LockTable::new());
        let first = table.acquire(&[id(1)], Duration::from_millis(10)).unwrap();

        let waiter = {
            let table = Arc::clone(&table);
            thread::spawn(move || {
                table
                    .acquire(&[id(1)], Duration::from_secs(5))
                    .map(|locks| locks.holds(id(1)))
            })
        };

        thread::sleep(Duration::from_millis(20));
        drop(first);

        assert!(waiter.join().unwrap().unwrap());
    }

    #[test]
    fn test_opposite_orders_do_not_deadlock() {
        let table = Arc::new(LockTable::new());
        let completed = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let table = Arc::clone(&table);
                let completed = Arc::clone(&completed);
                thread::spawn(move || {
                    let pair = if i % 2 == 0 {
                        [id(1), id(2)]
                    } else {
                        [id(2), id(1)]
                    };
                    for _ in 0..100 {
                        let _locks = table.acquire(&pair, Duration::from_secs(5)).unwrap();
                        completed.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(completed.load(Ordering::SeqCst), 800);
    }
}
