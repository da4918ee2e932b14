//! Unit of work over the account store and transaction log
//!
//! A unit of work locks the accounts it will touch, stages debits, credits
//! and ledger entries on private copies, and publishes all of them in a single
//! commit. Until `commit` returns nothing it staged is visible to anyone;
//! dropping it, or any error on the way, discards the staged changes.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use crate::error::{LedgerError, LedgerResult};
use crate::models::{
    Account, AccountId, BalanceError, Money, ReferenceNumber, Transaction, TransactionType,
};

use super::journal::{BalanceUpdate, CommitBody};
use super::locks::AccountLocks;
use super::Storage;

/// Outcome of a successful commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    /// Journal sequence number of the commit
    pub seq: u64,
    pub committed_at: DateTime<Utc>,
    /// Entries as written, stamped with the commit time
    pub entries: Vec<Transaction>,
    pub balances: Vec<BalanceUpdate>,
}

/// One account and the entries it owns, read at a single commit boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerView {
    pub account: Account,
    /// Newest first
    pub entries: Vec<Transaction>,
    /// Journal sequence number the view reflects
    pub as_of_seq: u64,
}

/// Atomic set of balance changes and ledger entries
pub trait UnitOfWork {
    /// Staged view of a locked account
    ///
    /// Any account the unit was not begun with is `NotFound`, as are the
    /// `debit` and `credit` targets below.
    fn account(&self, id: AccountId) -> LedgerResult<&Account>;

    /// Remove funds, returning the staged balance
    fn debit(&mut self, id: AccountId, amount: Money) -> LedgerResult<Money>;

    /// Add funds, returning the staged balance
    fn credit(&mut self, id: AccountId, amount: Money) -> LedgerResult<Money>;

    /// Stage ledger entries; all of them or none are accepted
    fn append(&mut self, entries: Vec<Transaction>) -> LedgerResult<()>;

    /// Make every staged change durable and visible at once
    fn commit(self) -> LedgerResult<CommitReceipt>;

    /// Discard every staged change and release the accounts
    fn abort(self);
}

/// Durable store of accounts and ledger entries
pub trait LedgerStore: Send + Sync {
    type Unit<'a>: UnitOfWork
    where
        Self: 'a;

    /// Lock `accounts` (in ascending id order) and open a unit of work on them
    fn begin(&self, accounts: &[AccountId]) -> LedgerResult<Self::Unit<'_>>;

    fn account(&self, id: AccountId) -> LedgerResult<Account>;

    fn account_by_number(&self, account_number: &str) -> LedgerResult<Account>;

    /// Entries owned by an account, newest first
    fn transactions_for(&self, id: AccountId) -> LedgerResult<Vec<Transaction>>;

    /// Account and its entries as of the same commit
    fn snapshot_for(&self, id: AccountId) -> LedgerResult<LedgerView>;

    /// Every entry carrying a reference number, debit leg first
    fn entries_by_reference(&self, reference: &ReferenceNumber) -> LedgerResult<Vec<Transaction>>;
}

/// Unit of work against [`Storage`]
pub struct StorageUnit<'a> {
    storage: &'a Storage,
    locks: AccountLocks<'a>,
    staged: BTreeMap<AccountId, Account>,
    touched: BTreeSet<AccountId>,
    entries: Vec<Transaction>,
    finished: bool,
}

impl<'a> StorageUnit<'a> {
    pub(super) fn new(storage: &'a Storage, locks: AccountLocks<'a>) -> LedgerResult<Self> {
        let staged = {
            let table = storage.accounts.read_table();
            locks
                .ids()
                .iter()
                .map(|&id| {
                    table
                        .get(id)
                        .cloned()
                        .map(|account| (id, account))
                        .ok_or_else(|| LedgerError::account_not_found(id.to_string()))
                })
                .collect::<LedgerResult<BTreeMap<_, _>>>()?
        };

        Ok(Self {
            storage,
            locks,
            staged,
            touched: BTreeSet::new(),
            entries: Vec::new(),
            finished: false,
        })
    }

    fn staged_mut(&mut self, id: AccountId) -> LedgerResult<&mut Account> {
        self.staged
            .get_mut(&id)
            .ok_or_else(|| not_in_unit(id))
    }

    fn check_entries(&self) -> LedgerResult<()> {
        if self.entries.is_empty() && self.touched.is_empty() {
            return Err(LedgerError::Validation(
                "Unit of work has no changes to commit".into(),
            ));
        }

        let mut legs: HashMap<&ReferenceNumber, usize> = HashMap::new();
        for entry in self.entries.iter().filter(|e| e.is_transfer()) {
            *legs.entry(&entry.reference_number).or_default() += 1;
        }
        if let Some((reference, count)) = legs.iter().find(|(_, count)| **count != 2) {
            return Err(LedgerError::Validation(format!(
                "Transfer {} has {} leg(s), expected 2",
                reference, count
            )));
        }

        for id in &self.touched {
            let balance = self.staged[id].balance();
            match self.entries.iter().rev().find(|e| e.account_id == *id) {
                Some(last) if last.balance_after_transaction == balance => {}
                Some(last) => {
                    return Err(LedgerError::Validation(format!(
                        "Entry {} records balance {} but account {} will hold {}",
                        last.id, last.balance_after_transaction, id, balance
                    )))
                }
                None => {
                    return Err(LedgerError::Validation(format!(
                        "Balance of account {} changed without a ledger entry",
                        id
                    )))
                }
            }
        }

        if let Some(entry) = self.entries.iter().find(|e| !self.touched.contains(&e.account_id)) {
            return Err(LedgerError::Validation(format!(
                "Entry {} records no balance change on its account",
                entry.id
            )));
        }

        Ok(())
    }

    fn commit_inner(&mut self) -> LedgerResult<CommitReceipt> {
        self.check_entries()?;

        let storage = self.storage;
        let mut journal = storage
            .journal
            .try_lock_for(storage.lock_timeout)
            .ok_or_else(|| {
                LedgerError::Conflict("Timed out waiting for the transaction journal".into())
            })?;

        // Authoritative uniqueness check: the journal mutex serializes commits
        {
            let index = storage.transactions.read_index();
            if let Some(dup) = self
                .entries
                .iter()
                .find(|e| index.contains_reference(&e.reference_number))
            {
                return Err(LedgerError::Conflict(format!(
                    "Reference number {} already exists",
                    dup.reference_number
                )));
            }
        }

        let committed_at = journal.next_commit_time();
        let mut entries = std::mem::take(&mut self.entries);
        for entry in &mut entries {
            entry.transaction_date = committed_at;
        }

        let balances: Vec<BalanceUpdate> = self
            .touched
            .iter()
            .map(|id| BalanceUpdate {
                account_id: *id,
                balance: self.staged[id].balance(),
            })
            .collect();

        let body = CommitBody {
            committed_at,
            balances,
            entries,
        };
        let seq = journal.append(&body)?;

        {
            let mut accounts = storage.accounts.write_table();
            let mut index = storage.transactions.write_index();
            accounts.apply(seq, committed_at, &body.balances)?;
            index.apply(seq, &body.entries)?;
        }
        drop(journal);

        tracing::debug!(
            seq,
            accounts = body.balances.len(),
            entries = body.entries.len(),
            "unit of work committed"
        );

        if let Err(err) = storage.accounts.save() {
            // The journal already holds the commit; the snapshot catches up on
            // the next successful save or on replay.
            tracing::warn!(seq, error = %err, "failed to refresh account snapshot");
        }

        Ok(CommitReceipt {
            seq,
            committed_at,
            entries: body.entries,
            balances: body.balances,
        })
    }
}

fn balance_error(account: &Account, err: BalanceError) -> LedgerError {
    match err {
        BalanceError::BelowMinimum { needed, available } => LedgerError::InsufficientFunds {
            account: account.account_number.clone(),
            needed,
            available,
        },
        BalanceError::NotActive(status) => LedgerError::Validation(format!(
            "Account '{}' is {} and cannot transact",
            account.account_number, status
        )),
        BalanceError::NonPositiveAmount(_) | BalanceError::Overflow => {
            LedgerError::Validation(format!("{} (account '{}')", err, account.account_number))
        }
    }
}

/// An account the unit did not lock is unknown to it
fn not_in_unit(id: AccountId) -> LedgerError {
    LedgerError::account_not_found(format!("{} (not locked by this unit of work)", id))
}

impl UnitOfWork for StorageUnit<'_> {
    fn account(&self, id: AccountId) -> LedgerResult<&Account> {
        self.staged.get(&id).ok_or_else(|| not_in_unit(id))
    }

    fn debit(&mut self, id: AccountId, amount: Money) -> LedgerResult<Money> {
        let account = self.staged_mut(id)?;
        let balance = account
            .apply_debit(amount)
            .map_err(|e| balance_error(account, e))?;
        self.touched.insert(id);
        Ok(balance)
    }

    fn credit(&mut self, id: AccountId, amount: Money) -> LedgerResult<Money> {
        let account = self.staged_mut(id)?;
        let balance = account
            .apply_credit(amount)
            .map_err(|e| balance_error(account, e))?;
        self.touched.insert(id);
        Ok(balance)
    }

    fn append(&mut self, entries: Vec<Transaction>) -> LedgerResult<()> {
        let mut staged = self.entries.clone();
        let committed = self.storage.transactions.read_index();

        for entry in entries {
            entry
                .validate()
                .map_err(|e| LedgerError::Validation(e.to_string()))?;

            if !self.locks.holds(entry.account_id) {
                return Err(LedgerError::Validation(format!(
                    "Entry {} belongs to account {} outside this unit of work",
                    entry.id, entry.account_id
                )));
            }

            if committed.contains_reference(&entry.reference_number) {
                return Err(LedgerError::Conflict(format!(
                    "Reference number {} already exists",
                    entry.reference_number
                )));
            }

            let siblings: Vec<&Transaction> = staged
                .iter()
                .filter(|e| e.reference_number == entry.reference_number)
                .collect();

            match (entry.transaction_type, siblings.as_slice()) {
                (_, []) => {}
                (TransactionType::Transfer, [other]) => {
                    let (debit, credit) = if other.is_debit() {
                        (*other, &entry)
                    } else {
                        (&entry, *other)
                    };
                    Transaction::validate_pair(debit, credit)
                        .map_err(|e| LedgerError::Validation(e.to_string()))?;
                }
                _ => {
                    return Err(LedgerError::Conflict(format!(
                        "Reference number {} used by more entries than one transfer",
                        entry.reference_number
                    )))
                }
            }

            staged.push(entry);
        }

        drop(committed);
        self.entries = staged;
        Ok(())
    }

    fn commit(mut self) -> LedgerResult<CommitReceipt> {
        let result = self.commit_inner();
        self.finished = result.is_ok();
        result
    }

    fn abort(mut self) {
        self.finished = true;
        tracing::debug!(accounts = self.locks.ids().len(), "unit of work aborted");
    }
}

impl Drop for StorageUnit<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(
                accounts = self.locks.ids().len(),
                "unit of work dropped without commit; staged changes discarded"
            );
        }
    }
}
