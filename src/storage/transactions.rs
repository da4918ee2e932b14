//! Transaction log indexes
//!
//! The journal is the durable copy of every entry; this repository keeps the
//! in-memory indexes the queries run against. Entries are only ever added,
//! a whole commit at a time.

use std::collections::HashMap;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{LedgerError, LedgerResult};
use crate::models::{AccountId, ReferenceNumber, Transaction, TransactionId};

#[derive(Debug, Clone)]
struct StoredEntry {
    seq: u64,
    entry: Transaction,
}

/// Committed entries in commit order, with lookup indexes
#[derive(Debug, Default)]
pub struct TransactionIndex {
    entries: Vec<StoredEntry>,
    by_id: HashMap<TransactionId, usize>,
    by_account: HashMap<AccountId, Vec<usize>>,
    by_reference: HashMap<ReferenceNumber, Vec<usize>>,
    last_seq: u64,
}

impl TransactionIndex {
    pub fn contains_reference(&self, reference: &ReferenceNumber) -> bool {
        self.by_reference.contains_key(reference)
    }

    /// Entries owned by an account, newest first
    ///
    /// Ordered by transaction date, then by commit sequence, so entries
    /// committed within the same clock tick keep their commit order.
    pub fn query_by_account(&self, account_id: AccountId) -> Vec<Transaction> {
        let Some(positions) = self.by_account.get(&account_id) else {
            return Vec::new();
        };

        let mut stored: Vec<&StoredEntry> = positions.iter().map(|&i| &self.entries[i]).collect();
        stored.sort_by(|a, b| {
            b.entry
                .transaction_date
                .cmp(&a.entry.transaction_date)
                .then(b.seq.cmp(&a.seq))
        });
        stored.into_iter().map(|s| s.entry.clone()).collect()
    }

    /// Both legs of one transfer, debit leg first
    pub fn get_by_reference(&self, reference: &ReferenceNumber) -> Vec<Transaction> {
        let mut legs: Vec<Transaction> = self
            .by_reference
            .get(reference)
            .map(|positions| {
                positions
                    .iter()
                    .map(|&i| self.entries[i].entry.clone())
                    .collect()
            })
            .unwrap_or_default();
        legs.sort_by_key(|t| t.amount);
        legs
    }

    pub fn get(&self, id: TransactionId) -> Option<&Transaction> {
        self.by_id.get(&id).map(|&i| &self.entries[i].entry)
    }

    /// Every entry in commit order
    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.entries.iter().map(|s| &s.entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sequence number of the last commit applied
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    /// Add the entries of one committed journal record
    pub(crate) fn apply(&mut self, seq: u64, entries: &[Transaction]) -> LedgerResult<()> {
        if seq <= self.last_seq {
            return Err(LedgerError::Persistence(format!(
                "Commit {} applied out of order (last applied {})",
                seq, self.last_seq
            )));
        }
        if let Some(dup) = entries.iter().find(|e| self.by_id.contains_key(&e.id)) {
            return Err(LedgerError::Persistence(format!(
                "Duplicate ledger entry {} in commit {}",
                dup.id, seq
            )));
        }

        for entry in entries {
            let position = self.entries.len();
            self.by_id.insert(entry.id, position);
            self.by_account
                .entry(entry.account_id)
                .or_default()
                .push(position);
            self.by_reference
                .entry(entry.reference_number.clone())
                .or_default()
                .push(position);
            self.entries.push(StoredEntry {
                seq,
                entry: entry.clone(),
            });
        }
        self.last_seq = seq;
        Ok(())
    }
}

/// Repository for the transaction log
#[derive(Default)]
pub struct TransactionRepository {
    index: RwLock<TransactionIndex>,
}

impl TransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn read_index(&self) -> RwLockReadGuard<'_, TransactionIndex> {
        self.index.read()
    }

    pub(crate) fn write_index(&self) -> RwLockWriteGuard<'_, TransactionIndex> {
        self.index.write()
    }

    /// Entries owned by an account, newest first
    pub fn query_by_account(&self, account_id: AccountId) -> Vec<Transaction> {
        self.index.read().query_by_account(account_id)
    }

    /// Both legs of a transfer
    pub fn get_by_reference(&self, reference: &ReferenceNumber) -> LedgerResult<Vec<Transaction>> {
        let legs = self.index.read().get_by_reference(reference);
        if legs.is_empty() {
            return Err(LedgerError::reference_not_found(reference.as_str()));
        }
        Ok(legs)
    }

    pub fn get(&self, id: TransactionId) -> Option<Transaction> {
        self.index.read().get(id).cloned()
    }

    /// Every committed entry in commit order
    pub fn get_all(&self) -> Vec<Transaction> {
        self.index.read().iter().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.index.read().len()
    }

    pub fn last_seq(&self) -> u64 {
        self.index.read().last_seq()
    }
}
