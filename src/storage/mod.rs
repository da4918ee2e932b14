//! Storage layer for the ledger
//!
//! Accounts live in a JSON snapshot, ledger entries in an append-only journal.
//! Every commit goes to the journal first; the in-memory tables and the
//! snapshot follow. On open, journal records newer than the snapshot are
//! replayed, so the two files can never disagree after a crash.
//!
//! A `Storage` holds an exclusive lock on its data directory from open to
//! drop, so a second process (or a second `Storage` in this one) waits for it
//! and then sees every commit the first one made.
//!
//! Lock order, when more than one is needed: account row locks, then the
//! journal mutex, then the account table, then the transaction index.

pub mod accounts;
pub mod dir_lock;
pub mod file_io;
pub mod journal;
pub mod locks;
pub mod transactions;
pub mod unit_of_work;

pub use accounts::AccountRepository;
pub use dir_lock::DirectoryLock;
pub use file_io::{read_json, write_json_atomic};
pub use journal::{BalanceUpdate, CommitBody};
pub use locks::LockTable;
pub use transactions::TransactionRepository;
pub use unit_of_work::{CommitReceipt, LedgerStore, LedgerView, StorageUnit, UnitOfWork};

use std::time::Duration;

use parking_lot::Mutex;

use crate::config::LedgerPaths;
use crate::error::{LedgerError, LedgerResult};
use crate::models::{Account, AccountId, ReferenceNumber, Transaction};

use journal::Journal;

/// Lock timeout used when none is configured
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Every account and entry as of one commit
#[derive(Debug, Clone)]
pub struct LedgerState {
    pub accounts: Vec<Account>,
    /// Commit order
    pub entries: Vec<Transaction>,
    pub as_of_seq: u64,
}

/// Main storage coordinator
pub struct Storage {
    paths: LedgerPaths,
    pub accounts: AccountRepository,
    pub transactions: TransactionRepository,
    journal: Mutex<Journal>,
    locks: LockTable,
    lock_timeout: Duration,
    _dir_lock: DirectoryLock,
}

impl Storage {
    /// Open storage with the default lock timeout
    pub fn open(paths: LedgerPaths) -> LedgerResult<Self> {
        Self::open_with_timeout(paths, DEFAULT_LOCK_TIMEOUT)
    }

    /// Open storage, replaying any journal records the snapshot is missing
    ///
    /// Waits up to `lock_timeout` for any other holder of the data directory;
    /// past that the error is a retryable `Conflict`.
    pub fn open_with_timeout(paths: LedgerPaths, lock_timeout: Duration) -> LedgerResult<Self> {
        paths.ensure_directories()?;
        let dir_lock = DirectoryLock::acquire(paths.lock_file(), lock_timeout)?;

        let accounts = AccountRepository::new(paths.accounts_file());
        let applied_seq = accounts.load()?;

        let (journal, records) = Journal::open(paths.journal_file())?;
        if journal.last_seq() < applied_seq {
            return Err(LedgerError::Persistence(format!(
                "Account snapshot is at commit {} but the journal ends at commit {}",
                applied_seq,
                journal.last_seq()
            )));
        }

        let transactions = TransactionRepository::new();
        let mut replayed = 0usize;
        {
            let mut table = accounts.write_table();
            let mut index = transactions.write_index();
            for record in &records {
                index.apply(record.seq, &record.body.entries)?;
                if record.seq > applied_seq {
                    table.apply(record.seq, record.body.committed_at, &record.body.balances)?;
                    replayed += 1;
                }
            }
        }

        if replayed > 0 {
            tracing::info!(
                replayed,
                from_seq = applied_seq,
                "replayed journal records into account snapshot"
            );
            accounts.save()?;
        }

        tracing::debug!(
            base_dir = %paths.base_dir().display(),
            accounts = accounts.count(),
            entries = transactions.count(),
            "storage opened"
        );

        Ok(Self {
            paths,
            accounts,
            transactions,
            journal: Mutex::new(journal),
            locks: LockTable::new(),
            lock_timeout,
            _dir_lock: dir_lock,
        })
    }

    pub fn paths(&self) -> &LedgerPaths {
        &self.paths
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Sequence number of the last published commit
    pub fn last_seq(&self) -> u64 {
        self.transactions.last_seq()
    }

    /// Every account and every entry at one commit boundary
    pub fn consistent_state(&self) -> LedgerState {
        let table = self.accounts.read_table();
        let index = self.transactions.read_index();

        let mut accounts: Vec<Account> = table.iter().cloned().collect();
        accounts.sort_by(|a, b| a.account_number.cmp(&b.account_number));

        LedgerState {
            accounts,
            entries: index.iter().cloned().collect(),
            as_of_seq: index.last_seq(),
        }
    }
}

impl LedgerStore for Storage {
    type Unit<'a> = StorageUnit<'a>;

    fn begin(&self, accounts: &[AccountId]) -> LedgerResult<StorageUnit<'_>> {
        let locks = self.locks.acquire(accounts, self.lock_timeout)?;
        tracing::debug!(accounts = ?locks.ids(), "account locks acquired");
        StorageUnit::new(self, locks)
    }

    fn account(&self, id: AccountId) -> LedgerResult<Account> {
        self.accounts
            .get(id)
            .ok_or_else(|| LedgerError::account_not_found(id.to_string()))
    }

    fn account_by_number(&self, account_number: &str) -> LedgerResult<Account> {
        self.accounts
            .get_by_number(account_number)
            .ok_or_else(|| LedgerError::account_not_found(account_number.trim()))
    }

    fn transactions_for(&self, id: AccountId) -> LedgerResult<Vec<Transaction>> {
        Ok(self.snapshot_for(id)?.entries)
    }

    fn snapshot_for(&self, id: AccountId) -> LedgerResult<LedgerView> {
        let table = self.accounts.read_table();
        let index = self.transactions.read_index();

        let account = table
            .get(id)
            .cloned()
            .ok_or_else(|| LedgerError::account_not_found(id.to_string()))?;

        Ok(LedgerView {
            account,
            entries: index.query_by_account(id),
            as_of_seq: index.last_seq(),
        })
    }

    fn entries_by_reference(&self, reference: &ReferenceNumber) -> LedgerResult<Vec<Transaction>> {
        self.transactions.get_by_reference(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountType, Currency, Money, PrincipalId, TransferDetails};
    use chrono::Utc;
    use tempfile::TempDir;

    fn open(temp_dir: &TempDir) -> Storage {
        Storage::open_with_timeout(
            LedgerPaths::with_base_dir(temp_dir.path()),
            Duration::from_millis(200),
        )
        .unwrap()
    }

    fn provision(storage: &Storage, number: &str, cents: i64) -> AccountId {
        let account = Account::new(number, AccountType::Checking, Currency::usd(), PrincipalId::new())
            .with_opening_balance(Money::from_cents(cents));
        let id = account.id;
        storage.accounts.insert(account).unwrap();
        id
    }

    /// Stage a complete transfer without committing it
    fn stage<'a>(
        storage: &'a Storage,
        source: AccountId,
        destination: AccountId,
        cents: i64,
        reference: &str,
    ) -> LedgerResult<StorageUnit<'a>> {
        let amount = Money::from_cents(cents);
        let mut unit = storage.begin(&[source, destination])?;
        let source_balance = unit.debit(source, amount)?;
        let destination_balance = unit.credit(destination, amount)?;

        let details = TransferDetails {
            reference_number: ReferenceNumber::parse(reference).unwrap(),
            source_account: source,
            destination_account: destination,
            amount,
            currency: Currency::usd(),
            initiated_by: PrincipalId::new(),
            transaction_date: Utc::now(),
        };
        unit.append(vec![
            Transaction::debit_leg(&details, "out", source_balance),
            Transaction::credit_leg(&details, "in", destination_balance),
        ])?;
        Ok(unit)
    }

    #[test]
    fn test_storage_creation() {
        let temp_dir = TempDir::new().unwrap();
        let storage = open(&temp_dir);

        assert!(temp_dir.path().join("data").exists());
        assert_eq!(storage.last_seq(), 0);
        assert_eq!(storage.accounts.count(), 0);
    }

    #[test]
    fn test_commit_publishes_balances_and_entries_together() {
        let temp_dir = TempDir::new().unwrap();
        let storage = open(&temp_dir);
        let a = provision(&storage, "A", 10000);
        let b = provision(&storage, "B", 5000);

        let unit = stage(&storage, a, b, 3000, "TRF-1").unwrap();
        // Nothing visible before commit
        assert_eq!(storage.account(a).unwrap().balance(), Money::from_cents(10000));
        assert_eq!(storage.transactions.count(), 0);

        let receipt = unit.commit().unwrap();
        assert_eq!(receipt.seq, 1);
        assert!(receipt
            .entries
            .iter()
            .all(|e| e.transaction_date == receipt.committed_at));

        let view = storage.snapshot_for(a).unwrap();
        assert_eq!(view.account.balance(), Money::from_cents(7000));
        assert_eq!(view.account.last_transaction_date, Some(receipt.committed_at));
        assert_eq!(view.entries.len(), 1);
        assert_eq!(view.as_of_seq, 1);
        assert_eq!(storage.account(b).unwrap().balance(), Money::from_cents(8000));
    }

    #[test]
    fn test_dropped_unit_changes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let storage = open(&temp_dir);
        let a = provision(&storage, "A", 10000);
        let b = provision(&storage, "B", 0);

        let unit = stage(&storage, a, b, 3000, "TRF-1").unwrap();
        drop(unit);

        assert_eq!(storage.account(a).unwrap().balance(), Money::from_cents(10000));
        assert_eq!(storage.transactions.count(), 0);
        assert!(!storage.locks.is_held(a));

        // Locks are free again
        stage(&storage, a, b, 3000, "TRF-2").unwrap().commit().unwrap();
    }

    #[test]
    fn test_insufficient_funds_leaves_no_trace() {
        let temp_dir = TempDir::new().unwrap();
        let storage = open(&temp_dir);
        let a = provision(&storage, "A", 7000);
        let b = provision(&storage, "B", 0);

        let err = stage(&storage, a, b, 100000, "TRF-1").err().unwrap();
        assert!(err.is_insufficient_funds());
        assert_eq!(storage.account(a).unwrap().balance(), Money::from_cents(7000));
        assert!(!storage.paths().journal_file().exists());
    }

    #[test]
    fn test_half_transfer_cannot_commit() {
        let temp_dir = TempDir::new().unwrap();
        let storage = open(&temp_dir);
        let a = provision(&storage, "A", 10000);
        let b = provision(&storage, "B", 0);

        let mut unit = storage.begin(&[a, b]).unwrap();
        unit.debit(a, Money::from_cents(100)).unwrap();
        let err = unit.commit().unwrap_err();

        assert!(err.is_validation());
        assert_eq!(storage.account(a).unwrap().balance(), Money::from_cents(10000));
    }

    #[test]
    fn test_duplicate_reference_is_conflict() {
        let temp_dir = TempDir::new().unwrap();
        let storage = open(&temp_dir);
        let a = provision(&storage, "A", 10000);
        let b = provision(&storage, "B", 0);

        stage(&storage, a, b, 100, "TRF-DUP").unwrap().commit().unwrap();
        let err = stage(&storage, a, b, 100, "TRF-DUP").err().unwrap();

        assert!(matches!(err, LedgerError::Conflict(_)));
        assert_eq!(storage.transactions.count(), 2);
        assert_eq!(storage.account(a).unwrap().balance(), Money::from_cents(9900));
    }

    #[test]
    fn test_journal_failure_is_persistence_error_and_publishes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let storage = open(&temp_dir);
        let a = provision(&storage, "A", 10000);
        let b = provision(&storage, "B", 5000);

        // Make the journal path unwritable as a file
        let journal = storage.paths().journal_file();
        let _ = std::fs::remove_file(&journal);
        std::fs::create_dir(&journal).unwrap();

        let err = stage(&storage, a, b, 3000, "TRF-1").unwrap().commit().unwrap_err();

        assert!(matches!(err, LedgerError::Persistence(_)));
        assert!(err.is_retryable());
        assert_eq!(storage.account(a).unwrap().balance(), Money::from_cents(10000));
        assert_eq!(storage.account(b).unwrap().balance(), Money::from_cents(5000));
        assert_eq!(storage.transactions.count(), 0);
        assert_eq!(storage.last_seq(), 0);
    }

    #[test]
    fn test_reopen_restores_balances_and_history() {
        let temp_dir = TempDir::new().unwrap();
        let (a, b) = {
            let storage = open(&temp_dir);
            let a = provision(&storage, "A", 10000);
            let b = provision(&storage, "B", 5000);
            stage(&storage, a, b, 3000, "TRF-1").unwrap().commit().unwrap();
            stage(&storage, b, a, 500, "TRF-2").unwrap().commit().unwrap();
            (a, b)
        };

        let storage = open(&temp_dir);
        assert_eq!(storage.account(a).unwrap().balance(), Money::from_cents(7500));
        assert_eq!(storage.account(b).unwrap().balance(), Money::from_cents(7500));
        assert_eq!(storage.transactions_for(a).unwrap().len(), 2);
        assert_eq!(storage.last_seq(), 2);
    }

    #[test]
    fn test_replay_recovers_stale_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let paths = LedgerPaths::with_base_dir(temp_dir.path());
        let (a, stale_snapshot) = {
            let storage = open(&temp_dir);
            let a = provision(&storage, "A", 10000);
            let b = provision(&storage, "B", 0);
            let stale = std::fs::read(paths.accounts_file()).unwrap();
            stage(&storage, a, b, 2500, "TRF-1").unwrap().commit().unwrap();
            (a, stale)
        };

        // Simulate a crash between the journal append and the snapshot write
        std::fs::write(paths.accounts_file(), stale_snapshot).unwrap();

        let storage = open(&temp_dir);
        assert_eq!(storage.account(a).unwrap().balance(), Money::from_cents(7500));
        assert_eq!(storage.accounts.read_table().applied_seq(), 1);
    }

    #[test]
    fn test_snapshot_ahead_of_journal_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let paths = LedgerPaths::with_base_dir(temp_dir.path());
        {
            let storage = open(&temp_dir);
            let a = provision(&storage, "A", 10000);
            let b = provision(&storage, "B", 0);
            stage(&storage, a, b, 2500, "TRF-1").unwrap().commit().unwrap();
        }
        std::fs::remove_file(paths.journal_file()).unwrap();

        let result = Storage::open(paths);
        assert!(matches!(result, Err(LedgerError::Persistence(_))));
    }

    #[test]
    fn test_second_storage_on_same_directory_waits_for_the_first() {
        let temp_dir = TempDir::new().unwrap();
        let first = open(&temp_dir);
        let a = provision(&first, "A", 10000);
        let c = provision(&first, "C", 0);
        let d = provision(&first, "D", 0);

        let err = Storage::open_with_timeout(
            LedgerPaths::with_base_dir(temp_dir.path()),
            Duration::from_millis(50),
        )
        .err()
        .unwrap();
        assert!(matches!(err, LedgerError::Conflict(_)));
        assert!(err.is_retryable());

        stage(&first, a, c, 6000, "TRF-1").unwrap().commit().unwrap();
        drop(first);

        // The next holder starts from the committed state, not a stale copy
        let second = open(&temp_dir);
        assert_eq!(second.account(a).unwrap().balance(), Money::from_cents(4000));
        let err = stage(&second, a, d, 6000, "TRF-2").err().unwrap();
        assert!(err.is_insufficient_funds());
        assert_eq!(second.last_seq(), 1);
    }

    #[test]
    fn test_begin_unknown_account_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let storage = open(&temp_dir);
        let a = provision(&storage, "A", 10000);

        let err = storage.begin(&[a, AccountId::new()]).err().unwrap();
        assert!(err.is_not_found());
        assert!(!storage.locks.is_held(a));
    }

    #[test]
    fn test_staging_on_account_outside_unit_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let storage = open(&temp_dir);
        let a = provision(&storage, "A", 10000);
        let b = provision(&storage, "B", 0);

        let mut unit = storage.begin(&[a]).unwrap();
        assert!(unit.credit(b, Money::from_cents(100)).unwrap_err().is_not_found());
        assert!(unit.debit(AccountId::new(), Money::from_cents(100)).unwrap_err().is_not_found());
        assert!(unit.account(b).unwrap_err().is_not_found());
        unit.abort();

        assert_eq!(storage.account(b).unwrap().balance(), Money::zero());
    }

    #[test]
    fn test_begin_times_out_on_held_account() {
        let temp_dir = TempDir::new().unwrap();
        let storage = open(&temp_dir);
        let a = provision(&storage, "A", 10000);
        let b = provision(&storage, "B", 0);

        let _held = storage.begin(&[a]).unwrap();
        let err = storage.begin(&[a, b]).err().unwrap();

        assert!(matches!(err, LedgerError::Conflict(_)));
        assert!(!storage.locks.is_held(b));
    }
}
