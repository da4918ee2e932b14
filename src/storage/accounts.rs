//! Account repository
//!
//! Holds the committed account table in memory and snapshots it to
//! `accounts.json`. The snapshot records the journal sequence it reflects so
//! that recovery knows which journal records still need replaying.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};
use crate::models::{Account, AccountId, PrincipalId};

use super::file_io::{read_json, write_json_atomic};
use super::journal::BalanceUpdate;

/// On-disk layout of `accounts.json`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AccountSnapshot {
    #[serde(default)]
    applied_seq: u64,
    accounts: Vec<Account>,
}

/// Committed account rows plus the unique account-number index
#[derive(Debug, Default)]
pub struct AccountTable {
    rows: HashMap<AccountId, Account>,
    by_number: HashMap<String, AccountId>,
    applied_seq: u64,
}

impl AccountTable {
    pub fn get(&self, id: AccountId) -> Option<&Account> {
        self.rows.get(&id)
    }

    pub fn get_by_number(&self, number: &str) -> Option<&Account> {
        self.by_number
            .get(number.trim())
            .and_then(|id| self.rows.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.rows.values()
    }

    /// Journal sequence number the balances reflect
    pub fn applied_seq(&self) -> u64 {
        self.applied_seq
    }

    fn insert(&mut self, account: Account) -> LedgerResult<()> {
        if self.by_number.contains_key(&account.account_number) {
            return Err(LedgerError::Conflict(format!(
                "Account number '{}' already exists",
                account.account_number
            )));
        }
        if self.rows.contains_key(&account.id) {
            return Err(LedgerError::Conflict(format!(
                "Account id {} already exists",
                account.id
            )));
        }

        self.by_number
            .insert(account.account_number.clone(), account.id);
        self.rows.insert(account.id, account);
        Ok(())
    }

    fn remove(&mut self, id: AccountId) {
        if let Some(account) = self.rows.remove(&id) {
            self.by_number.remove(&account.account_number);
        }
    }

    /// Apply the balances of one committed journal record
    pub(crate) fn apply(
        &mut self,
        seq: u64,
        committed_at: DateTime<Utc>,
        balances: &[BalanceUpdate],
    ) -> LedgerResult<()> {
        // Check first so a bad record leaves the table untouched
        if let Some(missing) = balances.iter().find(|b| !self.rows.contains_key(&b.account_id)) {
            return Err(LedgerError::Persistence(format!(
                "Journal record {} references unknown account {}",
                seq, missing.account_id
            )));
        }

        for update in balances {
            if let Some(account) = self.rows.get_mut(&update.account_id) {
                account.replay_balance(update.balance, committed_at);
            }
        }
        self.applied_seq = seq;
        Ok(())
    }
}

/// Repository for account persistence
pub struct AccountRepository {
    path: PathBuf,
    table: RwLock<AccountTable>,
    save_lock: Mutex<()>,
}

impl AccountRepository {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            table: RwLock::new(AccountTable::default()),
            save_lock: Mutex::new(()),
        }
    }

    /// Load the snapshot, returning the journal sequence it reflects
    pub fn load(&self) -> LedgerResult<u64> {
        let snapshot: AccountSnapshot = read_json(&self.path)?;

        let mut table = AccountTable {
            applied_seq: snapshot.applied_seq,
            ..AccountTable::default()
        };
        for account in snapshot.accounts {
            table.insert(account).map_err(|e| {
                LedgerError::Persistence(format!("Invalid account snapshot: {}", e))
            })?;
        }

        let applied_seq = table.applied_seq;
        *self.table.write() = table;
        Ok(applied_seq)
    }

    /// Write the current table to disk
    ///
    /// Captures and writes under one mutex so a slower writer can never
    /// replace a newer snapshot with an older one.
    pub fn save(&self) -> LedgerResult<()> {
        let _serialized = self.save_lock.lock();

        let snapshot = {
            let table = self.table.read();
            let mut accounts: Vec<Account> = table.rows.values().cloned().collect();
            accounts.sort_by(|a, b| a.account_number.cmp(&b.account_number));
            AccountSnapshot {
                applied_seq: table.applied_seq,
                accounts,
            }
        };

        write_json_atomic(&self.path, &snapshot)
    }

    pub(crate) fn read_table(&self) -> RwLockReadGuard<'_, AccountTable> {
        self.table.read()
    }

    pub(crate) fn write_table(&self) -> RwLockWriteGuard<'_, AccountTable> {
        self.table.write()
    }

    /// Provision a new account
    ///
    /// Rejects invalid accounts with a validation error and duplicate account
    /// numbers with a conflict. The account is durable when this returns.
    pub fn insert(&self, account: Account) -> LedgerResult<()> {
        account
            .validate()
            .map_err(|e| LedgerError::Validation(e.to_string()))?;

        let id = account.id;
        self.table.write().insert(account)?;

        if let Err(err) = self.save() {
            self.table.write().remove(id);
            return Err(err);
        }
        Ok(())
    }

    pub fn get(&self, id: AccountId) -> Option<Account> {
        self.table.read().get(id).cloned()
    }

    pub fn get_by_number(&self, number: &str) -> Option<Account> {
        self.table.read().get_by_number(number).cloned()
    }

    /// All accounts ordered by account number
    pub fn get_all(&self) -> Vec<Account> {
        let mut accounts: Vec<_> = self.table.read().rows.values().cloned().collect();
        accounts.sort_by(|a, b| a.account_number.cmp(&b.account_number));
        accounts
    }

    /// Accounts held by one principal
    pub fn get_by_owner(&self, owner: PrincipalId) -> Vec<Account> {
        self.get_all()
            .into_iter()
            .filter(|a| a.owner == owner)
            .collect()
    }

    pub fn count(&self) -> usize {
        self.table.read().rows.len()
    }
}
