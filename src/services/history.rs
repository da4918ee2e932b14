//! Transaction history queries
//!
//! Read-only. Every call reflects the committed state at the moment it runs;
//! re-issuing it is always safe.

use chrono::NaiveDate;

use crate::error::LedgerResult;
use crate::models::{AccountId, Transaction, TransactionType};
use crate::storage::{LedgerStore, Storage};

/// Optional narrowing of a history query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    /// Only entries on or after this date
    pub since: Option<NaiveDate>,
    /// Only entries on or before this date
    pub until: Option<NaiveDate>,
    pub transaction_type: Option<TransactionType>,
    /// Keep only the newest N entries
    pub limit: Option<usize>,
}

impl HistoryFilter {
    pub fn matches(&self, txn: &Transaction) -> bool {
        let date = txn.transaction_date.date_naive();

        if self.since.is_some_and(|since| date < since) {
            return false;
        }
        if self.until.is_some_and(|until| date > until) {
            return false;
        }
        if self
            .transaction_type
            .is_some_and(|kind| txn.transaction_type != kind)
        {
            return false;
        }
        true
    }

    fn apply(&self, entries: Vec<Transaction>) -> Vec<Transaction> {
        let filtered = entries.into_iter().filter(|t| self.matches(t));
        match self.limit {
            Some(limit) => filtered.take(limit).collect(),
            None => filtered.collect(),
        }
    }
}

/// Service for reading an account's ledger entries
pub struct HistoryService<'a, S: LedgerStore = Storage> {
    storage: &'a S,
}

impl<'a, S: LedgerStore> HistoryService<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    /// Entries owned by an account, newest first
    pub fn list_transactions(&self, account_id: AccountId) -> LedgerResult<Vec<Transaction>> {
        // Resolve first so an unknown account is an error, not an empty list
        self.storage.account(account_id)?;
        self.storage.transactions_for(account_id)
    }

    /// Filtered entries for the account with the given number, newest first
    pub fn list_by_number(
        &self,
        account_number: &str,
        filter: &HistoryFilter,
    ) -> LedgerResult<Vec<Transaction>> {
        let account = self.storage.account_by_number(account_number)?;
        let entries = self.storage.transactions_for(account.id)?;
        Ok(filter.apply(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerPaths;
    use crate::models::{Currency, Money, PrincipalId};
    use crate::services::account::{AccountService, OpenAccount};
    use crate::services::transfer::{TransferRequest, TransferService};
    use tempfile::TempDir;

    fn setup() -> (TempDir, Storage) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::open(LedgerPaths::with_base_dir(temp_dir.path())).unwrap();
        let accounts = AccountService::new(&storage);
        for number in ["A", "B"] {
            accounts
                .open(
                    OpenAccount::new(number, Currency::usd(), PrincipalId::new())
                        .with_opening_balance(Money::from_cents(10000)),
                )
                .unwrap();
        }
        (temp_dir, storage)
    }

    fn transfer(storage: &Storage, source: &str, destination: &str, cents: i64) {
        TransferService::new(storage)
            .transfer(TransferRequest {
                source_account_number: source.into(),
                destination_account_number: destination.into(),
                amount: Money::from_cents(cents),
                currency: Currency::usd(),
                description: None,
                initiated_by: PrincipalId::new(),
            })
            .unwrap();
    }

    #[test]
    fn test_history_newest_first_both_directions() {
        let (_temp_dir, storage) = setup();
        transfer(&storage, "A", "B", 100);
        transfer(&storage, "B", "A", 250);
        transfer(&storage, "A", "B", 300);

        let history = HistoryService::new(&storage)
            .list_by_number("A", &HistoryFilter::default())
            .unwrap();

        let amounts: Vec<i64> = history.iter().map(|t| t.amount.cents()).collect();
        assert_eq!(amounts, vec![-300, 250, -100]);
        assert_eq!(
            history[0].balance_after_transaction,
            storage.accounts.get_by_number("A").unwrap().balance()
        );
    }

    #[test]
    fn test_limit_keeps_newest() {
        let (_temp_dir, storage) = setup();
        for cents in [1, 2, 3] {
            transfer(&storage, "A", "B", cents);
        }

        let filter = HistoryFilter {
            limit: Some(2),
            ..HistoryFilter::default()
        };
        let history = HistoryService::new(&storage)
            .list_by_number("B", &filter)
            .unwrap();

        let amounts: Vec<i64> = history.iter().map(|t| t.amount.cents()).collect();
        assert_eq!(amounts, vec![3, 2]);
    }

    #[test]
    fn test_date_filter() {
        let (_temp_dir, storage) = setup();
        transfer(&storage, "A", "B", 100);
        let service = HistoryService::new(&storage);
        let all = service
            .list_by_number("A", &HistoryFilter::default())
            .unwrap();
        let today = all[0].transaction_date.date_naive();

        let same_day = HistoryFilter {
            since: Some(today),
            until: Some(today),
            ..HistoryFilter::default()
        };
        assert_eq!(service.list_by_number("A", &same_day).unwrap().len(), 1);

        let future = HistoryFilter {
            since: today.succ_opt(),
            ..HistoryFilter::default()
        };
        assert!(service.list_by_number("A", &future).unwrap().is_empty());

        let past = HistoryFilter {
            until: today.pred_opt(),
            ..HistoryFilter::default()
        };
        assert!(service.list_by_number("A", &past).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_account_is_not_found() {
        let (_temp_dir, storage) = setup();
        let service = HistoryService::new(&storage);

        assert!(service
            .list_by_number("ZZZ", &HistoryFilter::default())
            .unwrap_err()
            .is_not_found());
        assert!(service
            .list_transactions(AccountId::new())
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_repeated_reads_are_identical() {
        let (_temp_dir, storage) = setup();
        transfer(&storage, "A", "B", 100);
        let service = HistoryService::new(&storage);
        let id = storage.accounts.get_by_number("B").unwrap().id;

        assert_eq!(
            service.list_transactions(id).unwrap(),
            service.list_transactions(id).unwrap()
        );
    }
}
