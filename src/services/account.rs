//! Account service
//!
//! Provisioning hook and read access for accounts. Balances are never set
//! here after opening; they only move through transfers.

use crate::error::{LedgerError, LedgerResult};
use crate::models::{Account, AccountId, AccountStatus, AccountType, Currency, Money, PrincipalId};
use crate::storage::Storage;

/// Parameters for opening an account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAccount {
    pub account_number: String,
    pub account_type: AccountType,
    pub currency: Currency,
    pub owner: PrincipalId,
    pub opening_balance: Money,
    pub minimum_balance: Money,
    pub interest_rate_bps: u32,
}

impl OpenAccount {
    /// Checking account with no floor and no opening balance
    pub fn new(account_number: impl Into<String>, currency: Currency, owner: PrincipalId) -> Self {
        Self {
            account_number: account_number.into(),
            account_type: AccountType::Checking,
            currency,
            owner,
            opening_balance: Money::zero(),
            minimum_balance: Money::zero(),
            interest_rate_bps: 0,
        }
    }

    pub fn with_type(mut self, account_type: AccountType) -> Self {
        self.account_type = account_type;
        self
    }

    pub fn with_opening_balance(mut self, opening_balance: Money) -> Self {
        self.opening_balance = opening_balance;
        self
    }

    pub fn with_minimum_balance(mut self, minimum_balance: Money) -> Self {
        self.minimum_balance = minimum_balance;
        self
    }
}

/// Service for account management
pub struct AccountService<'a> {
    storage: &'a Storage,
}

impl<'a> AccountService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Open a new active account
    pub fn open(&self, request: OpenAccount) -> LedgerResult<Account> {
        let account = Account::new(
            request.account_number,
            request.account_type,
            request.currency,
            request.owner,
        )
        .with_opening_balance(request.opening_balance)
        .with_minimum_balance(request.minimum_balance)
        .with_interest_rate_bps(request.interest_rate_bps);

        self.storage.accounts.insert(account.clone())?;

        tracing::info!(
            account = %account.account_number,
            account_type = %account.account_type,
            opening_balance = %account.balance().format_with_currency(&account.currency),
            "account opened"
        );

        Ok(account)
    }

    pub fn get(&self, id: AccountId) -> LedgerResult<Account> {
        self.storage
            .accounts
            .get(id)
            .ok_or_else(|| LedgerError::account_not_found(id.to_string()))
    }

    pub fn get_by_number(&self, account_number: &str) -> LedgerResult<Account> {
        self.storage
            .accounts
            .get_by_number(account_number)
            .ok_or_else(|| LedgerError::account_not_found(account_number.trim()))
    }

    /// Find an account by number or by id
    pub fn find(&self, identifier: &str) -> LedgerResult<Account> {
        if let Some(account) = self.storage.accounts.get_by_number(identifier) {
            return Ok(account);
        }

        AccountId::parse(identifier.trim())
            .ok()
            .and_then(|id| self.storage.accounts.get(id))
            .ok_or_else(|| LedgerError::account_not_found(identifier.trim()))
    }

    /// All accounts, optionally only those that can transact
    pub fn list(&self, active_only: bool) -> Vec<Account> {
        self.storage
            .accounts
            .get_all()
            .into_iter()
            .filter(|a| !active_only || a.status == AccountStatus::Active)
            .collect()
    }

    /// Accounts held by one principal
    pub fn list_by_owner(&self, owner: PrincipalId) -> Vec<Account> {
        self.storage.accounts.get_by_owner(owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerPaths;
    use tempfile::TempDir;

    fn create_test_storage() -> (TempDir, Storage) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::open(LedgerPaths::with_base_dir(temp_dir.path())).unwrap();
        (temp_dir, storage)
    }

    #[test]
    fn test_open_account() {
        let (_temp_dir, storage) = create_test_storage();
        let service = AccountService::new(&storage);

        let account = service
            .open(
                OpenAccount::new("ACC-001", Currency::usd(), PrincipalId::new())
                    .with_type(AccountType::Savings)
                    .with_opening_balance(Money::from_cents(10000)),
            )
            .unwrap();

        assert_eq!(account.account_type, AccountType::Savings);
        assert_eq!(account.balance(), Money::from_cents(10000));
        assert_eq!(account.opening_balance, Money::from_cents(10000));
        assert_eq!(service.get_by_number("ACC-001").unwrap().id, account.id);
    }

    #[test]
    fn test_duplicate_number_rejected() {
        let (_temp_dir, storage) = create_test_storage();
        let service = AccountService::new(&storage);
        let owner = PrincipalId::new();

        service
            .open(OpenAccount::new("ACC-001", Currency::usd(), owner))
            .unwrap();
        let err = service
            .open(OpenAccount::new("ACC-001", Currency::usd(), owner))
            .unwrap_err();

        assert!(matches!(err, LedgerError::Conflict(_)));
    }

    #[test]
    fn test_opening_below_minimum_rejected() {
        let (_temp_dir, storage) = create_test_storage();
        let service = AccountService::new(&storage);

        let err = service
            .open(
                OpenAccount::new("ACC-001", Currency::usd(), PrincipalId::new())
                    .with_minimum_balance(Money::from_cents(500)),
            )
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_find_by_number_or_id() {
        let (_temp_dir, storage) = create_test_storage();
        let service = AccountService::new(&storage);
        let account = service
            .open(OpenAccount::new("ACC-001", Currency::usd(), PrincipalId::new()))
            .unwrap();

        assert_eq!(service.find("ACC-001").unwrap().id, account.id);
        assert_eq!(
            service.find(&account.id.as_uuid().to_string()).unwrap().id,
            account.id
        );
        assert!(service.find("nope").unwrap_err().is_not_found());
    }

    #[test]
    fn test_list_by_owner() {
        let (_temp_dir, storage) = create_test_storage();
        let service = AccountService::new(&storage);
        let alice = PrincipalId::new();

        service
            .open(OpenAccount::new("A-1", Currency::usd(), alice))
            .unwrap();
        service
            .open(OpenAccount::new("A-2", Currency::usd(), alice))
            .unwrap();
        service
            .open(OpenAccount::new("B-1", Currency::usd(), PrincipalId::new()))
            .unwrap();

        assert_eq!(service.list(false).len(), 3);
        assert_eq!(service.list_by_owner(alice).len(), 2);
    }
}
