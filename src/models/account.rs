//! Account model
//!
//! Represents a bank account held in the ledger. The balance is private: it
//! only changes through the debit/credit primitives the account store drives
//! inside a unit of work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::currency::Currency;
use super::ids::{AccountId, PrincipalId};
use super::money::Money;

/// Maximum length of an account number (IBAN upper bound)
pub const MAX_ACCOUNT_NUMBER_LEN: usize = 34;

/// Type of bank account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Current/checking account
    #[default]
    Checking,
    /// Savings account
    Savings,
    /// Credit line; usually opened with a negative minimum balance
    Credit,
    /// Other account type
    Other,
}

impl AccountType {
    /// Parse account type from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "checking" | "current" | "courant" => Some(Self::Checking),
            "savings" | "epargne" => Some(Self::Savings),
            "credit" | "credit_line" => Some(Self::Credit),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Checking => write!(f, "Checking"),
            Self::Savings => write!(f, "Savings"),
            Self::Credit => write!(f, "Credit"),
            Self::Other => write!(f, "Other"),
        }
    }
}

/// Lifecycle status of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    Inactive,
    Frozen,
    Closed,
}

impl AccountStatus {
    /// Only active accounts may be debited or credited
    pub fn can_transact(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Parse status from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "frozen" => Some(Self::Frozen),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::Inactive => write!(f, "Inactive"),
            Self::Frozen => write!(f, "Frozen"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

/// A bank account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier
    pub id: AccountId,

    /// Externally addressable, unique and immutable account number
    pub account_number: String,

    /// Type of account
    #[serde(rename = "type")]
    pub account_type: AccountType,

    /// Current balance
    balance: Money,

    /// Balance the account was provisioned with
    pub opening_balance: Money,

    /// Currency every entry on this account is denominated in
    pub currency: Currency,

    /// Lifecycle status
    #[serde(default)]
    pub status: AccountStatus,

    /// Floor the balance may never drop below after a committed debit
    #[serde(default)]
    pub minimum_balance: Money,

    /// Annual interest rate in basis points (informational; no accrual here)
    #[serde(default)]
    pub interest_rate_bps: u32,

    /// Principal the account belongs to
    pub owner: PrincipalId,

    /// Commit time of the last transfer touching this account
    pub last_transaction_date: Option<DateTime<Utc>>,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the account was last modified
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new active account with a zero balance
    pub fn new(
        account_number: impl Into<String>,
        account_type: AccountType,
        currency: Currency,
        owner: PrincipalId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::new(),
            account_number: account_number.into().trim().to_string(),
            account_type,
            balance: Money::zero(),
            opening_balance: Money::zero(),
            currency,
            status: AccountStatus::Active,
            minimum_balance: Money::zero(),
            interest_rate_bps: 0,
            owner,
            last_transaction_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the balance the account is provisioned with
    pub fn with_opening_balance(mut self, opening_balance: Money) -> Self {
        self.opening_balance = opening_balance;
        self.balance = opening_balance;
        self
    }

    pub fn with_minimum_balance(mut self, minimum_balance: Money) -> Self {
        self.minimum_balance = minimum_balance;
        self
    }

    pub fn with_interest_rate_bps(mut self, interest_rate_bps: u32) -> Self {
        self.interest_rate_bps = interest_rate_bps;
        self
    }

    pub fn with_status(mut self, status: AccountStatus) -> Self {
        self.status = status;
        self
    }

    /// Current balance
    pub fn balance(&self) -> Money {
        self.balance
    }

    /// Amount that can be debited without breaching the minimum balance
    pub fn available(&self) -> Money {
        self.balance
            .checked_sub(self.minimum_balance)
            .unwrap_or(Money::zero())
            .max(Money::zero())
    }

    /// Remove funds, keeping `balance >= minimum_balance`
    ///
    /// Leaves the account untouched on error.
    pub(crate) fn apply_debit(&mut self, amount: Money) -> Result<Money, BalanceError> {
        self.ensure_transactable(amount)?;

        let new_balance = self
            .balance
            .checked_sub(amount)
            .ok_or(BalanceError::Overflow)?;

        if new_balance < self.minimum_balance {
            return Err(BalanceError::BelowMinimum {
                needed: amount,
                available: self.available(),
            });
        }

        self.balance = new_balance;
        Ok(new_balance)
    }

    /// Add funds
    ///
    /// Leaves the account untouched on error.
    pub(crate) fn apply_credit(&mut self, amount: Money) -> Result<Money, BalanceError> {
        self.ensure_transactable(amount)?;

        let new_balance = self
            .balance
            .checked_add(amount)
            .ok_or(BalanceError::Overflow)?;

        self.balance = new_balance;
        Ok(new_balance)
    }

    /// Reinstate a balance recorded in the journal during recovery
    pub(crate) fn replay_balance(&mut self, balance: Money, at: DateTime<Utc>) {
        self.balance = balance;
        self.touch(at);
    }

    /// Record that a transfer touched this account
    pub(crate) fn touch(&mut self, at: DateTime<Utc>) {
        self.last_transaction_date = Some(at);
        self.updated_at = at;
    }

    fn ensure_transactable(&self, amount: Money) -> Result<(), BalanceError> {
        if !amount.is_positive() {
            return Err(BalanceError::NonPositiveAmount(amount));
        }
        if !self.status.can_transact() {
            return Err(BalanceError::NotActive(self.status));
        }
        Ok(())
    }

    /// Validate the account
    pub fn validate(&self) -> Result<(), AccountValidationError> {
        let number = self.account_number.as_str();

        if number.is_empty() {
            return Err(AccountValidationError::EmptyNumber);
        }

        if number.len() > MAX_ACCOUNT_NUMBER_LEN {
            return Err(AccountValidationError::NumberTooLong(number.len()));
        }

        if !number
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(AccountValidationError::InvalidNumber(number.to_string()));
        }

        if self.balance < self.minimum_balance {
            return Err(AccountValidationError::BelowMinimum {
                balance: self.balance,
                minimum: self.minimum_balance,
            });
        }

        Ok(())
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.account_number, self.account_type)
    }
}

/// Why a debit or credit was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceError {
    NonPositiveAmount(Money),
    NotActive(AccountStatus),
    BelowMinimum { needed: Money, available: Money },
    Overflow,
}

impl fmt::Display for BalanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositiveAmount(amount) => {
                write!(f, "Amount must be positive, got {}", amount)
            }
            Self::NotActive(status) => write!(f, "Account is {}", status),
            Self::BelowMinimum { needed, available } => write!(
                f,
                "Debit of {} exceeds available {}",
                needed, available
            ),
            Self::Overflow => write!(f, "Balance would overflow"),
        }
    }
}

impl std::error::Error for BalanceError {}

/// Validation errors for accounts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountValidationError {
    EmptyNumber,
    NumberTooLong(usize),
    InvalidNumber(String),
    BelowMinimum { balance: Money, minimum: Money },
}

impl fmt::Display for AccountValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyNumber => write!(f, "Account number cannot be empty"),
            Self::NumberTooLong(len) => write!(
                f,
                "Account number too long ({} chars, max {})",
                len, MAX_ACCOUNT_NUMBER_LEN
            ),
            Self::InvalidNumber(number) => write!(
                f,
                "Account number '{}' may only contain letters, digits and '-'",
                number
            ),
            Self::BelowMinimum { balance, minimum } => write!(
                f,
                "Opening balance {} is below the minimum balance {}",
                balance, minimum
            ),
        }
    }
}

impl std::error::Error for AccountValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn checking(balance_cents: i64) -> Account {
        Account::new("ACC-001", AccountType::Checking, Currency::usd(), PrincipalId::new())
            .with_opening_balance(Money::from_cents(balance_cents))
    }

    #[test]
    fn test_new_account() {
        let account = checking(10000);
        assert_eq!(account.account_number, "ACC-001");
        assert_eq!(account.status, AccountStatus::Active);
        assert_eq!(account.balance(), Money::from_cents(10000));
        assert_eq!(account.opening_balance, Money::from_cents(10000));
        assert!(account.last_transaction_date.is_none());
    }

    #[test]
    fn test_debit_respects_minimum_balance() {
        let mut account = checking(10000).with_minimum_balance(Money::from_cents(2000));

        assert_eq!(
            account.apply_debit(Money::from_cents(8000)),
            Ok(Money::from_cents(2000))
        );
        assert_eq!(
            account.apply_debit(Money::from_cents(1)),
            Err(BalanceError::BelowMinimum {
                needed: Money::from_cents(1),
                available: Money::zero(),
            })
        );
        assert_eq!(account.balance(), Money::from_cents(2000));
    }

    #[test]
    fn test_credit_line_can_go_negative() {
        let mut account = Account::new("CRD-1", AccountType::Credit, Currency::usd(), PrincipalId::new())
            .with_minimum_balance(Money::from_cents(-50000));

        assert_eq!(
            account.apply_debit(Money::from_cents(30000)),
            Ok(Money::from_cents(-30000))
        );
        assert_eq!(account.available(), Money::from_cents(20000));
    }

    #[test]
    fn test_non_positive_amounts_rejected() {
        let mut account = checking(10000);
        assert_eq!(
            account.apply_debit(Money::zero()),
            Err(BalanceError::NonPositiveAmount(Money::zero()))
        );
        assert_eq!(
            account.apply_credit(Money::from_cents(-1)),
            Err(BalanceError::NonPositiveAmount(Money::from_cents(-1)))
        );
        assert_eq!(account.balance(), Money::from_cents(10000));
    }

    #[test]
    fn test_frozen_account_cannot_transact() {
        let mut account = checking(10000).with_status(AccountStatus::Frozen);
        assert_eq!(
            account.apply_credit(Money::from_cents(100)),
            Err(BalanceError::NotActive(AccountStatus::Frozen))
        );
    }

    #[test]
    fn test_credit_overflow() {
        let mut account = checking(i64::MAX);
        assert_eq!(
            account.apply_credit(Money::from_cents(1)),
            Err(BalanceError::Overflow)
        );
    }

    #[test]
    fn test_validation() {
        assert!(checking(0).validate().is_ok());

        let mut account = checking(0);
        account.account_number = String::new();
        assert_eq!(account.validate(), Err(AccountValidationError::EmptyNumber));

        account.account_number = "A".repeat(35);
        assert!(matches!(
            account.validate(),
            Err(AccountValidationError::NumberTooLong(35))
        ));

        account.account_number = "ACC 001".into();
        assert!(matches!(
            account.validate(),
            Err(AccountValidationError::InvalidNumber(_))
        ));

        let below = checking(100).with_minimum_balance(Money::from_cents(500));
        assert!(matches!(
            below.validate(),
            Err(AccountValidationError::BelowMinimum { .. })
        ));
    }

    #[test]
    fn test_account_type_parsing() {
        assert_eq!(AccountType::parse("checking"), Some(AccountType::Checking));
        assert_eq!(AccountType::parse("Courant"), Some(AccountType::Checking));
        assert_eq!(AccountType::parse("EPARGNE"), Some(AccountType::Savings));
        assert_eq!(AccountType::parse("invalid"), None);
    }

    #[test]
    fn test_serialization_keeps_balance() {
        let account = checking(4200);
        let json = serde_json::to_string(&account).unwrap();
        let deserialized: Account = serde_json::from_str(&json).unwrap();
        assert_eq!(account, deserialized);
        assert_eq!(deserialized.balance(), Money::from_cents(4200));
    }

    #[test]
    fn test_display() {
        assert_eq!(checking(0).to_string(), "ACC-001 (Checking)");
    }
}
