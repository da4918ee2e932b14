//! Core data models for the ledger
//!
//! Accounts, ledger entries, money amounts, currencies, identifiers and
//! transfer reference numbers.

pub mod account;
pub mod currency;
pub mod ids;
pub mod money;
pub mod reference;
pub mod transaction;

pub use account::{Account, AccountStatus, AccountType, AccountValidationError, BalanceError};
pub use currency::{Currency, CurrencyParseError};
pub use ids::{AccountId, PrincipalId, TransactionId};
pub use money::{Money, MoneyParseError};
pub use reference::{
    ReferenceGenerator, ReferenceNumber, ReferenceParseError, UuidReferenceGenerator,
    DEFAULT_REFERENCE_PREFIX,
};
pub use transaction::{
    Transaction, TransactionStatus, TransactionType, TransactionValidationError, TransferDetails,
};
