//! Ledger entry model
//!
//! Every balance-affecting event is recorded as an immutable entry owned by
//! exactly one account. A transfer produces two entries (legs) sharing a
//! reference number: a negative debit leg owned by the source and a positive
//! credit leg owned by the destination.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::currency::Currency;
use super::ids::{AccountId, PrincipalId, TransactionId};
use super::money::Money;
use super::reference::ReferenceNumber;

/// Maximum length of an entry description, in characters
pub const MAX_DESCRIPTION_LEN: usize = 255;

/// Kind of balance-affecting event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Transfer,
    Interest,
    Fee,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deposit => write!(f, "Deposit"),
            Self::Withdrawal => write!(f, "Withdrawal"),
            Self::Transfer => write!(f, "Transfer"),
            Self::Interest => write!(f, "Interest"),
            Self::Fee => write!(f, "Fee"),
        }
    }
}

/// Status of a ledger entry
///
/// The synchronous transfer path only ever writes `Completed` entries. The
/// other states exist for asynchronous paths and compensating entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    /// Offset by a compensating entry; the original is never edited
    Reversed,
}

impl TransactionStatus {
    /// Allowed transitions: `Pending -> Completed | Failed`, `Completed -> Reversed`
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Completed)
                | (Self::Pending, Self::Failed)
                | (Self::Completed, Self::Reversed)
        )
    }

    /// No further transitions are possible
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Failed | Self::Reversed)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Completed => write!(f, "Completed"),
            Self::Failed => write!(f, "Failed"),
            Self::Reversed => write!(f, "Reversed"),
        }
    }
}

/// What both legs of one transfer have in common
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferDetails {
    pub reference_number: ReferenceNumber,
    pub source_account: AccountId,
    pub destination_account: AccountId,
    /// Positive amount moved from source to destination
    pub amount: Money,
    pub currency: Currency,
    pub initiated_by: PrincipalId,
    pub transaction_date: DateTime<Utc>,
}

/// An immutable ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier
    pub id: TransactionId,

    /// The account whose balance this entry changed
    pub account_id: AccountId,

    /// Shared by both legs of a transfer
    pub reference_number: ReferenceNumber,

    #[serde(rename = "type")]
    pub transaction_type: TransactionType,

    /// Signed amount: negative for the debit leg, positive for the credit leg
    pub amount: Money,

    pub currency: Currency,

    pub status: TransactionStatus,

    #[serde(default)]
    pub description: String,

    pub source_account: AccountId,

    pub destination_account: AccountId,

    pub transaction_date: DateTime<Utc>,

    /// Owning account's balance immediately after this entry
    pub balance_after_transaction: Money,

    /// Principal that requested the movement
    pub initiated_by: PrincipalId,
}

impl Transaction {
    /// Debit leg of a transfer, owned by the source account
    pub fn debit_leg(
        details: &TransferDetails,
        description: impl Into<String>,
        balance_after: Money,
    ) -> Self {
        Self::leg(details, details.source_account, -details.amount, description, balance_after)
    }

    /// Credit leg of a transfer, owned by the destination account
    pub fn credit_leg(
        details: &TransferDetails,
        description: impl Into<String>,
        balance_after: Money,
    ) -> Self {
        Self::leg(
            details,
            details.destination_account,
            details.amount,
            description,
            balance_after,
        )
    }

    fn leg(
        details: &TransferDetails,
        account_id: AccountId,
        amount: Money,
        description: impl Into<String>,
        balance_after: Money,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            account_id,
            reference_number: details.reference_number.clone(),
            transaction_type: TransactionType::Transfer,
            amount,
            currency: details.currency.clone(),
            status: TransactionStatus::Completed,
            description: description.into(),
            source_account: details.source_account,
            destination_account: details.destination_account,
            transaction_date: details.transaction_date,
            balance_after_transaction: balance_after,
            initiated_by: details.initiated_by,
        }
    }

    /// Money left the owning account
    pub fn is_debit(&self) -> bool {
        self.amount.is_negative()
    }

    /// Money arrived in the owning account
    pub fn is_credit(&self) -> bool {
        self.amount.is_positive()
    }

    pub fn is_transfer(&self) -> bool {
        self.transaction_type == TransactionType::Transfer
    }

    /// The other account of a transfer, seen from the owner
    pub fn counterparty(&self) -> AccountId {
        if self.account_id == self.source_account {
            self.destination_account
        } else {
            self.source_account
        }
    }

    /// Validate a single entry
    pub fn validate(&self) -> Result<(), TransactionValidationError> {
        if self.amount.is_zero() {
            return Err(TransactionValidationError::ZeroAmount);
        }

        let description_len = self.description.chars().count();
        if description_len > MAX_DESCRIPTION_LEN {
            return Err(TransactionValidationError::DescriptionTooLong(
                description_len,
            ));
        }

        if self.is_transfer() {
            if self.source_account == self.destination_account {
                return Err(TransactionValidationError::SelfTransfer);
            }

            let expected_owner = if self.is_debit() {
                self.source_account
            } else {
                self.destination_account
            };
            if self.account_id != expected_owner {
                return Err(TransactionValidationError::WrongOwner);
            }
        }

        Ok(())
    }

    /// Check that two entries form the debit and credit legs of one transfer
    pub fn validate_pair(
        debit: &Transaction,
        credit: &Transaction,
    ) -> Result<(), TransactionValidationError> {
        debit.validate()?;
        credit.validate()?;

        if !debit.is_transfer() || !credit.is_transfer() {
            return Err(TransactionValidationError::NotATransfer);
        }
        if debit.reference_number != credit.reference_number {
            return Err(TransactionValidationError::ReferenceMismatch);
        }
        if !debit.is_debit() || debit.amount != -credit.amount {
            return Err(TransactionValidationError::Unbalanced {
                debit: debit.amount,
                credit: credit.amount,
            });
        }
        if debit.currency != credit.currency {
            return Err(TransactionValidationError::CurrencyMismatch);
        }
        if debit.source_account != credit.source_account
            || debit.destination_account != credit.destination_account
        {
            return Err(TransactionValidationError::AccountMismatch);
        }

        Ok(())
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.transaction_date.format("%Y-%m-%d"),
            self.reference_number,
            self.amount.format_with_currency(&self.currency),
            self.description
        )
    }
}

/// Validation errors for ledger entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionValidationError {
    ZeroAmount,
    DescriptionTooLong(usize),
    SelfTransfer,
    WrongOwner,
    NotATransfer,
    ReferenceMismatch,
    Unbalanced { debit: Money, credit: Money },
    CurrencyMismatch,
    AccountMismatch,
}

impl fmt::Display for TransactionValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroAmount => write!(f, "Entry amount cannot be zero"),
            Self::DescriptionTooLong(len) => write!(
                f,
                "Description too long ({} chars, max {})",
                len, MAX_DESCRIPTION_LEN
            ),
            Self::SelfTransfer => write!(f, "Source and destination must differ"),
            Self::WrongOwner => write!(f, "Transfer leg is owned by the wrong account"),
            Self::NotATransfer => write!(f, "Entry is not a transfer leg"),
            Self::ReferenceMismatch => write!(f, "Transfer legs have different references"),
            Self::Unbalanced { debit, credit } => write!(
                f,
                "Transfer legs do not balance: debit {}, credit {}",
                debit, credit
            ),
            Self::CurrencyMismatch => write!(f, "Transfer legs have different currencies"),
            Self::AccountMismatch => write!(f, "Transfer legs name different accounts"),
        }
    }
}

impl std::error::Error for TransactionValidationError {}
