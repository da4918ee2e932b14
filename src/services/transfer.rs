//! Transfer service
//!
//! Moves funds between two accounts as one unit of work. A transfer either
//! changes both balances and writes both linked entries, or changes nothing.

use std::sync::Arc;

use chrono::Utc;

use crate::error::{LedgerError, LedgerResult};
use crate::models::transaction::MAX_DESCRIPTION_LEN;
use crate::models::{
    Account, Currency, Money, PrincipalId, ReferenceGenerator, ReferenceNumber, Transaction,
    TransferDetails, UuidReferenceGenerator,
};
use crate::storage::{LedgerStore, Storage, UnitOfWork};

/// What the caller asks to move
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub source_account_number: String,
    pub destination_account_number: String,
    pub amount: Money,
    pub currency: Currency,
    /// Applied to both legs; defaults to "Transfer to/from {account}"
    pub description: Option<String>,
    pub initiated_by: PrincipalId,
}

/// Both legs of a committed transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResult {
    /// Debit leg, owned by the source account
    pub source_entry: Transaction,
    /// Credit leg, owned by the destination account
    pub destination_entry: Transaction,
}

impl TransferResult {
    pub fn reference_number(&self) -> &ReferenceNumber {
        &self.source_entry.reference_number
    }
}

/// Service for transfers between accounts
pub struct TransferService<'a, S: LedgerStore = Storage> {
    storage: &'a S,
    references: Arc<dyn ReferenceGenerator>,
}

impl<'a, S: LedgerStore> TransferService<'a, S> {
    /// Create a transfer service using UUID reference numbers
    pub fn new(storage: &'a S) -> Self {
        Self {
            storage,
            references: Arc::new(UuidReferenceGenerator::default()),
        }
    }

    pub fn with_reference_generator(mut self, references: Arc<dyn ReferenceGenerator>) -> Self {
        self.references = references;
        self
    }

    /// Move `amount` from the source account to the destination account
    ///
    /// Rejections, in the order they are checked:
    /// - `Validation`: non-positive amount, blank account number, self-transfer,
    ///   oversized description, currency mismatch, inactive account
    /// - `NotFound`: unknown account number
    /// - `InsufficientFunds`: the debit would breach the source's minimum balance
    /// - `Conflict`: lock timeout or reference collision (retryable)
    /// - `Persistence`: the commit could not be made durable (retryable)
    ///
    /// Any error leaves balances and the log exactly as they were.
    pub fn transfer(&self, request: TransferRequest) -> LedgerResult<TransferResult> {
        let source_number = request.source_account_number.trim();
        let destination_number = request.destination_account_number.trim();

        validate_request(&request, source_number, destination_number)?;

        let source = self.storage.account_by_number(source_number)?;
        let destination = self.storage.account_by_number(destination_number)?;

        for account in [&source, &destination] {
            if account.currency != request.currency {
                return Err(LedgerError::Validation(format!(
                    "Account '{}' holds {}, cannot transfer {}",
                    account.account_number, account.currency, request.currency
                )));
            }
        }

        let result = self.execute(&request, &source, &destination);

        match &result {
            Ok(transfer) => tracing::info!(
                reference = %transfer.reference_number(),
                source = %source.account_number,
                destination = %destination.account_number,
                amount = %request.amount.format_with_currency(&request.currency),
                "transfer committed"
            ),
            Err(err) => tracing::warn!(
                source = %source.account_number,
                destination = %destination.account_number,
                amount = %request.amount.format_with_currency(&request.currency),
                retryable = err.is_retryable(),
                error = %err,
                "transfer aborted"
            ),
        }

        result
    }

    fn execute(
        &self,
        request: &TransferRequest,
        source: &Account,
        destination: &Account,
    ) -> LedgerResult<TransferResult> {
        let (source_id, destination_id) = (source.id, destination.id);
        let mut unit = self.storage.begin(&[source_id, destination_id])?;

        let source_balance = unit.debit(source_id, request.amount)?;
        let destination_balance = unit.credit(destination_id, request.amount)?;

        let details = TransferDetails {
            reference_number: self.references.generate(),
            source_account: source_id,
            destination_account: destination_id,
            amount: request.amount,
            currency: request.currency.clone(),
            initiated_by: request.initiated_by,
            transaction_date: Utc::now(),
        };

        let description = request
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty());

        let debit = Transaction::debit_leg(
            &details,
            description
                .map(str::to_string)
                .unwrap_or_else(|| format!("Transfer to {}", destination.account_number)),
            source_balance,
        );
        let credit = Transaction::credit_leg(
            &details,
            description
                .map(str::to_string)
                .unwrap_or_else(|| format!("Transfer from {}", source.account_number)),
            destination_balance,
        );

        unit.append(vec![debit, credit])?;
        let receipt = unit.commit()?;

        let mut entries = receipt.entries.into_iter();
        match (entries.next(), entries.next()) {
            (Some(source_entry), Some(destination_entry)) => Ok(TransferResult {
                source_entry,
                destination_entry,
            }),
            _ => Err(LedgerError::Persistence(format!(
                "Commit {} did not return both transfer legs",
                receipt.seq
            ))),
        }
    }

    /// Both legs of a committed transfer
    pub fn find_transfer(&self, reference: &ReferenceNumber) -> LedgerResult<TransferResult> {
        let legs = self.storage.entries_by_reference(reference)?;

        let source_entry = legs.iter().find(|t| t.is_debit()).cloned();
        let destination_entry = legs.iter().find(|t| t.is_credit()).cloned();

        match (source_entry, destination_entry) {
            (Some(source_entry), Some(destination_entry)) if legs.len() == 2 => {
                Ok(TransferResult {
                    source_entry,
                    destination_entry,
                })
            }
            _ => Err(LedgerError::Persistence(format!(
                "Transfer {} does not have exactly one debit and one credit leg",
                reference
            ))),
        }
    }
}

fn validate_request(
    request: &TransferRequest,
    source_number: &str,
    destination_number: &str,
) -> LedgerResult<()> {
    if !request.amount.is_positive() {
        return Err(LedgerError::Validation(format!(
            "Transfer amount must be positive, got {}",
            request.amount
        )));
    }

    if source_number.is_empty() {
        return Err(LedgerError::Validation(
            "Source account number is required".into(),
        ));
    }
    if destination_number.is_empty() {
        return Err(LedgerError::Validation(
            "Destination account number is required".into(),
        ));
    }

    if source_number == destination_number {
        return Err(LedgerError::Validation(
            "Cannot transfer to the same account".into(),
        ));
    }

    if let Some(description) = &request.description {
        let len = description.trim().chars().count();
        if len > MAX_DESCRIPTION_LEN {
            return Err(LedgerError::Validation(format!(
                "Description too long ({} chars, max {})",
                len, MAX_DESCRIPTION_LEN
            )));
        }
    }

    Ok(())
}
