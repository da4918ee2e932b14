//! CSV Export functionality
//!
//! Exports an account's history and the account list to CSV format.

use std::collections::HashMap;
use std::io::Write;

use serde::Serialize;

use crate::error::LedgerResult;
use crate::models::{Account, AccountId, Transaction};

/// One history row; amounts are decimal strings so no precision is lost
#[derive(Debug, Serialize)]
struct HistoryRow<'a> {
    date: String,
    reference: &'a str,
    #[serde(rename = "type")]
    transaction_type: String,
    status: String,
    description: &'a str,
    counterparty: String,
    amount: String,
    balance_after: String,
    currency: &'a str,
}

#[derive(Debug, Serialize)]
struct AccountRow<'a> {
    number: &'a str,
    #[serde(rename = "type")]
    account_type: String,
    status: String,
    currency: &'a str,
    opening_balance: String,
    balance: String,
    minimum_balance: String,
}

/// Export ledger entries to CSV
///
/// `numbers` maps account ids to account numbers for the counterparty column;
/// unknown ids fall back to the id itself.
pub fn export_history_csv<W: Write>(
    entries: &[Transaction],
    numbers: &HashMap<AccountId, String>,
    writer: W,
) -> LedgerResult<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    for txn in entries {
        let counterparty = txn.counterparty();
        csv_writer.serialize(HistoryRow {
            date: txn.transaction_date.to_rfc3339(),
            reference: txn.reference_number.as_str(),
            transaction_type: txn.transaction_type.to_string(),
            status: txn.status.to_string(),
            description: &txn.description,
            counterparty: numbers
                .get(&counterparty)
                .cloned()
                .unwrap_or_else(|| counterparty.as_uuid().to_string()),
            amount: txn.amount.to_string(),
            balance_after: txn.balance_after_transaction.to_string(),
            currency: txn.currency.code(),
        })?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Export accounts to CSV
pub fn export_accounts_csv<W: Write>(accounts: &[Account], writer: W) -> LedgerResult<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    for account in accounts {
        csv_writer.serialize(AccountRow {
            number: &account.account_number,
            account_type: account.account_type.to_string(),
            status: account.status.to_string(),
            currency: account.currency.code(),
            opening_balance: account.opening_balance.to_string(),
            balance: account.balance().to_string(),
            minimum_balance: account.minimum_balance.to_string(),
        })?;
    }

    csv_writer.flush()?;
    Ok(())
}
