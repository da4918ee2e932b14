//! Ledger entry display formatting
//!
//! Register views for an account's history and the detail view of a
//! transfer's two legs.

use crate::models::{Transaction, TransactionStatus};

fn status_icon(status: TransactionStatus) -> &'static str {
    match status {
        TransactionStatus::Pending => "…",
        TransactionStatus::Completed => "✓",
        TransactionStatus::Failed => "✗",
        TransactionStatus::Reversed => "↺",
    }
}

/// Format a single entry as a register row
pub fn format_transaction_row(txn: &Transaction, date_format: &str) -> String {
    format!(
        "{} {:16} {:24} {:>12} {:>12}  {}",
        status_icon(txn.status),
        txn.transaction_date.format(date_format),
        truncate(&txn.description, 24),
        txn.amount,
        txn.balance_after_transaction,
        txn.reference_number
    )
}

/// Format an account's entries as a register, newest first
pub fn format_transaction_register(
    account_number: &str,
    transactions: &[Transaction],
    date_format: &str,
) -> String {
    let mut output = String::new();
    output.push_str(&format!("Account: {}\n", account_number));

    if transactions.is_empty() {
        output.push_str("No transactions found.\n");
        return output;
    }

    output.push_str(&format!("Transactions: {}\n\n", transactions.len()));
    output.push_str(&format!(
        "{:1} {:16} {:24} {:>12} {:>12}  {}\n",
        "", "Date", "Description", "Amount", "Balance", "Reference"
    ));
    output.push_str(&"-".repeat(90));
    output.push('\n');

    for txn in transactions {
        output.push_str(&format_transaction_row(txn, date_format));
        output.push('\n');
    }

    output
}

/// Format both legs of a transfer
pub fn format_transfer_details(legs: &[Transaction], date_format: &str) -> String {
    let mut output = String::new();

    let Some(first) = legs.first() else {
        return "No transactions found.\n".to_string();
    };

    output.push_str(&format!("Reference:   {}\n", first.reference_number));
    output.push_str(&format!("Type:        {}\n", first.transaction_type));
    output.push_str(&format!("Status:      {}\n", first.status));
    output.push_str(&format!(
        "Date:        {}\n",
        first.transaction_date.format(date_format)
    ));
    output.push_str(&format!(
        "Amount:      {}\n",
        first.amount.abs().format_with_currency(&first.currency)
    ));
    output.push_str(&format!("Initiated by: {}\n", first.initiated_by));

    for leg in legs {
        let side = if leg.is_debit() { "Debit" } else { "Credit" };
        output.push_str(&format!(
            "\n{}: {}\n  Account:     {}\n  Amount:      {}\n  Balance:     {}\n",
            side,
            leg.id,
            leg.account_id,
            leg.amount,
            leg.balance_after_transaction
        ));
        if !leg.description.is_empty() {
            output.push_str(&format!("  Description: {}\n", leg.description));
        }
    }

    output
}

/// Pad or shorten a string to exactly `max_len` characters
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        format!("{:width$}", s, width = max_len)
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AccountId, Currency, Money, PrincipalId, ReferenceNumber, TransferDetails,
    };
    use chrono::Utc;

    fn create_test_pair() -> (Transaction, Transaction) {
        let details = TransferDetails {
            reference_number: ReferenceNumber::parse("TRF-0001").unwrap(),
            source_account: AccountId::new(),
            destination_account: AccountId::new(),
            amount: Money::from_cents(5000),
            currency: Currency::usd(),
            initiated_by: PrincipalId::new(),
            transaction_date: Utc::now(),
        };
        (
            Transaction::debit_leg(&details, "Transfer to B", Money::from_cents(5000)),
            Transaction::credit_leg(&details, "Transfer from A", Money::from_cents(15000)),
        )
    }

    #[test]
    fn test_format_transaction_row() {
        let (debit, _) = create_test_pair();

        let formatted = format_transaction_row(&debit, "%Y-%m-%d");
        assert!(formatted.contains("Transfer to B"));
        assert!(formatted.contains("-50.00"));
        assert!(formatted.contains("TRF-0001"));
        assert!(formatted.starts_with('✓'));
    }

    #[test]
    fn test_format_empty_register() {
        let formatted = format_transaction_register("ACC-001", &[], "%Y-%m-%d");
        assert!(formatted.contains("No transactions found"));
    }

    #[test]
    fn test_format_transfer_details() {
        let (debit, credit) = create_test_pair();

        let formatted = format_transfer_details(&[debit, credit], "%Y-%m-%d");
        assert!(formatted.contains("Reference:   TRF-0001"));
        assert!(formatted.contains("50.00 USD"));
        assert!(formatted.contains("Debit:"));
        assert!(formatted.contains("Credit:"));
        assert!(formatted.contains("150.00"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Short", 10).trim(), "Short");
        let result = truncate("A very long string", 10);
        assert_eq!(result.chars().count(), 10);
        assert!(result.ends_with("..."));
    }
}
