//! Account Summary Report
//!
//! Income, expenses and per-type totals for one account, recomputed from the
//! transaction log on every call.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{LedgerError, LedgerResult};
use crate::models::{AccountId, Currency, Money, TransactionType};
use crate::storage::{LedgerStore, LedgerView};

/// Summary of one account's ledger activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryReport {
    pub account_id: AccountId,
    pub account_number: String,
    pub currency: Currency,
    /// Sum of the credit legs the account owns
    pub total_income: Money,
    /// Sum of the debit legs the account owns, as a positive amount
    pub total_expenses: Money,
    pub current_balance: Money,
    /// Absolute amounts keyed by transaction type
    pub totals_by_type: BTreeMap<TransactionType, Money>,
    pub entry_count: usize,
    /// Journal sequence the summary was computed at
    pub as_of_seq: u64,
}

impl SummaryReport {
    /// Summarize an account by id
    pub fn generate<S: LedgerStore>(storage: &S, account_id: AccountId) -> LedgerResult<Self> {
        Self::from_view(storage.snapshot_for(account_id)?)
    }

    /// Summarize an account by account number
    pub fn generate_by_number<S: LedgerStore>(
        storage: &S,
        account_number: &str,
    ) -> LedgerResult<Self> {
        let account = storage.account_by_number(account_number)?;
        Self::generate(storage, account.id)
    }

    /// Build the summary from an account and the entries it owns
    pub fn from_view(view: LedgerView) -> LedgerResult<Self> {
        let mut total_income = Money::zero();
        let mut total_expenses = Money::zero();
        let mut totals_by_type: BTreeMap<TransactionType, Money> = BTreeMap::new();

        for entry in view.entries.iter().filter(|e| e.account_id == view.account.id) {
            let magnitude = entry.amount.abs();
            if entry.is_credit() {
                total_income = accumulate(total_income, magnitude)?;
            } else {
                total_expenses = accumulate(total_expenses, magnitude)?;
            }

            let slot = totals_by_type
                .entry(entry.transaction_type)
                .or_insert_with(Money::zero);
            *slot = accumulate(*slot, magnitude)?;
        }

        Ok(Self {
            account_id: view.account.id,
            account_number: view.account.account_number.clone(),
            currency: view.account.currency.clone(),
            total_income,
            total_expenses,
            current_balance: view.account.balance(),
            totals_by_type,
            entry_count: view.entries.len(),
            as_of_seq: view.as_of_seq,
        })
    }

    /// Net movement over the account's history
    pub fn net_change(&self) -> Money {
        self.total_income - self.total_expenses
    }

    /// Total for one transaction type
    pub fn total_for(&self, transaction_type: TransactionType) -> Money {
        self.totals_by_type
            .get(&transaction_type)
            .copied()
            .unwrap_or_default()
    }

    /// Format the report for terminal display
    pub fn format_terminal(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Account Summary: {}\n", self.account_number));
        output.push_str(&"=".repeat(40));
        output.push('\n');

        output.push_str(&format!(
            "Total Income:      {:>20}\n",
            self.total_income.format_with_currency(&self.currency)
        ));
        output.push_str(&format!(
            "Total Expenses:    {:>20}\n",
            self.total_expenses.format_with_currency(&self.currency)
        ));
        output.push_str(&format!(
            "Current Balance:   {:>20}\n",
            self.current_balance.format_with_currency(&self.currency)
        ));

        if !self.totals_by_type.is_empty() {
            output.push('\n');
            output.push_str("By Type\n");
            output.push_str(&"-".repeat(40));
            output.push('\n');
            for (transaction_type, total) in &self.totals_by_type {
                output.push_str(&format!(
                    "{:<19}{:>20}\n",
                    transaction_type.to_string(),
                    total.format_with_currency(&self.currency)
                ));
            }
        }

        output.push('\n');
        output.push_str(&format!(
            "{} entries as of commit {}\n",
            self.entry_count, self.as_of_seq
        ));
        output
    }
}

fn accumulate(total: Money, amount: Money) -> LedgerResult<Money> {
    total
        .checked_add(amount)
        .ok_or_else(|| LedgerError::Validation("Summary total overflowed".into()))
}
