//! Account display formatting
//!
//! Formats accounts for terminal output in table and detail views.

use crate::models::{Account, AccountStatus};

/// Format a list of accounts as a table
pub fn format_account_list(accounts: &[Account]) -> String {
    if accounts.is_empty() {
        return "No accounts found.".to_string();
    }

    let number_width = accounts
        .iter()
        .map(|a| a.account_number.len())
        .max()
        .unwrap_or(6)
        .max(6);

    let type_width = accounts
        .iter()
        .map(|a| a.account_type.to_string().len())
        .max()
        .unwrap_or(4)
        .max(4);

    let mut output = String::new();
    output.push_str(&format!(
        "{:<number_width$}  {:<type_width$}  {:>14}  {:>14}  {}\n",
        "Number",
        "Type",
        "Balance",
        "Available",
        "Status",
        number_width = number_width,
        type_width = type_width,
    ));

    output.push_str(&format!(
        "{:-<number_width$}  {:-<type_width$}  {:->14}  {:->14}  {:-<8}\n",
        "",
        "",
        "",
        "",
        "",
        number_width = number_width,
        type_width = type_width,
    ));

    for account in accounts {
        let status = match account.status {
            AccountStatus::Active => String::new(),
            other => other.to_string(),
        };

        output.push_str(&format!(
            "{:<number_width$}  {:<type_width$}  {:>14}  {:>14}  {}\n",
            account.account_number,
            account.account_type,
            account.balance().format_with_currency(&account.currency),
            account.available().format_with_currency(&account.currency),
            status,
            number_width = number_width,
            type_width = type_width,
        ));
    }

    output
}

/// Format a single account's details
pub fn format_account_details(account: &Account, date_format: &str) -> String {
    let mut output = String::new();

    output.push_str(&format!("Account: {}\n", account.account_number));
    output.push_str(&format!("  Type:             {}\n", account.account_type));
    output.push_str(&format!("  Status:           {}\n", account.status));
    output.push_str(&format!("  ID:               {}\n", account.id));
    output.push_str(&format!("  Owner:            {}\n", account.owner));
    output.push_str(&format!("  Currency:         {}\n", account.currency));
    output.push('\n');
    output.push_str(&format!(
        "  Opening Balance:  {}\n",
        account.opening_balance.format_with_currency(&account.currency)
    ));
    output.push_str(&format!(
        "  Current Balance:  {}\n",
        account.balance().format_with_currency(&account.currency)
    ));
    output.push_str(&format!(
        "  Minimum Balance:  {}\n",
        account.minimum_balance.format_with_currency(&account.currency)
    ));
    output.push_str(&format!(
        "  Available:        {}\n",
        account.available().format_with_currency(&account.currency)
    ));

    if account.interest_rate_bps > 0 {
        output.push_str(&format!(
            "  Interest Rate:    {}.{:02}%\n",
            account.interest_rate_bps / 100,
            account.interest_rate_bps % 100
        ));
    }

    output.push('\n');
    if let Some(date) = account.last_transaction_date {
        output.push_str(&format!("  Last Activity:  {}\n", date.format(date_format)));
    }
    output.push_str(&format!(
        "  Created:        {}\n",
        account.created_at.format(date_format)
    ));

    output
}
