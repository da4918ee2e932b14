//! CLI command handlers for account transfers
//!
//! Moves funds between two accounts and looks up committed transfers by
//! reference number.

use std::sync::Arc;

use clap::Args;

use crate::config::Settings;
use crate::display::transaction::format_transfer_details;
use crate::error::{LedgerError, LedgerResult};
use crate::models::{ReferenceNumber, UuidReferenceGenerator};
use crate::services::{TransferRequest, TransferService};
use crate::storage::Storage;

use super::{parse_currency, parse_money, parse_principal};

/// Arguments for the transfer command
#[derive(Args)]
pub struct TransferArgs {
    /// Source account number
    pub from: String,
    /// Destination account number
    pub to: String,
    /// Amount to move (e.g., "30.00")
    pub amount: String,
    /// Currency code; defaults to the configured currency
    #[arg(short, long)]
    pub currency: Option<String>,
    /// Description applied to both entries
    #[arg(short, long)]
    pub description: Option<String>,
    /// Principal id requesting the transfer; defaults to the configured operator
    #[arg(long)]
    pub initiated_by: Option<String>,
}

/// Handle the transfer command
pub fn handle_transfer_command(
    storage: &Storage,
    settings: &Settings,
    args: TransferArgs,
) -> LedgerResult<()> {
    let currency = match &args.currency {
        Some(code) => parse_currency(code)?,
        None => settings.default_currency.clone(),
    };
    let initiated_by = match &args.initiated_by {
        Some(id) => parse_principal(id)?,
        None => settings.operator,
    };

    let service = TransferService::new(storage).with_reference_generator(Arc::new(
        UuidReferenceGenerator::new(&settings.reference_prefix),
    ));

    let result = service.transfer(TransferRequest {
        source_account_number: args.from,
        destination_account_number: args.to,
        amount: parse_money(&args.amount, "amount")?,
        currency,
        description: args.description,
        initiated_by,
    })?;

    let debit = &result.source_entry;
    let credit = &result.destination_entry;
    println!("Transfer committed: {}", result.reference_number());
    println!(
        "  Amount: {}",
        credit.amount.format_with_currency(&credit.currency)
    );
    println!("  From:   balance now {}", debit.balance_after_transaction);
    println!("  To:     balance now {}", credit.balance_after_transaction);
    println!(
        "  Date:   {}",
        debit.transaction_date.format(&settings.date_format)
    );

    Ok(())
}

/// Handle the lookup command
pub fn handle_lookup_command(
    storage: &Storage,
    settings: &Settings,
    reference: &str,
) -> LedgerResult<()> {
    let reference = ReferenceNumber::parse(reference.trim())
        .map_err(|e| LedgerError::Validation(e.to_string()))?;

    let result = TransferService::new(storage).find_transfer(&reference)?;
    let legs = [result.source_entry, result.destination_entry];
    print!("{}", format_transfer_details(&legs, &settings.date_format));

    Ok(())
}
