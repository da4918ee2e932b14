//! Account CLI commands
//!
//! Implements CLI commands for account management.

use clap::Subcommand;

use crate::config::Settings;
use crate::display::account::{format_account_details, format_account_list};
use crate::error::{LedgerError, LedgerResult};
use crate::models::AccountType;
use crate::services::{AccountService, OpenAccount};
use crate::storage::Storage;

use super::{parse_currency, parse_money, parse_principal};

/// Account subcommands
#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a new account
    Open {
        /// Account number (letters, digits and '-')
        number: String,
        /// Account type (checking, savings, credit, other)
        #[arg(short = 't', long, default_value = "checking")]
        account_type: String,
        /// Opening balance (e.g., "1000.00" or "1000")
        #[arg(short, long, default_value = "0")]
        balance: String,
        /// Balance the account may never drop below
        #[arg(short, long, default_value = "0")]
        minimum: String,
        /// Currency code; defaults to the configured currency
        #[arg(short, long)]
        currency: Option<String>,
        /// Annual interest rate in basis points
        #[arg(long, default_value = "0")]
        rate_bps: u32,
        /// Owning principal id; defaults to the configured operator
        #[arg(long)]
        owner: Option<String>,
    },
    /// List accounts
    List {
        /// Include accounts that are not active
        #[arg(short, long)]
        all: bool,
        /// Only accounts held by this principal id
        #[arg(long)]
        owner: Option<String>,
    },
    /// Show account details
    Show {
        /// Account number or ID
        account: String,
    },
}

/// Handle an account command
pub fn handle_account_command(
    storage: &Storage,
    settings: &Settings,
    cmd: AccountCommands,
) -> LedgerResult<()> {
    let service = AccountService::new(storage);

    match cmd {
        AccountCommands::Open {
            number,
            account_type,
            balance,
            minimum,
            currency,
            rate_bps,
            owner,
        } => {
            let account_type = AccountType::parse(&account_type).ok_or_else(|| {
                LedgerError::Validation(format!(
                    "Invalid account type: '{}'. Valid types: checking, savings, credit, other",
                    account_type
                ))
            })?;
            let currency = match currency {
                Some(code) => parse_currency(&code)?,
                None => settings.default_currency.clone(),
            };
            let owner = match owner {
                Some(id) => parse_principal(&id)?,
                None => settings.operator,
            };

            let mut request = OpenAccount::new(number, currency, owner)
                .with_type(account_type)
                .with_opening_balance(parse_money(&balance, "balance")?)
                .with_minimum_balance(parse_money(&minimum, "minimum balance")?);
            request.interest_rate_bps = rate_bps;

            let account = service.open(request)?;

            println!("Opened account: {}", account.account_number);
            println!("  Type: {}", account.account_type);
            println!(
                "  Opening Balance: {}",
                account.opening_balance.format_with_currency(&account.currency)
            );
            println!("  ID: {}", account.id.as_uuid());
        }

        AccountCommands::List { all, owner } => {
            let accounts = match owner {
                Some(id) => service.list_by_owner(parse_principal(&id)?),
                None => service.list(!all),
            };
            print!("{}", format_account_list(&accounts));
        }

        AccountCommands::Show { account } => {
            let found = service.find(&account)?;
            print!("{}", format_account_details(&found, &settings.date_format));
        }
    }

    Ok(())
}
