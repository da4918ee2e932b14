//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the service layer.

pub mod account;
pub mod history;
pub mod report;
pub mod transfer;

pub use account::{handle_account_command, AccountCommands};
pub use history::{handle_history_command, HistoryArgs, HistoryFormat};
pub use report::{handle_export_command, handle_summary_command, handle_verify_command};
pub use transfer::{handle_lookup_command, handle_transfer_command, TransferArgs};

use chrono::NaiveDate;

use crate::error::{LedgerError, LedgerResult};
use crate::models::{Currency, Money, PrincipalId};

pub(crate) fn parse_money(s: &str, what: &str) -> LedgerResult<Money> {
    Money::parse(s).map_err(|e| {
        LedgerError::Validation(format!(
            "Invalid {}: '{}'. Use format like '100.00' or '100'. Error: {}",
            what, s, e
        ))
    })
}

pub(crate) fn parse_currency(code: &str) -> LedgerResult<Currency> {
    Currency::parse(code).map_err(|e| LedgerError::Validation(e.to_string()))
}

pub(crate) fn parse_principal(id: &str) -> LedgerResult<PrincipalId> {
    PrincipalId::parse(id.trim())
        .map_err(|_| LedgerError::Validation(format!("Invalid principal id: '{}'", id)))
}

pub(crate) fn parse_date(s: &str) -> LedgerResult<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
        LedgerError::Validation(format!("Invalid date format: '{}'. Use YYYY-MM-DD", s))
    })
}
