//! History CLI command
//!
//! Lists an account's entries newest first, optionally exporting them.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::{Args, ValueEnum};

use crate::config::Settings;
use crate::display::transaction::format_transaction_register;
use crate::error::{LedgerError, LedgerResult};
use crate::export::{export_history_csv, write_json, HistoryExport};
use crate::models::TransactionType;
use crate::services::{AccountService, HistoryFilter, HistoryService};
use crate::storage::Storage;

use super::parse_date;

/// Export format for history
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum HistoryFormat {
    Csv,
    Json,
}

/// Arguments for the history command
#[derive(Args)]
pub struct HistoryArgs {
    /// Account number or ID
    pub account: String,
    /// Number of entries to show
    #[arg(short, long)]
    pub limit: Option<usize>,
    /// Only entries on or after this date (YYYY-MM-DD)
    #[arg(long)]
    pub since: Option<String>,
    /// Only entries on or before this date (YYYY-MM-DD)
    #[arg(long)]
    pub until: Option<String>,
    /// Only entries of this type (deposit, withdrawal, transfer, interest, fee)
    #[arg(short = 't', long = "type")]
    pub transaction_type: Option<String>,
    /// Write the entries in this format instead of a table
    #[arg(short, long, value_enum)]
    pub export: Option<HistoryFormat>,
    /// Output file for --export; stdout when omitted
    #[arg(short, long, requires = "export")]
    pub output: Option<PathBuf>,
}

/// Handle the history command
pub fn handle_history_command(
    storage: &Storage,
    settings: &Settings,
    args: HistoryArgs,
) -> LedgerResult<()> {
    let account = AccountService::new(storage).find(&args.account)?;

    let filter = HistoryFilter {
        since: args.since.as_deref().map(parse_date).transpose()?,
        until: args.until.as_deref().map(parse_date).transpose()?,
        transaction_type: args
            .transaction_type
            .as_deref()
            .map(parse_transaction_type)
            .transpose()?,
        limit: args.limit,
    };

    let entries = HistoryService::new(storage).list_by_number(&account.account_number, &filter)?;

    let Some(format) = args.export else {
        print!(
            "{}",
            format_transaction_register(&account.account_number, &entries, &settings.date_format)
        );
        return Ok(());
    };

    let writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };

    let count = entries.len();
    match format {
        HistoryFormat::Csv => {
            let numbers: HashMap<_, _> = storage
                .accounts
                .get_all()
                .into_iter()
                .map(|a| (a.id, a.account_number))
                .collect();
            export_history_csv(&entries, &numbers, writer)?;
        }
        HistoryFormat::Json => {
            write_json(&HistoryExport::new(account, entries), writer, true)?;
        }
    }

    if let Some(path) = args.output {
        println!("Exported {} entries to {}", count, path.display());
    }
    Ok(())
}

fn parse_transaction_type(s: &str) -> LedgerResult<TransactionType> {
    match s.trim().to_lowercase().as_str() {
        "deposit" => Ok(TransactionType::Deposit),
        "withdrawal" => Ok(TransactionType::Withdrawal),
        "transfer" => Ok(TransactionType::Transfer),
        "interest" => Ok(TransactionType::Interest),
        "fee" => Ok(TransactionType::Fee),
        _ => Err(LedgerError::Validation(format!(
            "Invalid transaction type: '{}'. Valid types: deposit, withdrawal, transfer, interest, fee",
            s
        ))),
    }
}
