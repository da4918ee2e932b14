//! Report CLI commands
//!
//! Account summary, ledger verification and full ledger export.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

use crate::error::{LedgerError, LedgerResult};
use crate::export::{export_accounts_csv, write_json, LedgerExport};
use crate::reports::SummaryReport;
use crate::services::{AccountService, VerificationService};
use crate::storage::Storage;

/// Handle the summary command
pub fn handle_summary_command(storage: &Storage, account: &str, json: bool) -> LedgerResult<()> {
    let account = AccountService::new(storage).find(account)?;
    let report = SummaryReport::generate(storage, account.id)?;

    if json {
        write_json(&report, io::stdout().lock(), true)?;
        println!();
    } else {
        print!("{}", report.format_terminal());
    }
    Ok(())
}

/// Handle the verify command
///
/// Fails when any discrepancy is found so scripts can rely on the exit code.
pub fn handle_verify_command(storage: &Storage, json: bool) -> LedgerResult<()> {
    let report = VerificationService::new(storage).verify();

    if json {
        write_json(&report, io::stdout().lock(), true)?;
        println!();
    } else {
        println!(
            "Checked {} accounts and {} entries as of commit {}",
            report.accounts_checked, report.entries_checked, report.as_of_seq
        );
        for discrepancy in &report.discrepancies {
            println!("  ! {}", discrepancy);
        }
    }

    if report.is_consistent() {
        if !json {
            println!("Ledger is consistent.");
        }
        Ok(())
    } else {
        Err(LedgerError::Persistence(format!(
            "Ledger verification found {} discrepancies",
            report.discrepancies.len()
        )))
    }
}

/// Handle the export command
pub fn handle_export_command(
    storage: &Storage,
    output: &Path,
    accounts_only: bool,
    pretty: bool,
) -> LedgerResult<()> {
    let writer = BufWriter::new(File::create(output)?);
    let state = storage.consistent_state();

    if accounts_only {
        export_accounts_csv(&state.accounts, writer)?;
        println!(
            "Exported {} accounts to {}",
            state.accounts.len(),
            output.display()
        );
    } else {
        let export = LedgerExport::from_state(state);
        write_json(&export, writer, pretty)?;
        println!(
            "Exported {} accounts and {} entries to {}",
            export.accounts.len(),
            export.entries.len(),
            output.display()
        );
    }
    Ok(())
}
