//! JSON Export functionality
//!
//! Exports an account's history, or the whole ledger at one commit, to JSON
//! with schema versioning.

use std::collections::HashSet;
use std::io::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};
use crate::models::{Account, Transaction};
use crate::storage::LedgerState;

/// Current export schema version
pub const EXPORT_SCHEMA_VERSION: &str = "1.0.0";

/// History of a single account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryExport {
    pub schema_version: String,
    pub exported_at: DateTime<Utc>,
    pub account: Account,
    /// Newest first
    pub entries: Vec<Transaction>,
}

impl HistoryExport {
    pub fn new(account: Account, entries: Vec<Transaction>) -> Self {
        Self {
            schema_version: EXPORT_SCHEMA_VERSION.to_string(),
            exported_at: Utc::now(),
            account,
            entries,
        }
    }
}

/// Every account and entry as of one commit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerExport {
    /// Schema version for compatibility checking
    pub schema_version: String,
    pub exported_at: DateTime<Utc>,
    /// Application version that created the export
    pub app_version: String,
    /// Journal sequence the export reflects
    pub as_of_seq: u64,
    pub accounts: Vec<Account>,
    /// Commit order
    pub entries: Vec<Transaction>,
}

impl LedgerExport {
    pub fn from_state(state: LedgerState) -> Self {
        Self {
            schema_version: EXPORT_SCHEMA_VERSION.to_string(),
            exported_at: Utc::now(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            as_of_seq: state.as_of_seq,
            accounts: state.accounts,
            entries: state.entries,
        }
    }

    /// Check the schema version and that every entry's accounts exist
    pub fn validate(&self) -> Result<(), String> {
        if self.schema_version != EXPORT_SCHEMA_VERSION {
            return Err(format!(
                "Schema version mismatch: expected {}, got {}",
                EXPORT_SCHEMA_VERSION, self.schema_version
            ));
        }

        let account_ids: HashSet<_> = self.accounts.iter().map(|a| a.id).collect();
        for txn in &self.entries {
            for id in [txn.account_id, txn.source_account, txn.destination_account] {
                if !account_ids.contains(&id) {
                    return Err(format!(
                        "Entry {} references unknown account {}",
                        txn.id, id
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Write any export as JSON
pub fn write_json<T: Serialize, W: Write>(value: &T, writer: W, pretty: bool) -> LedgerResult<()> {
    if pretty {
        serde_json::to_writer_pretty(writer, value)
    } else {
        serde_json::to_writer(writer, value)
    }?;
    Ok(())
}

/// Read a ledger export back, rejecting one that fails validation
pub fn read_ledger_export(json_str: &str) -> LedgerResult<LedgerExport> {
    let export: LedgerExport = serde_json::from_str(json_str)
        .map_err(|e| LedgerError::Validation(format!("Invalid ledger export: {}", e)))?;

    export.validate().map_err(LedgerError::Validation)?;
    Ok(export)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerPaths;
    use crate::models::{Currency, Money, PrincipalId};
    use crate::services::{AccountService, OpenAccount, TransferRequest, TransferService};
    use crate::storage::Storage;
    use tempfile::TempDir;

    fn create_test_storage() -> (TempDir, Storage) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::open(LedgerPaths::with_base_dir(temp_dir.path())).unwrap();
        let accounts = AccountService::new(&storage);
        for number in ["A", "B"] {
            accounts
                .open(
                    OpenAccount::new(number, Currency::usd(), PrincipalId::new())
                        .with_opening_balance(Money::from_cents(10000)),
                )
                .unwrap();
        }
        TransferService::new(&storage)
            .transfer(TransferRequest {
                source_account_number: "A".into(),
                destination_account_number: "B".into(),
                amount: Money::from_cents(2500),
                currency: Currency::usd(),
                description: None,
                initiated_by: PrincipalId::new(),
            })
            .unwrap();
        (temp_dir, storage)
    }

    #[test]
    fn test_ledger_export() {
        let (_temp_dir, storage) = create_test_storage();

        let export = LedgerExport::from_state(storage.consistent_state());

        assert_eq!(export.schema_version, EXPORT_SCHEMA_VERSION);
        assert_eq!(export.accounts.len(), 2);
        assert_eq!(export.entries.len(), 2);
        assert_eq!(export.as_of_seq, 1);
        assert!(export.validate().is_ok());
    }

    #[test]
    fn test_json_roundtrip() {
        let (_temp_dir, storage) = create_test_storage();
        let export = LedgerExport::from_state(storage.consistent_state());

        let mut output = Vec::new();
        write_json(&export, &mut output, true).unwrap();
        let imported = read_ledger_export(&String::from_utf8(output).unwrap()).unwrap();

        assert_eq!(imported.entries, export.entries);
        assert_eq!(imported.accounts[0].balance(), Money::from_cents(7500));
    }

    #[test]
    fn test_validate_rejects_dangling_entry() {
        let (_temp_dir, storage) = create_test_storage();
        let mut export = LedgerExport::from_state(storage.consistent_state());
        export.accounts.pop();

        assert!(export.validate().is_err());
    }

    #[test]
    fn test_history_export_shape() {
        let (_temp_dir, storage) = create_test_storage();
        let account = storage.accounts.get_by_number("A").unwrap();
        let entries = storage.transactions.query_by_account(account.id);

        let mut output = Vec::new();
        write_json(&HistoryExport::new(account, entries), &mut output, false).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(value["account"]["account_number"], "A");
        assert_eq!(value["entries"][0]["amount"], -2500);
        assert_eq!(value["entries"][0]["type"], "transfer");
    }
}
