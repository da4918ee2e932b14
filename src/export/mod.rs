//! Export module
//!
//! - CSV: account history and the account list (spreadsheet-compatible)
//! - JSON: account history, or the full ledger at one commit

pub mod csv;
pub mod json;

pub use self::csv::{export_accounts_csv, export_history_csv};
pub use self::json::{
    read_ledger_export, write_json, HistoryExport, LedgerExport, EXPORT_SCHEMA_VERSION,
};
