//! bank-ledger - double-entry ledger core for bank accounts
//!
//! Moves money between accounts so that every transfer changes both balances
//! and writes both linked ledger entries, or changes nothing at all.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Configuration and path management
//! - `error`: Custom error types
//! - `logging`: `tracing` subscriber setup
//! - `models`: Core data models (accounts, ledger entries, money, references)
//! - `storage`: Account snapshot, transaction journal, locks and units of work
//! - `services`: Accounts, transfers, history and verification
//! - `reports`: Per-account summary
//! - `display`, `export`, `cli`: Terminal output, file export, command handlers
//!
//! # Example
//!
//! ```rust,ignore
//! use bank_ledger::config::LedgerPaths;
//! use bank_ledger::models::{Currency, Money, PrincipalId};
//! use bank_ledger::services::{TransferRequest, TransferService};
//! use bank_ledger::storage::Storage;
//!
//! let storage = Storage::open(LedgerPaths::new()?)?;
//! let result = TransferService::new(&storage).transfer(TransferRequest {
//!     source_account_number: "ACC-A".into(),
//!     destination_account_number: "ACC-B".into(),
//!     amount: Money::from_cents(3000),
//!     currency: Currency::usd(),
//!     description: None,
//!     initiated_by: PrincipalId::new(),
//! })?;
//! ```

pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod export;
pub mod logging;
pub mod models;
pub mod reports;
pub mod services;
pub mod storage;

pub use error::{LedgerError, LedgerResult};
