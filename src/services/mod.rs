//! Service layer for the ledger
//!
//! Services sit on top of the storage layer: they validate requests, resolve
//! account numbers, and drive units of work.

pub mod account;
pub mod history;
pub mod transfer;
pub mod verify;

pub use account::{AccountService, OpenAccount};
pub use history::{HistoryFilter, HistoryService};
pub use transfer::{TransferRequest, TransferResult, TransferService};
pub use verify::{Discrepancy, VerificationReport, VerificationService};
