//! Reports module
//!
//! Read-only views derived from the transaction log.

pub mod summary;

pub use summary::SummaryReport;
