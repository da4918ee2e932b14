//! Display formatting for terminal output

pub mod account;
pub mod transaction;

pub use account::{format_account_details, format_account_list};
pub use transaction::{format_transaction_register, format_transaction_row, format_transfer_details};
