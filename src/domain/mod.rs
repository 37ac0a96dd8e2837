//! Domain model
//!
//! Wallet and transaction records plus the closed kind/status variants.
//! Invalid kinds and statuses are unrepresentable outside the persistence
//! boundary, where they exist only as their string form.

mod transaction;
mod wallet;

pub use transaction::{ParseEnumError, Transaction, TransactionKind, TransactionStatus};
pub use wallet::Wallet;
