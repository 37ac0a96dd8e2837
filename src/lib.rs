//! digital-wallet Library
//!
//! Re-exports modules for integration testing and external use.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod ledger;
pub mod store;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use ledger::WalletLedger;
