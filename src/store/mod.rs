//! Balance Store
//!
//! Durable, transactional storage for wallet and transaction records. The
//! [`WalletStore`] trait is the contract the ledger engine programs against:
//! locked reads, version-conditional writes and filtered, paginated scans,
//! all scoped to an explicit unit of work.
//!
//! [`PgWalletStore`] is the authoritative Postgres implementation.
//! [`MemoryWalletStore`] backs the engine tests and keeps the same locking
//! semantics in-process.

mod memory;
mod postgres;

pub use memory::MemoryWalletStore;
pub use postgres::{PgUnit, PgWalletStore};

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{Transaction, TransactionStatus, Wallet};

/// Store-layer error types
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("wallet not found")]
    WalletNotFound,

    #[error("user already owns a wallet")]
    DuplicateWallet,

    #[error("optimistic lock conflict: wallet version advanced by another writer")]
    OptimisticLock,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Transactional wallet storage.
///
/// Operations taking `&mut Self::Unit` run inside that unit of work and
/// become durable only when the unit commits. `commit` and `rollback`
/// consume the unit, so a unit can end exactly once; dropping a unit
/// without committing rolls it back.
#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Unit-of-work handle scoping locks and writes.
    type Unit: Send;

    async fn begin(&self) -> Result<Self::Unit, StoreError>;

    async fn commit(&self, unit: Self::Unit) -> Result<(), StoreError>;

    async fn rollback(&self, unit: Self::Unit) -> Result<(), StoreError>;

    /// Insert a new wallet row. Fails with [`StoreError::DuplicateWallet`]
    /// if the user already owns one.
    async fn create(&self, wallet: &Wallet) -> Result<(), StoreError>;

    /// Unlocked wallet lookup by owning user.
    async fn get_by_user(&self, user_id: Uuid) -> Result<Wallet, StoreError>;

    /// Wallet lookup acquiring an exclusive row lock scoped to the unit.
    /// Blocks other lockers on the same row until the unit ends.
    async fn get_by_user_locked(
        &self,
        unit: &mut Self::Unit,
        user_id: Uuid,
    ) -> Result<Wallet, StoreError>;

    /// Conditional balance write: succeeds only if the stored version equals
    /// `new_version - 1`, otherwise [`StoreError::OptimisticLock`]. This is
    /// a second guard layered on top of the row lock, covering any write
    /// path that mutates without locking.
    async fn update_balance(
        &self,
        unit: &mut Self::Unit,
        wallet_id: Uuid,
        new_balance: Decimal,
        new_version: i64,
    ) -> Result<(), StoreError>;

    async fn create_transaction(
        &self,
        unit: &mut Self::Unit,
        txn: &Transaction,
    ) -> Result<(), StoreError>;

    async fn update_transaction_status(
        &self,
        unit: &mut Self::Unit,
        txn_id: Uuid,
        status: TransactionStatus,
    ) -> Result<(), StoreError>;

    /// Page of transactions for a wallet, newest first.
    async fn list_transactions(
        &self,
        wallet_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>, StoreError>;

    async fn count_transactions(&self, wallet_id: Uuid) -> Result<i64, StoreError>;
}
