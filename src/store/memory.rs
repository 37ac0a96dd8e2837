//! In-memory Balance Store
//!
//! Keeps the [`WalletStore`] contract without a database: writes are staged
//! on the unit and applied atomically on commit, and `get_by_user_locked`
//! holds a real per-wallet async lock until the unit is dropped. Used by the
//! engine tests and handy as an ephemeral backend for local experiments.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::{Transaction, TransactionStatus, Wallet};

use super::{StoreError, WalletStore};

#[derive(Debug)]
enum StagedOp {
    InsertTransaction(Transaction),
    UpdateBalance {
        wallet_id: Uuid,
        new_balance: Decimal,
        new_version: i64,
    },
    SetStatus {
        txn_id: Uuid,
        status: TransactionStatus,
    },
}

/// Unit of work for the in-memory store. Dropping it without commit
/// discards the staged writes and releases any held row locks.
pub struct MemoryUnit {
    staged: Vec<StagedOp>,
    // Held until the unit ends, mirroring SELECT ... FOR UPDATE.
    _row_guards: Vec<OwnedMutexGuard<()>>,
}

#[derive(Default)]
struct State {
    wallets: HashMap<Uuid, Wallet>,
    user_index: HashMap<Uuid, Uuid>,
    transactions: Vec<Transaction>,
    row_locks: HashMap<Uuid, Arc<Mutex<()>>>,
}

#[derive(Clone, Default)]
pub struct MemoryWalletStore {
    state: Arc<Mutex<State>>,
}

impl MemoryWalletStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WalletStore for MemoryWalletStore {
    type Unit = MemoryUnit;

    async fn begin(&self) -> Result<Self::Unit, StoreError> {
        Ok(MemoryUnit {
            staged: Vec::new(),
            _row_guards: Vec::new(),
        })
    }

    async fn commit(&self, unit: Self::Unit) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;

        // Validate every conditional write before applying anything, so a
        // conflict leaves no partial state behind.
        for op in &unit.staged {
            if let StagedOp::UpdateBalance {
                wallet_id,
                new_version,
                ..
            } = op
            {
                let wallet = state
                    .wallets
                    .get(wallet_id)
                    .ok_or(StoreError::WalletNotFound)?;
                if wallet.version != new_version - 1 {
                    return Err(StoreError::OptimisticLock);
                }
            }
        }

        for op in unit.staged {
            match op {
                StagedOp::InsertTransaction(txn) => state.transactions.push(txn),
                StagedOp::UpdateBalance {
                    wallet_id,
                    new_balance,
                    new_version,
                } => {
                    if let Some(wallet) = state.wallets.get_mut(&wallet_id) {
                        wallet.balance = new_balance;
                        wallet.version = new_version;
                        wallet.updated_at = Utc::now();
                    }
                }
                StagedOp::SetStatus { txn_id, status } => {
                    if let Some(txn) = state.transactions.iter_mut().find(|t| t.id == txn_id) {
                        txn.status = status;
                        txn.updated_at = Utc::now();
                    }
                }
            }
        }

        Ok(())
    }

    async fn rollback(&self, unit: Self::Unit) -> Result<(), StoreError> {
        drop(unit);
        Ok(())
    }

    async fn create(&self, wallet: &Wallet) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;

        if state.user_index.contains_key(&wallet.user_id) {
            return Err(StoreError::DuplicateWallet);
        }

        state.user_index.insert(wallet.user_id, wallet.id);
        state.wallets.insert(wallet.id, wallet.clone());
        Ok(())
    }

    async fn get_by_user(&self, user_id: Uuid) -> Result<Wallet, StoreError> {
        let state = self.state.lock().await;

        let wallet_id = state
            .user_index
            .get(&user_id)
            .ok_or(StoreError::WalletNotFound)?;
        state
            .wallets
            .get(wallet_id)
            .cloned()
            .ok_or(StoreError::WalletNotFound)
    }

    async fn get_by_user_locked(
        &self,
        unit: &mut Self::Unit,
        user_id: Uuid,
    ) -> Result<Wallet, StoreError> {
        let (wallet_id, row_lock) = {
            let mut state = self.state.lock().await;
            let wallet_id = *state
                .user_index
                .get(&user_id)
                .ok_or(StoreError::WalletNotFound)?;
            let row_lock = state
                .row_locks
                .entry(wallet_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone();
            (wallet_id, row_lock)
        };

        // Block until the current holder's unit ends, then re-read so the
        // caller observes the committed state.
        let guard = row_lock.lock_owned().await;
        unit._row_guards.push(guard);

        let state = self.state.lock().await;
        state
            .wallets
            .get(&wallet_id)
            .cloned()
            .ok_or(StoreError::WalletNotFound)
    }

    async fn update_balance(
        &self,
        unit: &mut Self::Unit,
        wallet_id: Uuid,
        new_balance: Decimal,
        new_version: i64,
    ) -> Result<(), StoreError> {
        unit.staged.push(StagedOp::UpdateBalance {
            wallet_id,
            new_balance,
            new_version,
        });
        Ok(())
    }

    async fn create_transaction(
        &self,
        unit: &mut Self::Unit,
        txn: &Transaction,
    ) -> Result<(), StoreError> {
        unit.staged.push(StagedOp::InsertTransaction(txn.clone()));
        Ok(())
    }

    async fn update_transaction_status(
        &self,
        unit: &mut Self::Unit,
        txn_id: Uuid,
        status: TransactionStatus,
    ) -> Result<(), StoreError> {
        unit.staged.push(StagedOp::SetStatus { txn_id, status });
        Ok(())
    }

    async fn list_transactions(
        &self,
        wallet_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>, StoreError> {
        let state = self.state.lock().await;

        // Reverse insertion order first so equal timestamps still come back
        // newest first after the stable sort.
        let mut rows: Vec<Transaction> = state
            .transactions
            .iter()
            .rev()
            .filter(|t| t.wallet_id == wallet_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_transactions(&self, wallet_id: Uuid) -> Result<i64, StoreError> {
        let state = self.state.lock().await;

        Ok(state
            .transactions
            .iter()
            .filter(|t| t.wallet_id == wallet_id)
            .count() as i64)
    }
}
