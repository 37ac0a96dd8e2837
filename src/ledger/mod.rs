//! Wallet Ledger Engine
//!
//! The authoritative orchestrator for balance changes. A mutation runs as
//! one unit of work: locked wallet read, pending transaction insert,
//! version-conditional balance write, status flip to completed, commit.
//! Either everything in that list is durable or none of it is. After a
//! commit the user's cached history pages are invalidated best-effort, and
//! history reads go through the cache before touching the store.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cache::{history_key, history_prefix, HistoryCache};
use crate::domain::{Transaction, TransactionKind, TransactionStatus, Wallet};
use crate::error::{AppError, AppResult};
use crate::store::{StoreError, WalletStore};

/// How long a cached history page stays valid.
pub const DEFAULT_HISTORY_TTL: Duration = Duration::from_secs(300);

// =========================================================================
// Engine result payloads
// =========================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletInfo {
    pub id: Uuid,
    pub user_id: Uuid,
    pub balance: Decimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Wallet> for WalletInfo {
    fn from(wallet: Wallet) -> Self {
        Self {
            id: wallet.id,
            user_id: wallet.user_id,
            balance: wallet.balance,
            currency: wallet.currency,
            created_at: wallet.created_at,
            updated_at: wallet.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceInfo {
    pub user_id: Uuid,
    pub balance: Decimal,
    pub currency: String,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of a successful withdraw or deposit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationReceipt {
    pub transaction_id: Uuid,
    pub amount: Decimal,
    pub new_balance: Decimal,
    pub status: TransactionStatus,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionView {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Transaction> for TransactionView {
    fn from(txn: Transaction) -> Self {
        Self {
            id: txn.id,
            kind: txn.kind,
            amount: txn.amount,
            description: txn.description,
            status: txn.status,
            created_at: txn.created_at,
            updated_at: txn.updated_at,
        }
    }
}

/// One page of transaction history. This is also the payload cached as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPage {
    pub transactions: Vec<TransactionView>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

/// Page number addressed by an offset: `offset = k * limit` lands on page
/// `k + 1`.
pub fn page_number(offset: i64, limit: i64) -> i64 {
    offset / limit + 1
}

/// `ceil(total / limit)` in integer arithmetic.
pub fn total_pages(total: i64, limit: i64) -> i64 {
    (total + limit - 1) / limit
}

// =========================================================================
// Engine
// =========================================================================

pub struct WalletLedger<S, C> {
    store: S,
    cache: C,
    history_ttl: Duration,
}

impl<S, C> WalletLedger<S, C>
where
    S: WalletStore,
    C: HistoryCache,
{
    pub fn new(store: S, cache: C) -> Self {
        Self {
            store,
            cache,
            history_ttl: DEFAULT_HISTORY_TTL,
        }
    }

    pub fn with_history_ttl(mut self, ttl: Duration) -> Self {
        self.history_ttl = ttl;
        self
    }

    /// Create the user's wallet: balance 0, version 1. One per user.
    pub async fn create_wallet(&self, user_id: Uuid, currency: String) -> AppResult<WalletInfo> {
        let wallet = Wallet::new(user_id, currency);

        self.store
            .create(&wallet)
            .await
            .map_err(|e| classify(e, user_id))?;

        tracing::info!(
            user_id = %user_id,
            wallet_id = %wallet.id,
            currency = %wallet.currency,
            "Wallet created"
        );

        Ok(wallet.into())
    }

    /// Current balance from an unlocked read. Always strongly consistent;
    /// the cache is never consulted for balances.
    pub async fn get_balance(&self, user_id: Uuid) -> AppResult<BalanceInfo> {
        let wallet = self
            .store
            .get_by_user(user_id)
            .await
            .map_err(|e| classify(e, user_id))?;

        Ok(BalanceInfo {
            user_id: wallet.user_id,
            balance: wallet.balance,
            currency: wallet.currency,
            timestamp: Utc::now(),
        })
    }

    pub async fn withdraw(
        &self,
        user_id: Uuid,
        amount: Decimal,
        description: Option<String>,
    ) -> AppResult<MutationReceipt> {
        self.mutate(user_id, TransactionKind::Withdraw, amount, description)
            .await
    }

    pub async fn deposit(
        &self,
        user_id: Uuid,
        amount: Decimal,
        description: Option<String>,
    ) -> AppResult<MutationReceipt> {
        self.mutate(user_id, TransactionKind::Deposit, amount, description)
            .await
    }

    /// Shared mutation protocol for withdraw and deposit.
    async fn mutate(
        &self,
        user_id: Uuid,
        kind: TransactionKind,
        amount: Decimal,
        description: Option<String>,
    ) -> AppResult<MutationReceipt> {
        // Validated before any unit of work is opened.
        if amount <= Decimal::ZERO {
            return Err(AppError::InvalidRequest(
                "amount must be positive".to_string(),
            ));
        }

        let mut unit = self.store.begin().await.map_err(|e| classify(e, user_id))?;

        let staged = self
            .stage_mutation(&mut unit, user_id, kind, amount, description)
            .await;

        let (txn, new_balance) = match staged {
            Ok(staged) => staged,
            Err(e) => {
                if let Err(rb) = self.store.rollback(unit).await {
                    tracing::warn!(user_id = %user_id, error = %rb, "Rollback failed");
                }
                return Err(e);
            }
        };

        self.store
            .commit(unit)
            .await
            .map_err(|e| classify(e, user_id))?;

        // Committed state must not be served from pages cached before this
        // mutation; a failure here only extends staleness until the TTL.
        self.invalidate_history(user_id).await;

        tracing::info!(
            user_id = %user_id,
            transaction_id = %txn.id,
            kind = %kind,
            amount = %amount,
            new_balance = %new_balance,
            "Mutation committed"
        );

        Ok(MutationReceipt {
            transaction_id: txn.id,
            amount,
            new_balance,
            status: txn.status,
            timestamp: txn.updated_at,
        })
    }

    /// Steps 3-8 of the mutation protocol, all scoped to `unit`. Any error
    /// leaves the unit uncommitted; the caller rolls it back.
    async fn stage_mutation(
        &self,
        unit: &mut S::Unit,
        user_id: Uuid,
        kind: TransactionKind,
        amount: Decimal,
        description: Option<String>,
    ) -> AppResult<(Transaction, Decimal)> {
        let wallet = self
            .store
            .get_by_user_locked(unit, user_id)
            .await
            .map_err(|e| classify(e, user_id))?;

        if kind == TransactionKind::Withdraw && amount > wallet.balance {
            tracing::warn!(
                user_id = %user_id,
                current_balance = %wallet.balance,
                withdraw_amount = %amount,
                "Insufficient balance for withdrawal"
            );
            return Err(AppError::InsufficientBalance);
        }

        let new_balance = match kind {
            TransactionKind::Withdraw => wallet.balance - amount,
            TransactionKind::Deposit => wallet.balance + amount,
        };
        let new_version = wallet.version + 1;

        let mut txn = Transaction::pending(wallet.id, kind, amount, description);

        self.store
            .create_transaction(unit, &txn)
            .await
            .map_err(|e| classify(e, user_id))?;

        self.store
            .update_balance(unit, wallet.id, new_balance, new_version)
            .await
            .map_err(|e| classify(e, user_id))?;

        self.store
            .update_transaction_status(unit, txn.id, TransactionStatus::Completed)
            .await
            .map_err(|e| classify(e, user_id))?;

        txn.status = TransactionStatus::Completed;
        txn.updated_at = Utc::now();

        Ok((txn, new_balance))
    }

    /// Paginated history, read through the cache.
    pub async fn get_transaction_history(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<HistoryPage> {
        if limit <= 0 {
            return Err(AppError::InvalidRequest(
                "limit must be positive".to_string(),
            ));
        }
        if offset < 0 {
            return Err(AppError::InvalidRequest(
                "offset must not be negative".to_string(),
            ));
        }

        let page = page_number(offset, limit);
        let cache_key = history_key(user_id, page, limit);

        match self.cache.get(&cache_key).await {
            Ok(Some(payload)) => {
                // A malformed payload is treated as a miss.
                if let Ok(cached) = serde_json::from_str::<HistoryPage>(&payload) {
                    tracing::debug!(cache_key = %cache_key, "History cache hit");
                    return Ok(cached);
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(cache_key = %cache_key, error = %e, "History cache read failed");
            }
        }

        let wallet = self
            .store
            .get_by_user(user_id)
            .await
            .map_err(|e| classify(e, user_id))?;

        let transactions = self
            .store
            .list_transactions(wallet.id, limit, offset)
            .await
            .map_err(|e| classify(e, user_id))?;

        let total = self
            .store
            .count_transactions(wallet.id)
            .await
            .map_err(|e| classify(e, user_id))?;

        let response = HistoryPage {
            transactions: transactions.into_iter().map(Into::into).collect(),
            total,
            page,
            limit,
            total_pages: total_pages(total, limit),
        };

        match serde_json::to_string(&response) {
            Ok(payload) => {
                if let Err(e) = self.cache.set(&cache_key, &payload, self.history_ttl).await {
                    tracing::warn!(cache_key = %cache_key, error = %e, "History cache write failed");
                }
            }
            Err(e) => {
                tracing::warn!(cache_key = %cache_key, error = %e, "History page serialization failed");
            }
        }

        Ok(response)
    }

    /// Best-effort sweep of every cached history page for this user.
    async fn invalidate_history(&self, user_id: Uuid) {
        match self.cache.delete_prefix(&history_prefix(user_id)).await {
            Ok(0) => {}
            Ok(deleted) => {
                tracing::info!(user_id = %user_id, deleted, "Invalidated history cache");
            }
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "History cache invalidation failed");
            }
        }
    }
}

fn classify(err: StoreError, user_id: Uuid) -> AppError {
    match err {
        StoreError::WalletNotFound => AppError::WalletNotFound(user_id.to_string()),
        StoreError::DuplicateWallet => AppError::DuplicateWallet,
        StoreError::OptimisticLock => AppError::VersionConflict,
        err @ StoreError::Database(_) => AppError::Repository(err),
    }
}
