//! Postgres Balance Store
//!
//! Authoritative [`WalletStore`] implementation. Units of work are plain
//! sqlx transactions: dropping one without commit rolls it back, and the
//! row lock taken by `SELECT ... FOR UPDATE` is held until the transaction
//! ends either way.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::domain::{Transaction, TransactionStatus, Wallet};

use super::{StoreError, WalletStore};

/// Unit-of-work handle for the Postgres store.
pub type PgUnit = sqlx::Transaction<'static, Postgres>;

/// Postgres unique-violation error code (duplicate `user_id`).
const UNIQUE_VIOLATION: &str = "23505";

type WalletRow = (
    Uuid,
    Uuid,
    Decimal,
    String,
    i64,
    DateTime<Utc>,
    DateTime<Utc>,
);

type TransactionRow = (
    Uuid,
    Uuid,
    String,
    Decimal,
    String,
    Option<String>,
    DateTime<Utc>,
    DateTime<Utc>,
);

#[derive(Debug, Clone)]
pub struct PgWalletStore {
    pool: PgPool,
}

impl PgWalletStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn wallet_from_row(row: WalletRow) -> Wallet {
        let (id, user_id, balance, currency, version, created_at, updated_at) = row;
        Wallet {
            id,
            user_id,
            balance,
            currency,
            version,
            created_at,
            updated_at,
        }
    }

    fn transaction_from_row(row: TransactionRow) -> Result<Transaction, StoreError> {
        let (id, wallet_id, kind, amount, status, description, created_at, updated_at) = row;
        let kind = kind
            .parse()
            .map_err(|e: crate::domain::ParseEnumError| sqlx::Error::Decode(Box::new(e)))?;
        let status = status
            .parse()
            .map_err(|e: crate::domain::ParseEnumError| sqlx::Error::Decode(Box::new(e)))?;
        Ok(Transaction {
            id,
            wallet_id,
            kind,
            amount,
            status,
            description,
            created_at,
            updated_at,
        })
    }
}

#[async_trait]
impl WalletStore for PgWalletStore {
    type Unit = PgUnit;

    async fn begin(&self) -> Result<Self::Unit, StoreError> {
        Ok(self.pool.begin().await?)
    }

    async fn commit(&self, unit: Self::Unit) -> Result<(), StoreError> {
        Ok(unit.commit().await?)
    }

    async fn rollback(&self, unit: Self::Unit) -> Result<(), StoreError> {
        Ok(unit.rollback().await?)
    }

    async fn create(&self, wallet: &Wallet) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO wallets (id, user_id, balance, currency, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(wallet.id)
        .bind(wallet.user_id)
        .bind(wallet.balance)
        .bind(&wallet.currency)
        .bind(wallet.version)
        .bind(wallet.created_at)
        .bind(wallet.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                let is_duplicate = e
                    .as_database_error()
                    .and_then(|db| db.code())
                    .is_some_and(|code| code == UNIQUE_VIOLATION);
                if is_duplicate {
                    Err(StoreError::DuplicateWallet)
                } else {
                    Err(StoreError::Database(e))
                }
            }
        }
    }

    async fn get_by_user(&self, user_id: Uuid) -> Result<Wallet, StoreError> {
        let row: Option<WalletRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, balance, currency, version, created_at, updated_at
            FROM wallets
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::wallet_from_row)
            .ok_or(StoreError::WalletNotFound)
    }

    async fn get_by_user_locked(
        &self,
        unit: &mut Self::Unit,
        user_id: Uuid,
    ) -> Result<Wallet, StoreError> {
        let row: Option<WalletRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, balance, currency, version, created_at, updated_at
            FROM wallets
            WHERE user_id = $1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut **unit)
        .await?;

        row.map(Self::wallet_from_row)
            .ok_or(StoreError::WalletNotFound)
    }

    async fn update_balance(
        &self,
        unit: &mut Self::Unit,
        wallet_id: Uuid,
        new_balance: Decimal,
        new_version: i64,
    ) -> Result<(), StoreError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE wallets
            SET balance = $2, version = $3, updated_at = NOW()
            WHERE id = $1 AND version = $4
            "#,
        )
        .bind(wallet_id)
        .bind(new_balance)
        .bind(new_version)
        .bind(new_version - 1)
        .execute(&mut **unit)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(StoreError::OptimisticLock);
        }

        Ok(())
    }

    async fn create_transaction(
        &self,
        unit: &mut Self::Unit,
        txn: &Transaction,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO transactions (id, wallet_id, type, amount, status, description, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(txn.id)
        .bind(txn.wallet_id)
        .bind(txn.kind.as_str())
        .bind(txn.amount)
        .bind(txn.status.as_str())
        .bind(&txn.description)
        .bind(txn.created_at)
        .bind(txn.updated_at)
        .execute(&mut **unit)
        .await?;

        Ok(())
    }

    async fn update_transaction_status(
        &self,
        unit: &mut Self::Unit,
        txn_id: Uuid,
        status: TransactionStatus,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE transactions
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(txn_id)
        .bind(status.as_str())
        .execute(&mut **unit)
        .await?;

        Ok(())
    }

    async fn list_transactions(
        &self,
        wallet_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>, StoreError> {
        let rows: Vec<TransactionRow> = sqlx::query_as(
            r#"
            SELECT id, wallet_id, type, amount, status, description, created_at, updated_at
            FROM transactions
            WHERE wallet_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(wallet_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::transaction_from_row).collect()
    }

    async fn count_transactions(&self, wallet_id: Uuid) -> Result<i64, StoreError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE wallet_id = $1")
                .bind(wallet_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}
