//! Wallet record
//!
//! One wallet per user. The balance is a fixed-point decimal that is never
//! negative, and the version counter advances by exactly one on every
//! successful mutation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub balance: Decimal,
    pub currency: String,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Create a fresh wallet: zero balance, version 1.
    pub fn new(user_id: Uuid, currency: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            balance: Decimal::ZERO,
            currency,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }
}
