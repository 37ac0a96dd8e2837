//! Transaction record
//!
//! Every balance mutation appends exactly one transaction row. Rows are
//! created `Pending` inside the unit of work and flipped to `Completed`
//! before it commits; history is append-only afterwards.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Direction of a balance mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Withdraw,
    Deposit,
}

/// Settlement state of a transaction row.
///
/// `Failed` exists in the schema but is not produced by the all-or-nothing
/// commit path: an aborted unit of work leaves no row at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

/// Unknown string form for a kind or status coming back from storage.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown {field} value: {value}")]
pub struct ParseEnumError {
    pub field: &'static str,
    pub value: String,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Withdraw => "withdraw",
            TransactionKind::Deposit => "deposit",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "withdraw" => Ok(TransactionKind::Withdraw),
            "deposit" => Ok(TransactionKind::Deposit),
            other => Err(ParseEnumError {
                field: "type",
                value: other.to_string(),
            }),
        }
    }
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(ParseEnumError {
                field: "status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub wallet_id: Uuid,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub status: TransactionStatus,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Create a pending transaction row for a mutation in flight.
    pub fn pending(
        wallet_id: Uuid,
        kind: TransactionKind,
        amount: Decimal,
        description: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            wallet_id,
            kind,
            amount,
            status: TransactionStatus::Pending,
            description,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_kind_string_roundtrip() {
        for kind in [TransactionKind::Withdraw, TransactionKind::Deposit] {
            assert_eq!(kind.as_str().parse::<TransactionKind>().unwrap(), kind);
        }
        assert!("transfer".parse::<TransactionKind>().is_err());
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Completed,
            TransactionStatus::Failed,
        ] {
            assert_eq!(
                status.as_str().parse::<TransactionStatus>().unwrap(),
                status
            );
        }
        assert!("settled".parse::<TransactionStatus>().is_err());
    }

    #[test]
    fn test_pending_transaction_defaults() {
        let wallet_id = Uuid::new_v4();
        let txn = Transaction::pending(wallet_id, TransactionKind::Deposit, dec!(250.50), None);

        assert_eq!(txn.wallet_id, wallet_id);
        assert_eq!(txn.status, TransactionStatus::Pending);
        assert_eq!(txn.amount, dec!(250.50));
        assert!(txn.description.is_none());
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let txn = Transaction::pending(
            Uuid::new_v4(),
            TransactionKind::Withdraw,
            dec!(10),
            Some("coffee".to_string()),
        );
        let json = serde_json::to_value(&txn).unwrap();

        assert_eq!(json["type"], "withdraw");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["description"], "coffee");
    }
}
