//! API Routes
//!
//! HTTP endpoint definitions for the wallet service. Requests arrive with a
//! verified user identity (see middleware) and already-typed JSON bodies;
//! handlers re-check the few invariants the ledger engine also defends.

use std::sync::Arc;

use axum::{
    extract::{Extension, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::cache::HistoryCache;
use crate::error::AppError;
use crate::ledger::{BalanceInfo, HistoryPage, MutationReceipt, WalletInfo, WalletLedger};
use crate::store::WalletStore;

use super::middleware::RequestUser;

/// Default page size for transaction history
const DEFAULT_HISTORY_LIMIT: i64 = 10;

/// Largest page size a caller may request
const MAX_HISTORY_LIMIT: i64 = 100;

const MAX_DESCRIPTION_LEN: usize = 500;

/// Shared application state
pub struct AppState<S, C> {
    pub ledger: Arc<WalletLedger<S, C>>,
}

impl<S, C> Clone for AppState<S, C> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
        }
    }
}

// =========================================================================
// Request types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct CreateWalletRequest {
    pub currency: String,
}

#[derive(Debug, Deserialize)]
pub struct MutationRequest {
    pub amount: Decimal,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

fn validate_currency(currency: &str) -> Result<(), AppError> {
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::InvalidRequest(
            "currency must be a 3-letter code".to_string(),
        ));
    }
    Ok(())
}

fn validate_description(description: &Option<String>) -> Result<(), AppError> {
    if let Some(description) = description {
        if description.len() > MAX_DESCRIPTION_LEN {
            return Err(AppError::InvalidRequest(format!(
                "description must be at most {} characters",
                MAX_DESCRIPTION_LEN
            )));
        }
    }
    Ok(())
}

// =========================================================================
// Wallet router
// =========================================================================

/// Create the wallet API router
pub fn create_router<S, C>() -> Router<AppState<S, C>>
where
    S: WalletStore + 'static,
    C: HistoryCache + 'static,
{
    Router::new()
        .route("/", post(create_wallet::<S, C>))
        .route("/balance", get(get_balance::<S, C>))
        .route("/withdraw", post(withdraw::<S, C>))
        .route("/deposit", post(deposit::<S, C>))
        .route("/transactions", get(get_transaction_history::<S, C>))
}

/// POST /api/v1/wallets
async fn create_wallet<S, C>(
    State(state): State<AppState<S, C>>,
    Extension(user): Extension<RequestUser>,
    Json(request): Json<CreateWalletRequest>,
) -> Result<(StatusCode, Json<WalletInfo>), AppError>
where
    S: WalletStore,
    C: HistoryCache,
{
    validate_currency(&request.currency)?;

    let wallet = state
        .ledger
        .create_wallet(user.user_id, request.currency)
        .await?;

    Ok((StatusCode::CREATED, Json(wallet)))
}

/// GET /api/v1/wallets/balance
async fn get_balance<S, C>(
    State(state): State<AppState<S, C>>,
    Extension(user): Extension<RequestUser>,
) -> Result<Json<BalanceInfo>, AppError>
where
    S: WalletStore,
    C: HistoryCache,
{
    let balance = state.ledger.get_balance(user.user_id).await?;

    Ok(Json(balance))
}

/// POST /api/v1/wallets/withdraw
async fn withdraw<S, C>(
    State(state): State<AppState<S, C>>,
    Extension(user): Extension<RequestUser>,
    Json(request): Json<MutationRequest>,
) -> Result<Json<MutationReceipt>, AppError>
where
    S: WalletStore,
    C: HistoryCache,
{
    validate_description(&request.description)?;

    let receipt = state
        .ledger
        .withdraw(user.user_id, request.amount, request.description)
        .await?;

    Ok(Json(receipt))
}

/// POST /api/v1/wallets/deposit
async fn deposit<S, C>(
    State(state): State<AppState<S, C>>,
    Extension(user): Extension<RequestUser>,
    Json(request): Json<MutationRequest>,
) -> Result<Json<MutationReceipt>, AppError>
where
    S: WalletStore,
    C: HistoryCache,
{
    validate_description(&request.description)?;

    let receipt = state
        .ledger
        .deposit(user.user_id, request.amount, request.description)
        .await?;

    Ok(Json(receipt))
}

/// GET /api/v1/wallets/transactions?limit=&offset=
async fn get_transaction_history<S, C>(
    State(state): State<AppState<S, C>>,
    Extension(user): Extension<RequestUser>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryPage>, AppError>
where
    S: WalletStore,
    C: HistoryCache,
{
    let (limit, offset) = normalize_pagination(query.limit, query.offset);

    let page = state
        .ledger
        .get_transaction_history(user.user_id, limit, offset)
        .await?;

    Ok(Json(page))
}

/// Clamp caller-supplied pagination to sane bounds.
fn normalize_pagination(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = match limit {
        Some(limit) if limit > 0 => limit.min(MAX_HISTORY_LIMIT),
        _ => DEFAULT_HISTORY_LIMIT,
    };
    let offset = offset.unwrap_or(0).max(0);

    (limit, offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutation_request_deserialize() {
        let json = r#"{"amount": "100.50", "description": "groceries"}"#;
        let request: MutationRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.amount.to_string(), "100.50");
        assert_eq!(request.description, Some("groceries".to_string()));

        let bare: MutationRequest = serde_json::from_str(r#"{"amount": 25}"#).unwrap();
        assert!(bare.description.is_none());
    }

    #[test]
    fn test_currency_validation() {
        assert!(validate_currency("IDR").is_ok());
        assert!(validate_currency("usd").is_ok());
        assert!(validate_currency("EURO").is_err());
        assert!(validate_currency("E1").is_err());
        assert!(validate_currency("").is_err());
    }

    #[test]
    fn test_description_length_limit() {
        assert!(validate_description(&None).is_ok());
        assert!(validate_description(&Some("ok".to_string())).is_ok());
        assert!(validate_description(&Some("x".repeat(501))).is_err());
    }

    #[test]
    fn test_normalize_pagination() {
        assert_eq!(normalize_pagination(None, None), (10, 0));
        assert_eq!(normalize_pagination(Some(0), Some(-5)), (10, 0));
        assert_eq!(normalize_pagination(Some(250), Some(20)), (100, 20));
        assert_eq!(normalize_pagination(Some(25), Some(50)), (25, 50));
    }
}
