//! HTTP API tests
//!
//! Drive the full router over the in-memory store with `oneshot` requests.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;
use uuid::Uuid;

use digital_wallet::api;
use digital_wallet::cache::MemoryHistoryCache;
use digital_wallet::ledger::WalletLedger;
use digital_wallet::store::MemoryWalletStore;

fn test_router() -> Router {
    let ledger = WalletLedger::new(MemoryWalletStore::new(), MemoryHistoryCache::new());
    api::build_router(ledger)
}

fn request(method: &str, uri: &str, user_id: Option<Uuid>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user_id) = user_id {
        builder = builder.header("X-User-Id", user_id.to_string());
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_needs_no_identity() {
    let app = test_router();

    let response = app
        .oneshot(request("GET", "/health", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized() {
    let app = test_router();

    let response = app
        .oneshot(request(
            "POST",
            "/api/v1/wallets/",
            None,
            Some(json!({"currency": "IDR"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error_code"], "unauthenticated");
}

#[tokio::test]
async fn test_create_wallet_and_duplicate() {
    let app = test_router();
    let user_id = Uuid::new_v4();

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/wallets/",
            Some(user_id),
            Some(json!({"currency": "IDR"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["user_id"], user_id.to_string());
    assert_eq!(body["currency"], "IDR");
    assert_eq!(body["balance"], "0");

    let response = app
        .oneshot(request(
            "POST",
            "/api/v1/wallets/",
            Some(user_id),
            Some(json!({"currency": "IDR"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["error_code"], "wallet_already_exists");
}

#[tokio::test]
async fn test_invalid_currency_rejected() {
    let app = test_router();

    let response = app
        .oneshot(request(
            "POST",
            "/api/v1/wallets/",
            Some(Uuid::new_v4()),
            Some(json!({"currency": "RUPIAH"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error_code"], "invalid_request");
}

#[tokio::test]
async fn test_deposit_withdraw_and_balance_flow() {
    let app = test_router();
    let user_id = Uuid::new_v4();

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/wallets/",
            Some(user_id),
            Some(json!({"currency": "IDR"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/wallets/deposit",
            Some(user_id),
            Some(json!({"amount": "1000.00", "description": "payday"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["new_balance"], "1000.00");
    assert_eq!(body["status"], "completed");

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/wallets/withdraw",
            Some(user_id),
            Some(json!({"amount": "400.00"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["new_balance"], "600.00");

    let response = app
        .oneshot(request(
            "GET",
            "/api/v1/wallets/balance",
            Some(user_id),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["balance"], "600.00");
    assert_eq!(body["currency"], "IDR");
}

#[tokio::test]
async fn test_overdraft_maps_to_insufficient_balance() {
    let app = test_router();
    let user_id = Uuid::new_v4();

    app.clone()
        .oneshot(request(
            "POST",
            "/api/v1/wallets/",
            Some(user_id),
            Some(json!({"currency": "IDR"})),
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(request(
            "POST",
            "/api/v1/wallets/withdraw",
            Some(user_id),
            Some(json!({"amount": "50.00"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error_code"], "insufficient_balance");
}

#[tokio::test]
async fn test_nonpositive_amount_rejected() {
    let app = test_router();
    let user_id = Uuid::new_v4();

    app.clone()
        .oneshot(request(
            "POST",
            "/api/v1/wallets/",
            Some(user_id),
            Some(json!({"currency": "IDR"})),
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(request(
            "POST",
            "/api/v1/wallets/deposit",
            Some(user_id),
            Some(json!({"amount": "-10.00"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error_code"], "invalid_request");
}

#[tokio::test]
async fn test_balance_without_wallet_is_not_found() {
    let app = test_router();

    let response = app
        .oneshot(request(
            "GET",
            "/api/v1/wallets/balance",
            Some(Uuid::new_v4()),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error_code"], "wallet_not_found");
}

#[tokio::test]
async fn test_transaction_history_pagination() {
    let app = test_router();
    let user_id = Uuid::new_v4();

    app.clone()
        .oneshot(request(
            "POST",
            "/api/v1/wallets/",
            Some(user_id),
            Some(json!({"currency": "IDR"})),
        ))
        .await
        .unwrap();

    for amount in ["10.00", "20.00", "30.00"] {
        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/api/v1/wallets/deposit",
                Some(user_id),
                Some(json!({"amount": amount})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(request(
            "GET",
            "/api/v1/wallets/transactions?limit=2&offset=0",
            Some(user_id),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], 3);
    assert_eq!(body["page"], 1);
    assert_eq!(body["limit"], 2);
    assert_eq!(body["total_pages"], 2);
    assert_eq!(body["transactions"].as_array().unwrap().len(), 2);
    assert_eq!(body["transactions"][0]["amount"], "30.00");
    assert_eq!(body["transactions"][0]["type"], "deposit");

    let response = app
        .oneshot(request(
            "GET",
            "/api/v1/wallets/transactions?limit=2&offset=2",
            Some(user_id),
            None,
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["page"], 2);
    assert_eq!(body["transactions"].as_array().unwrap().len(), 1);
    assert_eq!(body["transactions"][0]["amount"], "10.00");
}
