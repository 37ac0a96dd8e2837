//! HTTP API
//!
//! Thin transport layer over the ledger engine: routing, identity
//! extraction and request validation. Everything stateful lives in the
//! engine and its collaborators.

pub mod middleware;
pub mod routes;

use axum::{middleware as axum_middleware, Router};
use tower_http::trace::TraceLayer;

pub use routes::AppState;

use crate::cache::HistoryCache;
use crate::ledger::WalletLedger;
use crate::store::WalletStore;

/// Build the full application router around a ledger engine.
pub fn build_router<S, C>(ledger: WalletLedger<S, C>) -> Router
where
    S: WalletStore + 'static,
    C: HistoryCache + 'static,
{
    let state = AppState {
        ledger: std::sync::Arc::new(ledger),
    };

    let wallet_routes = routes::create_router::<S, C>()
        .layer(axum_middleware::from_fn(middleware::identity_middleware));

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/api/v1/wallets/", wallet_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
