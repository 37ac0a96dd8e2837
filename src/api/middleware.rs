//! API Middleware
//!
//! Caller-identity extraction. Authentication itself happens upstream; this
//! service only consumes the verified user id the gateway forwards.

use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

/// Verified request user from the X-User-Id header
#[derive(Debug, Clone, Copy)]
pub struct RequestUser {
    pub user_id: Uuid,
}

/// Require a verified user identity on every wallet route.
pub async fn identity_middleware(
    headers: HeaderMap,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let user_id = match headers
        .get("X-User-Id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
    {
        Some(user_id) => user_id,
        None => {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": "Missing or invalid X-User-Id header",
                    "error_code": "unauthenticated"
                })),
            )
                .into_response());
        }
    };

    request.extensions_mut().insert(RequestUser { user_id });

    Ok(next.run(request).await)
}
