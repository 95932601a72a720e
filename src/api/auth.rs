//! API key authentication middleware

use std::sync::Arc;

use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use secrecy::ExposeSecret;

use super::ApiState;
use super::error::ErrorResponse;

/// Extract API key from Authorization header
fn extract_api_key(req: &Request) -> Option<&str> {
    req.headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Middleware to verify API key on function routes
pub async fn require_api_key(
    State(state): State<Arc<ApiState>>,
    req: Request,
    next: Next,
) -> Response {
    // If no API key configured, allow all requests (development mode)
    let Some(expected_key) = &state.api_key else {
        return next.run(req).await;
    };

    match extract_api_key(&req) {
        Some(key) if key == expected_key.expose_secret() => next.run(req).await,
        Some(_) => {
            tracing::warn!("invalid API key provided");
            unauthenticated("invalid API key")
        }
        None => {
            tracing::debug!("no API key provided");
            unauthenticated("missing API key")
        }
    }
}

fn unauthenticated(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}
