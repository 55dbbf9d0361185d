//! API middleware

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{info, warn};

use crate::auth::{self, Claims};
use crate::error::ApiError;
use crate::AppState;

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// Authentication middleware
///
/// Verifies the bearer token and stores the raw claims plus the verified
/// [`core_kernel::Actor`] in the request extensions for handlers to pick
/// up. Role enforcement happens later, in the domain services.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = bearer_token(request.headers()) else {
        warn!("Missing or malformed Authorization header");
        return Err(ApiError::Unauthorized);
    };

    let claims = auth::validate_token(token, &state.config.jwt_secret).map_err(|err| {
        warn!(error = ?err, "Token validation failed");
        ApiError::Unauthorized
    })?;
    let actor = auth::actor_from_claims(&claims).map_err(|err| {
        warn!(error = ?err, "Token carried unusable claims");
        ApiError::Unauthorized
    })?;

    request.extensions_mut().insert(claims);
    request.extensions_mut().insert(actor);
    Ok(next.run(request).await)
}

/// Audit logging middleware
///
/// Every request is logged with its caller, outcome, and latency.
pub async fn audit_middleware(
    State(_state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let user_id = request
        .extensions()
        .get::<Claims>()
        .map(|claims| claims.sub.clone())
        .unwrap_or_else(|| "anonymous".to_string());

    let started = Instant::now();
    let response = next.run(request).await;

    info!(
        method = %method,
        uri = %uri,
        user = %user_id,
        status = %response.status().as_u16(),
        duration_ms = started.elapsed().as_millis() as u64,
        "API request"
    );

    response
}
