/**
 * Authentication
 * Bearer JWT verification guarding the admin routes
 */
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, INVALID_TOKEN, NO_CREDENTIALS};
use crate::AppState;

/// Default lifetime of an issued access token, in minutes.
pub const ACCESS_TOKEN_EXPIRY_MINUTES: i64 = 60;

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

/// Create an access token for `subject`, valid for `ttl`.
pub fn issue_access_token(
    secret: &str,
    subject: &str,
    role: &str,
    ttl: Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: subject.to_string(),
        role: role.to_string(),
        exp: (now + ttl).timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Verify and decode access token
pub fn verify_access_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Extract bearer token from Authorization header
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Rejects requests without a valid bearer token; on success the decoded
/// [`Claims`] are available to handlers as a request extension.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(request.headers()).ok_or(ApiError::Unauthorized(NO_CREDENTIALS))?;

    let claims = verify_access_token(&state.config.jwt_secret, token).map_err(|e| {
        tracing::warn!("Rejected bearer token: {}", e);
        ApiError::Unauthorized(INVALID_TOKEN)
    })?;

    tracing::debug!(sub = %claims.sub, "authenticated admin request");
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
