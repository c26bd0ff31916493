//! API key authentication middleware

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::api_key::ApiKey;

/// Extractor that requires a valid, rate-limited API key
///
/// The key is taken from either:
/// - Authorization header: `Bearer <secret>`
/// - X-API-Key header: `<secret>`
///
/// Inactive, expired and post-rotation secrets are rejected here, the
/// instant the stored record says so.
#[derive(Debug, Clone)]
pub struct RequireApiKey(pub ApiKey);

impl FromRequestParts<AppState> for RequireApiKey {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let secret = extract_secret_from_headers(&parts.headers)?;

        debug!(
            prefix = %secret.chars().take(8).collect::<String>(),
            "Authenticating API key"
        );

        let api_key = state
            .api_keys
            .validate(&secret)
            .await
            .map_err(ApiError::from)?
            .ok_or_else(|| ApiError::unauthorized("Invalid API key"))?;

        let decision = state.api_keys.check_rate_limit(&api_key).await;

        if !decision.allowed {
            let window = decision
                .exhausted
                .map(|w| w.to_string())
                .unwrap_or_else(|| "per_minute".to_string());

            return Err(ApiError::rate_limited(format!(
                "Rate limit exceeded ({}); retry in {}s",
                window, decision.reset_in_seconds
            )));
        }

        Ok(RequireApiKey(api_key))
    }
}

fn extract_secret_from_headers(headers: &axum::http::HeaderMap) -> Result<String, ApiError> {
    // Authorization header takes precedence
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        let auth_str = auth_header
            .to_str()
            .map_err(|_| ApiError::bad_request("Invalid Authorization header encoding"))?;

        if let Some(token) = auth_str.strip_prefix("Bearer ") {
            return Ok(token.trim().to_string());
        }
    }

    if let Some(api_key_header) = headers.get("x-api-key") {
        let key = api_key_header
            .to_str()
            .map_err(|_| ApiError::bad_request("Invalid X-API-Key header encoding"))?;

        return Ok(key.trim().to_string());
    }

    Err(ApiError::unauthorized(
        "API key required. Provide via 'Authorization: Bearer <key>' or 'X-API-Key: <key>' header",
    ))
}
