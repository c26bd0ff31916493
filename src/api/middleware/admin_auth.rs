//! Admin authentication middleware
//!
//! Admin endpoints require an API key carrying the `admin:keys` scope.
//! The authenticated key also establishes the account context every
//! lifecycle operation runs under.

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::account::AccountId;
use crate::domain::api_key::ApiKey;

use super::auth::RequireApiKey;

/// Scope required for key-administration endpoints
pub const ADMIN_KEYS_SCOPE: &str = "admin:keys";

/// Extractor that requires admin access
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub ApiKey);

impl RequireAdmin {
    /// Account the authenticated caller belongs to
    pub fn account(&self) -> &AccountId {
        self.0.account_id()
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireApiKey(api_key) = RequireApiKey::from_request_parts(parts, state).await?;

        if !api_key.has_scope(ADMIN_KEYS_SCOPE) {
            return Err(ApiError::forbidden(format!(
                "Admin access requires the '{}' scope",
                ADMIN_KEYS_SCOPE
            )));
        }

        debug!(api_key_id = %api_key.id(), account = %api_key.account_id(), "Admin access granted");

        Ok(RequireAdmin(api_key))
    }
}
