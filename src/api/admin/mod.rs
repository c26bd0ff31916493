//! Admin API endpoints for credential administration

pub mod api_keys;
pub mod scopes;

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use super::state::AppState;

/// Create admin API router
pub fn create_admin_router() -> Router<AppState> {
    Router::new()
        // API key management
        .route("/api-keys", get(api_keys::list_api_keys))
        .route("/api-keys", post(api_keys::create_api_key))
        .route("/api-keys/{key_id}", get(api_keys::get_api_key))
        .route("/api-keys/{key_id}", put(api_keys::update_api_key))
        .route("/api-keys/{key_id}", delete(api_keys::delete_api_key))
        .route("/api-keys/{key_id}/rotate", post(api_keys::rotate_api_key))
        .route(
            "/api-keys/{key_id}/activate",
            post(api_keys::activate_api_key),
        )
        .route(
            "/api-keys/{key_id}/deactivate",
            post(api_keys::deactivate_api_key),
        )
        .route("/api-keys/{key_id}/usage", get(api_keys::get_api_key_usage))
        // Scope catalog (read-only)
        .route("/scopes", get(scopes::list_scopes))
}
