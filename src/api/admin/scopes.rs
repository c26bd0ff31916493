//! Scope catalog admin endpoints

use axum::{extract::State, Json};
use serde::Serialize;

use crate::api::middleware::RequireAdmin;
use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::scope::ScopeCatalog;

/// One scope entry in a category group
#[derive(Debug, Clone, Serialize)]
pub struct ScopeResponse {
    pub scope: String,
    pub description: String,
}

/// Scopes grouped by category for bulk selection in clients
#[derive(Debug, Clone, Serialize)]
pub struct ScopeCategoryResponse {
    pub category: String,
    pub scopes: Vec<ScopeResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListScopesResponse {
    pub categories: Vec<ScopeCategoryResponse>,
}

fn catalog_response(catalog: &ScopeCatalog) -> ListScopesResponse {
    let categories = catalog
        .by_category()
        .into_iter()
        .map(|(category, scopes)| ScopeCategoryResponse {
            category: category.to_string(),
            scopes: scopes
                .into_iter()
                .map(|s| ScopeResponse {
                    scope: s.scope.clone(),
                    description: s.description.clone(),
                })
                .collect(),
        })
        .collect();

    ListScopesResponse { categories }
}

/// GET /admin/scopes
pub async fn list_scopes(
    State(state): State<AppState>,
    _admin: RequireAdmin,
) -> Result<Json<ListScopesResponse>, ApiError> {
    Ok(Json(catalog_response(state.api_keys.catalog())))
}
