//! API key management admin endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;
use validator::Validate;

use crate::api::middleware::RequireAdmin;
use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::api_key::{
    filter_by_search, ApiKey, ApiKeyDraft, ApiKeyId, ApiKeyPatch, RateLimits,
};
use crate::domain::usage::{ApiKeyUsageStats, EndpointCount};

/// Request to create a new API key
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateApiKeyRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"))]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[validate(length(min = 1, message = "At least one scope is required"))]
    pub scopes: Vec<String>,
    #[validate(range(min = 1, message = "Rate limit must be at least 1"))]
    pub rate_limit_per_minute: u32,
    #[validate(range(min = 1, message = "Rate limit must be at least 1"))]
    pub rate_limit_per_hour: u32,
    #[validate(range(min = 1, message = "Rate limit must be at least 1"))]
    pub rate_limit_per_day: u32,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Request to update an API key. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateApiKeyRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(length(min = 1, message = "At least one scope is required"))]
    pub scopes: Option<Vec<String>>,
    #[validate(range(min = 1, message = "Rate limit must be at least 1"))]
    pub rate_limit_per_minute: Option<u32>,
    #[validate(range(min = 1, message = "Rate limit must be at least 1"))]
    pub rate_limit_per_hour: Option<u32>,
    #[validate(range(min = 1, message = "Rate limit must be at least 1"))]
    pub rate_limit_per_day: Option<u32>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Query parameters for the key listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListApiKeysQuery {
    #[serde(default)]
    pub include_inactive: bool,
    /// Case-insensitive substring match against name or description
    pub search: Option<String>,
}

/// API key response (never carries secret material)
#[derive(Debug, Clone, Serialize)]
pub struct ApiKeyResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub key_prefix: String,
    pub scopes: Vec<String>,
    pub rate_limit_per_minute: u32,
    pub rate_limit_per_hour: u32,
    pub rate_limit_per_day: u32,
    pub expires_at: Option<String>,
    pub is_active: bool,
    pub request_count: u64,
    pub last_used_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&ApiKey> for ApiKeyResponse {
    fn from(key: &ApiKey) -> Self {
        Self {
            id: key.id().to_string(),
            name: key.name().to_string(),
            description: key.description().map(String::from),
            key_prefix: key.key_prefix().to_string(),
            scopes: key.scopes().iter().cloned().collect(),
            rate_limit_per_minute: key.rate_limits().per_minute,
            rate_limit_per_hour: key.rate_limits().per_hour,
            rate_limit_per_day: key.rate_limits().per_day,
            expires_at: key.expires_at().map(|dt| dt.to_rfc3339()),
            is_active: key.is_active(),
            request_count: key.request_count(),
            last_used_at: key.last_used_at().map(|dt| dt.to_rfc3339()),
            created_at: key.created_at().to_rfc3339(),
            updated_at: key.updated_at().to_rfc3339(),
        }
    }
}

/// Response carrying the one-time plaintext secret (creation only)
#[derive(Debug, Clone, Serialize)]
pub struct ApiKeyCreatedResponse {
    #[serde(flatten)]
    pub key: ApiKeyResponse,
    /// The full secret. Shown exactly once; only the prefix survives.
    pub api_key: String,
}

/// Response after rotating a key's secret
#[derive(Debug, Clone, Serialize)]
pub struct RotateApiKeyResponse {
    /// The new full secret. Shown exactly once.
    pub api_key: String,
    pub key_prefix: String,
}

/// List API keys response
#[derive(Debug, Clone, Serialize)]
pub struct ListApiKeysResponse {
    pub api_keys: Vec<ApiKeyResponse>,
    pub total: usize,
}

/// Usage statistics response
#[derive(Debug, Clone, Serialize)]
pub struct UsageStatsResponse {
    pub total_requests: u64,
    pub requests_last_24h: u64,
    pub requests_last_7d: u64,
    pub requests_last_30d: u64,
    pub avg_response_time_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_rate: Option<f64>,
    pub most_used_endpoints: Vec<EndpointCountResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointCountResponse {
    pub method: String,
    pub endpoint: String,
    pub count: u64,
}

impl From<EndpointCount> for EndpointCountResponse {
    fn from(entry: EndpointCount) -> Self {
        Self {
            method: entry.method,
            endpoint: entry.endpoint,
            count: entry.count,
        }
    }
}

impl From<ApiKeyUsageStats> for UsageStatsResponse {
    fn from(stats: ApiKeyUsageStats) -> Self {
        Self {
            total_requests: stats.total_requests,
            requests_last_24h: stats.requests_last_24h,
            requests_last_7d: stats.requests_last_7d,
            requests_last_30d: stats.requests_last_30d,
            avg_response_time_ms: stats.avg_response_time_ms,
            error_rate: stats.error_rate,
            most_used_endpoints: stats
                .most_used_endpoints
                .into_iter()
                .map(EndpointCountResponse::from)
                .collect(),
        }
    }
}

fn validated<T: Validate>(request: T) -> Result<T, ApiError> {
    request
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    Ok(request)
}

/// GET /admin/api-keys
pub async fn list_api_keys(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Query(query): Query<ListApiKeysQuery>,
) -> Result<Json<ListApiKeysResponse>, ApiError> {
    debug!(account = %admin.account(), "Listing API keys");

    let keys = state
        .api_keys
        .list(admin.account(), query.include_inactive)
        .await
        .map_err(ApiError::from)?;

    let responses: Vec<ApiKeyResponse> = match query.search.as_deref() {
        Some(needle) if !needle.is_empty() => filter_by_search(&keys, needle)
            .into_iter()
            .map(ApiKeyResponse::from)
            .collect(),
        _ => keys.iter().map(ApiKeyResponse::from).collect(),
    };

    let total = responses.len();

    Ok(Json(ListApiKeysResponse {
        api_keys: responses,
        total,
    }))
}

/// POST /admin/api-keys
pub async fn create_api_key(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Json(request): Json<CreateApiKeyRequest>,
) -> Result<Json<ApiKeyCreatedResponse>, ApiError> {
    let request = validated(request)?;

    debug!(account = %admin.account(), name = %request.name, "Creating API key");

    let mut draft = ApiKeyDraft::new(
        request.name,
        request.scopes.into_iter().collect(),
        RateLimits::new(
            request.rate_limit_per_minute,
            request.rate_limit_per_hour,
            request.rate_limit_per_day,
        ),
    );
    draft.description = request.description;
    draft.expires_at = request.expires_at;

    let created = state
        .api_keys
        .create(admin.account(), draft)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(ApiKeyCreatedResponse {
        key: ApiKeyResponse::from(&created.api_key),
        api_key: created.secret,
    }))
}

/// GET /admin/api-keys/{key_id}
pub async fn get_api_key(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Path(key_id): Path<Uuid>,
) -> Result<Json<ApiKeyResponse>, ApiError> {
    let key = state
        .api_keys
        .get(admin.account(), ApiKeyId::from(key_id))
        .await
        .map_err(ApiError::from)?;

    Ok(Json(ApiKeyResponse::from(&key)))
}

/// PUT /admin/api-keys/{key_id}
pub async fn update_api_key(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Path(key_id): Path<Uuid>,
    Json(request): Json<UpdateApiKeyRequest>,
) -> Result<Json<ApiKeyResponse>, ApiError> {
    let request = validated(request)?;

    debug!(account = %admin.account(), %key_id, "Updating API key");

    let rate_limits = match (
        request.rate_limit_per_minute,
        request.rate_limit_per_hour,
        request.rate_limit_per_day,
    ) {
        (None, None, None) => None,
        (minute, hour, day) => {
            // Partial limit updates fill the gaps from the current record
            let current = state
                .api_keys
                .get(admin.account(), ApiKeyId::from(key_id))
                .await
                .map_err(ApiError::from)?
                .rate_limits();

            Some(RateLimits::new(
                minute.unwrap_or(current.per_minute),
                hour.unwrap_or(current.per_hour),
                day.unwrap_or(current.per_day),
            ))
        }
    };

    let patch = ApiKeyPatch {
        name: request.name,
        description: request.description,
        scopes: request.scopes.map(|s| s.into_iter().collect()),
        rate_limits,
        expires_at: request.expires_at.map(Some),
    };

    let updated = state
        .api_keys
        .update(admin.account(), ApiKeyId::from(key_id), patch)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(ApiKeyResponse::from(&updated)))
}

/// DELETE /admin/api-keys/{key_id}
pub async fn delete_api_key(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Path(key_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    debug!(account = %admin.account(), %key_id, "Deleting API key");

    state
        .api_keys
        .delete(admin.account(), ApiKeyId::from(key_id))
        .await
        .map_err(ApiError::from)?;

    Ok(Json(serde_json::json!({
        "deleted": true,
        "id": key_id.to_string()
    })))
}

/// POST /admin/api-keys/{key_id}/rotate
pub async fn rotate_api_key(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Path(key_id): Path<Uuid>,
) -> Result<Json<RotateApiKeyResponse>, ApiError> {
    debug!(account = %admin.account(), %key_id, "Rotating API key");

    let rotated = state
        .api_keys
        .rotate(admin.account(), ApiKeyId::from(key_id))
        .await
        .map_err(ApiError::from)?;

    Ok(Json(RotateApiKeyResponse {
        api_key: rotated.secret,
        key_prefix: rotated.api_key.key_prefix().to_string(),
    }))
}

/// POST /admin/api-keys/{key_id}/activate
pub async fn activate_api_key(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Path(key_id): Path<Uuid>,
) -> Result<Json<ApiKeyResponse>, ApiError> {
    let key = state
        .api_keys
        .set_active(admin.account(), ApiKeyId::from(key_id), true)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(ApiKeyResponse::from(&key)))
}

/// POST /admin/api-keys/{key_id}/deactivate
pub async fn deactivate_api_key(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Path(key_id): Path<Uuid>,
) -> Result<Json<ApiKeyResponse>, ApiError> {
    let key = state
        .api_keys
        .set_active(admin.account(), ApiKeyId::from(key_id), false)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(ApiKeyResponse::from(&key)))
}

/// GET /admin/api-keys/{key_id}/usage
pub async fn get_api_key_usage(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Path(key_id): Path<Uuid>,
) -> Result<Json<UsageStatsResponse>, ApiError> {
    let stats = state
        .api_keys
        .usage(admin.account(), ApiKeyId::from(key_id))
        .await
        .map_err(ApiError::from)?;

    Ok(Json(UsageStatsResponse::from(stats)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::AccountId;
    use std::collections::BTreeSet;

    #[test]
    fn test_create_request_deserialization() {
        let json = r#"{
            "name": "Prod",
            "scopes": ["reports:read"],
            "rate_limit_per_minute": 60,
            "rate_limit_per_hour": 1000,
            "rate_limit_per_day": 10000
        }"#;

        let request: CreateApiKeyRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.name, "Prod");
        assert_eq!(request.scopes, vec!["reports:read"]);
        assert!(request.description.is_none());
        assert!(request.expires_at.is_none());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_create_request_validation() {
        let request = CreateApiKeyRequest {
            name: "".to_string(),
            description: None,
            scopes: vec!["reports:read".to_string()],
            rate_limit_per_minute: 60,
            rate_limit_per_hour: 1000,
            rate_limit_per_day: 10000,
            expires_at: None,
        };
        assert!(request.validate().is_err());

        let request = CreateApiKeyRequest {
            name: "Prod".to_string(),
            description: None,
            scopes: vec![],
            rate_limit_per_minute: 60,
            rate_limit_per_hour: 1000,
            rate_limit_per_day: 10000,
            expires_at: None,
        };
        assert!(request.validate().is_err());

        let request = CreateApiKeyRequest {
            name: "Prod".to_string(),
            description: None,
            scopes: vec!["reports:read".to_string()],
            rate_limit_per_minute: 0,
            rate_limit_per_hour: 1000,
            rate_limit_per_day: 10000,
            expires_at: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_update_request_empty_is_valid() {
        let request: UpdateApiKeyRequest = serde_json::from_str("{}").unwrap();

        assert!(request.validate().is_ok());
        assert!(request.name.is_none());
        assert!(request.scopes.is_none());
    }

    #[test]
    fn test_update_request_rejects_zero_limit() {
        let request = UpdateApiKeyRequest {
            rate_limit_per_minute: Some(0),
            ..Default::default()
        };

        assert!(request.validate().is_err());
    }

    #[test]
    fn test_list_query_defaults() {
        let query: ListApiKeysQuery = serde_json::from_str("{}").unwrap();

        assert!(!query.include_inactive);
        assert!(query.search.is_none());
    }

    #[test]
    fn test_api_key_response_from_entity() {
        let scopes: BTreeSet<String> = ["reports:read".to_string()].into_iter().collect();
        let key = ApiKey::new(
            ApiKeyId::generate(),
            AccountId::new("acme").unwrap(),
            "Prod",
            "sha256$hash",
            "pa_test_abc12345",
            scopes,
            RateLimits::new(60, 1000, 10000),
        );

        let response = ApiKeyResponse::from(&key);

        assert_eq!(response.name, "Prod");
        assert_eq!(response.key_prefix, "pa_test_abc12345");
        assert_eq!(response.scopes, vec!["reports:read"]);
        assert!(response.is_active);
        assert_eq!(response.request_count, 0);
        assert!(response.last_used_at.is_none());
    }

    #[test]
    fn test_created_response_carries_secret_beside_record() {
        let scopes: BTreeSet<String> = ["reports:read".to_string()].into_iter().collect();
        let key = ApiKey::new(
            ApiKeyId::generate(),
            AccountId::new("acme").unwrap(),
            "Prod",
            "sha256$hash",
            "pa_test_abc12345",
            scopes,
            RateLimits::new(60, 1000, 10000),
        );

        let response = ApiKeyCreatedResponse {
            key: ApiKeyResponse::from(&key),
            api_key: "pa_test_abc12345fullsecret".to_string(),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"api_key\":\"pa_test_abc12345fullsecret\""));
        assert!(json.contains("\"key_prefix\":\"pa_test_abc12345\""));
        // The stored hash never leaves the server
        assert!(!json.contains("sha256$hash"));
    }

    #[test]
    fn test_usage_stats_response_mapping() {
        let stats = ApiKeyUsageStats {
            total_requests: 12,
            requests_last_24h: 3,
            requests_last_7d: 8,
            requests_last_30d: 12,
            avg_response_time_ms: 42.5,
            error_rate: Some(0.25),
            most_used_endpoints: vec![EndpointCount {
                method: "GET".to_string(),
                endpoint: "/v1/reports".to_string(),
                count: 7,
            }],
        };

        let response = UsageStatsResponse::from(stats);

        assert_eq!(response.total_requests, 12);
        assert_eq!(response.most_used_endpoints.len(), 1);
        assert_eq!(response.most_used_endpoints[0].endpoint, "/v1/reports");
    }

    #[test]
    fn test_rotate_response_serialization() {
        let response = RotateApiKeyResponse {
            api_key: "pa_live_newsecret".to_string(),
            key_prefix: "pa_live_newsecre".to_string(),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"api_key\":\"pa_live_newsecret\""));
    }
}
