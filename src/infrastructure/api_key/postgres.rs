//! PostgreSQL-backed API key repository

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use uuid::Uuid;

use crate::domain::account::AccountId;
use crate::domain::api_key::{ApiKey, ApiKeyId, ApiKeyParts, ApiKeyRepository, RateLimits};
use crate::domain::DomainError;

/// PostgreSQL implementation of [`ApiKeyRepository`]
///
/// Stores keys in a typed `api_keys` table; scopes are kept as JSONB.
#[derive(Debug)]
pub struct PostgresApiKeyRepository {
    pool: PgPool,
}

impl PostgresApiKeyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Ensures the api_keys table exists
    pub async fn ensure_table(&self) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS api_keys (
                id UUID PRIMARY KEY,
                account_id VARCHAR(64) NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                secret_hash TEXT NOT NULL,
                key_prefix VARCHAR(32) NOT NULL UNIQUE,
                scopes JSONB NOT NULL,
                rate_limit_per_minute INTEGER NOT NULL,
                rate_limit_per_hour INTEGER NOT NULL,
                rate_limit_per_day INTEGER NOT NULL,
                expires_at TIMESTAMPTZ,
                is_active BOOLEAN NOT NULL,
                request_count BIGINT NOT NULL DEFAULT 0,
                last_used_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to create api_keys table: {}", e)))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_api_keys_account ON api_keys (account_id, created_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to create index: {}", e)))?;

        Ok(())
    }
}

fn row_to_key(row: &PgRow) -> Result<ApiKey, DomainError> {
    let storage_err = |e: sqlx::Error| DomainError::storage(format!("Bad api_keys row: {}", e));

    let scopes_value: serde_json::Value = row.try_get("scopes").map_err(storage_err)?;
    let scopes: BTreeSet<String> = serde_json::from_value(scopes_value)
        .map_err(|e| DomainError::storage(format!("Bad scopes column: {}", e)))?;

    let account_raw: String = row.try_get("account_id").map_err(storage_err)?;
    let account_id = AccountId::new(account_raw)
        .map_err(|e| DomainError::storage(format!("Bad account_id column: {}", e)))?;

    let per_minute: i32 = row.try_get("rate_limit_per_minute").map_err(storage_err)?;
    let per_hour: i32 = row.try_get("rate_limit_per_hour").map_err(storage_err)?;
    let per_day: i32 = row.try_get("rate_limit_per_day").map_err(storage_err)?;
    let request_count: i64 = row.try_get("request_count").map_err(storage_err)?;

    let parts = ApiKeyParts {
        id: ApiKeyId::from(row.try_get::<Uuid, _>("id").map_err(storage_err)?),
        account_id,
        name: row.try_get("name").map_err(storage_err)?,
        description: row.try_get("description").map_err(storage_err)?,
        secret_hash: row.try_get("secret_hash").map_err(storage_err)?,
        key_prefix: row.try_get("key_prefix").map_err(storage_err)?,
        scopes,
        rate_limits: RateLimits::new(
            per_minute.max(0) as u32,
            per_hour.max(0) as u32,
            per_day.max(0) as u32,
        ),
        expires_at: row
            .try_get::<Option<DateTime<Utc>>, _>("expires_at")
            .map_err(storage_err)?,
        is_active: row.try_get("is_active").map_err(storage_err)?,
        request_count: request_count.max(0) as u64,
        last_used_at: row
            .try_get::<Option<DateTime<Utc>>, _>("last_used_at")
            .map_err(storage_err)?,
        created_at: row.try_get("created_at").map_err(storage_err)?,
        updated_at: row.try_get("updated_at").map_err(storage_err)?,
    };

    Ok(ApiKey::from(parts))
}

fn scopes_to_json(key: &ApiKey) -> Result<serde_json::Value, DomainError> {
    serde_json::to_value(key.scopes())
        .map_err(|e| DomainError::internal(format!("Failed to encode scopes: {}", e)))
}

#[async_trait]
impl ApiKeyRepository for PostgresApiKeyRepository {
    async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError> {
        let row = sqlx::query("SELECT * FROM api_keys WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to fetch API key: {}", e)))?;

        row.as_ref().map(row_to_key).transpose()
    }

    async fn get_by_prefix(&self, prefix: &str) -> Result<Option<ApiKey>, DomainError> {
        let row = sqlx::query("SELECT * FROM api_keys WHERE key_prefix = $1")
            .bind(prefix)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to fetch API key: {}", e)))?;

        row.as_ref().map(row_to_key).transpose()
    }

    async fn insert(&self, api_key: ApiKey) -> Result<ApiKey, DomainError> {
        let scopes = scopes_to_json(&api_key)?;

        let result = sqlx::query(
            r#"
            INSERT INTO api_keys (
                id, account_id, name, description, secret_hash, key_prefix, scopes,
                rate_limit_per_minute, rate_limit_per_hour, rate_limit_per_day,
                expires_at, is_active, request_count, last_used_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(api_key.id().as_uuid())
        .bind(api_key.account_id().as_str())
        .bind(api_key.name())
        .bind(api_key.description())
        .bind(api_key.secret_hash())
        .bind(api_key.key_prefix())
        .bind(scopes)
        .bind(api_key.rate_limits().per_minute as i32)
        .bind(api_key.rate_limits().per_hour as i32)
        .bind(api_key.rate_limits().per_day as i32)
        .bind(api_key.expires_at())
        .bind(api_key.is_active())
        .bind(api_key.request_count() as i64)
        .bind(api_key.last_used_at())
        .bind(api_key.created_at())
        .bind(api_key.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to insert API key: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::conflict(format!(
                "API key '{}' or its prefix already exists",
                api_key.id()
            )));
        }

        Ok(api_key)
    }

    async fn update(&self, api_key: &ApiKey) -> Result<ApiKey, DomainError> {
        let scopes = scopes_to_json(api_key)?;

        let result = sqlx::query(
            r#"
            UPDATE api_keys SET
                name = $2, description = $3, secret_hash = $4, key_prefix = $5,
                scopes = $6, rate_limit_per_minute = $7, rate_limit_per_hour = $8,
                rate_limit_per_day = $9, expires_at = $10, is_active = $11,
                updated_at = $12
            WHERE id = $1
            "#,
        )
        .bind(api_key.id().as_uuid())
        .bind(api_key.name())
        .bind(api_key.description())
        .bind(api_key.secret_hash())
        .bind(api_key.key_prefix())
        .bind(scopes)
        .bind(api_key.rate_limits().per_minute as i32)
        .bind(api_key.rate_limits().per_hour as i32)
        .bind(api_key.rate_limits().per_day as i32)
        .bind(api_key.expires_at())
        .bind(api_key.is_active())
        .bind(api_key.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to update API key: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!(
                "API key '{}' not found",
                api_key.id()
            )));
        }

        Ok(api_key.clone())
    }

    async fn delete(&self, id: &ApiKeyId) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to delete API key: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(
        &self,
        account: &AccountId,
        include_inactive: bool,
    ) -> Result<Vec<ApiKey>, DomainError> {
        let query = if include_inactive {
            "SELECT * FROM api_keys WHERE account_id = $1 ORDER BY created_at, id"
        } else {
            "SELECT * FROM api_keys WHERE account_id = $1 AND is_active ORDER BY created_at, id"
        };

        let rows = sqlx::query(query)
            .bind(account.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to list API keys: {}", e)))?;

        rows.iter().map(row_to_key).collect()
    }

    async fn record_usage(&self, id: &ApiKeyId) -> Result<(), DomainError> {
        let result = sqlx::query(
            "UPDATE api_keys SET request_count = request_count + 1, last_used_at = NOW() WHERE id = $1",
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to record usage: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!(
                "API key '{}' not found",
                id
            )));
        }

        Ok(())
    }
}
