//! API Key repository trait

use async_trait::async_trait;
use std::fmt::Debug;

use crate::domain::account::AccountId;
use crate::domain::DomainError;

use super::entity::{ApiKey, ApiKeyId};

/// Repository trait for API key storage
///
/// Listing order is stable across repeated calls absent mutation
/// (creation time, then id).
#[async_trait]
pub trait ApiKeyRepository: Send + Sync + Debug {
    /// Get an API key by its ID
    async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError>;

    /// Get an API key by its display prefix (for lookup during authentication)
    async fn get_by_prefix(&self, prefix: &str) -> Result<Option<ApiKey>, DomainError>;

    /// Persist a new API key
    async fn insert(&self, api_key: ApiKey) -> Result<ApiKey, DomainError>;

    /// Update an existing API key
    async fn update(&self, api_key: &ApiKey) -> Result<ApiKey, DomainError>;

    /// Delete an API key, returns true if a record was removed
    async fn delete(&self, id: &ApiKeyId) -> Result<bool, DomainError>;

    /// List an account's keys; inactive records are filtered out unless requested
    async fn list(
        &self,
        account: &AccountId,
        include_inactive: bool,
    ) -> Result<Vec<ApiKey>, DomainError>;

    /// Check if an API key ID exists
    async fn exists(&self, id: &ApiKeyId) -> Result<bool, DomainError> {
        Ok(self.get(id).await?.is_some())
    }

    /// Record usage of an API key (request count + last-used timestamp)
    async fn record_usage(&self, id: &ApiKeyId) -> Result<(), DomainError>;
}
