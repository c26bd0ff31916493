//! In-memory API key repository implementation

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::account::AccountId;
use crate::domain::api_key::{ApiKey, ApiKeyId, ApiKeyRepository};
use crate::domain::DomainError;

/// In-memory implementation of [`ApiKeyRepository`]
///
/// Default backend for development and tests. Keeps a secondary index
/// from display prefix to id for the authentication lookup path.
#[derive(Debug, Default)]
pub struct InMemoryApiKeyRepository {
    keys: Arc<RwLock<HashMap<ApiKeyId, ApiKey>>>,
    prefix_index: Arc<RwLock<HashMap<String, ApiKeyId>>>,
}

impl InMemoryApiKeyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository seeded with keys
    pub fn with_keys(keys: Vec<ApiKey>) -> Self {
        let repo = Self::new();

        let keys_map: HashMap<ApiKeyId, ApiKey> =
            keys.iter().map(|k| (k.id(), k.clone())).collect();
        let prefix_map: HashMap<String, ApiKeyId> = keys
            .iter()
            .map(|k| (k.key_prefix().to_string(), k.id()))
            .collect();

        *futures::executor::block_on(repo.keys.write()) = keys_map;
        *futures::executor::block_on(repo.prefix_index.write()) = prefix_map;

        repo
    }
}

#[async_trait]
impl ApiKeyRepository for InMemoryApiKeyRepository {
    async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError> {
        let keys = self.keys.read().await;
        Ok(keys.get(id).cloned())
    }

    async fn get_by_prefix(&self, prefix: &str) -> Result<Option<ApiKey>, DomainError> {
        let prefix_index = self.prefix_index.read().await;

        if let Some(id) = prefix_index.get(prefix) {
            let keys = self.keys.read().await;
            Ok(keys.get(id).cloned())
        } else {
            Ok(None)
        }
    }

    async fn insert(&self, api_key: ApiKey) -> Result<ApiKey, DomainError> {
        let mut keys = self.keys.write().await;
        let mut prefix_index = self.prefix_index.write().await;

        let id = api_key.id();
        let prefix = api_key.key_prefix().to_string();

        if keys.contains_key(&id) {
            return Err(DomainError::conflict(format!(
                "API key '{}' already exists",
                id
            )));
        }

        if prefix_index.contains_key(&prefix) {
            return Err(DomainError::conflict(format!(
                "API key with prefix '{}' already exists",
                prefix
            )));
        }

        keys.insert(id, api_key.clone());
        prefix_index.insert(prefix, id);

        Ok(api_key)
    }

    async fn update(&self, api_key: &ApiKey) -> Result<ApiKey, DomainError> {
        let mut keys = self.keys.write().await;
        let mut prefix_index = self.prefix_index.write().await;

        let id = api_key.id();

        let previous = keys.get(&id).ok_or_else(|| {
            DomainError::not_found(format!("API key '{}' not found", id))
        })?;

        // Rotation changes the prefix; keep the index in sync
        if previous.key_prefix() != api_key.key_prefix() {
            prefix_index.remove(previous.key_prefix());
            prefix_index.insert(api_key.key_prefix().to_string(), id);
        }

        keys.insert(id, api_key.clone());
        Ok(api_key.clone())
    }

    async fn delete(&self, id: &ApiKeyId) -> Result<bool, DomainError> {
        let mut keys = self.keys.write().await;
        let mut prefix_index = self.prefix_index.write().await;

        if let Some(key) = keys.remove(id) {
            prefix_index.remove(key.key_prefix());
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn list(
        &self,
        account: &AccountId,
        include_inactive: bool,
    ) -> Result<Vec<ApiKey>, DomainError> {
        let keys = self.keys.read().await;

        let mut result: Vec<ApiKey> = keys
            .values()
            .filter(|k| k.account_id() == account)
            .filter(|k| include_inactive || k.is_active())
            .cloned()
            .collect();

        result.sort_by_key(|k| (k.created_at(), k.id()));

        Ok(result)
    }

    async fn record_usage(&self, id: &ApiKeyId) -> Result<(), DomainError> {
        let mut keys = self.keys.write().await;

        if let Some(key) = keys.get_mut(id) {
            key.record_usage();
            Ok(())
        } else {
            Err(DomainError::not_found(format!(
                "API key '{}' not found",
                id
            )))
        }
    }
}
