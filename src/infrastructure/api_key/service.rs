//! API Key lifecycle service
//!
//! Mediates every state transition of API key records: create, rotate,
//! activation toggling, scope/limit updates, deletion, listing and usage
//! retrieval. Validation happens before any store mutation; an operation
//! either fully succeeds or fails with no partial state change.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::account::AccountId;
use crate::domain::api_key::{
    validate_draft, validate_patch, ApiKey, ApiKeyDraft, ApiKeyId, ApiKeyPatch, ApiKeyRepository,
};
use crate::domain::scope::ScopeCatalog;
use crate::domain::usage::{ApiKeyUsageStats, UsageTelemetry};
use crate::domain::DomainError;

use super::generator::SecretGenerator;
use super::rate_limiter::{RateLimitDecision, RateLimiter};

/// Result of creating a new API key
///
/// Carries the only occurrence of the plaintext secret. If the caller
/// fails to persist or display it, the secret is gone for good; the
/// stored record retains only the display prefix and a hash.
#[derive(Debug)]
pub struct CreatedApiKey {
    pub api_key: ApiKey,
    pub secret: String,
}

/// Result of rotating an API key's secret
#[derive(Debug)]
pub struct RotatedApiKey {
    pub api_key: ApiKey,
    pub secret: String,
}

/// API Key lifecycle service
pub struct ApiKeyService {
    repository: Arc<dyn ApiKeyRepository>,
    telemetry: Arc<dyn UsageTelemetry>,
    generator: SecretGenerator,
    rate_limiter: Arc<RateLimiter>,
    catalog: Arc<ScopeCatalog>,
}

impl std::fmt::Debug for ApiKeyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyService")
            .field("repository", &self.repository)
            .field("generator", &self.generator)
            .finish()
    }
}

impl ApiKeyService {
    pub fn new(
        repository: Arc<dyn ApiKeyRepository>,
        telemetry: Arc<dyn UsageTelemetry>,
        catalog: Arc<ScopeCatalog>,
    ) -> Self {
        Self {
            repository,
            telemetry,
            generator: SecretGenerator::live(),
            rate_limiter: Arc::new(RateLimiter::new()),
            catalog,
        }
    }

    /// Use a custom secret generator
    pub fn with_generator(mut self, generator: SecretGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Use a shared rate limiter
    pub fn with_rate_limiter(mut self, rate_limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    /// The scope catalog used for validation
    pub fn catalog(&self) -> &ScopeCatalog {
        &self.catalog
    }

    /// Create a new API key from a draft
    ///
    /// Never idempotent: a retried call mints a new id and a new secret.
    pub async fn create(
        &self,
        account: &AccountId,
        draft: ApiKeyDraft,
    ) -> Result<CreatedApiKey, DomainError> {
        validate_draft(&draft, &self.catalog)?;

        let id = ApiKeyId::generate();
        let generated = self.generator.generate();

        info!(%id, account = %account, name = %draft.name, "Creating API key");

        let mut api_key = ApiKey::new(
            id,
            account.clone(),
            draft.name,
            &generated.hash,
            &generated.prefix,
            draft.scopes,
            draft.rate_limits,
        );

        if let Some(description) = draft.description {
            api_key = api_key.with_description(description);
        }

        if let Some(expires_at) = draft.expires_at {
            api_key = api_key.with_expiration(expires_at);
        }

        let created = self.repository.insert(api_key).await?;

        Ok(CreatedApiKey {
            api_key: created,
            secret: generated.secret,
        })
    }

    /// Create an API key with known secret material (bootstrap and
    /// integration testing; ordinary creates always mint fresh material)
    pub async fn create_with_secret(
        &self,
        account: &AccountId,
        draft: ApiKeyDraft,
        material: &str,
    ) -> Result<CreatedApiKey, DomainError> {
        validate_draft(&draft, &self.catalog)?;

        let id = ApiKeyId::generate();
        let generated = self.generator.from_material(material);

        info!(%id, account = %account, name = %draft.name, "Creating API key with known secret");

        let mut api_key = ApiKey::new(
            id,
            account.clone(),
            draft.name,
            &generated.hash,
            &generated.prefix,
            draft.scopes,
            draft.rate_limits,
        );

        if let Some(description) = draft.description {
            api_key = api_key.with_description(description);
        }

        let created = self.repository.insert(api_key).await?;

        Ok(CreatedApiKey {
            api_key: created,
            secret: generated.secret,
        })
    }

    /// List an account's keys. Inactive records are filtered out unless
    /// requested; ordering is stable across calls absent mutation.
    pub async fn list(
        &self,
        account: &AccountId,
        include_inactive: bool,
    ) -> Result<Vec<ApiKey>, DomainError> {
        self.repository.list(account, include_inactive).await
    }

    /// Get one key, enforcing ownership
    pub async fn get(&self, account: &AccountId, id: ApiKeyId) -> Result<ApiKey, DomainError> {
        self.fetch_owned(account, id).await
    }

    /// Reissue a key's secret
    ///
    /// The previous secret stops verifying the moment the update lands;
    /// there is no grace period. Identity, scopes and limits are kept,
    /// only the display prefix changes.
    pub async fn rotate(
        &self,
        account: &AccountId,
        id: ApiKeyId,
    ) -> Result<RotatedApiKey, DomainError> {
        let mut key = self.fetch_owned(account, id).await?;

        info!(%id, "Rotating API key secret");

        let generated = self.generator.generate();
        key.rotate_secret(&generated.hash, &generated.prefix);

        let updated = self.repository.update(&key).await?;
        self.rate_limiter.reset(id).await;

        Ok(RotatedApiKey {
            api_key: updated,
            secret: generated.secret,
        })
    }

    /// Delete a key. Irreversible: the record and its usage history are
    /// no longer retrievable afterwards.
    pub async fn delete(&self, account: &AccountId, id: ApiKeyId) -> Result<(), DomainError> {
        self.fetch_owned(account, id).await?;

        info!(%id, "Deleting API key");

        self.repository.delete(&id).await?;
        self.rate_limiter.reset(id).await;

        if let Err(e) = self.telemetry.forget(&id).await {
            warn!(%id, "Failed to drop usage history: {}", e);
        }

        Ok(())
    }

    /// Set the active flag. Idempotent: setting the current value is a
    /// no-op that still succeeds and returns the current record.
    pub async fn set_active(
        &self,
        account: &AccountId,
        id: ApiKeyId,
        active: bool,
    ) -> Result<ApiKey, DomainError> {
        let mut key = self.fetch_owned(account, id).await?;

        if !key.set_active(active) {
            return Ok(key);
        }

        info!(%id, active, "Toggling API key");
        self.repository.update(&key).await
    }

    /// Apply a partial update. Fields absent from the patch are left
    /// unchanged; present fields follow the same rules as create.
    pub async fn update(
        &self,
        account: &AccountId,
        id: ApiKeyId,
        patch: ApiKeyPatch,
    ) -> Result<ApiKey, DomainError> {
        validate_patch(&patch, &self.catalog)?;

        let mut key = self.fetch_owned(account, id).await?;

        if patch.is_empty() {
            return Ok(key);
        }

        info!(%id, "Updating API key");

        if let Some(name) = patch.name {
            key.set_name(name);
        }

        if let Some(description) = patch.description {
            key.set_description(Some(description));
        }

        if let Some(scopes) = patch.scopes {
            key.set_scopes(scopes);
        }

        let limits_changed = patch.rate_limits.is_some();

        if let Some(limits) = patch.rate_limits {
            key.set_rate_limits(limits);
        }

        if let Some(expires_at) = patch.expires_at {
            key.set_expiration(expires_at);
        }

        let updated = self.repository.update(&key).await?;

        if limits_changed {
            self.rate_limiter.reset(id).await;
        }

        Ok(updated)
    }

    /// Usage statistics for one key. Purely observational.
    pub async fn usage(
        &self,
        account: &AccountId,
        id: ApiKeyId,
    ) -> Result<ApiKeyUsageStats, DomainError> {
        self.fetch_owned(account, id).await?;
        self.telemetry.stats_for(&id).await
    }

    /// Resolve and verify a plaintext secret for the authorization layer.
    ///
    /// Returns the key when the secret verifies and the key is active and
    /// unexpired; records usage on success.
    pub async fn validate(&self, secret: &str) -> Result<Option<ApiKey>, DomainError> {
        let prefix = match SecretGenerator::extract_prefix(secret) {
            Some(p) => p,
            None => return Ok(None),
        };

        debug!(prefix, "Validating API key secret");

        let key = match self.repository.get_by_prefix(prefix).await? {
            Some(k) => k,
            None => return Ok(None),
        };

        if !self.generator.verify_secret(secret, key.secret_hash()) {
            debug!(prefix, "API key hash verification failed");
            return Ok(None);
        }

        if !key.is_usable() {
            debug!(id = %key.id(), "API key is inactive or expired");
            return Ok(None);
        }

        if let Err(e) = self.repository.record_usage(&key.id()).await {
            warn!(id = %key.id(), "Failed to record API key usage: {}", e);
        }

        Ok(Some(key))
    }

    /// Check and consume one request against a key's rate limits
    pub async fn check_rate_limit(&self, key: &ApiKey) -> RateLimitDecision {
        self.rate_limiter
            .check_and_record(key.id(), key.rate_limits())
            .await
    }

    async fn fetch_owned(
        &self,
        account: &AccountId,
        id: ApiKeyId,
    ) -> Result<ApiKey, DomainError> {
        let key = self
            .repository
            .get(&id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("API key '{}' not found", id)))?;

        if key.account_id() != account {
            return Err(DomainError::permission(format!(
                "API key '{}' belongs to another account",
                id
            )));
        }

        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::api_key::RateLimits;
    use crate::domain::usage::MockUsageTelemetry;
    use crate::infrastructure::api_key::InMemoryApiKeyRepository;
    use crate::infrastructure::usage::InMemoryUsageTelemetry;
    use std::collections::BTreeSet;

    fn scopes(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn account() -> AccountId {
        AccountId::new("acme").unwrap()
    }

    fn draft(name: &str) -> ApiKeyDraft {
        ApiKeyDraft::new(
            name,
            scopes(&["reports:read"]),
            RateLimits::new(60, 1000, 10000),
        )
    }

    fn create_service() -> ApiKeyService {
        ApiKeyService::new(
            Arc::new(InMemoryApiKeyRepository::new()),
            Arc::new(InMemoryUsageTelemetry::new()),
            Arc::new(ScopeCatalog::builtin().clone()),
        )
        .with_generator(SecretGenerator::test())
    }

    #[tokio::test]
    async fn test_create_returns_secret_once() {
        let service = create_service();

        let created = service.create(&account(), draft("Prod")).await.unwrap();

        assert!(!created.secret.is_empty());
        assert!(created.secret.starts_with("pa_test_"));
        // Stored record keeps only hash + prefix, never the secret
        assert_ne!(created.api_key.secret_hash(), created.secret);
        assert!(created.secret.starts_with(created.api_key.key_prefix()));
        assert!(created.api_key.key_prefix().len() < created.secret.len());
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_draft_without_persisting() {
        let service = create_service();

        assert!(matches!(
            service.create(&account(), draft("")).await,
            Err(DomainError::Validation { .. })
        ));

        let mut bad = draft("NoScopes");
        bad.scopes = BTreeSet::new();
        assert!(matches!(
            service.create(&account(), bad).await,
            Err(DomainError::Validation { .. })
        ));

        let mut bad = draft("BadLimit");
        bad.rate_limits = RateLimits::new(0, 1000, 10000);
        assert!(matches!(
            service.create(&account(), bad).await,
            Err(DomainError::Validation { .. })
        ));

        let mut bad = draft("BadScope");
        bad.scopes = scopes(&["billing:read"]);
        assert!(matches!(
            service.create(&account(), bad).await,
            Err(DomainError::Validation { .. })
        ));

        // Fail-fast: nothing was persisted
        let keys = service.list(&account(), true).await.unwrap();
        assert!(keys.is_empty());
    }

    #[tokio::test]
    async fn test_create_is_not_idempotent() {
        let service = create_service();

        let first = service.create(&account(), draft("Prod")).await.unwrap();
        let second = service.create(&account(), draft("Prod")).await.unwrap();

        assert_ne!(first.api_key.id(), second.api_key.id());
        assert_ne!(first.secret, second.secret);
    }

    #[tokio::test]
    async fn test_created_key_appears_in_listing() {
        let service = create_service();

        let created = service.create(&account(), draft("Prod")).await.unwrap();

        let keys = service.list(&account(), false).await.unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].name(), "Prod");
        assert_eq!(keys[0].scopes(), &scopes(&["reports:read"]));
        assert_eq!(keys[0].key_prefix(), created.api_key.key_prefix());
        assert_eq!(keys[0].request_count(), 0);
    }

    #[tokio::test]
    async fn test_validate_accepts_fresh_secret() {
        let service = create_service();

        let created = service.create(&account(), draft("Prod")).await.unwrap();

        let validated = service.validate(&created.secret).await.unwrap().unwrap();
        assert_eq!(validated.id(), created.api_key.id());

        // Usage was recorded
        let key = service.get(&account(), created.api_key.id()).await.unwrap();
        assert_eq!(key.request_count(), 1);
        assert!(key.last_used_at().is_some());
    }

    #[tokio::test]
    async fn test_rotate_invalidates_old_secret_immediately() {
        let service = create_service();

        let created = service.create(&account(), draft("Prod")).await.unwrap();
        let id = created.api_key.id();
        let old_prefix = created.api_key.key_prefix().to_string();

        let rotated = service.rotate(&account(), id).await.unwrap();

        // Old secret is dead, new one works
        assert!(service.validate(&created.secret).await.unwrap().is_none());
        assert!(service.validate(&rotated.secret).await.unwrap().is_some());

        // Identity, name and scopes preserved; only the prefix differs
        assert_eq!(rotated.api_key.id(), id);
        assert_eq!(rotated.api_key.name(), "Prod");
        assert_eq!(rotated.api_key.scopes(), &scopes(&["reports:read"]));
        assert_ne!(rotated.api_key.key_prefix(), old_prefix);
    }

    #[tokio::test]
    async fn test_rotate_unknown_id_not_found() {
        let service = create_service();

        let result = service.rotate(&account(), ApiKeyId::generate()).await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_operations_enforce_ownership() {
        let service = create_service();

        let created = service.create(&account(), draft("Prod")).await.unwrap();
        let id = created.api_key.id();
        let other = AccountId::new("globex").unwrap();

        assert!(matches!(
            service.rotate(&other, id).await,
            Err(DomainError::Permission { .. })
        ));
        assert!(matches!(
            service.delete(&other, id).await,
            Err(DomainError::Permission { .. })
        ));
        assert!(matches!(
            service.usage(&other, id).await,
            Err(DomainError::Permission { .. })
        ));
    }

    #[tokio::test]
    async fn test_set_active_is_idempotent() {
        let service = create_service();

        let created = service.create(&account(), draft("Prod")).await.unwrap();
        let id = created.api_key.id();

        let first = service.set_active(&account(), id, true).await.unwrap();
        let second = service.set_active(&account(), id, true).await.unwrap();

        assert!(second.is_active());
        assert_eq!(first.updated_at(), second.updated_at());
    }

    #[tokio::test]
    async fn test_deactivated_key_is_rejected_but_listable() {
        let service = create_service();

        let created = service.create(&account(), draft("Prod")).await.unwrap();
        let id = created.api_key.id();

        service.set_active(&account(), id, false).await.unwrap();

        assert!(service.validate(&created.secret).await.unwrap().is_none());

        let visible = service.list(&account(), false).await.unwrap();
        assert!(visible.is_empty());
        let all = service.list(&account(), true).await.unwrap();
        assert_eq!(all.len(), 1);

        // Reactivation restores authorization
        service.set_active(&account(), id, true).await.unwrap();
        assert!(service.validate(&created.secret).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_expired_key_is_rejected_but_listable() {
        let service = create_service();

        let mut d = draft("Expired");
        d.expires_at = Some(chrono::Utc::now() - chrono::Duration::hours(1));
        let created = service.create(&account(), d).await.unwrap();

        assert!(service.validate(&created.secret).await.unwrap().is_none());

        let all = service.list(&account(), true).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_key_from_all_listings() {
        let service = create_service();

        let created = service.create(&account(), draft("Prod")).await.unwrap();
        let id = created.api_key.id();

        service.delete(&account(), id).await.unwrap();

        let all = service.list(&account(), true).await.unwrap();
        assert!(all.is_empty());
        assert!(matches!(
            service.usage(&account(), id).await,
            Err(DomainError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_patch_applies_present_fields_only() {
        let service = create_service();

        let created = service.create(&account(), draft("Prod")).await.unwrap();
        let id = created.api_key.id();

        let patch = ApiKeyPatch {
            scopes: Some(scopes(&["reports:read", "reports:export"])),
            rate_limits: Some(RateLimits::new(10, 100, 1000)),
            ..Default::default()
        };

        let updated = service.update(&account(), id, patch).await.unwrap();

        assert_eq!(updated.name(), "Prod");
        assert_eq!(updated.scopes().len(), 2);
        assert_eq!(updated.rate_limits().per_minute, 10);
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_patch() {
        let service = create_service();

        let created = service.create(&account(), draft("Prod")).await.unwrap();
        let id = created.api_key.id();

        let patch = ApiKeyPatch {
            scopes: Some(scopes(&["billing:read"])),
            ..Default::default()
        };

        assert!(matches!(
            service.update(&account(), id, patch).await,
            Err(DomainError::Validation { .. })
        ));

        // Record unchanged
        let key = service.get(&account(), id).await.unwrap();
        assert_eq!(key.scopes(), &scopes(&["reports:read"]));
    }

    #[tokio::test]
    async fn test_usage_on_fresh_key_is_empty() {
        let service = create_service();

        let created = service.create(&account(), draft("Prod")).await.unwrap();

        let stats = service
            .usage(&account(), created.api_key.id())
            .await
            .unwrap();

        assert_eq!(stats.total_requests, 0);
        assert!(stats.most_used_endpoints.is_empty());
    }

    #[tokio::test]
    async fn test_rate_limit_enforced() {
        let service = create_service();

        let mut d = draft("Limited");
        d.rate_limits = RateLimits::new(2, 100, 1000);
        let created = service.create(&account(), d).await.unwrap();

        assert!(service.check_rate_limit(&created.api_key).await.allowed);
        assert!(service.check_rate_limit(&created.api_key).await.allowed);
        assert!(!service.check_rate_limit(&created.api_key).await.allowed);
    }

    #[tokio::test]
    async fn test_telemetry_failure_surfaces_unchanged() {
        let mut telemetry = MockUsageTelemetry::new();
        telemetry
            .expect_stats_for()
            .returning(|_| Err(DomainError::unavailable("telemetry offline")));
        telemetry.expect_forget().returning(|_| Ok(()));

        let service = ApiKeyService::new(
            Arc::new(InMemoryApiKeyRepository::new()),
            Arc::new(telemetry),
            Arc::new(ScopeCatalog::builtin().clone()),
        )
        .with_generator(SecretGenerator::test());

        let created = service.create(&account(), draft("Prod")).await.unwrap();

        let result = service.usage(&account(), created.api_key.id()).await;
        assert!(matches!(result, Err(DomainError::Unavailable { .. })));
    }

    #[tokio::test]
    async fn test_create_with_secret_is_deterministic() {
        let service = create_service();

        let created = service
            .create_with_secret(&account(), draft("Bootstrap"), "knownmaterial42")
            .await
            .unwrap();

        assert_eq!(created.secret, "pa_test_knownmaterial42");
        assert!(service.validate(&created.secret).await.unwrap().is_some());
    }
}
