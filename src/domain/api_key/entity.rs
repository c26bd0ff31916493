//! API Key entity and related types

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::account::AccountId;

/// API Key identifier - opaque, UUID-backed
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ApiKeyId(Uuid);

impl ApiKeyId {
    /// Generate a fresh identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for ApiKeyId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ApiKeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Request rate limits carried on every key
///
/// Each window is independent. No cross-window consistency is enforced:
/// an hourly limit smaller than the per-minute limit is accepted as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimits {
    /// Maximum requests per minute
    pub per_minute: u32,
    /// Maximum requests per hour
    pub per_hour: u32,
    /// Maximum requests per day
    pub per_day: u32,
}

impl RateLimits {
    /// Create a new rate limit configuration
    pub fn new(per_minute: u32, per_hour: u32, per_day: u32) -> Self {
        Self {
            per_minute,
            per_hour,
            per_day,
        }
    }
}

/// Everything needed to reconstruct an [`ApiKey`] from a persisted row
pub struct ApiKeyParts {
    pub id: ApiKeyId,
    pub account_id: AccountId,
    pub name: String,
    pub description: Option<String>,
    pub secret_hash: String,
    pub key_prefix: String,
    pub scopes: BTreeSet<String>,
    pub rate_limits: RateLimits,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub request_count: u64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// API Key entity
///
/// The full secret is never stored; only its hash and a short display
/// prefix survive creation.
#[derive(Debug, Clone)]
pub struct ApiKey {
    id: ApiKeyId,
    account_id: AccountId,
    name: String,
    description: Option<String>,
    /// Hashed secret, format: algorithm$encoded (e.g. "sha256$...")
    secret_hash: String,
    /// Non-secret leading fragment of the secret, safe to display
    key_prefix: String,
    scopes: BTreeSet<String>,
    rate_limits: RateLimits,
    /// None = the key never expires
    expires_at: Option<DateTime<Utc>>,
    is_active: bool,
    request_count: u64,
    last_used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ApiKey {
    /// Create a new API key. New keys start active with a zero request count.
    pub fn new(
        id: ApiKeyId,
        account_id: AccountId,
        name: impl Into<String>,
        secret_hash: impl Into<String>,
        key_prefix: impl Into<String>,
        scopes: BTreeSet<String>,
        rate_limits: RateLimits,
    ) -> Self {
        let now = Utc::now();

        Self {
            id,
            account_id,
            name: name.into(),
            description: None,
            secret_hash: secret_hash.into(),
            key_prefix: key_prefix.into(),
            scopes,
            rate_limits,
            expires_at: None,
            is_active: true,
            request_count: 0,
            last_used_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set expiration
    pub fn with_expiration(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    // Getters

    pub fn id(&self) -> ApiKeyId {
        self.id
    }

    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn secret_hash(&self) -> &str {
        &self.secret_hash
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    pub fn scopes(&self) -> &BTreeSet<String> {
        &self.scopes
    }

    pub fn rate_limits(&self) -> RateLimits {
        self.rate_limits
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        self.last_used_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // Status checks

    /// Check if the key has passed its expiration timestamp
    pub fn is_expired(&self) -> bool {
        if let Some(expires_at) = self.expires_at {
            Utc::now() >= expires_at
        } else {
            false
        }
    }

    /// Check if the key may authorize requests right now
    pub fn is_usable(&self) -> bool {
        self.is_active && !self.is_expired()
    }

    /// Check if the key carries a scope
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    // Mutators

    /// Update the name
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    /// Update the description
    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
        self.touch();
    }

    /// Update the scope set
    pub fn set_scopes(&mut self, scopes: BTreeSet<String>) {
        self.scopes = scopes;
        self.touch();
    }

    /// Update rate limits
    pub fn set_rate_limits(&mut self, rate_limits: RateLimits) {
        self.rate_limits = rate_limits;
        self.touch();
    }

    /// Update expiration
    pub fn set_expiration(&mut self, expires_at: Option<DateTime<Utc>>) {
        self.expires_at = expires_at;
        self.touch();
    }

    /// Set the active flag. Returns true if the value actually changed;
    /// setting the current value leaves the record untouched.
    pub fn set_active(&mut self, active: bool) -> bool {
        if self.is_active == active {
            return false;
        }

        self.is_active = active;
        self.touch();
        true
    }

    /// Replace the secret material. Identity, scopes and limits are kept;
    /// the previous secret stops verifying the moment this is persisted.
    pub fn rotate_secret(
        &mut self,
        secret_hash: impl Into<String>,
        key_prefix: impl Into<String>,
    ) {
        self.secret_hash = secret_hash.into();
        self.key_prefix = key_prefix.into();
        self.touch();
    }

    /// Record key usage
    pub fn record_usage(&mut self) {
        self.request_count += 1;
        self.last_used_at = Some(Utc::now());
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl From<ApiKeyParts> for ApiKey {
    fn from(parts: ApiKeyParts) -> Self {
        Self {
            id: parts.id,
            account_id: parts.account_id,
            name: parts.name,
            description: parts.description,
            secret_hash: parts.secret_hash,
            key_prefix: parts.key_prefix,
            scopes: parts.scopes,
            rate_limits: parts.rate_limits,
            expires_at: parts.expires_at,
            is_active: parts.is_active,
            request_count: parts.request_count,
            last_used_at: parts.last_used_at,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
        }
    }
}

/// Pure, side-effect-free refinement of a key listing: case-insensitive
/// substring match against name or description. Never alters the input.
pub fn filter_by_search<'a>(keys: &'a [ApiKey], query: &str) -> Vec<&'a ApiKey> {
    let needle = query.to_lowercase();

    keys.iter()
        .filter(|k| {
            k.name.to_lowercase().contains(&needle)
                || k.description
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(&needle))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn scopes(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn create_test_key(name: &str) -> ApiKey {
        ApiKey::new(
            ApiKeyId::generate(),
            AccountId::new("acme").unwrap(),
            name,
            "sha256$hashed",
            "pa_test_abc12345",
            scopes(&["reports:read"]),
            RateLimits::new(60, 1000, 10000),
        )
    }

    #[test]
    fn test_new_key_starts_active_and_unused() {
        let key = create_test_key("Prod");

        assert!(key.is_active());
        assert!(key.is_usable());
        assert_eq!(key.request_count(), 0);
        assert!(key.last_used_at().is_none());
        assert_eq!(key.account_id().as_str(), "acme");
    }

    #[test]
    fn test_key_expiration() {
        let past = Utc::now() - Duration::hours(1);
        let key = create_test_key("Old").with_expiration(past);

        assert!(key.is_expired());
        assert!(!key.is_usable());
        // Expired keys stay active and manageable
        assert!(key.is_active());
    }

    #[test]
    fn test_set_active_is_idempotent() {
        let mut key = create_test_key("Prod");
        let updated_before = key.updated_at();

        assert!(!key.set_active(true));
        assert_eq!(key.updated_at(), updated_before);

        assert!(key.set_active(false));
        assert!(!key.is_usable());

        assert!(!key.set_active(false));
    }

    #[test]
    fn test_rotate_secret_preserves_identity() {
        let mut key = create_test_key("Prod");
        let id = key.id();
        let old_scopes = key.scopes().clone();

        key.rotate_secret("sha256$newhash", "pa_test_zzz99999");

        assert_eq!(key.id(), id);
        assert_eq!(key.scopes(), &old_scopes);
        assert_eq!(key.key_prefix(), "pa_test_zzz99999");
        assert_eq!(key.secret_hash(), "sha256$newhash");
    }

    #[test]
    fn test_record_usage() {
        let mut key = create_test_key("Prod");

        key.record_usage();
        key.record_usage();

        assert_eq!(key.request_count(), 2);
        assert!(key.last_used_at().is_some());
    }

    #[test]
    fn test_has_scope() {
        let key = create_test_key("Prod");

        assert!(key.has_scope("reports:read"));
        assert!(!key.has_scope("admin:keys"));
    }

    #[test]
    fn test_filter_by_search_matches_name_and_description() {
        let keys = vec![
            create_test_key("Production ingest"),
            create_test_key("Staging").with_description("ingest smoke tests"),
            create_test_key("CI"),
        ];

        let matched = filter_by_search(&keys, "INGEST");
        assert_eq!(matched.len(), 2);

        let matched = filter_by_search(&keys, "ci");
        assert_eq!(matched.len(), 1);

        // Refinement never mutates the canonical list
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn test_filter_by_search_empty_query_matches_all() {
        let keys = vec![create_test_key("A"), create_test_key("B")];
        assert_eq!(filter_by_search(&keys, "").len(), 2);
    }
}
