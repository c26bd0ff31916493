//! Create drafts and update patches for API keys

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use super::entity::RateLimits;

/// Input for creating a new API key
///
/// Drafts carry no identity or secret material; both are minted by the
/// lifecycle service on a successful create.
#[derive(Debug, Clone)]
pub struct ApiKeyDraft {
    pub name: String,
    pub description: Option<String>,
    pub scopes: BTreeSet<String>,
    pub rate_limits: RateLimits,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ApiKeyDraft {
    pub fn new(
        name: impl Into<String>,
        scopes: BTreeSet<String>,
        rate_limits: RateLimits,
    ) -> Self {
        Self {
            name: name.into(),
            description: None,
            scopes,
            rate_limits,
            expires_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_expiration(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

/// Partial update for an existing key. Absent fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct ApiKeyPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub scopes: Option<BTreeSet<String>>,
    pub rate_limits: Option<RateLimits>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

impl ApiKeyPatch {
    /// True if the patch changes nothing
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.scopes.is_none()
            && self.rate_limits.is_none()
            && self.expires_at.is_none()
    }
}
