//! API Key draft/patch validation
//!
//! All validation happens before any store mutation; a draft or patch
//! that fails here produces no side effects.

use thiserror::Error;

use crate::domain::error::DomainError;
use crate::domain::scope::ScopeCatalog;

use super::draft::{ApiKeyDraft, ApiKeyPatch};
use super::entity::RateLimits;

/// Errors that can occur while validating a key draft or patch
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ApiKeyValidationError {
    #[error("Key name cannot be empty")]
    EmptyName,

    #[error("Key name exceeds maximum length of {0} characters")]
    NameTooLong(usize),

    #[error("At least one scope is required")]
    NoScopes,

    #[error("Unknown scope: '{0}'")]
    UnknownScope(String),

    #[error("Rate limit '{0}' must be at least 1")]
    InvalidRateLimit(&'static str),
}

impl From<ApiKeyValidationError> for DomainError {
    fn from(err: ApiKeyValidationError) -> Self {
        DomainError::validation(err.to_string())
    }
}

const MAX_KEY_NAME_LENGTH: usize = 255;

/// Validate a display name: non-empty after trimming, bounded length
pub fn validate_name(name: &str) -> Result<(), ApiKeyValidationError> {
    if name.trim().is_empty() {
        return Err(ApiKeyValidationError::EmptyName);
    }

    if name.len() > MAX_KEY_NAME_LENGTH {
        return Err(ApiKeyValidationError::NameTooLong(MAX_KEY_NAME_LENGTH));
    }

    Ok(())
}

/// Validate rate limits: every window must allow at least one request
pub fn validate_rate_limits(limits: &RateLimits) -> Result<(), ApiKeyValidationError> {
    if limits.per_minute < 1 {
        return Err(ApiKeyValidationError::InvalidRateLimit("per_minute"));
    }

    if limits.per_hour < 1 {
        return Err(ApiKeyValidationError::InvalidRateLimit("per_hour"));
    }

    if limits.per_day < 1 {
        return Err(ApiKeyValidationError::InvalidRateLimit("per_day"));
    }

    Ok(())
}

/// Validate a scope selection: non-empty, every member in the catalog
pub fn validate_scopes<'a>(
    scopes: impl IntoIterator<Item = &'a String>,
    catalog: &ScopeCatalog,
) -> Result<(), ApiKeyValidationError> {
    let mut any = false;

    for scope in scopes {
        any = true;

        if !catalog.contains(scope) {
            return Err(ApiKeyValidationError::UnknownScope(scope.clone()));
        }
    }

    if !any {
        return Err(ApiKeyValidationError::NoScopes);
    }

    Ok(())
}

/// Validate a full create draft
pub fn validate_draft(
    draft: &ApiKeyDraft,
    catalog: &ScopeCatalog,
) -> Result<(), ApiKeyValidationError> {
    validate_name(&draft.name)?;
    validate_scopes(&draft.scopes, catalog)?;
    validate_rate_limits(&draft.rate_limits)?;

    Ok(())
}

/// Validate a patch: absent fields are skipped, present fields follow
/// the same rules as create
pub fn validate_patch(
    patch: &ApiKeyPatch,
    catalog: &ScopeCatalog,
) -> Result<(), ApiKeyValidationError> {
    if let Some(name) = &patch.name {
        validate_name(name)?;
    }

    if let Some(scopes) = &patch.scopes {
        validate_scopes(scopes, catalog)?;
    }

    if let Some(limits) = &patch.rate_limits {
        validate_rate_limits(limits)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn scopes(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn valid_draft() -> ApiKeyDraft {
        ApiKeyDraft::new(
            "Prod",
            scopes(&["reports:read"]),
            RateLimits::new(60, 1000, 10000),
        )
    }

    #[test]
    fn test_valid_draft_passes() {
        assert!(validate_draft(&valid_draft(), ScopeCatalog::builtin()).is_ok());
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut draft = valid_draft();
        draft.name = "".to_string();

        assert_eq!(
            validate_draft(&draft, ScopeCatalog::builtin()),
            Err(ApiKeyValidationError::EmptyName)
        );
    }

    #[test]
    fn test_whitespace_name_rejected() {
        let mut draft = valid_draft();
        draft.name = "   ".to_string();

        assert_eq!(
            validate_draft(&draft, ScopeCatalog::builtin()),
            Err(ApiKeyValidationError::EmptyName)
        );
    }

    #[test]
    fn test_overlong_name_rejected() {
        let mut draft = valid_draft();
        draft.name = "x".repeat(256);

        assert_eq!(
            validate_draft(&draft, ScopeCatalog::builtin()),
            Err(ApiKeyValidationError::NameTooLong(255))
        );
    }

    #[test]
    fn test_empty_scopes_rejected() {
        let mut draft = valid_draft();
        draft.scopes = BTreeSet::new();

        assert_eq!(
            validate_draft(&draft, ScopeCatalog::builtin()),
            Err(ApiKeyValidationError::NoScopes)
        );
    }

    #[test]
    fn test_unknown_scope_rejected_by_name() {
        let mut draft = valid_draft();
        draft.scopes = scopes(&["reports:read", "billing:read"]);

        assert_eq!(
            validate_draft(&draft, ScopeCatalog::builtin()),
            Err(ApiKeyValidationError::UnknownScope("billing:read".to_string()))
        );
    }

    #[test]
    fn test_zero_rate_limit_rejected() {
        let mut draft = valid_draft();
        draft.rate_limits = RateLimits::new(0, 1000, 10000);

        assert_eq!(
            validate_draft(&draft, ScopeCatalog::builtin()),
            Err(ApiKeyValidationError::InvalidRateLimit("per_minute"))
        );

        draft.rate_limits = RateLimits::new(60, 0, 10000);
        assert_eq!(
            validate_draft(&draft, ScopeCatalog::builtin()),
            Err(ApiKeyValidationError::InvalidRateLimit("per_hour"))
        );

        draft.rate_limits = RateLimits::new(60, 1000, 0);
        assert_eq!(
            validate_draft(&draft, ScopeCatalog::builtin()),
            Err(ApiKeyValidationError::InvalidRateLimit("per_day"))
        );
    }

    #[test]
    fn test_inconsistent_windows_are_accepted() {
        // per_hour smaller than per_minute is deliberately not rejected
        let mut draft = valid_draft();
        draft.rate_limits = RateLimits::new(100, 10, 10000);

        assert!(validate_draft(&draft, ScopeCatalog::builtin()).is_ok());
    }

    #[test]
    fn test_empty_patch_passes() {
        let patch = ApiKeyPatch::default();
        assert!(validate_patch(&patch, ScopeCatalog::builtin()).is_ok());
    }

    #[test]
    fn test_patch_with_bad_field_rejected() {
        let patch = ApiKeyPatch {
            scopes: Some(BTreeSet::new()),
            ..Default::default()
        };

        assert_eq!(
            validate_patch(&patch, ScopeCatalog::builtin()),
            Err(ApiKeyValidationError::NoScopes)
        );
    }
}
