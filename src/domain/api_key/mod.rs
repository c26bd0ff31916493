//! API Key domain module

mod draft;
mod entity;
mod repository;
mod validation;

pub use draft::{ApiKeyDraft, ApiKeyPatch};
pub use entity::{filter_by_search, ApiKey, ApiKeyId, ApiKeyParts, RateLimits};
pub use repository::ApiKeyRepository;
pub use validation::{
    validate_draft, validate_name, validate_patch, validate_rate_limits, validate_scopes,
    ApiKeyValidationError,
};
