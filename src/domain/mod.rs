//! Domain layer - Core business logic and entities

pub mod account;
pub mod api_key;
pub mod error;
pub mod scope;
pub mod usage;

pub use account::{AccountId, AccountValidationError};
pub use api_key::{
    filter_by_search, ApiKey, ApiKeyDraft, ApiKeyId, ApiKeyPatch, ApiKeyRepository,
    ApiKeyValidationError, RateLimits,
};
pub use error::DomainError;
pub use scope::{toggle_category, ApiScope, ScopeCatalog};
pub use usage::{ApiKeyUsageStats, EndpointCount, UsageTelemetry};
