//! API Key infrastructure implementations
//!
//! Secret generation, lifecycle service, rate limiting and the storage
//! backends for key records.

mod generator;
mod postgres;
mod rate_limiter;
mod repository;
mod service;

pub use generator::{GeneratedSecret, SecretGenerator};
pub use postgres::PostgresApiKeyRepository;
pub use rate_limiter::{LimitWindow, RateLimitDecision, RateLimiter};
pub use repository::InMemoryApiKeyRepository;
pub use service::{ApiKeyService, CreatedApiKey, RotatedApiKey};
