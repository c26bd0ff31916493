//! API middleware components

pub mod admin_auth;
pub mod auth;
pub mod metrics;

pub use admin_auth::{RequireAdmin, ADMIN_KEYS_SCOPE};
pub use auth::RequireApiKey;
pub use metrics::metrics_middleware;
