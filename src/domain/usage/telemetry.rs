//! Usage telemetry collaborator contract

use async_trait::async_trait;

use crate::domain::api_key::ApiKeyId;
use crate::domain::DomainError;

use super::stats::ApiKeyUsageStats;

/// Read-side contract for per-key usage statistics
///
/// The lifecycle manager never writes through this interface; aggregation
/// happens in the telemetry collaborator. A key unknown to the collaborator
/// reports empty stats.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsageTelemetry: Send + Sync {
    /// Aggregated statistics for one key
    async fn stats_for(&self, id: &ApiKeyId) -> Result<ApiKeyUsageStats, DomainError>;

    /// Drop all recorded usage for a key (called on irreversible delete)
    async fn forget(&self, id: &ApiKeyId) -> Result<(), DomainError>;
}
