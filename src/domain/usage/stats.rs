//! Usage statistics read model

use serde::{Deserialize, Serialize};

/// Request count for a single endpoint, used in the most-used ranking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointCount {
    /// HTTP method
    pub method: String,
    /// Endpoint path
    pub endpoint: String,
    /// Number of requests observed
    pub count: u64,
}

/// Aggregated usage statistics for one API key
///
/// Supplied by the telemetry collaborator; this core treats the numbers
/// as opaque and does not check that the windowed counts are consistent
/// with each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKeyUsageStats {
    pub total_requests: u64,
    pub requests_last_24h: u64,
    pub requests_last_7d: u64,
    pub requests_last_30d: u64,
    pub avg_response_time_ms: f64,
    /// Fraction of failed requests in [0, 1]; absent when unknown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_rate: Option<f64>,
    /// Ordered descending by count, length bounded by the telemetry source
    pub most_used_endpoints: Vec<EndpointCount>,
}

impl ApiKeyUsageStats {
    /// Stats for a key that has never been used
    pub fn empty() -> Self {
        Self {
            total_requests: 0,
            requests_last_24h: 0,
            requests_last_7d: 0,
            requests_last_30d: 0,
            avg_response_time_ms: 0.0,
            error_rate: None,
            most_used_endpoints: Vec::new(),
        }
    }
}

impl Default for ApiKeyUsageStats {
    fn default() -> Self {
        Self::empty()
    }
}
