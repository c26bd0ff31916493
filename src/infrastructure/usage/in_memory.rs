//! In-memory usage telemetry
//!
//! Records one sample per authorized request and aggregates them into the
//! windowed statistics shape on demand. Stands in for the platform's
//! telemetry pipeline in development and tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::domain::api_key::ApiKeyId;
use crate::domain::usage::{ApiKeyUsageStats, EndpointCount, UsageTelemetry};
use crate::domain::DomainError;

/// One observed request
#[derive(Debug, Clone)]
pub struct RequestSample {
    pub method: String,
    pub endpoint: String,
    pub status: u16,
    pub latency_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl RequestSample {
    pub fn new(
        method: impl Into<String>,
        endpoint: impl Into<String>,
        status: u16,
        latency_ms: u64,
    ) -> Self {
        Self {
            method: method.into(),
            endpoint: endpoint.into(),
            status,
            latency_ms,
            timestamp: Utc::now(),
        }
    }

    fn is_error(&self) -> bool {
        self.status >= 400
    }
}

/// In-memory implementation of [`UsageTelemetry`]
#[derive(Debug)]
pub struct InMemoryUsageTelemetry {
    samples: Arc<RwLock<HashMap<ApiKeyId, Vec<RequestSample>>>>,
    /// Upper bound on the most-used-endpoints ranking length
    max_endpoints: usize,
}

impl InMemoryUsageTelemetry {
    pub fn new() -> Self {
        Self {
            samples: Arc::new(RwLock::new(HashMap::new())),
            max_endpoints: 10,
        }
    }

    pub fn with_max_endpoints(mut self, max: usize) -> Self {
        self.max_endpoints = max;
        self
    }

    /// Record a request sample for a key
    pub async fn record(&self, id: ApiKeyId, sample: RequestSample) {
        let mut samples = self.samples.write().await;
        samples.entry(id).or_default().push(sample);
    }

    fn aggregate(&self, samples: &[RequestSample]) -> ApiKeyUsageStats {
        if samples.is_empty() {
            return ApiKeyUsageStats::empty();
        }

        let now = Utc::now();
        let day_ago = now - Duration::hours(24);
        let week_ago = now - Duration::days(7);
        let month_ago = now - Duration::days(30);

        let total = samples.len() as u64;
        let errors = samples.iter().filter(|s| s.is_error()).count() as u64;
        let latency_sum: u64 = samples.iter().map(|s| s.latency_ms).sum();

        let mut per_endpoint: HashMap<(String, String), u64> = HashMap::new();

        for sample in samples {
            *per_endpoint
                .entry((sample.method.clone(), sample.endpoint.clone()))
                .or_default() += 1;
        }

        let mut most_used: Vec<EndpointCount> = per_endpoint
            .into_iter()
            .map(|((method, endpoint), count)| EndpointCount {
                method,
                endpoint,
                count,
            })
            .collect();

        // Descending by count; ties broken by path for a stable ranking
        most_used.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.endpoint.cmp(&b.endpoint))
                .then_with(|| a.method.cmp(&b.method))
        });
        most_used.truncate(self.max_endpoints);

        ApiKeyUsageStats {
            total_requests: total,
            requests_last_24h: samples.iter().filter(|s| s.timestamp >= day_ago).count() as u64,
            requests_last_7d: samples.iter().filter(|s| s.timestamp >= week_ago).count() as u64,
            requests_last_30d: samples.iter().filter(|s| s.timestamp >= month_ago).count()
                as u64,
            avg_response_time_ms: latency_sum as f64 / total as f64,
            error_rate: Some(errors as f64 / total as f64),
            most_used_endpoints: most_used,
        }
    }
}

impl Default for InMemoryUsageTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UsageTelemetry for InMemoryUsageTelemetry {
    async fn stats_for(&self, id: &ApiKeyId) -> Result<ApiKeyUsageStats, DomainError> {
        let samples = self.samples.read().await;

        Ok(samples
            .get(id)
            .map(|s| self.aggregate(s))
            .unwrap_or_else(ApiKeyUsageStats::empty))
    }

    async fn forget(&self, id: &ApiKeyId) -> Result<(), DomainError> {
        let mut samples = self.samples.write().await;
        samples.remove(id);
        Ok(())
    }
}
