//! Usage telemetry implementations

mod in_memory;

pub use in_memory::{InMemoryUsageTelemetry, RequestSample};
