//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, KeyConfig, LogFormat, LoggingConfig, MetricsConfig, ServerConfig, StorageConfig,
};
