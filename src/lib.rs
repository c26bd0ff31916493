//! Pulse Analytics API
//!
//! Credential administration service for the Pulse BI platform:
//! - API key lifecycle (create, rotate, toggle, update, delete)
//! - Scope catalog with grouped bulk selection
//! - Per-key rate limiting and usage statistics

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info};

use api::state::AppState;
use domain::account::AccountId;
use domain::api_key::{ApiKeyDraft, ApiKeyRepository, RateLimits};
use domain::scope::ScopeCatalog;
use domain::usage::UsageTelemetry;
use domain::DomainError;
use infrastructure::api_key::{
    ApiKeyService, InMemoryApiKeyRepository, PostgresApiKeyRepository, SecretGenerator,
};
use infrastructure::usage::InMemoryUsageTelemetry;

/// Create the application state with all services initialized
pub async fn create_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let repository = create_repository(config).await?;
    let telemetry: Arc<dyn UsageTelemetry> = Arc::new(InMemoryUsageTelemetry::new());
    let catalog = Arc::new(ScopeCatalog::builtin().clone());

    let api_keys = Arc::new(
        ApiKeyService::new(repository, telemetry, catalog)
            .with_generator(SecretGenerator::new(&config.keys.secret_prefix)),
    );

    if let Ok(material) = std::env::var("ADMIN_API_KEY") {
        bootstrap_admin_key(&api_keys, &config.keys.secret_prefix, &material).await?;
    }

    Ok(AppState::new(api_keys))
}

async fn create_repository(config: &AppConfig) -> anyhow::Result<Arc<dyn ApiKeyRepository>> {
    match config.storage.backend.as_str() {
        "postgres" => {
            let database_url = std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL is required for postgres storage"))?;

            info!("Connecting to PostgreSQL...");
            let pool = sqlx::PgPool::connect(&database_url)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to connect to PostgreSQL: {}", e))?;

            let repository = PostgresApiKeyRepository::new(pool);
            repository.ensure_table().await?;
            info!("PostgreSQL storage ready");

            Ok(Arc::new(repository))
        }
        other => {
            if other != "memory" {
                info!("Unknown storage backend '{}', using in-memory", other);
            } else {
                info!("Using in-memory storage");
            }

            Ok(Arc::new(InMemoryApiKeyRepository::new()))
        }
    }
}

/// Seed a platform-operator key from the ADMIN_API_KEY environment
/// variable so operators can reach the admin API on a fresh deployment.
///
/// The variable holds the secret material; the full secret is the
/// configured type prefix followed by that material.
async fn bootstrap_admin_key(
    api_keys: &ApiKeyService,
    secret_prefix: &str,
    material: &str,
) -> anyhow::Result<()> {
    // Accept the full secret too, stripping the type prefix
    let material = material.strip_prefix(secret_prefix).unwrap_or(material);

    let scopes: BTreeSet<String> = ["admin:keys".to_string(), "admin:settings".to_string()]
        .into_iter()
        .collect();

    let draft = ApiKeyDraft::new("Platform admin", scopes, RateLimits::new(120, 5000, 50000))
        .with_description("Bootstrap key seeded from ADMIN_API_KEY");

    match api_keys
        .create_with_secret(&AccountId::platform(), draft, material)
        .await
    {
        Ok(created) => {
            info!("Admin API key created with ID: {}", created.api_key.id());
            Ok(())
        }
        // A previous boot already seeded this secret
        Err(DomainError::Conflict { .. }) => {
            debug!("Admin API key already present, skipping bootstrap");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
