//! Application state for shared services

use std::sync::Arc;

use crate::infrastructure::api_key::ApiKeyService;

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub api_keys: Arc<ApiKeyService>,
}

impl AppState {
    pub fn new(api_keys: Arc<ApiKeyService>) -> Self {
        Self { api_keys }
    }
}
