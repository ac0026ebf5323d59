/// TOML configuration file, validation and hot reloading.
pub mod toml_config;

use crate::types::{AppError, Result};
use std::time::Duration;

/// HTTP client shared by the LLM and search collaborators.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("delve/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))
}
