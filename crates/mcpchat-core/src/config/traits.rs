//! Configuration provider trait

use async_trait::async_trait;

use super::settings::{EngineConfig, ToolProviderConfig};

/// Configuration provider abstraction
///
/// Implementations:
/// - `MemoryConfigProvider`: In-memory for testing
/// - `FileConfigProvider`: YAML file (~/.config/mcpchat/config.yaml)
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Load the full engine configuration
    async fn engine_config(&self) -> ConfigResult<EngineConfig>;

    /// Get all configured tool providers
    async fn tool_providers(&self) -> Vec<ToolProviderConfig> {
        self.engine_config()
            .await
            .map(|c| c.tool_providers)
            .unwrap_or_default()
    }

    /// Add a new tool provider
    async fn add_tool_provider(&self, config: ToolProviderConfig) -> ConfigResult<()>;

    /// Remove a tool provider
    async fn remove_tool_provider(&self, name: &str) -> ConfigResult<()>;
}

/// Errors that can occur during configuration operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Tool provider not found: {0}")]
    ProviderNotFound(String),

    #[error("Tool provider already exists: {0}")]
    ProviderExists(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Insert a provider unless one with the same name (case-insensitive) exists
pub(crate) fn insert_provider(
    providers: &mut Vec<ToolProviderConfig>,
    config: ToolProviderConfig,
) -> ConfigResult<()> {
    let name_lower = config.name.to_lowercase();
    if providers.iter().any(|p| p.name.to_lowercase() == name_lower) {
        return Err(ConfigError::ProviderExists(config.name));
    }
    providers.push(config);
    Ok(())
}

/// Remove a provider by name (case-insensitive)
pub(crate) fn remove_provider(
    providers: &mut Vec<ToolProviderConfig>,
    name: &str,
) -> ConfigResult<()> {
    let name_lower = name.to_lowercase();
    let original_len = providers.len();
    providers.retain(|p| p.name.to_lowercase() != name_lower);
    if providers.len() == original_len {
        Err(ConfigError::ProviderNotFound(name.to_string()))
    } else {
        Ok(())
    }
}
