//! In-memory configuration provider

use async_trait::async_trait;
use parking_lot::RwLock;

use super::settings::{EngineConfig, ToolProviderConfig};
use super::traits::{insert_provider, remove_provider, ConfigProvider, ConfigResult};

/// In-memory configuration provider for testing
#[derive(Debug, Default)]
pub struct MemoryConfigProvider {
    config: RwLock<EngineConfig>,
}

impl MemoryConfigProvider {
    /// Create a memory config provider holding defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory config provider with an initial configuration
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    /// Replace the configuration
    pub fn set_config(&self, config: EngineConfig) {
        *self.config.write() = config;
    }
}

#[async_trait]
impl ConfigProvider for MemoryConfigProvider {
    async fn engine_config(&self) -> ConfigResult<EngineConfig> {
        Ok(self.config.read().clone())
    }

    async fn add_tool_provider(&self, config: ToolProviderConfig) -> ConfigResult<()> {
        insert_provider(&mut self.config.write().tool_providers, config)
    }

    async fn remove_tool_provider(&self, name: &str) -> ConfigResult<()> {
        remove_provider(&mut self.config.write().tool_providers, name)
    }
}
