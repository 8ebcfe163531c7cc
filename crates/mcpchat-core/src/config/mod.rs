//! Configuration
//!
//! Supports multiple configuration sources:
//! - `MemoryConfigProvider`: In-memory for testing
//! - `FileConfigProvider`: YAML file-based (user/workspace/explicit path)

mod file;
mod memory;
mod settings;
mod traits;

pub use file::{ConfigLevel, FileConfigProvider};
pub use memory::MemoryConfigProvider;
pub use settings::{
    ChatSettings, EngineConfig, PromptSettings, ServerSettings, ToolProviderConfig, TransportConfig,
    ENV_BIND, ENV_CONFIG_PATH, ENV_MAX_STEPS,
};
pub use traits::{ConfigError, ConfigProvider, ConfigResult};
