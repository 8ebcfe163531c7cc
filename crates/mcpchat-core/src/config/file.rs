//! File-based configuration provider (YAML)
//!
//! Supports user-level (~/.config/mcpchat/config.yaml), workspace-level
//! (.config/mcpchat/config.yaml) and explicit paths.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::settings::{EngineConfig, ToolProviderConfig, ENV_CONFIG_PATH};
use super::traits::{insert_provider, remove_provider, ConfigError, ConfigProvider, ConfigResult};

/// Config level (user, workspace or explicit)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLevel {
    /// User-level config (~/.config/mcpchat/config.yaml)
    User,
    /// Workspace-level config (.config/mcpchat/config.yaml in workspace root)
    Workspace,
    /// Path given on the command line or in `MCPCHAT_CONFIG`
    Explicit,
}

impl ConfigLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigLevel::User => "user",
            ConfigLevel::Workspace => "workspace",
            ConfigLevel::Explicit => "explicit",
        }
    }
}

/// File-based configuration provider
///
/// A missing file yields defaults. The parsed file is cached until `reload`.
/// Environment overrides are applied on every read and never written back.
///
/// # Example
///
/// ```no_run
/// use mcpchat_core::config::FileConfigProvider;
///
/// // User-level config
/// let user_config = FileConfigProvider::user();
///
/// // Workspace-level config
/// let workspace_config = FileConfigProvider::workspace("/path/to/workspace");
/// ```
pub struct FileConfigProvider {
    path: PathBuf,
    level: ConfigLevel,
    cache: RwLock<Option<EngineConfig>>,
}

impl FileConfigProvider {
    /// Create a new file config provider for a specific path
    pub fn new(path: impl Into<PathBuf>, level: ConfigLevel) -> Self {
        Self {
            path: path.into(),
            level,
            cache: RwLock::new(None),
        }
    }

    /// Create a user-level config provider (~/.config/mcpchat/config.yaml)
    pub fn user() -> Self {
        // XDG config directory (~/.config on Linux, ~/Library/Application Support on macOS)
        let config_dir = dirs::config_dir().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config")
        });
        let path = config_dir.join("mcpchat").join("config.yaml");
        Self::new(path, ConfigLevel::User)
    }

    /// Create a workspace-level config provider (.config/mcpchat/config.yaml)
    pub fn workspace(workspace_root: impl AsRef<Path>) -> Self {
        let path = workspace_root.as_ref().join(".config").join("mcpchat").join("config.yaml");
        Self::new(path, ConfigLevel::Workspace)
    }

    /// Explicit path, else `MCPCHAT_CONFIG`, else the user-level file
    pub fn discover(explicit: Option<PathBuf>) -> Self {
        explicit
            .or_else(|| std::env::var_os(ENV_CONFIG_PATH).map(PathBuf::from))
            .map(|p| Self::new(p, ConfigLevel::Explicit))
            .unwrap_or_else(Self::user)
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the config level
    pub fn level(&self) -> ConfigLevel {
        self.level
    }

    /// Check if the config file exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load config from file
    fn load(&self) -> ConfigResult<EngineConfig> {
        if !self.path.exists() {
            return Ok(EngineConfig::default());
        }

        let content = fs::read_to_string(&self.path)?;
        EngineConfig::from_yaml_str(&content)
    }

    /// Save config to file
    fn save(&self, config: &EngineConfig) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&self.path, serde_yaml::to_string(config)?)?;
        *self.cache.write() = Some(config.clone());
        Ok(())
    }

    /// Get cached or load config (file contents only)
    fn get_config(&self) -> ConfigResult<EngineConfig> {
        if let Some(config) = self.cache.read().as_ref() {
            return Ok(config.clone());
        }

        let config = self.load()?;
        *self.cache.write() = Some(config.clone());
        Ok(config)
    }

    /// Reload config from disk (invalidate cache)
    pub fn reload(&self) -> ConfigResult<EngineConfig> {
        let config = self.load()?;
        *self.cache.write() = Some(config.clone());
        Ok(config)
    }
}

impl std::fmt::Debug for FileConfigProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileConfigProvider")
            .field("path", &self.path)
            .field("level", &self.level)
            .field("exists", &self.exists())
            .finish()
    }
}

#[async_trait]
impl ConfigProvider for FileConfigProvider {
    async fn engine_config(&self) -> ConfigResult<EngineConfig> {
        let mut config = self.get_config()?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    async fn add_tool_provider(&self, provider: ToolProviderConfig) -> ConfigResult<()> {
        let mut config = self.get_config()?;
        insert_provider(&mut config.tool_providers, provider)?;
        self.save(&config)
    }

    async fn remove_tool_provider(&self, name: &str) -> ConfigResult<()> {
        let mut config = self.get_config()?;
        remove_provider(&mut config.tool_providers, name)?;
        self.save(&config)
    }
}
