//! Engine configuration model
//!
//! Everything the turn engine needs to run: the model, loop bounds, session
//! timings, the tool providers to connect and where prompt text comes from.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::ModelConfig;

use super::traits::{ConfigError, ConfigResult};

/// Environment variable naming an explicit config file
pub const ENV_CONFIG_PATH: &str = "MCPCHAT_CONFIG";
/// Environment variable overriding `chat.max_steps`
pub const ENV_MAX_STEPS: &str = "MCPCHAT_MAX_STEPS";
/// Environment variable overriding `server.bind`
pub const ENV_BIND: &str = "MCPCHAT_BIND";
/// Default bound on reaching a tool provider
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub chat: ChatSettings,
    #[serde(default)]
    pub tool_providers: Vec<ToolProviderConfig>,
    #[serde(default)]
    pub prompts: PromptSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

impl EngineConfig {
    /// Parse YAML text
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Apply `MCPCHAT_*` environment overrides
    pub fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_MAX_STEPS) {
            self.chat.max_steps = raw.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!(
                    "{} must be a positive integer, got {:?}",
                    ENV_MAX_STEPS, raw
                ))
            })?;
        }
        if let Some(bind) = lookup(ENV_BIND) {
            self.server.bind = bind;
        }
        Ok(())
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.chat.max_steps == 0 {
            return Err(ConfigError::Invalid("chat.max_steps must be at least 1".into()));
        }
        if self.chat.lock_timeout_ms == 0 {
            return Err(ConfigError::Invalid("chat.lock_timeout_ms must be positive".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for provider in &self.tool_providers {
            if !seen.insert(provider.name.to_lowercase()) {
                return Err(ConfigError::ProviderExists(provider.name.clone()));
            }
            if provider.connect_timeout_ms == 0 {
                return Err(ConfigError::Invalid(format!(
                    "tool provider {} needs a positive connect_timeout_ms",
                    provider.name
                )));
            }
            if let TransportConfig::Stdio { command, .. } = &provider.transport {
                if command.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "tool provider {} has an empty command",
                        provider.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Tool providers that are switched on
    pub fn enabled_tool_providers(&self) -> Vec<ToolProviderConfig> {
        self.tool_providers.iter().filter(|p| p.enabled).cloned().collect()
    }
}

/// Turn and session bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    /// Maximum generation steps per turn
    pub max_steps: u32,
    /// Maximum tools kept after selection
    pub max_selected_tools: usize,
    /// Session time-to-live, refreshed on every write
    pub session_ttl_secs: u64,
    /// How long a turn waits for the session lock
    pub lock_timeout_ms: u64,
    /// Token budget for a history summary
    pub summary_max_tokens: u32,
    /// User interactions kept when retrying a failed summary
    pub max_interactions_for_summary: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            max_steps: 10,
            max_selected_tools: 128,
            session_ttl_secs: 86_400,
            lock_timeout_ms: 30_000,
            summary_max_tokens: 2_000,
            max_interactions_for_summary: 10,
        }
    }
}

/// How to reach a tool provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    /// Spawn a child process and speak framed JSON over stdio
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cwd: Option<PathBuf>,
    },
    /// Streamable HTTP endpoint
    Http { url: String },
}

/// One configured tool provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolProviderConfig {
    /// Provider name; becomes the tag on every tool it exposes
    pub name: String,
    pub transport: TransportConfig,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Tools from this provider survive selection regardless of the model's choice
    #[serde(default)]
    pub always_on: bool,
    /// Keep this provider's tool list for the life of the process
    #[serde(default)]
    pub cache_tools: bool,
    /// Environment variable the caller's auth token is passed in (stdio only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token_env: Option<String>,
    /// If non-empty, only these tools are exposed
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Bound on connecting, and separately on listing tools
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

impl ToolProviderConfig {
    pub fn stdio(name: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        Self::with_transport(
            name,
            TransportConfig::Stdio {
                command: command.into(),
                args,
                env: HashMap::new(),
                cwd: None,
            },
        )
    }

    pub fn http(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::with_transport(name, TransportConfig::Http { url: url.into() })
    }

    fn with_transport(name: impl Into<String>, transport: TransportConfig) -> Self {
        Self {
            name: name.into(),
            transport,
            enabled: true,
            always_on: false,
            cache_tools: false,
            auth_token_env: None,
            include: vec![],
            exclude: vec![],
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }

    pub fn always_on(mut self) -> Self {
        self.always_on = true;
        self
    }

    pub fn cached(mut self) -> Self {
        self.cache_tools = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Whether a tool passes the include/exclude lists
    pub fn allows_tool(&self, name: &str) -> bool {
        if self.exclude.iter().any(|n| n == name) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|n| n == name)
    }
}

/// Where prompt text is loaded from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    /// Directory holding prompt files
    pub dir: Option<PathBuf>,
    /// Remote base URL tried before the directory
    pub remote_base_url: Option<String>,
    /// Base system prompt file name
    pub base_file: String,
    /// Provider tag to fragment file name
    pub fragments: HashMap<String, String>,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            dir: None,
            remote_base_url: None,
            base_file: "system.txt".to_string(),
            fragments: HashMap::new(),
        }
    }
}

/// HTTP surface settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}
