//! Transport-agnostic tool connections
//!
//! The registry only ever sees `ToolConnector` and `ToolConnection`; process
//! spawning and HTTP handshakes stay behind `McpConnector`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::config::{ToolProviderConfig, TransportConfig};
use crate::logging::Logger;
use crate::types::ToolDescriptor;

use super::client::{to_descriptor, McpClient, McpError, McpResult, ToolOutput};

/// One live channel to a tool provider
#[async_trait]
pub trait ToolConnection: Send + Sync {
    /// Provider name; every descriptor from this connection carries it as tag
    fn provider(&self) -> &str;

    /// Capability listing
    async fn list_tools(&self) -> McpResult<Vec<ToolDescriptor>>;

    /// Invoke one tool
    async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<ToolOutput>;

    /// Release the channel; later calls fail with `McpError::Closed`
    async fn close(&self) -> McpResult<()>;
}

/// Opens connections to configured providers
#[async_trait]
pub trait ToolConnector: Send + Sync {
    async fn connect(
        &self,
        config: &ToolProviderConfig,
        auth_token: Option<&str>,
    ) -> McpResult<Arc<dyn ToolConnection>>;
}

/// Connection backed by an rmcp client
pub struct McpConnection {
    provider: String,
    client: Mutex<Option<McpClient>>,
}

impl McpConnection {
    pub fn new(provider: impl Into<String>, client: McpClient) -> Self {
        Self {
            provider: provider.into(),
            client: Mutex::new(Some(client)),
        }
    }
}

#[async_trait]
impl ToolConnection for McpConnection {
    fn provider(&self) -> &str {
        &self.provider
    }

    async fn list_tools(&self) -> McpResult<Vec<ToolDescriptor>> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or(McpError::Closed)?;
        let tools = client.list_tools().await?;
        Ok(tools
            .into_iter()
            .map(|t| to_descriptor(t, &self.provider))
            .collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<ToolOutput> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or(McpError::Closed)?;
        Ok(client.call_tool(name, arguments).await?.into())
    }

    async fn close(&self) -> McpResult<()> {
        let client = self.client.lock().await.take();
        match client {
            Some(client) => client.close().await,
            None => Ok(()),
        }
    }
}

/// Connector speaking MCP over the configured transport
pub struct McpConnector {
    logger: Arc<dyn Logger>,
}

impl McpConnector {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self { logger }
    }

    /// Build the child process command for a stdio provider
    pub fn stdio_command(config: &ToolProviderConfig, auth_token: Option<&str>) -> Option<Command> {
        let TransportConfig::Stdio { command, args, env, cwd } = &config.transport else {
            return None;
        };

        let mut cmd = Command::new(command);
        cmd.args(args).envs(env).kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        if let (Some(var), Some(token)) = (&config.auth_token_env, auth_token) {
            cmd.env(var, token);
        }
        Some(cmd)
    }
}

#[async_trait]
impl ToolConnector for McpConnector {
    async fn connect(
        &self,
        config: &ToolProviderConfig,
        auth_token: Option<&str>,
    ) -> McpResult<Arc<dyn ToolConnection>> {
        let client = match &config.transport {
            TransportConfig::Stdio { .. } => {
                let cmd = Self::stdio_command(config, auth_token).ok_or_else(|| {
                    McpError::ConnectionFailed(format!("{} is not a stdio provider", config.name))
                })?;
                McpClient::connect_stdio(cmd, Arc::clone(&self.logger)).await?
            }
            TransportConfig::Http { url } => {
                McpClient::connect_http(url, Arc::clone(&self.logger)).await?
            }
        };

        Ok(Arc::new(McpConnection::new(config.name.clone(), client)))
    }
}
