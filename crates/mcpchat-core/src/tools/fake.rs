//! In-process tool providers for tests
//!
//! `FakeConnector` hands out `FakeConnection`s by provider name and can be
//! told to fail or hang particular providers, so registry and turn tests run
//! without spawning processes.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::config::ToolProviderConfig;
use crate::mcp::{McpError, McpResult, ToolConnection, ToolConnector, ToolOutput};
use crate::types::ToolDescriptor;

/// A connection that answers from memory
#[derive(Debug)]
pub struct FakeConnection {
    provider: String,
    tools: Vec<String>,
    fail_calls: bool,
    fail_list: bool,
    hang_list: bool,
    fail_close: bool,
    calls: Mutex<Vec<String>>,
    list_count: AtomicUsize,
    close_count: AtomicUsize,
}

impl FakeConnection {
    pub fn new(provider: impl Into<String>, tools: &[&str]) -> Self {
        Self {
            provider: provider.into(),
            tools: tools.iter().map(|t| t.to_string()).collect(),
            fail_calls: false,
            fail_list: false,
            hang_list: false,
            fail_close: false,
            calls: Mutex::new(Vec::new()),
            list_count: AtomicUsize::new(0),
            close_count: AtomicUsize::new(0),
        }
    }

    /// Every `call_tool` fails
    pub fn failing_calls(mut self) -> Self {
        self.fail_calls = true;
        self
    }

    /// `list_tools` fails
    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    /// `list_tools` never answers
    pub fn hanging_list(mut self) -> Self {
        self.hang_list = true;
        self
    }

    /// `close` fails (after being counted)
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Names of tools called so far
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn list_count(&self) -> usize {
        self.list_count.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolConnection for FakeConnection {
    fn provider(&self) -> &str {
        &self.provider
    }

    async fn list_tools(&self) -> McpResult<Vec<ToolDescriptor>> {
        self.list_count.fetch_add(1, Ordering::SeqCst);
        if self.hang_list {
            std::future::pending::<()>().await;
        }
        if self.fail_list {
            return Err(McpError::Protocol(format!("{} cannot list tools", self.provider)));
        }
        Ok(self
            .tools
            .iter()
            .map(|name| {
                let description = format!("{} from {}", name, self.provider);
                ToolDescriptor::new(name.clone(), description, &self.provider)
            })
            .collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<ToolOutput> {
        self.calls.lock().push(name.to_string());
        if self.fail_calls {
            return Err(McpError::ToolCallFailed(format!("{} is broken", name)));
        }
        Ok(ToolOutput::text(format!("{} -> {}", name, arguments)))
    }

    async fn close(&self) -> McpResult<()> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(McpError::Protocol(format!("{} refused to close", self.provider)));
        }
        Ok(())
    }
}

/// Connector over a fixed set of fake connections
#[derive(Debug, Default)]
pub struct FakeConnector {
    connections: HashMap<String, Arc<FakeConnection>>,
    unreachable: HashSet<String>,
    hanging: HashSet<String>,
    attempts: Mutex<Vec<(String, Option<String>)>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection under its provider name
    pub fn with_connection(mut self, connection: FakeConnection) -> Self {
        self.connections
            .insert(connection.provider.clone(), Arc::new(connection));
        self
    }

    /// Connecting to `provider` fails
    pub fn with_unreachable(mut self, provider: impl Into<String>) -> Self {
        self.unreachable.insert(provider.into());
        self
    }

    /// Connecting to `provider` never completes
    pub fn with_hanging(mut self, provider: impl Into<String>) -> Self {
        self.hanging.insert(provider.into());
        self
    }

    pub fn connection(&self, provider: &str) -> Option<Arc<FakeConnection>> {
        self.connections.get(provider).cloned()
    }

    /// Provider names and auth tokens of every connect attempt
    pub fn attempts(&self) -> Vec<(String, Option<String>)> {
        self.attempts.lock().clone()
    }

    /// Total closes across all connections
    pub fn total_closes(&self) -> usize {
        self.connections.values().map(|c| c.close_count()).sum()
    }
}

#[async_trait]
impl ToolConnector for FakeConnector {
    async fn connect(
        &self,
        config: &ToolProviderConfig,
        auth_token: Option<&str>,
    ) -> McpResult<Arc<dyn ToolConnection>> {
        self.attempts
            .lock()
            .push((config.name.clone(), auth_token.map(String::from)));

        if self.hanging.contains(&config.name) {
            std::future::pending::<()>().await;
        }
        if self.unreachable.contains(&config.name) {
            return Err(McpError::ConnectionFailed(format!("{} is unreachable", config.name)));
        }
        match self.connections.get(&config.name) {
            Some(connection) => Ok(Arc::clone(connection) as Arc<dyn ToolConnection>),
            None => Err(McpError::ConnectionFailed(format!("no provider named {}", config.name))),
        }
    }
}
