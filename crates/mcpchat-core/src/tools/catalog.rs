//! Turn-scoped tool catalog
//!
//! Holds the live connections opened for one turn together with the tools
//! they expose. Connections leave the catalog only through `close`, which
//! consumes it.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::log_warn;
use crate::logging::Logger;
use crate::mcp::ToolConnection;
use crate::types::{ToolCall, ToolDescriptor, ToolResult};

use super::registry::close_all;

/// Aggregated tools across the connections of one turn
pub struct ToolCatalog {
    connections: Vec<Arc<dyn ToolConnection>>,
    tools: Vec<ToolDescriptor>,
    /// Tool name to index into `connections`
    owners: HashMap<String, usize>,
    /// Providers that failed to connect or list
    failed_providers: Vec<String>,
}

impl ToolCatalog {
    /// Catalog with no connections and no tools
    pub fn empty() -> Self {
        Self {
            connections: Vec::new(),
            tools: Vec::new(),
            owners: HashMap::new(),
            failed_providers: Vec::new(),
        }
    }

    pub(crate) fn new(
        connections: Vec<Arc<dyn ToolConnection>>,
        tools: Vec<ToolDescriptor>,
        failed_providers: Vec<String>,
    ) -> Self {
        let index: HashMap<&str, usize> = connections
            .iter()
            .enumerate()
            .map(|(i, c)| (c.provider(), i))
            .collect();
        let owners = tools
            .iter()
            .filter_map(|t| index.get(t.provider_tag.as_str()).map(|i| (t.name.clone(), *i)))
            .collect();

        Self {
            connections,
            tools,
            owners,
            failed_providers,
        }
    }

    /// Every tool, in provider configuration order
    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.owners.contains_key(name)
    }

    /// Distinct provider tags present in the catalog
    pub fn provider_tags(&self) -> BTreeSet<String> {
        self.tools.iter().map(|t| t.provider_tag.clone()).collect()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn failed_providers(&self) -> &[String] {
        &self.failed_providers
    }

    /// Invoke a tool call on the connection that owns the tool
    ///
    /// Unknown tools and provider failures come back as error results so the
    /// model can see what went wrong.
    pub async fn invoke(&self, call: &ToolCall, logger: &dyn Logger) -> ToolResult {
        let Some(&owner) = self.owners.get(&call.name) else {
            log_warn!(logger, "[ToolCatalog] Model called unknown tool: {}", call.name);
            return ToolResult::error(&call.id, format!("Error: unknown tool '{}'", call.name));
        };
        let connection = &self.connections[owner];

        match connection.call_tool(&call.name, call.input.clone()).await {
            Ok(output) => ToolResult {
                call_id: call.id.clone(),
                content: output.content,
                is_error: output.is_error,
            },
            Err(e) => {
                log_warn!(
                    logger,
                    "[ToolCatalog] Tool {} on {} failed: {}",
                    call.name,
                    connection.provider(),
                    e
                );
                ToolResult::error(&call.id, format!("Error: {}", e))
            }
        }
    }

    /// Invoke several calls in order
    pub async fn invoke_all(&self, calls: &[ToolCall], logger: &dyn Logger) -> Vec<ToolResult> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.invoke(call, logger).await);
        }
        results
    }

    /// Close every connection; returns how many closes failed
    pub async fn close(self, logger: &dyn Logger) -> usize {
        close_all(self.connections, logger).await
    }
}

impl std::fmt::Debug for ToolCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCatalog")
            .field("connections", &self.connections.len())
            .field("tools", &self.tools.len())
            .field("failed_providers", &self.failed_providers)
            .finish()
    }
}
