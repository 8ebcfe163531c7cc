//! Tool registry for one chat turn
//!
//! The ToolRegistry is responsible for:
//! - Connecting to every configured tool provider, independently and within
//!   each provider's connect timeout
//! - Listing each provider's tools and tagging them with the provider name
//! - Applying per-provider include/exclude filters
//! - Handing the live connections to a `ToolCatalog` that closes them

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::config::ToolProviderConfig;
use crate::logging::Logger;
use crate::mcp::{McpError, McpResult, ToolConnection, ToolConnector};
use crate::types::ToolDescriptor;
use crate::{log_debug, log_error, log_info, log_warn};

use super::cache::CatalogCache;
use super::catalog::ToolCatalog;

/// Outcome of connecting to a single provider
enum ProviderOutcome {
    Ready(Arc<dyn ToolConnection>, Vec<ToolDescriptor>),
    Failed(String),
}

/// Opens per-turn tool catalogs across configured providers
pub struct ToolRegistry {
    providers: Vec<ToolProviderConfig>,
    connector: Arc<dyn ToolConnector>,
    cache: Arc<CatalogCache>,
    logger: Arc<dyn Logger>,
}

impl ToolRegistry {
    /// Create a registry; disabled providers are dropped here
    pub fn new(
        providers: Vec<ToolProviderConfig>,
        connector: Arc<dyn ToolConnector>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            providers: providers.into_iter().filter(|p| p.enabled).collect(),
            connector,
            cache: Arc::new(CatalogCache::new()),
            logger,
        }
    }

    /// Share a listing cache with other registries
    pub fn with_cache(mut self, cache: Arc<CatalogCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &Arc<CatalogCache> {
        &self.cache
    }

    pub fn providers(&self) -> &[ToolProviderConfig] {
        &self.providers
    }

    /// Names of providers whose tools are always offered
    pub fn always_on_tags(&self) -> HashSet<String> {
        self.providers
            .iter()
            .filter(|p| p.always_on)
            .map(|p| p.name.clone())
            .collect()
    }

    /// Connect to every provider and gather their tools
    ///
    /// A provider that fails to connect or list is logged and left out. The
    /// returned catalog owns every connection that did open.
    pub async fn catalog(&self, auth_token: Option<&str>) -> ToolCatalog {
        if self.providers.is_empty() {
            return ToolCatalog::empty();
        }

        let outcomes = join_all(
            self.providers
                .iter()
                .map(|provider| self.open_provider(provider, auth_token)),
        )
        .await;

        let mut connections = Vec::new();
        let mut tools: Vec<ToolDescriptor> = Vec::new();
        let mut seen = HashSet::new();
        let mut failed = Vec::new();

        for outcome in outcomes {
            match outcome {
                ProviderOutcome::Ready(connection, listed) => {
                    for tool in listed {
                        if seen.insert(tool.name.clone()) {
                            tools.push(tool);
                        } else {
                            log_warn!(
                                self.logger,
                                "[ToolRegistry] Duplicate tool {} from {} ignored",
                                tool.name,
                                tool.provider_tag
                            );
                        }
                    }
                    connections.push(connection);
                }
                ProviderOutcome::Failed(name) => failed.push(name),
            }
        }

        log_info!(
            self.logger,
            "[ToolRegistry] Catalog ready: {} tools from {} providers ({} unavailable)",
            tools.len(),
            connections.len(),
            failed.len()
        );

        ToolCatalog::new(connections, tools, failed)
    }

    async fn open_provider(
        &self,
        provider: &ToolProviderConfig,
        auth_token: Option<&str>,
    ) -> ProviderOutcome {
        let limit = provider.connect_timeout();
        let connecting = self.connector.connect(provider, auth_token);
        let connection = match bounded(limit, "connect", connecting).await {
            Ok(connection) => connection,
            Err(e) => {
                log_error!(
                    self.logger,
                    "[ToolRegistry] Tool provider {} unavailable: {}",
                    provider.name,
                    e
                );
                return ProviderOutcome::Failed(provider.name.clone());
            }
        };

        let listing = async {
            if provider.cache_tools {
                self.cache
                    .get_or_populate(&provider.name, || connection.list_tools())
                    .await
            } else {
                connection.list_tools().await
            }
        };
        let listed = bounded(limit, "list tools", listing).await;

        match listed {
            Ok(tools) => {
                let tools: Vec<_> = tools
                    .into_iter()
                    .filter(|t| provider.allows_tool(&t.name))
                    .map(|mut t| {
                        t.provider_tag = provider.name.clone();
                        t
                    })
                    .collect();
                log_debug!(
                    self.logger,
                    "[ToolRegistry] {} exposes {} tools",
                    provider.name,
                    tools.len()
                );
                ProviderOutcome::Ready(connection, tools)
            }
            Err(e) => {
                log_error!(
                    self.logger,
                    "[ToolRegistry] Failed to list tools from {}: {}",
                    provider.name,
                    e
                );
                let _ = close_one(connection.as_ref(), self.logger.as_ref()).await;
                ProviderOutcome::Failed(provider.name.clone())
            }
        }
    }
}

/// Fail with `McpError::Timeout` once `limit` passes
async fn bounded<T, F>(limit: Duration, phase: &str, future: F) -> McpResult<T>
where
    F: Future<Output = McpResult<T>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(McpError::Timeout(format!(
            "no answer to {} within {}ms",
            phase,
            limit.as_millis()
        ))),
    }
}

async fn close_one(connection: &dyn ToolConnection, logger: &dyn Logger) -> Result<(), McpError> {
    let result = connection.close().await;
    if let Err(e) = &result {
        log_warn!(
            logger,
            "[ToolRegistry] Failed to close {}: {}",
            connection.provider(),
            e
        );
    }
    result
}

/// Close every connection, attempting all of them even when some fail
///
/// Failures are logged and counted, never returned as errors.
pub async fn close_all(connections: Vec<Arc<dyn ToolConnection>>, logger: &dyn Logger) -> usize {
    let results = join_all(
        connections
            .iter()
            .map(|connection| close_one(connection.as_ref(), logger)),
    )
    .await;
    results.iter().filter(|r| r.is_err()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogLevel, MemoryLogger, NoOpLogger};
    use crate::tools::{FakeConnection, FakeConnector};

    fn providers() -> Vec<ToolProviderConfig> {
        vec![
            ToolProviderConfig::stdio("alpha", "alpha-server", vec![]),
            ToolProviderConfig::stdio("beta", "beta-server", vec![]),
            ToolProviderConfig::http("gamma", "http://localhost:9000/mcp"),
        ]
    }

    fn connector() -> FakeConnector {
        FakeConnector::new()
            .with_connection(FakeConnection::new("alpha", &["list_flows", "run_flow"]))
            .with_unreachable("beta")
            .with_connection(FakeConnection::new("gamma", &["search_docs"]))
    }

    #[tokio::test]
    async fn test_failed_provider_is_excluded_and_logged() {
        let logger = Arc::new(MemoryLogger::new());
        let connector = Arc::new(connector());
        let registry = ToolRegistry::new(providers(), connector.clone(), logger.clone());

        let catalog = registry.catalog(Some("token")).await;

        let names: Vec<_> = catalog.tools().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["list_flows", "run_flow", "search_docs"]);
        assert_eq!(catalog.connection_count(), 2);
        assert_eq!(catalog.failed_providers(), &["beta".to_string()]);
        assert!(logger.contains(LogLevel::Error, "beta"));

        let tags = catalog.provider_tags();
        assert!(tags.contains("alpha") && tags.contains("gamma"));
        assert!(!tags.contains("beta"));

        assert_eq!(connector.attempts().len(), 3);
        assert!(connector
            .attempts()
            .iter()
            .all(|(_, token)| token.as_deref() == Some("token")));
    }

    #[tokio::test]
    async fn test_listing_failure_closes_connection() {
        let connector = Arc::new(
            FakeConnector::new()
                .with_connection(FakeConnection::new("alpha", &["list_flows"]).failing_list()),
        );
        let registry = ToolRegistry::new(
            vec![ToolProviderConfig::stdio("alpha", "alpha-server", vec![])],
            connector.clone(),
            Arc::new(MemoryLogger::new()),
        );

        let catalog = registry.catalog(None).await;
        assert!(catalog.is_empty());
        assert_eq!(catalog.connection_count(), 0);
        assert_eq!(connector.connection("alpha").unwrap().close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_provider_times_out_without_stalling_others() {
        let logger = Arc::new(MemoryLogger::new());
        let connector = FakeConnector::new()
            .with_connection(FakeConnection::new("alpha", &["list_flows"]))
            .with_hanging("beta");
        let registry = ToolRegistry::new(
            vec![
                ToolProviderConfig::stdio("alpha", "alpha-server", vec![]),
                ToolProviderConfig::stdio("beta", "beta-server", vec![])
                    .with_connect_timeout(Duration::from_millis(50)),
            ],
            Arc::new(connector),
            logger.clone(),
        );

        let catalog = registry.catalog(None).await;

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.failed_providers(), &["beta".to_string()]);
        assert!(logger.contains(LogLevel::Error, "no answer to connect within 50ms"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_listing_times_out_and_closes() {
        let logger = Arc::new(MemoryLogger::new());
        let connector = Arc::new(
            FakeConnector::new()
                .with_connection(FakeConnection::new("alpha", &["list_flows"]).hanging_list()),
        );
        let registry = ToolRegistry::new(
            vec![ToolProviderConfig::stdio("alpha", "alpha-server", vec![])
                .with_connect_timeout(Duration::from_millis(50))],
            connector.clone(),
            logger.clone(),
        );

        let catalog = registry.catalog(None).await;

        assert!(catalog.is_empty());
        assert_eq!(catalog.failed_providers(), &["alpha".to_string()]);
        assert_eq!(connector.connection("alpha").unwrap().close_count(), 1);
        assert!(logger.contains(LogLevel::Error, "no answer to list tools"));
    }

    #[tokio::test]
    async fn test_filters_and_disabled_providers() {
        let mut alpha = ToolProviderConfig::stdio("alpha", "alpha-server", vec![]);
        alpha.exclude = vec!["run_flow".to_string()];
        let gamma = ToolProviderConfig::http("gamma", "http://localhost:9000/mcp").disabled();

        let registry = ToolRegistry::new(
            vec![alpha, gamma],
            Arc::new(connector()),
            Arc::new(MemoryLogger::new()),
        );
        assert_eq!(registry.providers().len(), 1);

        let catalog = registry.catalog(None).await;
        let names: Vec<_> = catalog.tools().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["list_flows"]);
    }

    #[tokio::test]
    async fn test_duplicate_tool_names_keep_first() {
        let connector = FakeConnector::new()
            .with_connection(FakeConnection::new("alpha", &["search"]))
            .with_connection(FakeConnection::new("gamma", &["search"]));
        let registry = ToolRegistry::new(
            vec![
                ToolProviderConfig::stdio("alpha", "a", vec![]),
                ToolProviderConfig::stdio("gamma", "g", vec![]),
            ],
            Arc::new(connector),
            Arc::new(MemoryLogger::new()),
        );

        let catalog = registry.catalog(None).await;
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.tools()[0].provider_tag, "alpha");
    }

    #[tokio::test]
    async fn test_cached_provider_listed_once() {
        let connector = Arc::new(
            FakeConnector::new().with_connection(FakeConnection::new("alpha", &["list_flows"])),
        );
        let registry = ToolRegistry::new(
            vec![ToolProviderConfig::stdio("alpha", "a", vec![]).cached()],
            connector.clone(),
            Arc::new(MemoryLogger::new()),
        );

        for _ in 0..3 {
            let catalog = registry.catalog(None).await;
            assert_eq!(catalog.len(), 1);
            catalog.close(&NoOpLogger).await;
        }
        let alpha = connector.connection("alpha").unwrap();
        assert_eq!(alpha.list_count(), 1);
        assert_eq!(alpha.close_count(), 3);
        assert!(registry.cache().is_populated("alpha"));
    }

    #[tokio::test]
    async fn test_close_all_attempts_every_connection() {
        let a = Arc::new(FakeConnection::new("alpha", &[]).failing_close());
        let b = Arc::new(FakeConnection::new("beta", &[]));
        let c = Arc::new(FakeConnection::new("gamma", &[]).failing_close());
        let logger = MemoryLogger::new();

        let connections: Vec<Arc<dyn ToolConnection>> = vec![a.clone(), b.clone(), c.clone()];
        let failures = close_all(connections, &logger).await;

        assert_eq!(failures, 2);
        assert_eq!(a.close_count() + b.close_count() + c.close_count(), 3);
        assert_eq!(logger.messages_at(LogLevel::Warn).len(), 2);
    }

    #[test]
    fn test_always_on_tags() {
        let registry = ToolRegistry::new(
            vec![
                ToolProviderConfig::stdio("alpha", "a", vec![]).always_on(),
                ToolProviderConfig::stdio("beta", "b", vec![]),
            ],
            Arc::new(FakeConnector::new()),
            Arc::new(MemoryLogger::new()),
        );
        let tags = registry.always_on_tags();
        assert!(tags.contains("alpha"));
        assert_eq!(tags.len(), 1);
    }
}
