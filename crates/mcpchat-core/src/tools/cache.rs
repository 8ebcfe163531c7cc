//! Process-wide tool listing cache
//!
//! Providers marked `cache_tools` are listed once and the result is kept for
//! the life of the owning `CatalogCache`. Each provider gets its own
//! populate-once cell, so concurrent turns never list the same provider twice
//! and a failed listing leaves the cell empty for the next turn to retry.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;

use crate::types::ToolDescriptor;

type Cell = Arc<OnceCell<Vec<ToolDescriptor>>>;

/// Owned cache of per-provider tool listings
#[derive(Debug, Default)]
pub struct CatalogCache {
    entries: Mutex<HashMap<String, Cell>>,
}

impl CatalogCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, provider: &str) -> Cell {
        Arc::clone(
            self.entries
                .lock()
                .entry(provider.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new())),
        )
    }

    /// Cached listing, or run `populate` once and keep its result
    pub async fn get_or_populate<F, Fut, E>(
        &self,
        provider: &str,
        populate: F,
    ) -> Result<Vec<ToolDescriptor>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<ToolDescriptor>, E>>,
    {
        let cell = self.cell(provider);
        cell.get_or_try_init(populate).await.cloned()
    }

    /// Cached listing without populating
    pub fn get(&self, provider: &str) -> Option<Vec<ToolDescriptor>> {
        self.entries
            .lock()
            .get(provider)
            .and_then(|cell| cell.get().cloned())
    }

    pub fn is_populated(&self, provider: &str) -> bool {
        self.get(provider).is_some()
    }

    /// Drop one provider's listing
    pub fn invalidate(&self, provider: &str) {
        self.entries.lock().remove(provider);
    }

    /// Drop every listing
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn listing(tag: &str) -> Vec<ToolDescriptor> {
        vec![ToolDescriptor::new("list_flows", "List flows", tag)]
    }

    #[tokio::test]
    async fn test_populates_once() {
        let cache = CatalogCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let tools = cache
                .get_or_populate("openops", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(listing("openops"))
                })
                .await
                .unwrap();
            assert_eq!(tools.len(), 1);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_populated("openops"));
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let cache = CatalogCache::new();
        let failed = cache
            .get_or_populate("openops", || async { Err::<Vec<ToolDescriptor>, _>("down") })
            .await;
        assert!(failed.is_err());
        assert!(!cache.is_populated("openops"));

        let tools = cache
            .get_or_populate("openops", || async { Ok::<_, &str>(listing("openops")) })
            .await
            .unwrap();
        assert_eq!(tools[0].provider_tag, "openops");
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let cache = CatalogCache::new();
        for tag in ["a", "b"] {
            cache
                .get_or_populate(tag, || async move { Ok::<_, String>(listing(tag)) })
                .await
                .unwrap();
        }

        cache.invalidate("a");
        assert!(!cache.is_populated("a"));
        assert!(cache.is_populated("b"));

        cache.clear();
        assert!(cache.get("b").is_none());
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_population() {
        let cache = Arc::new(CatalogCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    cache
                        .get_or_populate("openops", || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::task::yield_now().await;
                            Ok::<_, String>(listing("openops"))
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
