//! Keyed mutual exclusion with bounded waits

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::error::{SessionError, SessionResult};

/// A held lock; released when dropped
pub struct LockGuard {
    key: String,
    _held: Box<dyn Any + Send + Sync>,
}

impl LockGuard {
    pub fn new(key: impl Into<String>, held: impl Any + Send + Sync) -> Self {
        Self {
            key: key.into(),
            _held: Box::new(held),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Release explicitly
    pub fn release(self) {}
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard").field("key", &self.key).finish()
    }
}

/// Mutex substrate
#[async_trait]
pub trait LockProvider: Send + Sync {
    /// Wait up to `timeout` for `key`
    async fn acquire(&self, key: &str, timeout: Duration) -> SessionResult<LockGuard>;
}

/// Process-local locks, one tokio mutex per key
#[derive(Debug, Default)]
pub struct LocalLockProvider {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl LocalLockProvider {
    const PRUNE_THRESHOLD: usize = 1024;

    pub fn new() -> Self {
        Self::default()
    }

    fn mutex_for(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        if locks.len() > Self::PRUNE_THRESHOLD {
            locks.retain(|_, m| Arc::strong_count(m) > 1);
        }
        Arc::clone(locks.entry(key.to_string()).or_default())
    }

    /// Keys currently tracked
    pub fn tracked(&self) -> usize {
        self.locks.lock().len()
    }
}

#[async_trait]
impl LockProvider for LocalLockProvider {
    async fn acquire(&self, key: &str, timeout: Duration) -> SessionResult<LockGuard> {
        let mutex = self.mutex_for(key);
        match tokio::time::timeout(timeout, mutex.lock_owned()).await {
            Ok(guard) => Ok(LockGuard::new(key, guard)),
            Err(_) => Err(SessionError::LockTimeout {
                key: key.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }
}
