//! Session persistence
//!
//! One `SessionRecord` per session holds the session metadata together with
//! both transcript views: `context`, the tool-bearing history the model sees,
//! and `display`, the cleaned history shown to the user. Both views change in
//! the same critical section, so they cannot drift apart.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::logging::Logger;
use crate::types::{display_view, ChatMessage, ChatSession, SessionScope};
use crate::{log_debug, log_info, log_warn};

use super::error::{SessionError, SessionResult};
use super::kv::{get_serialized, set_serialized, KvStore, MemoryKvStore};
use super::lock::{LocalLockProvider, LockProvider};

/// Sessions live this long after their last write
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(86_400);

/// Default bound on waiting for a session's lock
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything stored for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub session: ChatSession,
    #[serde(default)]
    pub display: Vec<ChatMessage>,
    #[serde(default)]
    pub context: Vec<ChatMessage>,
}

/// How `open` treats a session that does not resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    /// Create a new session when nothing resolves
    #[default]
    ResumeOrCreate,
    /// Fail with `NotFound` when nothing resolves
    ResumeOnly,
}

/// Result of `SessionStore::open`
#[derive(Debug, Clone)]
pub struct OpenedSession {
    pub session: ChatSession,
    /// Display history
    pub history: Vec<ChatMessage>,
    pub created: bool,
}

/// TTL-backed transcripts with per-session mutual exclusion
pub struct SessionStore {
    kv: Arc<dyn KvStore>,
    locks: Arc<dyn LockProvider>,
    ttl: Duration,
    lock_timeout: Duration,
    logger: Arc<dyn Logger>,
}

impl SessionStore {
    pub fn new(
        kv: Arc<dyn KvStore>,
        locks: Arc<dyn LockProvider>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            kv,
            locks,
            ttl: DEFAULT_SESSION_TTL,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            logger,
        }
    }

    /// Store backed by process-local substrates
    pub fn in_memory(logger: Arc<dyn Logger>) -> Self {
        Self::new(
            Arc::new(MemoryKvStore::new()),
            Arc::new(LocalLockProvider::new()),
            logger,
        )
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    fn record_key(session_id: &str) -> String {
        format!("chat:{}", session_id)
    }

    fn lock_key(session_id: &str) -> String {
        format!("lock:chat:{}", session_id)
    }

    async fn load(&self, session_id: &str) -> SessionResult<Option<SessionRecord>> {
        get_serialized(self.kv.as_ref(), &Self::record_key(session_id)).await
    }

    async fn save(&self, record: &mut SessionRecord) -> SessionResult<()> {
        let ttl = chrono::Duration::from_std(self.ttl)
            .unwrap_or_else(|_| chrono::Duration::days(1));
        record.session.expires_at = Utc::now() + ttl;
        set_serialized(
            self.kv.as_ref(),
            &Self::record_key(&record.session.session_id),
            record,
            self.ttl,
        )
        .await
    }

    /// Resolve or create a session
    ///
    /// An explicit id is tried first, then the id derived from `scope`. When
    /// neither resolves, `ResumeOrCreate` creates a session under the derived
    /// id (or a random one without a scope) and `ResumeOnly` fails.
    pub async fn open(
        &self,
        session_id: Option<&str>,
        owner_id: &str,
        scope: Option<SessionScope>,
        mode: OpenMode,
    ) -> SessionResult<OpenedSession> {
        let derived = scope.as_ref().map(|s| s.derive_session_id(owner_id));

        for candidate in [session_id, derived.as_deref()].into_iter().flatten() {
            if let Some(record) = self.load(candidate).await? {
                if record.session.owner_id == owner_id {
                    return Ok(OpenedSession {
                        session: record.session,
                        history: record.display,
                        created: false,
                    });
                }
                log_warn!(
                    self.logger,
                    "[SessionStore] Session {} belongs to another owner",
                    candidate
                );
            }
        }

        if mode == OpenMode::ResumeOnly {
            let missing = session_id.or(derived.as_deref()).unwrap_or("<none>");
            return Err(SessionError::NotFound(missing.to_string()));
        }

        let new_id = derived.unwrap_or_else(|| Uuid::new_v4().to_string());
        let _guard = self
            .locks
            .acquire(&Self::lock_key(&new_id), self.lock_timeout)
            .await?;

        // Another caller may have created it while we waited
        if let Some(record) = self.load(&new_id).await? {
            return Ok(OpenedSession {
                session: record.session,
                history: record.display,
                created: false,
            });
        }

        let mut record = SessionRecord {
            session: ChatSession {
                session_id: new_id,
                owner_id: owner_id.to_string(),
                context_metadata: scope,
                expires_at: Utc::now(),
            },
            display: Vec::new(),
            context: Vec::new(),
        };
        self.save(&mut record).await?;
        log_info!(self.logger, "[SessionStore] Created session {}", record.session.session_id);

        Ok(OpenedSession {
            session: record.session,
            history: Vec::new(),
            created: true,
        })
    }

    /// Session metadata, if the session exists
    pub async fn session(&self, session_id: &str) -> SessionResult<Option<ChatSession>> {
        Ok(self.load(session_id).await?.map(|r| r.session))
    }

    /// Session metadata, or `NotFound`
    pub async fn require(&self, session_id: &str) -> SessionResult<ChatSession> {
        self.session(session_id)
            .await?
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    /// Display history; empty when the session is absent or unreadable
    pub async fn get_history(&self, session_id: &str) -> Vec<ChatMessage> {
        self.load_or_empty(session_id).await.map(|r| r.display).unwrap_or_default()
    }

    /// Tool-bearing context history; empty when absent or unreadable
    pub async fn get_context(&self, session_id: &str) -> Vec<ChatMessage> {
        self.load_or_empty(session_id).await.map(|r| r.context).unwrap_or_default()
    }

    async fn load_or_empty(&self, session_id: &str) -> Option<SessionRecord> {
        match self.load(session_id).await {
            Ok(record) => record,
            Err(e) => {
                log_warn!(
                    self.logger,
                    "[SessionStore] Failed to read session {}: {}",
                    session_id,
                    e
                );
                None
            }
        }
    }

    /// Locked read-modify-write of one session's record
    ///
    /// The guard drops on every path out of this function.
    async fn modify<F>(&self, session_id: &str, change: F) -> SessionResult<SessionRecord>
    where
        F: FnOnce(&mut SessionRecord) + Send,
    {
        let _guard = self
            .locks
            .acquire(&Self::lock_key(session_id), self.lock_timeout)
            .await?;

        let mut record = self
            .load(session_id)
            .await?
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        change(&mut record);
        self.save(&mut record).await?;
        Ok(record)
    }

    /// Append messages to both views; returns the display history
    ///
    /// The display view receives the messages with tool calls stripped and
    /// tool results dropped.
    pub async fn append_and_persist(
        &self,
        session_id: &str,
        messages: Vec<ChatMessage>,
    ) -> SessionResult<Vec<ChatMessage>> {
        let record = self
            .modify(session_id, |record| {
                record.display.extend(display_view(&messages));
                record.context.extend(messages);
            })
            .await?;
        Ok(record.display)
    }

    /// Append to the context view only; returns the context history
    pub async fn append_context(
        &self,
        session_id: &str,
        messages: Vec<ChatMessage>,
    ) -> SessionResult<Vec<ChatMessage>> {
        let record = self
            .modify(session_id, |record| record.context.extend(messages))
            .await?;
        Ok(record.context)
    }

    /// Persist a finished turn
    ///
    /// The user message joins the display view with the cleaned output. The
    /// context view already holds the user message and gains the raw output.
    pub async fn commit_turn(
        &self,
        session_id: &str,
        user: ChatMessage,
        produced: Vec<ChatMessage>,
    ) -> SessionResult<Vec<ChatMessage>> {
        let record = self
            .modify(session_id, |record| {
                record.display.extend(user.without_tool_calls());
                record.display.extend(display_view(&produced));
                record.context.extend(produced);
            })
            .await?;
        Ok(record.display)
    }

    /// Swap a leading `snapshot` of the context view for `replacement`
    ///
    /// Messages appended after the snapshot was read stay behind the
    /// replacement. Returns `None` and writes nothing when the context no
    /// longer starts with `snapshot`.
    pub async fn replace_context_prefix(
        &self,
        session_id: &str,
        snapshot: &[ChatMessage],
        replacement: Vec<ChatMessage>,
    ) -> SessionResult<Option<Vec<ChatMessage>>> {
        let _guard = self
            .locks
            .acquire(&Self::lock_key(session_id), self.lock_timeout)
            .await?;

        let mut record = self
            .load(session_id)
            .await?
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        if !record.context.starts_with(snapshot) {
            log_debug!(
                self.logger,
                "[SessionStore] Context of {} changed since snapshot, keeping it",
                session_id
            );
            return Ok(None);
        }

        let appended = record.context.split_off(snapshot.len());
        record.context = replacement;
        record.context.extend(appended);
        self.save(&mut record).await?;
        Ok(Some(record.context))
    }

    /// Remove a session; deleting an absent session succeeds
    pub async fn delete(&self, session_id: &str) -> SessionResult<()> {
        let _guard = self
            .locks
            .acquire(&Self::lock_key(session_id), self.lock_timeout)
            .await?;
        self.kv.delete(&Self::record_key(session_id)).await?;
        log_debug!(self.logger, "[SessionStore] Deleted session {}", session_id);
        Ok(())
    }
}
