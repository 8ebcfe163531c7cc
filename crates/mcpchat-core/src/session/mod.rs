//! Session persistence
//!
//! `SessionStore` keeps each session's transcripts in a `KvStore` and
//! serializes writers through a `LockProvider`. The in-process substrates
//! (`MemoryKvStore`, `LocalLockProvider`) suit a single server; other
//! deployments plug in their own implementations of the two traits.

mod error;
mod kv;
mod lock;
mod store;
mod summarizer;

pub use error::{SessionError, SessionResult};
pub use kv::{get_serialized, set_serialized, KvStore, MemoryKvStore};
pub use lock::{LocalLockProvider, LockGuard, LockProvider};
pub use store::{
    OpenMode, OpenedSession, SessionRecord, SessionStore, DEFAULT_LOCK_TIMEOUT, DEFAULT_SESSION_TTL,
};
pub use summarizer::{HistorySummarizer, SUMMARY_PREFIX};
