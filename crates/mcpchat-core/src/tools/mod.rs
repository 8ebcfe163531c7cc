//! Tool discovery, selection and invocation
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  ToolRegistry                               │
//! │                                             │
//! │  - Connects to every configured provider    │
//! │  - Tags tools with their provider name      │
//! │  - Excludes providers that fail             │
//! └─────────────────────────────────────────────┘
//!           │ ToolCatalog (one per turn)
//!           ▼
//! ┌─────────────────────────────────────────────┐
//! │  ToolSelector                               │
//! │                                             │
//! │  - Asks the model for relevant tool names   │
//! │  - Drops unknown names, caps the count      │
//! │  - Adds always-on providers back            │
//! └─────────────────────────────────────────────┘
//!           │
//!           ▼
//!   ToolCatalog::invoke during the turn, ToolCatalog::close at the end
//! ```

mod cache;
mod catalog;
mod fake;
mod registry;
mod selector;

pub use cache::CatalogCache;
pub use catalog::ToolCatalog;
pub use fake::{FakeConnection, FakeConnector};
pub use registry::{close_all, ToolRegistry};
pub use selector::{SelectionError, SelectionResult, ToolSelector, DEFAULT_MAX_SELECTED_TOOLS};
