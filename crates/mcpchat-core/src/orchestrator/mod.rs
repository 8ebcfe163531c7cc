//! Turn orchestration
//!
//! ```text
//! ChatService::prepare_turn   (session check, user message into context)
//!        │
//!        ▼
//! StreamOrchestrator::run
//!   Init ─► Selecting ─► Generating ⇄ ToolCall ─► Finishing ─► Closed
//!                  └──────────┴──────────┴─► Errored ─┘
//! ```
//!
//! Errors found before the start frame come back as [`ChatError`]; anything
//! after it is written into the stream by [`FailureReporter`].

mod error;
mod failure;
mod prompts;
mod service;
mod state;
mod turn;

pub use error::{ChatError, ChatResult, TurnError};
pub use failure::{ErrorClass, FailureReporter, TurnIdentity};
pub use prompts::{with_disclaimer, PromptLibrary, BUILTIN_BASE_PROMPT, NO_TOOLS_DISCLAIMER};
pub use service::ChatService;
pub use state::{TurnPhase, TurnState};
pub use turn::{
    recursion_warning, PreparedTurn, StreamOrchestrator, TurnEnd, TurnOutcome, DEFAULT_MAX_STEPS,
    TRUNCATION_MESSAGE,
};
