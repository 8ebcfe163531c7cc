//! Logging abstractions
//!
//! Every component receives an injected [`Logger`] instead of reaching for a
//! global. The server wires [`TracingLogger`]; tests use [`NoOpLogger`] or
//! [`MemoryLogger`].

mod memory;
mod noop;
mod tracing_logger;
mod traits;

pub use memory::{LogLevel, LogLine, MemoryLogger};
pub use noop::NoOpLogger;
pub use tracing_logger::TracingLogger;
pub use traits::{Logger, SharedLogger};
