//! Silent logger
//!
//! Stands in wherever a component needs a `Logger` but nobody reads the output,
//! mostly the model and tool-provider doubles in turn tests.

use std::sync::Arc;

use super::traits::{Logger, SharedLogger};

/// Drops every line
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLogger;

impl NoOpLogger {
    pub fn new() -> Self {
        Self
    }

    /// Ready to hand to a component constructor
    pub fn shared() -> SharedLogger {
        Arc::new(Self)
    }
}

impl Logger for NoOpLogger {
    fn debug(&self, _message: &str) {}
    fn info(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{log_debug, log_error};

    #[test]
    fn test_macros_accept_shared_logger() {
        let logger = NoOpLogger::shared();
        log_debug!(logger, "[SessionStore] Deleted session {}", "s1");
        log_error!(logger, "[ToolRegistry] Tool provider {} unavailable", "beta");
    }
}
