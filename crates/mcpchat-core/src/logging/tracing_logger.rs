//! Logger that forwards to the `tracing` ecosystem

use super::traits::Logger;

/// A logger that emits `tracing` events tagged with a component name
///
/// The subscriber (installed by the binary) decides formatting and filtering.
#[derive(Debug, Clone)]
pub struct TracingLogger {
    component: String,
}

impl Default for TracingLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl TracingLogger {
    /// Create a tracing logger with the default component name
    pub fn new() -> Self {
        Self {
            component: "mcpchat".to_string(),
        }
    }

    /// Create a tracing logger for a named component
    pub fn for_component(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }

    /// The component name attached to every event
    pub fn component(&self) -> &str {
        &self.component
    }
}

impl Logger for TracingLogger {
    fn debug(&self, message: &str) {
        tracing::debug!(component = %self.component, "{}", message);
    }

    fn info(&self, message: &str) {
        tracing::info!(component = %self.component, "{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!(component = %self.component, "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(component = %self.component, "{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_logger_creation() {
        let logger = TracingLogger::new();
        assert_eq!(logger.component(), "mcpchat");

        let custom = TracingLogger::for_component("registry");
        assert_eq!(custom.component(), "registry");
    }

    #[test]
    fn test_tracing_logger_without_subscriber() {
        // No subscriber installed: events are dropped, nothing panics
        let logger = TracingLogger::new();
        logger.debug("debug message");
        logger.info("info message");
        logger.warn("warn message");
        logger.error("error message");
    }
}
