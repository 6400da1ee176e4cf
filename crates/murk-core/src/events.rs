//! Pipeline logging over a closed event set.
//!
//! Call sites never format free-form strings: they name an [`Event`] plus a
//! detail payload, which keeps the output auditable and the logger
//! pluggable. The default logger forwards to `tracing`; tests install a
//! [`MemoryLogger`] and assert on the captured sequence.

use std::sync::{Arc, Mutex};

/// The closed set of pipeline messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Version,
    ObfuscationStarted,
    RandomGeneratorSeed,
    CodeTransformationStage,
    NodeTransformationStage,
    EmptySourceCode,
    ObfuscationCompleted,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::Version => "version",
            Event::ObfuscationStarted => "obfuscation-started",
            Event::RandomGeneratorSeed => "random-generator-seed",
            Event::CodeTransformationStage => "code-transformation-stage",
            Event::NodeTransformationStage => "node-transformation-stage",
            Event::EmptySourceCode => "empty-source-code",
            Event::ObfuscationCompleted => "obfuscation-completed",
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a logged event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Success,
}

/// Pluggable pipeline logger.
pub trait Logger {
    fn info(&self, event: Event, detail: &str);
    fn warn(&self, event: Event, detail: &str);
    fn success(&self, event: Event, detail: &str);
}

/// Default logger: forwards to `tracing` (the subscriber is owned by the
/// binary, never installed here).
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, event: Event, detail: &str) {
        tracing::info!(target: "murk", event = event.as_str(), "{detail}");
    }

    fn warn(&self, event: Event, detail: &str) {
        tracing::warn!(target: "murk", event = event.as_str(), "{detail}");
    }

    fn success(&self, event: Event, detail: &str) {
        tracing::info!(target: "murk", event = event.as_str(), done = true, "{detail}");
    }
}

/// A captured log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub level: Level,
    pub event: Event,
    pub detail: String,
}

/// Collects events in memory. Useful for asserting pipeline behavior in
/// tests and for embedders that surface progress in their own UI.
#[derive(Debug, Default, Clone)]
pub struct MemoryLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle that keeps reading entries after the logger is moved into
    /// an `Obfuscator`.
    pub fn handle(&self) -> MemoryLogger {
        self.clone()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().clone()
    }

    /// Events of a given kind, in order.
    pub fn events(&self, event: Event) -> Vec<LogEntry> {
        self.entries().into_iter().filter(|e| e.event == event).collect()
    }

    fn push(&self, level: Level, event: Event, detail: &str) {
        self.entries.lock().unwrap().push(LogEntry {
            level,
            event,
            detail: detail.to_string(),
        });
    }
}

impl Logger for MemoryLogger {
    fn info(&self, event: Event, detail: &str) {
        self.push(Level::Info, event, detail);
    }

    fn warn(&self, event: Event, detail: &str) {
        self.push(Level::Warn, event, detail);
    }

    fn success(&self, event: Event, detail: &str) {
        self.push(Level::Success, event, detail);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_logger_captures_in_order() {
        let logger = MemoryLogger::new();
        let handle = logger.handle();
        logger.info(Event::ObfuscationStarted, "");
        logger.warn(Event::EmptySourceCode, "");
        logger.success(Event::ObfuscationCompleted, "");
        let entries = handle.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].level, Level::Warn);
        assert_eq!(entries[1].event, Event::EmptySourceCode);
    }
}
