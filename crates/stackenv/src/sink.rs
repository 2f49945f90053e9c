//! Event sinks: the append-only log stream shared by all components.

use log::Level;

/// Destination for component log events.
///
/// Every component that reports progress takes a sink explicitly instead
/// of writing to a process-wide stream.
pub trait EventSink {
    /// Record an informational event.
    fn info(&mut self, message: &str);

    /// Record a warning.
    fn warn(&mut self, message: &str);

    /// Record an error.
    fn error(&mut self, message: &str);
}

/// Sink that forwards to the `log` facade under a fixed target.
#[derive(Debug, Clone, Copy)]
pub struct LogSink {
    target: &'static str,
}

impl LogSink {
    /// Create a sink logging under `target` (e.g. `"executor"`).
    pub fn new(target: &'static str) -> Self {
        Self { target }
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new("stackpilot")
    }
}

impl EventSink for LogSink {
    fn info(&mut self, message: &str) {
        log::log!(target: self.target, Level::Info, "{message}");
    }

    fn warn(&mut self, message: &str) {
        log::log!(target: self.target, Level::Warn, "{message}");
    }

    fn error(&mut self, message: &str) {
        log::log!(target: self.target, Level::Error, "{message}");
    }
}

/// Sink that keeps every event in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    entries: Vec<(Level, String)>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events, oldest first.
    pub fn entries(&self) -> &[(Level, String)] {
        &self.entries
    }

    /// Messages recorded at `level`.
    pub fn at_level(&self, level: Level) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.as_str())
            .collect()
    }

    /// Whether any message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.entries.iter().any(|(_, m)| m.contains(needle))
    }
}

impl EventSink for MemorySink {
    fn info(&mut self, message: &str) {
        self.entries.push((Level::Info, message.to_string()));
    }

    fn warn(&mut self, message: &str) {
        self.entries.push((Level::Warn, message.to_string()));
    }

    fn error(&mut self, message: &str) {
        self.entries.push((Level::Error, message.to_string()));
    }
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn info(&mut self, _message: &str) {}
    fn warn(&mut self, _message: &str) {}
    fn error(&mut self, _message: &str) {}
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn info(&mut self, message: &str) {
        (**self).info(message);
    }

    fn warn(&mut self, message: &str) {
        (**self).warn(message);
    }

    fn error(&mut self, message: &str) {
        (**self).error(message);
    }
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn info(&mut self, message: &str) {
        (**self).info(message);
    }

    fn warn(&mut self, message: &str) {
        (**self).warn(message);
    }

    fn error(&mut self, message: &str) {
        (**self).error(message);
    }
}
