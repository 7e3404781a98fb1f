//! Diagnostic sinks.
//!
//! A table emits free-form trace lines (adds, deletes, sweep intervals) to an
//! optional [`TraceSink`]. Sinks are observability only: a table behaves the
//! same with or without one.
//!
//! - [`TracingSink`]: forwards every line to `tracing` at debug level
//! - [`BufferSink`]: keeps lines in memory, handy for demos and tests
//! - [`NoopSink`]: discards everything
//!
//! ```
//! use std::sync::Arc;
//! use lapse_core::{BufferSink, TraceSink};
//!
//! let sink = Arc::new(BufferSink::new());
//! sink.trace("add item key: aa");
//! assert_eq!(sink.lines(), vec!["add item key: aa".to_string()]);
//! ```

use std::fmt;

use parking_lot::Mutex;

/// Receiver of free-form trace lines emitted by a table.
///
/// Implementations should be cheap; they run on the thread of the table
/// operation that produced the line. Tables release their locks before
/// calling a sink, so a sink may read or modify the table it is attached to.
pub trait TraceSink: Send + Sync {
    /// Records one line.
    fn trace(&self, line: &str);
}

/// Sink that forwards lines to the `tracing` ecosystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TracingSink {
    /// Creates a new tracing sink.
    pub fn new() -> Self {
        Self
    }
}

impl TraceSink for TracingSink {
    fn trace(&self, line: &str) {
        tracing::debug!(target: "lapse::sink", "{}", line);
    }
}

/// Sink that discards every line.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {
    #[inline]
    fn trace(&self, _line: &str) {}
}

/// Sink that collects lines in memory, optionally with a prefix.
#[derive(Default)]
pub struct BufferSink {
    prefix: String,
    lines: Mutex<Vec<String>>,
}

impl BufferSink {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty buffer that prepends `prefix` to every line.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            lines: Mutex::new(Vec::new()),
        }
    }

    /// Returns a copy of all collected lines.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Returns the number of collected lines.
    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    /// Returns true if nothing has been collected.
    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    /// Removes and returns all collected lines.
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock())
    }
}

impl TraceSink for BufferSink {
    fn trace(&self, line: &str) {
        let line = if self.prefix.is_empty() {
            line.to_string()
        } else {
            format!("{}{}", self.prefix, line)
        };
        self.lines.lock().push(line);
    }
}

impl fmt::Debug for BufferSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferSink")
            .field("prefix", &self.prefix)
            .field("lines", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_sinks_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TracingSink>();
        assert_send_sync::<NoopSink>();
        assert_send_sync::<BufferSink>();
    }

    #[test]
    fn test_sinks_as_trait_objects() {
        let sinks: Vec<Arc<dyn TraceSink>> = vec![
            Arc::new(TracingSink::new()),
            Arc::new(NoopSink),
            Arc::new(BufferSink::new()),
        ];
        for sink in sinks {
            sink.trace("hello");
        }
    }

    #[test]
    fn test_buffer_sink_prefix_and_drain() {
        let sink = BufferSink::with_prefix("lapse ");
        assert!(sink.is_empty());

        sink.trace("one");
        sink.trace("two");
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.lines(), vec!["lapse one", "lapse two"]);

        let drained = sink.drain();
        assert_eq!(drained.len(), 2);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_buffer_sink_debug_reports_count() {
        let sink = BufferSink::new();
        sink.trace("x");
        assert!(format!("{:?}", sink).contains("lines: 1"));
    }
}
