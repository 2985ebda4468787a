//! Log sinks for transfer sessions.
//!
//! A [`Transfer`](crate::Transfer) reports what it does through three
//! independent sinks (debug, info and error). Sinks only observe; nothing
//! they do feeds back into control flow. This keeps the library free of
//! any particular output so the CLI, tests and embedding callers can each
//! decide where messages go.

use std::sync::{Arc, Mutex};

use tracing::Level;

/// Receives log lines from a transfer.
pub trait LogSink: Send + Sync {
    /// Called once per message.
    fn log(&self, message: &str);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn log(&self, _message: &str) {}
}

/// Forwards messages to `tracing` at a fixed level.
#[derive(Debug, Clone, Copy)]
pub struct TracingSink {
    level: Level,
}

impl TracingSink {
    pub fn new(level: Level) -> Self {
        Self { level }
    }
}

impl LogSink for TracingSink {
    fn log(&self, message: &str) {
        match self.level {
            Level::TRACE => tracing::trace!("{}", message),
            Level::DEBUG => tracing::debug!("{}", message),
            Level::INFO => tracing::info!("{}", message),
            Level::WARN => tracing::warn!("{}", message),
            _ => tracing::error!("{}", message),
        }
    }
}

/// Keeps every message in memory.
/// Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    messages: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get log messages without clearing
    pub fn messages(&self) -> Vec<String> {
        match self.messages.lock() {
            Ok(messages) => messages.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Get and clear log messages
    pub fn take(&self) -> Vec<String> {
        match self.messages.lock() {
            Ok(mut messages) => std::mem::take(&mut *messages),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl LogSink for MemorySink {
    fn log(&self, message: &str) {
        let mut messages = match self.messages.lock() {
            Ok(messages) => messages,
            Err(poisoned) => poisoned.into_inner(),
        };
        messages.push(message.to_string());
    }
}

/// The debug, info and error sinks of one session.
#[derive(Clone)]
pub struct Sinks {
    pub debug: Arc<dyn LogSink>,
    pub info: Arc<dyn LogSink>,
    pub error: Arc<dyn LogSink>,
}

impl Sinks {
    /// Sinks that forward to `tracing` at DEBUG, INFO and ERROR.
    pub fn tracing() -> Self {
        Self {
            debug: Arc::new(TracingSink::new(Level::DEBUG)),
            info: Arc::new(TracingSink::new(Level::INFO)),
            error: Arc::new(TracingSink::new(Level::ERROR)),
        }
    }

    /// Sinks that drop every message.
    pub fn silent() -> Self {
        Self {
            debug: Arc::new(NullSink),
            info: Arc::new(NullSink),
            error: Arc::new(NullSink),
        }
    }

    pub fn debug(&self, message: &str) {
        self.debug.log(message);
    }

    pub fn info(&self, message: &str) {
        self.info.log(message);
    }

    pub fn error(&self, message: &str) {
        self.error.log(message);
    }
}

impl Default for Sinks {
    fn default() -> Self {
        Self::tracing()
    }
}

impl std::fmt::Debug for Sinks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sinks").finish_non_exhaustive()
    }
}
