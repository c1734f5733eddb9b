//! Logging capability for the resolver
//!
//! The resolver reports its progress through a small capability trait
//! rather than a fixed backend: anything implementing [`Logger`] can be
//! installed with [`with_logger`](crate::with_logger), including a plain
//! closure (wrapped in [`LogFn`]) or a constructor that itself consumes
//! other provided values.
//!
//! By default everything is dropped ([`DiscardLogger`]). With the
//! `tracing` feature, [`TracingLogger`] forwards entries to the `tracing`
//! ecosystem the host application already uses.

use crate::conforms;
use crate::introspect::Conformance;
use std::fmt;

/// Verbosity of a single log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Drop the entry.
    #[default]
    Silence,
    /// Progress worth surfacing, e.g. call timing.
    Info,
    /// Per-node linking and traversal detail.
    Debug,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Silence => f.write_str("silence"),
            Self::Info => f.write_str("info"),
            Self::Debug => f.write_str("debug"),
        }
    }
}

/// Capability the resolver logs through.
pub trait Logger: Send + Sync {
    /// Emit one entry. Implementations decide filtering and formatting;
    /// `Silence` entries are never emitted by the resolver itself.
    fn print(&self, level: LogLevel, message: &str);
}

/// A log sink made from a plain function.
///
/// This is also the type a logger *constructor* may return when the
/// application assembles its sink out of other provided values.
pub struct LogFn(Box<dyn Fn(LogLevel, &str) + Send + Sync>);

impl LogFn {
    /// Wrap a callable as a [`Logger`].
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(LogLevel, &str) + Send + Sync + 'static,
    {
        Self(Box::new(f))
    }
}

impl Logger for LogFn {
    #[inline]
    fn print(&self, level: LogLevel, message: &str) {
        (self.0)(level, message);
    }
}

impl fmt::Debug for LogFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LogFn(..)")
    }
}

/// The default logger: drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardLogger;

impl Logger for DiscardLogger {
    #[inline]
    fn print(&self, _level: LogLevel, _message: &str) {}
}

/// A logger that writes to stderr, for quick wiring and examples.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdLogger;

impl Logger for StdLogger {
    fn print(&self, level: LogLevel, message: &str) {
        if level != LogLevel::Silence {
            eprintln!("revolve [{level}] {message}");
        }
    }
}

/// Forwards resolver entries to `tracing` events.
#[cfg(feature = "tracing")]
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

#[cfg(feature = "tracing")]
impl Logger for TracingLogger {
    fn print(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Silence => {}
            LogLevel::Info => tracing::info!(target: "revolve", "{message}"),
            LogLevel::Debug => tracing::debug!(target: "revolve", "{message}"),
        }
    }
}

/// Conformances the logger bootstrap always knows about, so a sink
/// callable and a logger implementation satisfy the same parameter.
pub(crate) fn builtin_conformances() -> Vec<Conformance> {
    conforms!(LogFn => dyn Logger)
}
