//! Engine logging
//!
//! Log records flow through a replaceable [`Logger`] installed on
//! [`Engine`](crate::mgp::Engine). The `engine_*` macros below are what the rest
//! of the workspace calls; each takes a source tag such as `"mgp::PipelineCache"`
//! followed by `format!` arguments.

use colored::*;
use std::time::SystemTime;
use chrono::{DateTime, Local};

/// Sink for engine log records
///
/// Implement this to route engine output somewhere other than stdout.
///
/// # Example
///
/// ```no_run
/// use mgp_engine::mgp::log::{Logger, LogEntry};
///
/// struct FrameTimeline {
///     lines: std::sync::Mutex<Vec<String>>,
/// }
///
/// impl Logger for FrameTimeline {
///     fn log(&self, entry: &LogEntry) {
///         self.lines.lock().unwrap().push(entry.message.clone());
///     }
/// }
/// ```
pub trait Logger: Send + Sync {
    /// Handle one record
    fn log(&self, entry: &LogEntry);
}

/// A single log record
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Severity level
    pub severity: LogSeverity,

    /// When the record was produced
    pub timestamp: SystemTime,

    /// Emitting component (e.g. "mgp::Queue", "mgp::vulkan")
    pub source: String,

    /// Formatted message
    pub message: String,

    /// Source file, set for ERROR records only
    pub file: Option<&'static str>,

    /// Source line, set for ERROR records only
    pub line: Option<u32>,
}

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogSeverity {
    /// Per-call chatter (barriers, cache hits)
    Trace,

    /// Development information
    Debug,

    /// Lifecycle events (device created, swapchain rebuilt)
    Info,

    /// Recoverable problems
    Warn,

    /// Failures, reported with file:line
    Error,
}

/// Coloured stdout logger
///
/// Format:
/// - Normal: `[timestamp] [SEVERITY] [source] message`
/// - Error: `[timestamp] [ERROR] [source] message (file:line)`
pub struct DefaultLogger;

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        let datetime: DateTime<Local> = entry.timestamp.into();
        let timestamp = datetime.format("%Y-%m-%d %H:%M:%S%.3f").to_string();

        let severity_str = match entry.severity {
            LogSeverity::Trace => "TRACE".bright_black(),
            LogSeverity::Debug => "DEBUG".cyan(),
            LogSeverity::Info => "INFO ".green(),
            LogSeverity::Warn => "WARN ".yellow(),
            LogSeverity::Error => "ERROR".red().bold(),
        };

        let source = entry.source.bright_blue();

        if let (Some(file), Some(line)) = (entry.file, entry.line) {
            println!(
                "[{}] [{}] [{}] {} ({}:{})",
                timestamp, severity_str, source, entry.message, file, line
            );
        } else {
            println!("[{}] [{}] [{}] {}", timestamp, severity_str, source, entry.message);
        }
    }
}

// ===== LOGGING MACROS =====

/// Log a TRACE message
///
/// ```ignore
/// engine_trace!("mgp::RenderGraph", "barrier {:?} -> {:?}", old, new);
/// ```
#[macro_export]
macro_rules! engine_trace {
    ($source:expr, $($arg:tt)*) => {
        $crate::mgp::Engine::log(
            $crate::mgp::log::LogSeverity::Trace,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a DEBUG message
#[macro_export]
macro_rules! engine_debug {
    ($source:expr, $($arg:tt)*) => {
        $crate::mgp::Engine::log(
            $crate::mgp::log::LogSeverity::Debug,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an INFO message
#[macro_export]
macro_rules! engine_info {
    ($source:expr, $($arg:tt)*) => {
        $crate::mgp::Engine::log(
            $crate::mgp::log::LogSeverity::Info,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a WARN message
#[macro_export]
macro_rules! engine_warn {
    ($source:expr, $($arg:tt)*) => {
        $crate::mgp::Engine::log(
            $crate::mgp::log::LogSeverity::Warn,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an ERROR message with file:line information
#[macro_export]
macro_rules! engine_error {
    ($source:expr, $($arg:tt)*) => {
        $crate::mgp::Engine::log_detailed(
            $crate::mgp::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            file!(),
            line!()
        )
    };
}

// ===== ERROR HELPER MACROS =====

/// Log an ERROR and evaluate to `Error::BackendError` carrying the same message
///
/// Meant for `map_err` closures:
///
/// ```ignore
/// device.reset_fences(&[fence])
///     .map_err(|e| engine_err!("mgp::vulkan", "Failed to reset fence: {:?}", e))?;
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::mgp::Engine::log_detailed(
            $crate::mgp::log::LogSeverity::Error,
            $source,
            message.clone(),
            file!(),
            line!()
        );
        $crate::mgp::Error::BackendError(message)
    }};
}

/// Log an ERROR and return `Err(Error::BackendError(..))` from the current function
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

/// Log a WARN and evaluate to `Error::BackendError` carrying the same message
#[macro_export]
macro_rules! engine_warn_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::mgp::Engine::log(
            $crate::mgp::log::LogSeverity::Warn,
            $source,
            message.clone()
        );
        $crate::mgp::Error::BackendError(message)
    }};
}

/// Log a WARN and return `Err(Error::BackendError(..))` from the current function
#[macro_export]
macro_rules! engine_bail_warn {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_warn_err!($source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
