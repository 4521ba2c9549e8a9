//! Unit tests for log.rs
//!
//! Tests LogSeverity, LogEntry, DefaultLogger and the error helper macros.

use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
use crate::mgp::{Engine, Error, Result};
use serial_test::serial;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

fn entry(severity: LogSeverity, file: Option<&'static str>, line: Option<u32>) -> LogEntry {
    LogEntry {
        severity,
        timestamp: SystemTime::now(),
        source: "mgp::Test".to_string(),
        message: format!("{:?} message", severity),
        file,
        line,
    }
}

/// Captures every record it receives
#[derive(Clone, Default)]
struct CaptureLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

// ============================================================================
// LOG SEVERITY TESTS
// ============================================================================

#[test]
fn test_log_severity_ordering() {
    assert!(LogSeverity::Trace < LogSeverity::Debug);
    assert!(LogSeverity::Debug < LogSeverity::Info);
    assert!(LogSeverity::Info < LogSeverity::Warn);
    assert!(LogSeverity::Warn < LogSeverity::Error);
}

#[test]
fn test_log_severity_debug() {
    assert_eq!(format!("{:?}", LogSeverity::Trace), "Trace");
    assert_eq!(format!("{:?}", LogSeverity::Error), "Error");
}

// ============================================================================
// LOG ENTRY TESTS
// ============================================================================

#[test]
fn test_log_entry_with_file_line() {
    let e = entry(LogSeverity::Error, Some("queue.rs"), Some(42));
    assert_eq!(e.source, "mgp::Test");
    assert_eq!(e.file, Some("queue.rs"));
    assert_eq!(e.line, Some(42));
}

#[test]
fn test_log_entry_clone() {
    let e1 = entry(LogSeverity::Warn, None, None);
    let e2 = e1.clone();
    assert_eq!(e1.severity, e2.severity);
    assert_eq!(e1.message, e2.message);
}

// ============================================================================
// DEFAULT LOGGER TESTS
// ============================================================================

#[test]
fn test_default_logger_all_severities() {
    let logger = DefaultLogger;
    for severity in [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ] {
        logger.log(&entry(severity, None, None));
        logger.log(&entry(severity, Some("test.rs"), Some(7)));
    }
}

#[test]
fn test_logger_trait_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<DefaultLogger>();
    assert_send_sync::<CaptureLogger>();
}

// ============================================================================
// MACRO TESTS
// ============================================================================

#[test]
#[serial]
fn test_engine_err_logs_and_builds_backend_error() {
    let capture = CaptureLogger::default();
    Engine::set_logger(capture.clone());

    let err = crate::engine_err!("mgp::Test", "fence {} lost", 3);

    Engine::reset_logger();
    match err {
        Error::BackendError(msg) => assert_eq!(msg, "fence 3 lost"),
        other => panic!("unexpected error {:?}", other),
    }
    let entries = capture.entries.lock().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].severity, LogSeverity::Error);
    assert!(entries[0].file.is_some());
    assert!(entries[0].line.is_some());
}

#[test]
#[serial]
fn test_engine_bail_returns_early() {
    fn guarded(value: u32) -> Result<u32> {
        if value == 0 {
            crate::engine_bail!("mgp::Test", "value must be non-zero");
        }
        Ok(value * 2)
    }

    let capture = CaptureLogger::default();
    Engine::set_logger(capture.clone());
    let ok = guarded(4);
    let failed = guarded(0);
    Engine::reset_logger();

    assert_eq!(ok.unwrap(), 8);
    assert!(matches!(failed, Err(Error::BackendError(_))));
    assert_eq!(capture.entries.lock().unwrap().len(), 1);
}

#[test]
#[serial]
fn test_engine_bail_warn_logs_at_warn_level() {
    fn refuse() -> Result<()> {
        crate::engine_bail_warn!("mgp::Test", "nothing to do");
    }

    let capture = CaptureLogger::default();
    Engine::set_logger(capture.clone());
    let result = refuse();
    Engine::reset_logger();

    assert!(result.is_err());
    let entries = capture.entries.lock().unwrap();
    assert_eq!(entries[0].severity, LogSeverity::Warn);
    assert!(entries[0].file.is_none());
}
