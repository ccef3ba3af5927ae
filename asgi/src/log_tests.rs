//! Unit tests for log.rs
//!
//! Logger-swapping tests are #[serial]: the logger slot is process-wide.

use crate::error::Error;
use crate::log::{self, DefaultLogger, LogEntry, LogSeverity, Logger};
use serial_test::serial;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

/// Logger capturing entries for inspection
struct CaptureLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl CaptureLogger {
    fn new() -> (Self, Arc<Mutex<Vec<LogEntry>>>) {
        let entries = Arc::new(Mutex::new(Vec::new()));
        (Self { entries: entries.clone() }, entries)
    }
}

impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

// ============================================================================
// LOG SEVERITY
// ============================================================================

#[test]
fn test_log_severity_ordering() {
    assert!(LogSeverity::Trace < LogSeverity::Debug);
    assert!(LogSeverity::Debug < LogSeverity::Info);
    assert!(LogSeverity::Info < LogSeverity::Warn);
    assert!(LogSeverity::Warn < LogSeverity::Error);
}

#[test]
fn test_log_severity_debug_names() {
    assert_eq!(format!("{:?}", LogSeverity::Trace), "Trace");
    assert_eq!(format!("{:?}", LogSeverity::Error), "Error");
}

// ============================================================================
// LOG ENTRY / DEFAULT LOGGER
// ============================================================================

#[test]
fn test_log_entry_with_file_line() {
    let entry = LogEntry {
        severity: LogSeverity::Error,
        timestamp: SystemTime::now(),
        source: "asgi::vulkan".to_string(),
        message: "vkCreateBuffer failed".to_string(),
        file: Some("vulkan_buffer.rs"),
        line: Some(42),
    };

    let cloned = entry.clone();
    assert_eq!(cloned.source, "asgi::vulkan");
    assert_eq!(cloned.file, Some("vulkan_buffer.rs"));
    assert_eq!(cloned.line, Some(42));
}

#[test]
fn test_default_logger_handles_every_severity() {
    let logger = DefaultLogger;
    for severity in [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ] {
        logger.log(&LogEntry {
            severity,
            timestamp: SystemTime::now(),
            source: "test".to_string(),
            message: "message".to_string(),
            file: None,
            line: None,
        });
    }
}

// ============================================================================
// GLOBAL LOGGER AND MACROS
// ============================================================================

#[test]
#[serial]
fn test_custom_logger_receives_macro_output() {
    let (logger, entries) = CaptureLogger::new();
    log::set_logger(logger);

    crate::gi_info!("asgi::test", "created {} buffers", 3);
    crate::gi_warn!("asgi::test", "slow path");
    crate::gi_error!("asgi::test", "failed: {}", "reason");

    {
        let captured = entries.lock().unwrap();
        assert_eq!(captured.len(), 3);
        assert_eq!(captured[0].severity, LogSeverity::Info);
        assert_eq!(captured[0].message, "created 3 buffers");
        assert!(captured[0].file.is_none());
        assert_eq!(captured[2].severity, LogSeverity::Error);
        assert!(captured[2].file.is_some());
        assert!(captured[2].line.is_some());
    }

    log::reset_logger();
}

#[test]
#[serial]
fn test_gi_err_logs_and_builds_backend_error() {
    let (logger, entries) = CaptureLogger::new();
    log::set_logger(logger);

    let err = crate::gi_err!("asgi::test", "submit failed: {}", -4);
    assert!(matches!(&err, Error::BackendError(msg) if msg == "submit failed: -4"));

    {
        let captured = entries.lock().unwrap();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].severity, LogSeverity::Error);
        assert_eq!(captured[0].source, "asgi::test");
    }

    log::reset_logger();
}

#[test]
#[serial]
fn test_gi_bail_warn_returns_invalid_resource() {
    let (logger, entries) = CaptureLogger::new();
    log::set_logger(logger);

    fn check(level: u32) -> crate::error::Result<()> {
        if level > 3 {
            crate::gi_bail_warn!("asgi::test", "mip level {} out of range", level);
        }
        Ok(())
    }

    assert!(check(1).is_ok());
    assert!(matches!(check(7), Err(Error::InvalidResource(_))));
    assert_eq!(entries.lock().unwrap()[0].severity, LogSeverity::Warn);

    log::reset_logger();
}
