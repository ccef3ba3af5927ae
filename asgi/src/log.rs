//! Logging for ASGI and its backends
//!
//! - Pluggable [`Logger`] trait, installed process-wide with [`set_logger`]
//! - Five ordered severities, Trace through Error
//! - Colored console output by default ([`DefaultLogger`])
//! - file:line details on ERROR entries
//!
//! Modules log through the `gi_*!` macros, passing a source string such as
//! `"asgi::upload"` or `"asgi::vulkan"`.

use chrono::{DateTime, Local};
use colored::*;
use std::sync::{OnceLock, RwLock};
use std::time::SystemTime;

/// Process-wide logger, [`DefaultLogger`] until replaced
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

/// Sink for log entries, installed with [`set_logger`]
///
/// ```no_run
/// use asgi::gi::log::{LogEntry, LogSeverity, Logger};
///
/// /// Forwards only failures, e.g. to a crash reporter
/// struct ErrorsOnly;
///
/// impl Logger for ErrorsOnly {
///     fn log(&self, entry: &LogEntry) {
///         if entry.severity == LogSeverity::Error {
///             eprintln!("{}: {}", entry.source, entry.message);
///         }
///     }
/// }
/// ```
pub trait Logger: Send + Sync {
    fn log(&self, entry: &LogEntry);
}

/// One record handed to the installed [`Logger`]
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub severity: LogSeverity,
    pub timestamp: SystemTime,
    /// Emitting module, e.g. "asgi::upload" or "asgi::vulkan"
    pub source: String,
    pub message: String,
    /// Set for `gi_error!` and the error macros only
    pub file: Option<&'static str>,
    pub line: Option<u32>,
}

/// Ordered from most verbose to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogSeverity {
    /// Very verbose information (per-barrier, per-copy)
    Trace,

    /// Development information
    Debug,

    /// Important events (device selected, swapchain created)
    Info,

    /// Potential issues
    Warn,

    /// Failures, logged with file:line
    Error,
}

/// Colored stdout logger: `[timestamp] [SEVERITY] [source] message`, with
/// ` (file:line)` appended on detailed entries
pub struct DefaultLogger;

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        let stamp = DateTime::<Local>::from(entry.timestamp).format("%Y-%m-%d %H:%M:%S%.3f");

        let tag = match entry.severity {
            LogSeverity::Trace => "TRACE".bright_black(),
            LogSeverity::Debug => "DEBUG".cyan(),
            LogSeverity::Info => "INFO ".green(),
            LogSeverity::Warn => "WARN ".yellow(),
            LogSeverity::Error => "ERROR".red().bold(),
        };

        let location = match (entry.file, entry.line) {
            (Some(file), Some(line)) => format!(" ({}:{})", file, line),
            _ => String::new(),
        };

        println!(
            "[{}] [{}] [{}] {}{}",
            stamp,
            tag,
            entry.source.bright_blue(),
            entry.message,
            location
        );
    }
}

fn logger_slot() -> &'static RwLock<Box<dyn Logger>> {
    LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)))
}

/// Replace the process-wide logger
pub fn set_logger<L: Logger + 'static>(logger: L) {
    if let Ok(mut lock) = logger_slot().write() {
        *lock = Box::new(logger);
    }
}

/// Restore [`DefaultLogger`]
pub fn reset_logger() {
    if let Ok(mut lock) = logger_slot().write() {
        *lock = Box::new(DefaultLogger);
    }
}

/// Log without file:line (used by `gi_trace!` .. `gi_warn!`)
pub fn log(severity: LogSeverity, source: &str, message: String) {
    if let Ok(lock) = logger_slot().read() {
        lock.log(&LogEntry {
            severity,
            timestamp: SystemTime::now(),
            source: source.to_string(),
            message,
            file: None,
            line: None,
        });
    }
}

/// Log with file:line (used by `gi_error!` and the error macros)
pub fn log_detailed(
    severity: LogSeverity,
    source: &str,
    message: String,
    file: &'static str,
    line: u32,
) {
    if let Ok(lock) = logger_slot().read() {
        lock.log(&LogEntry {
            severity,
            timestamp: SystemTime::now(),
            source: source.to_string(),
            message,
            file: Some(file),
            line: Some(line),
        });
    }
}

// ============================================================================
// Logging macros
// ============================================================================

/// Log a TRACE message
#[macro_export]
macro_rules! gi_trace {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::log($crate::log::LogSeverity::Trace, $source, format!($($arg)*))
    };
}

/// Log a DEBUG message
#[macro_export]
macro_rules! gi_debug {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::log($crate::log::LogSeverity::Debug, $source, format!($($arg)*))
    };
}

/// Log an INFO message
///
/// ```no_run
/// asgi::gi_info!("asgi::vulkan", "Selected device {}", "llvmpipe");
/// ```
#[macro_export]
macro_rules! gi_info {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::log($crate::log::LogSeverity::Info, $source, format!($($arg)*))
    };
}

/// Log a WARN message
#[macro_export]
macro_rules! gi_warn {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::log($crate::log::LogSeverity::Warn, $source, format!($($arg)*))
    };
}

/// Log an ERROR message, attaching file:line
#[macro_export]
macro_rules! gi_error {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::log_detailed(
            $crate::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            file!(),
            line!()
        )
    };
}

// ============================================================================
// Error macros
// ============================================================================

/// Log at ERROR and evaluate to `Error::BackendError` carrying the same message
///
/// ```ignore
/// let pool = device.create_command_pool(&info, None)
///     .map_err(|e| gi_err!("asgi::vulkan", "Failed to create command pool: {:?}", e))?;
/// ```
#[macro_export]
macro_rules! gi_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::log::log_detailed(
            $crate::log::LogSeverity::Error,
            $source,
            message.clone(),
            file!(),
            line!()
        );
        $crate::gi::Error::BackendError(message)
    }};
}

/// Log at ERROR and return `Err(Error::BackendError)`
#[macro_export]
macro_rules! gi_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::gi_err!($source, $($arg)*))
    };
}

/// Log at WARN and evaluate to `Error::InvalidResource` (caller mistakes, not backend faults)
#[macro_export]
macro_rules! gi_warn_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::log::log($crate::log::LogSeverity::Warn, $source, message.clone());
        $crate::gi::Error::InvalidResource(message)
    }};
}

/// Log at WARN and return `Err(Error::InvalidResource)`
#[macro_export]
macro_rules! gi_bail_warn {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::gi_warn_err!($source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
