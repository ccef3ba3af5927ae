/// Validation-layer messenger: filtering, counting and colored output
///
/// The callback is installed by [`VulkanGi`](crate::VulkanGi) when validation
/// is enabled. Its configuration lives in a process-wide slot so the
/// `extern "system"` callback can reach it without user data.

use ash::vk;
use asgi::gi::{DebugMessageFilter, DebugOutput, DebugSeverity, GiConfig, ValidationStats};
use colored::*;
use rustc_hash::FxHashMap;
use std::ffi::CStr;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

static MESSENGER_CONFIG: Mutex<Option<MessengerConfig>> = Mutex::new(None);

static VALIDATION_COUNTERS: ValidationCounters = ValidationCounters::new();

/// Occurrences per message text, for repeat markers and the final report
static REPEATS: Mutex<Option<FxHashMap<String, u32>>> = Mutex::new(None);

/// Messenger settings extracted from [`GiConfig`]
#[derive(Debug, Clone)]
pub(crate) struct MessengerConfig {
    pub severity: DebugSeverity,
    pub output: DebugOutput,
    pub message_filter: DebugMessageFilter,
    pub break_on_error: bool,
    pub panic_on_error: bool,
    pub enable_stats: bool,
}

impl MessengerConfig {
    pub(crate) fn from_config(config: &GiConfig) -> Self {
        Self {
            severity: config.debug_severity,
            output: config.debug_output.clone(),
            message_filter: config.debug_message_filter,
            break_on_error: config.break_on_validation_error,
            panic_on_error: config.panic_on_error,
            enable_stats: config.enable_validation_stats,
        }
    }

    /// Severities the messenger is created with
    pub(crate) fn severity_flags(&self) -> vk::DebugUtilsMessageSeverityFlagsEXT {
        match self.severity {
            DebugSeverity::ErrorsOnly => vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            DebugSeverity::ErrorsAndWarnings => {
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
            }
            DebugSeverity::All => {
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
            }
        }
    }

    fn accepts(&self, severity: vk::DebugUtilsMessageSeverityFlagsEXT, kind: vk::DebugUtilsMessageTypeFlagsEXT) -> bool {
        let severity_ok = match self.severity {
            DebugSeverity::ErrorsOnly => severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR),
            DebugSeverity::ErrorsAndWarnings => severity.intersects(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
            ),
            DebugSeverity::All => true,
        };
        if !severity_ok {
            return false;
        }

        if kind.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
            self.message_filter.show_validation
        } else if kind.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
            self.message_filter.show_performance
        } else {
            self.message_filter.show_general
        }
    }
}

struct ValidationCounters {
    errors: AtomicU32,
    warnings: AtomicU32,
    info: AtomicU32,
    verbose: AtomicU32,
}

impl ValidationCounters {
    const fn new() -> Self {
        Self {
            errors: AtomicU32::new(0),
            warnings: AtomicU32::new(0),
            info: AtomicU32::new(0),
            verbose: AtomicU32::new(0),
        }
    }

    fn count(&self, severity: vk::DebugUtilsMessageSeverityFlagsEXT) {
        let counter = if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            &self.errors
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            &self.warnings
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
            &self.info
        } else {
            &self.verbose
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ValidationStats {
        ValidationStats {
            errors: self.errors.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            info: self.info.load(Ordering::Relaxed),
            verbose: self.verbose.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.errors.store(0, Ordering::Relaxed);
        self.warnings.store(0, Ordering::Relaxed);
        self.info.store(0, Ordering::Relaxed);
        self.verbose.store(0, Ordering::Relaxed);
    }
}

// The callback must keep working after a panic elsewhere poisoned a lock
fn lock<T>(mutex: &'static Mutex<T>) -> MutexGuard<'static, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Install the messenger configuration and reset counters
pub(crate) fn init_debug_config(config: MessengerConfig) {
    VALIDATION_COUNTERS.reset();
    *lock(&REPEATS) = Some(FxHashMap::default());
    *lock(&MESSENGER_CONFIG) = Some(config);
}

/// Drop the configuration so late callbacks during teardown are ignored
pub(crate) fn cleanup_debug_config() {
    *lock(&MESSENGER_CONFIG) = None;
}

/// Validation messages counted since the backend was created
pub fn get_validation_stats() -> ValidationStats {
    VALIDATION_COUNTERS.snapshot()
}

/// Print a colored summary of the validation counters to stdout
pub fn print_validation_stats_report() {
    let stats = get_validation_stats();

    if stats.total() == 0 {
        println!("\n{}", "No validation messages".green().bold());
        return;
    }

    println!("\n{}", "=== Validation Statistics Report ===".bright_blue().bold());
    if stats.errors > 0 {
        println!("  {} {}", "Errors:".red().bold(), stats.errors);
    }
    if stats.warnings > 0 {
        println!("  {} {}", "Warnings:".yellow().bold(), stats.warnings);
    }
    if stats.info > 0 {
        println!("  {} {}", "Info:".cyan(), stats.info);
    }
    if stats.verbose > 0 {
        println!("  {} {}", "Verbose:".bright_black(), stats.verbose);
    }
    println!("  {} {}", "Total:".white().bold(), stats.total());

    if let Some(repeats) = lock(&REPEATS).as_ref() {
        let repeated = repeats.values().filter(|&&count| count > 1).count();
        if repeated > 0 {
            println!("\n  {} message(s) appeared multiple times", repeated);
        }
    }
    println!("{}\n", "====================================".bright_blue().bold());
}

fn record_repeat(message: &str) -> u32 {
    let mut guard = lock(&REPEATS);
    let repeats = guard.get_or_insert_with(FxHashMap::default);
    let count = repeats.entry(message.to_string()).or_insert(0);
    *count += 1;
    *count
}

unsafe fn c_str_or<'a>(ptr: *const std::os::raw::c_char, fallback: &'a str) -> std::borrow::Cow<'a, str> {
    if ptr.is_null() {
        std::borrow::Cow::Borrowed(fallback)
    } else {
        CStr::from_ptr(ptr).to_string_lossy()
    }
}

/// Debug-utils messenger callback
pub(crate) unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    let config = match lock(&MESSENGER_CONFIG).clone() {
        Some(config) => config,
        None => return vk::FALSE,
    };
    if p_callback_data.is_null() || !config.accepts(message_severity, message_type) {
        return vk::FALSE;
    }

    let callback_data = &*p_callback_data;
    let message_id = c_str_or(callback_data.p_message_id_name, "Unknown");
    let message = c_str_or(callback_data.p_message, "No message");

    let is_error = message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR);
    let (severity_str, severity_colored) = if is_error {
        ("ERROR", "ERROR".red().bold())
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        ("WARNING", "WARNING".yellow().bold())
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        ("INFO", "INFO".cyan())
    } else {
        ("VERBOSE", "VERBOSE".bright_black())
    };

    let type_str = if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    };

    let occurrences = if config.enable_stats {
        VALIDATION_COUNTERS.count(message_severity);
        record_repeat(&message)
    } else {
        1
    };
    let repeat_marker = if occurrences > 1 {
        format!(" [x{}]", occurrences)
    } else {
        String::new()
    };

    let console_line = format!(
        "{} {} [{}]{}\n  |- {}: {}\n  `- {}\n",
        "[VULKAN".bright_blue().bold(),
        format!("{}]", severity_colored).bright_blue().bold(),
        type_str.bright_black(),
        repeat_marker.yellow(),
        "Message ID".bright_black(),
        message_id.white(),
        message.white()
    );
    let file_line = format!(
        "[VULKAN {}] [{}]{}\n  |- Message ID: {}\n  `- {}\n",
        severity_str, type_str, repeat_marker, message_id, message
    );

    match &config.output {
        DebugOutput::Console => eprint!("{}", console_line),
        DebugOutput::File(path) => append_to_file(path, &file_line),
        DebugOutput::Both(path) => {
            eprint!("{}", console_line);
            append_to_file(path, &file_line);
        }
    }

    if is_error && config.panic_on_error {
        panic!("Validation error [{}] {}: {}", type_str, message_id, message);
    }

    if is_error && config.break_on_error {
        eprintln!(
            "\n{}\n  Context: {} [{}]\n  Message: {}\n",
            "BREAK ON VALIDATION ERROR - aborting".red().bold(),
            message_id.yellow(),
            type_str.cyan(),
            message.white()
        );
        std::process::abort();
    }

    vk::FALSE
}

fn append_to_file(path: &str, text: &str) {
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
        let _ = writeln!(file, "{}", text);
    }
}

#[cfg(test)]
#[path = "debug_tests.rs"]
mod tests;
