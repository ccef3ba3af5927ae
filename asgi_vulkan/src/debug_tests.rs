use super::*;
use serial_test::serial;

fn messenger(severity: DebugSeverity) -> MessengerConfig {
    MessengerConfig {
        severity,
        output: DebugOutput::Console,
        message_filter: DebugMessageFilter::default(),
        break_on_error: false,
        panic_on_error: false,
        enable_stats: true,
    }
}

#[test]
fn test_severity_flags_grow_with_severity() {
    assert_eq!(
        messenger(DebugSeverity::ErrorsOnly).severity_flags(),
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
    );
    let warnings = messenger(DebugSeverity::ErrorsAndWarnings).severity_flags();
    assert!(warnings.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING));
    assert!(!warnings.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO));
    let all = messenger(DebugSeverity::All).severity_flags();
    assert!(all.contains(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE));
}

#[test]
fn test_accepts_filters_by_severity() {
    let config = messenger(DebugSeverity::ErrorsOnly);
    let validation = vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION;
    assert!(config.accepts(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR, validation));
    assert!(!config.accepts(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING, validation));
}

#[test]
fn test_accepts_filters_by_category() {
    let mut config = messenger(DebugSeverity::All);
    config.message_filter.show_performance = false;
    let info = vk::DebugUtilsMessageSeverityFlagsEXT::INFO;
    assert!(!config.accepts(info, vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE));
    assert!(config.accepts(info, vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION));
    assert!(config.accepts(info, vk::DebugUtilsMessageTypeFlagsEXT::GENERAL));
}

#[test]
fn test_from_config_copies_debug_settings() {
    let gi_config = GiConfig {
        debug_severity: DebugSeverity::All,
        debug_output: DebugOutput::File("validation.log".to_string()),
        panic_on_error: true,
        ..GiConfig::default()
    };
    let config = MessengerConfig::from_config(&gi_config);
    assert_eq!(config.severity, DebugSeverity::All);
    assert_eq!(config.output, DebugOutput::File("validation.log".to_string()));
    assert!(config.panic_on_error);
    assert!(config.enable_stats);
}

#[test]
#[serial]
fn test_init_resets_counters() {
    VALIDATION_COUNTERS.count(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR);
    VALIDATION_COUNTERS.count(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING);
    assert!(get_validation_stats().total() >= 2);

    init_debug_config(messenger(DebugSeverity::All));
    assert_eq!(get_validation_stats(), ValidationStats::default());
    cleanup_debug_config();
}

#[test]
#[serial]
fn test_repeats_are_counted_per_message() {
    init_debug_config(messenger(DebugSeverity::All));
    assert_eq!(record_repeat("same"), 1);
    assert_eq!(record_repeat("same"), 2);
    assert_eq!(record_repeat("other"), 1);
    cleanup_debug_config();
}

#[test]
#[serial]
fn test_callback_ignored_without_config() {
    cleanup_debug_config();
    let result = unsafe {
        vulkan_debug_callback(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION,
            std::ptr::null(),
            std::ptr::null_mut(),
        )
    };
    assert_eq!(result, vk::FALSE);
}
