//! Backend configuration
//!
//! [`GiConfig`] is passed to the backend when it is created (the `Init` step):
//! device selection, validation/debug-messenger settings and the external
//! shader compiler used to produce missing bytecode.

use std::path::PathBuf;

/// Backend kind selectable through the plugin registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GiType {
    Vulkan,
}

impl GiType {
    /// Registry key of this backend
    pub fn name(&self) -> &'static str {
        match self {
            GiType::Vulkan => "vulkan",
        }
    }
}

/// Which validation messages reach the debug output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    ErrorsOnly,
    ErrorsAndWarnings,
    All,
}

/// Where validation messages are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugOutput {
    Console,
    /// Append to the given file
    File(String),
    /// Console and file
    Both(String),
}

/// Message categories shown by the debug messenger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugMessageFilter {
    pub show_general: bool,
    pub show_validation: bool,
    pub show_performance: bool,
}

impl Default for DebugMessageFilter {
    fn default() -> Self {
        Self {
            show_general: true,
            show_validation: true,
            show_performance: true,
        }
    }
}

/// Counters collected by the debug messenger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

/// External compiler invoked when a shader's bytecode file is missing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderCompilerConfig {
    /// Directory holding the compiler. `None` means the directory of the running executable.
    pub compiler_dir: Option<PathBuf>,
    /// Compiler executable name
    pub compiler_name: String,
    /// Extension appended to the shader source path to locate its bytecode
    pub bytecode_extension: String,
}

impl Default for ShaderCompilerConfig {
    fn default() -> Self {
        let compiler_name = if cfg!(windows) {
            "glslangValidator.exe"
        } else {
            "glslangValidator"
        };
        Self {
            compiler_dir: None,
            compiler_name: compiler_name.to_string(),
            bytecode_extension: "spv".to_string(),
        }
    }
}

impl ShaderCompilerConfig {
    /// Full path of the compiler executable
    pub fn compiler_path(&self) -> PathBuf {
        let dir = self.compiler_dir.clone().or_else(|| {
            std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
        });
        match dir {
            Some(dir) => dir.join(&self.compiler_name),
            None => PathBuf::from(&self.compiler_name),
        }
    }
}

/// Backend configuration
#[derive(Debug, Clone)]
pub struct GiConfig {
    /// Enable validation layers and the debug messenger
    pub enable_validation: bool,
    /// Application name reported to the driver
    pub app_name: String,
    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),
    /// Physical device to use, matched against the driver-reported name.
    /// `None` selects the first enumerated device.
    pub device_name: Option<String>,
    pub debug_severity: DebugSeverity,
    pub debug_output: DebugOutput,
    pub debug_message_filter: DebugMessageFilter,
    /// Abort the process on the first validation error (for debugger attachment)
    pub break_on_validation_error: bool,
    /// Panic on the first validation error
    pub panic_on_error: bool,
    /// Count validation messages into [`ValidationStats`]
    pub enable_validation_stats: bool,
    pub shader_compiler: ShaderCompilerConfig,
}

impl Default for GiConfig {
    fn default() -> Self {
        Self {
            enable_validation: cfg!(debug_assertions),
            app_name: "ASGI Application".to_string(),
            app_version: (1, 0, 0),
            device_name: None,
            debug_severity: DebugSeverity::ErrorsAndWarnings,
            debug_output: DebugOutput::Console,
            debug_message_filter: DebugMessageFilter::default(),
            break_on_validation_error: false,
            panic_on_error: false,
            enable_validation_stats: true,
            shader_compiler: ShaderCompilerConfig::default(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
