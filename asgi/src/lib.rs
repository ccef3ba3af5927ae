/*!
# ASGI

Backend-agnostic GPU resource and pipeline layer.

Calling code describes the resources and rendering state it needs through
plain descriptors; a backend (Vulkan today) turns them into native objects.
Backends are selected at runtime through the plugin registry.

## Architecture

- **GraphicsInterface**: backend trait creating and destroying every resource
- **MemoryAllocator**: explicit allocator context, usage-classified memory
- **ShaderReflection / PipelineLayoutDesc**: binding layouts synthesized from shader reflection
- **Upload engine**: direct and staged (batched) uploads over a [`TransferDevice`](upload::TransferDevice)
- **ImageLayoutTracker**: per-mip layout state driving image barriers
*/

// Internal modules
mod error;
pub mod log;
pub mod config;
pub mod format;
pub mod memory;
pub mod image_layout;
pub mod upload;
pub mod device;

// Main gi namespace module
pub mod gi {
    // Error types
    pub use crate::error::{Error, Result};

    // Configuration
    pub use crate::config::*;

    // Backend trait and registry
    pub use crate::device::{GraphicsInterface, register_backend, create_context, is_backend_registered};

    // Logging sub-module (types only, macros live at the crate root)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger, set_logger, reset_logger};
    }

    // Device sub-module with every descriptor and handle
    pub mod device {
        pub use crate::device::*;
        pub use crate::format::{Format, format_size};
    }

    // Memory classification and allocator context
    pub mod memory {
        pub use crate::memory::*;
    }

    // Upload engine and layout tracking
    pub mod upload {
        pub use crate::upload::*;
        pub use crate::image_layout::*;
    }
}
