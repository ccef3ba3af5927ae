//! Error types for ASGI
//!
//! Every fallible operation of the core and of the backends returns
//! [`Result`]. Failures are reported synchronously to the caller; nothing
//! is queued or retried.

use std::fmt;

/// Result type for ASGI operations
pub type Result<T> = std::result::Result<T, Error>;

/// ASGI errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error (native object creation, submission, mapping)
    BackendError(String),

    /// The memory allocator could not satisfy a request
    OutOfMemory,

    /// Invalid resource (stale handle, out-of-range region, bad descriptor)
    InvalidResource(String),

    /// Initialization failed (loader, instance, device, allocator)
    InitializationFailed(String),

    /// A required artifact is missing (shader bytecode, backend plugin)
    NotFound(String),

    /// A pipeline was described without its mandatory stages
    InvalidStages(String),

    /// The active backend does not provide this capability
    Unsupported(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::NotFound(msg) => write!(f, "Not found: {}", msg),
            Error::InvalidStages(msg) => write!(f, "Invalid shader stages: {}", msg),
            Error::Unsupported(msg) => write!(f, "Unsupported: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
