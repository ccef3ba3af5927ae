//! Unit tests for error.rs
//!
//! Covers Display output of every variant, trait impls and `?` propagation.

use crate::error::{Error, Result};

// ============================================================================
// DISPLAY
// ============================================================================

#[test]
fn test_backend_error_display() {
    let err = Error::BackendError("vkQueueSubmit returned ERROR_DEVICE_LOST".to_string());
    let display = format!("{}", err);
    assert!(display.starts_with("Backend error"));
    assert!(display.contains("ERROR_DEVICE_LOST"));
}

#[test]
fn test_out_of_memory_display() {
    assert_eq!(format!("{}", Error::OutOfMemory), "Out of GPU memory");
}

#[test]
fn test_not_found_display() {
    let err = Error::NotFound("shaders/quad.vert.spv".to_string());
    assert_eq!(format!("{}", err), "Not found: shaders/quad.vert.spv");
}

#[test]
fn test_invalid_stages_display() {
    let err = Error::InvalidStages("fragment stage missing".to_string());
    assert!(format!("{}", err).contains("fragment stage missing"));
    assert!(format!("{}", err).starts_with("Invalid shader stages"));
}

#[test]
fn test_unsupported_display() {
    let err = Error::Unsupported("cmd_draw".to_string());
    assert_eq!(format!("{}", err), "Unsupported: cmd_draw");
}

#[test]
fn test_invalid_resource_and_init_display() {
    let err = Error::InvalidResource("stale buffer handle".to_string());
    assert!(format!("{}", err).contains("Invalid resource"));

    let err = Error::InitializationFailed("no Vulkan loader".to_string());
    assert!(format!("{}", err).contains("Initialization failed"));
}

// ============================================================================
// TRAIT IMPLEMENTATIONS
// ============================================================================

#[test]
fn test_error_is_std_error() {
    let err = Error::OutOfMemory;
    let _: &dyn std::error::Error = &err;
}

#[test]
fn test_error_debug_names_variant() {
    assert!(format!("{:?}", Error::OutOfMemory).contains("OutOfMemory"));
    assert!(format!("{:?}", Error::NotFound("x".into())).contains("NotFound"));
    assert!(format!("{:?}", Error::InvalidStages("x".into())).contains("InvalidStages"));
}

#[test]
fn test_error_clone_keeps_message() {
    let err = Error::BackendError("lost".to_string());
    let cloned = err.clone();
    assert_eq!(format!("{}", err), format!("{}", cloned));
}

// ============================================================================
// PROPAGATION
// ============================================================================

#[test]
fn test_error_propagation_with_question_mark() {
    fn inner() -> Result<u32> {
        Err(Error::OutOfMemory)
    }

    fn outer() -> Result<u32> {
        let value = inner()?;
        Ok(value + 1)
    }

    assert!(matches!(outer(), Err(Error::OutOfMemory)));
}
