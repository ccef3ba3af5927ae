use super::*;

fn capabilities(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
    vk::SurfaceCapabilitiesKHR {
        min_image_count: min,
        max_image_count: max,
        current_extent: vk::Extent2D { width: u32::MAX, height: u32::MAX },
        min_image_extent: vk::Extent2D { width: 16, height: 16 },
        max_image_extent: vk::Extent2D { width: 4096, height: 2048 },
        supported_composite_alpha: vk::CompositeAlphaFlagsKHR::INHERIT,
        ..Default::default()
    }
}

fn surface_format(format: vk::Format) -> vk::SurfaceFormatKHR {
    vk::SurfaceFormatKHR {
        format,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    }
}

// ============================================================================
// Surface format
// ============================================================================

#[test]
fn test_preferred_format_used_when_offered() {
    let available = [surface_format(vk::Format::B8G8R8A8_UNORM), surface_format(vk::Format::B8G8R8A8_SRGB)];
    let chosen = choose_surface_format(&available, Some(Format::B8G8R8A8_SRGB));
    assert_eq!(chosen.map(|f| f.format), Some(vk::Format::B8G8R8A8_SRGB));
}

#[test]
fn test_missing_preferred_format_falls_back_to_first_known() {
    let available = [
        surface_format(vk::Format::A2B10G10R10_UNORM_PACK32),
        surface_format(vk::Format::B8G8R8A8_UNORM),
    ];
    let chosen = choose_surface_format(&available, Some(Format::R8G8B8A8_SRGB));
    let expected = available.iter().find(|f| format_from_vk(f.format).is_some()).map(|f| f.format);
    assert_eq!(chosen.map(|f| f.format), expected);
}

#[test]
fn test_no_surface_format() {
    assert!(choose_surface_format(&[], None).is_none());
}

// ============================================================================
// Extent, image count, present mode
// ============================================================================

#[test]
fn test_surface_imposed_extent_wins() {
    let mut caps = capabilities(2, 3);
    caps.current_extent = vk::Extent2D { width: 800, height: 600 };
    let extent = choose_extent(&caps, 1920, 1080);
    assert_eq!((extent.width, extent.height), (800, 600));
}

#[test]
fn test_requested_extent_is_clamped() {
    let extent = choose_extent(&capabilities(2, 3), 8000, 4);
    assert_eq!((extent.width, extent.height), (4096, 16));
}

#[test]
fn test_image_count() {
    assert_eq!(choose_image_count(&capabilities(2, 0)), 3);
    assert_eq!(choose_image_count(&capabilities(2, 8)), 3);
    assert_eq!(choose_image_count(&capabilities(1, 2)), 2);
    assert_eq!(choose_image_count(&capabilities(4, 0)), 4);
}

#[test]
fn test_vsync_forces_fifo() {
    let modes = [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO];
    assert_eq!(choose_present_mode(&modes, true), vk::PresentModeKHR::FIFO);
}

#[test]
fn test_present_mode_without_vsync() {
    let all = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::MAILBOX];
    assert_eq!(choose_present_mode(&all, false), vk::PresentModeKHR::MAILBOX);

    let immediate = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
    assert_eq!(choose_present_mode(&immediate, false), vk::PresentModeKHR::IMMEDIATE);

    assert_eq!(choose_present_mode(&[vk::PresentModeKHR::FIFO], false), vk::PresentModeKHR::FIFO);
}

#[test]
fn test_composite_alpha_first_supported() {
    assert_eq!(choose_composite_alpha(&capabilities(2, 3)), vk::CompositeAlphaFlagsKHR::INHERIT);

    let mut caps = capabilities(2, 3);
    caps.supported_composite_alpha = vk::CompositeAlphaFlagsKHR::OPAQUE | vk::CompositeAlphaFlagsKHR::INHERIT;
    assert_eq!(choose_composite_alpha(&caps), vk::CompositeAlphaFlagsKHR::OPAQUE);
}

// ============================================================================
// Frame progress
// ============================================================================

#[test]
fn test_frame_acquire_submit_present() {
    let mut frame = FrameState::default();
    assert!(!frame.ready_for_submit());
    assert_eq!(frame.take_for_submit(), None);

    frame.acquired(2);
    assert!(frame.ready_for_submit());
    assert_eq!(frame.take_for_submit(), Some(2));
    assert!(frame.render_pending);

    // Only one submission waits on an acquire
    assert!(!frame.ready_for_submit());
    assert_eq!(frame.take_for_submit(), None);

    frame.presented();
    assert_eq!(frame, FrameState::default());
}

#[test]
fn test_rejected_submission_restores_attachment() {
    let mut frame = FrameState::default();
    frame.acquired(1);
    assert_eq!(frame.take_for_submit(), Some(1));

    frame.restore_submit();
    assert!(frame.ready_for_submit());
    assert!(!frame.render_pending);
    assert_eq!(frame.take_for_submit(), Some(1));
}

#[test]
fn test_restore_without_submission_is_a_no_op() {
    let mut frame = FrameState::default();
    frame.restore_submit();
    assert_eq!(frame, FrameState::default());

    frame.acquired(0);
    frame.restore_submit();
    assert!(frame.ready_for_submit());
    assert!(!frame.render_pending);
}
