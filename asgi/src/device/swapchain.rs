/// Swapchain descriptor and state

use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use crate::format::Format;

/// Descriptor for creating a swapchain on a native window
#[derive(Debug, Clone, Copy)]
pub struct SwapchainDesc {
    pub display: RawDisplayHandle,
    pub window: RawWindowHandle,
    /// Requested extent, used when the surface does not impose one
    pub width: u32,
    pub height: u32,
    /// Surface format to prefer when available
    pub preferred_format: Option<Format>,
    /// Depth attachment created next to each color attachment
    pub depth_format: Option<Format>,
    /// FIFO presentation when true, otherwise mailbox or immediate if available
    pub vsync: bool,
}

/// Swapchain state as seen by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainInfo {
    pub width: u32,
    pub height: u32,
    pub format: Format,
    pub image_count: u32,
    pub depth_format: Option<Format>,
    /// Attachment acquired by the last `acquire_next_attachment`
    pub current_attachment: Option<u32>,
}
