/// 2D images, image views and upload regions

use bitflags::bitflags;
use crate::device::{ImageHandle, SampleCount};
use crate::error::Result;
use crate::format::Format;
use crate::gi_bail_warn;
use crate::memory::MemoryAllocation;

bitflags! {
    /// Image usage flags, plus the abstract `UPLOAD` / `READBACK` memory bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageUsageFlags: u32 {
        const TRANSFER_SRC = 1 << 0;
        const TRANSFER_DST = 1 << 1;
        const SAMPLED = 1 << 2;
        const STORAGE = 1 << 3;
        const COLOR_ATTACHMENT = 1 << 4;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 5;
        const TRANSIENT_ATTACHMENT = 1 << 6;
        const INPUT_ATTACHMENT = 1 << 7;
        const UPLOAD = 1 << 16;
        const READBACK = 1 << 17;
    }
}

bitflags! {
    /// Aspects of an image addressed by views, copies and barriers
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageAspectFlags: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

/// Aspect of an image created with `format` and `usage`
///
/// Depth/stencil aspects only apply to depth-stencil attachments; any other
/// image is addressed through its color aspect.
pub fn image_aspect(format: Format, usage: ImageUsageFlags) -> ImageAspectFlags {
    if !usage.contains(ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT) {
        return ImageAspectFlags::COLOR;
    }
    match (format.is_depth(), format.is_stencil()) {
        (true, true) => ImageAspectFlags::DEPTH | ImageAspectFlags::STENCIL,
        (true, false) => ImageAspectFlags::DEPTH,
        (false, true) => ImageAspectFlags::STENCIL,
        (false, false) => ImageAspectFlags::COLOR,
    }
}

/// Descriptor for creating a 2D image
#[derive(Debug, Clone, Copy)]
pub struct Image2DDesc {
    pub width: u32,
    pub height: u32,
    pub format: Format,
    /// Number of mip levels (at least 1)
    pub mip_levels: u32,
    pub samples: SampleCount,
    pub usage: ImageUsageFlags,
}

impl Default for Image2DDesc {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            format: Format::R8G8B8A8_UNORM,
            mip_levels: 1,
            samples: SampleCount::S1,
            usage: ImageUsageFlags::SAMPLED | ImageUsageFlags::TRANSFER_DST,
        }
    }
}

impl Image2DDesc {
    /// Longest mip chain for a `width` x `height` image
    pub fn max_mip_levels(width: u32, height: u32) -> u32 {
        32 - width.max(height).max(1).leading_zeros()
    }

    /// Reject empty extents, undefined formats and impossible mip chains
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            gi_bail_warn!("asgi::image", "Image extent {}x{} is empty", self.width, self.height);
        }
        if self.format == Format::Undefined {
            gi_bail_warn!("asgi::image", "Image format is undefined");
        }
        let max = Self::max_mip_levels(self.width, self.height);
        if self.mip_levels == 0 || self.mip_levels > max {
            gi_bail_warn!("asgi::image",
                "{} mip levels requested, {}x{} allows 1..={}",
                self.mip_levels, self.width, self.height, max);
        }
        Ok(())
    }
}

/// Image state as seen by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: Format,
    pub mip_levels: u32,
    pub samples: SampleCount,
    pub usage: ImageUsageFlags,
    /// Aspect derived from format and usage at creation
    pub aspect: ImageAspectFlags,
    /// Backing allocation. `None` for images owned by a swapchain.
    pub memory: Option<MemoryAllocation>,
}

impl ImageInfo {
    /// Extent of mip `level`, never smaller than 1x1
    pub fn mip_extent(&self, level: u32) -> (u32, u32) {
        let shift = level.min(31);
        ((self.width >> shift).max(1), (self.height >> shift).max(1))
    }
}

/// Rectangle of one mip level targeted by an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImageRegion {
    pub level: u32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ImageRegion {
    /// Whole mip `level` of `info`
    pub fn full_level(info: &ImageInfo, level: u32) -> Self {
        let (width, height) = info.mip_extent(level);
        Self { level, x: 0, y: 0, width, height }
    }
}

/// Image view state
///
/// `image` is a non-owning back-reference resolved through the backend's
/// image arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageViewInfo {
    pub image: ImageHandle,
    pub base_mip: u32,
    pub mip_count: u32,
    pub format: Format,
    pub aspect: ImageAspectFlags,
}
