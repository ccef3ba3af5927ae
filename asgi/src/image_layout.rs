/// Per-image, per-mip layout tracking
///
/// Each mip level remembers the last GPU access recorded against it. Before a
/// different kind of access the tracker produces a [`LayoutTransition`] whose
/// source and destination flags feed a single image memory barrier.

use bitflags::bitflags;
use crate::device::ImageAspectFlags;

bitflags! {
    /// Memory access kinds of a barrier
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        const SHADER_READ = 1 << 0;
        const SHADER_WRITE = 1 << 1;
        const COLOR_ATTACHMENT_WRITE = 1 << 2;
        const DEPTH_STENCIL_ATTACHMENT_WRITE = 1 << 3;
        const TRANSFER_READ = 1 << 4;
        const TRANSFER_WRITE = 1 << 5;
        const COLOR_ATTACHMENT_READ = 1 << 6;
        const DEPTH_STENCIL_ATTACHMENT_READ = 1 << 7;
        const INPUT_ATTACHMENT_READ = 1 << 8;
        const MEMORY_READ = 1 << 9;
        const MEMORY_WRITE = 1 << 10;
    }
}

bitflags! {
    /// Pipeline stages of a barrier
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineStageFlags: u32 {
        const TOP_OF_PIPE = 1 << 0;
        const FRAGMENT_SHADER = 1 << 1;
        const EARLY_FRAGMENT_TESTS = 1 << 2;
        const LATE_FRAGMENT_TESTS = 1 << 3;
        const COLOR_ATTACHMENT_OUTPUT = 1 << 4;
        const COMPUTE_SHADER = 1 << 5;
        const TRANSFER = 1 << 6;
        const BOTTOM_OF_PIPE = 1 << 7;
        const VERTEX_INPUT = 1 << 8;
        const VERTEX_SHADER = 1 << 9;
        const ALL_GRAPHICS = 1 << 10;
        const ALL_COMMANDS = 1 << 11;
    }
}

/// Image memory layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    Undefined,
    General,
    ColorAttachmentOptimal,
    DepthStencilAttachmentOptimal,
    DepthStencilReadOnlyOptimal,
    ShaderReadOnlyOptimal,
    TransferSrcOptimal,
    TransferDstOptimal,
    PresentSrc,
}

/// Last known access of one mip level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayoutState {
    Undefined,
    TransferDest,
    ColorAttachment,
    DepthStencilAttachment,
    TransferSource,
    Present,
    PixelShaderRead,
    PixelDepthStencilRead,
    ComputeGeneralRW,
    PixelGeneralRW,
}

/// Access, stage and layout describing one side of a barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierFlags {
    pub access: AccessFlags,
    pub stage: PipelineStageFlags,
    pub layout: ImageLayout,
}

impl ImageLayoutState {
    /// Barrier flags of an access in this state
    pub fn barrier_flags(&self) -> BarrierFlags {
        let (access, stage, layout) = match self {
            ImageLayoutState::Undefined => (
                AccessFlags::empty(),
                PipelineStageFlags::TOP_OF_PIPE,
                ImageLayout::Undefined,
            ),
            ImageLayoutState::TransferDest => (
                AccessFlags::TRANSFER_WRITE,
                PipelineStageFlags::TRANSFER,
                ImageLayout::TransferDstOptimal,
            ),
            ImageLayoutState::ColorAttachment => (
                AccessFlags::COLOR_ATTACHMENT_WRITE,
                PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                ImageLayout::ColorAttachmentOptimal,
            ),
            ImageLayoutState::DepthStencilAttachment => (
                AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                PipelineStageFlags::EARLY_FRAGMENT_TESTS | PipelineStageFlags::LATE_FRAGMENT_TESTS,
                ImageLayout::DepthStencilAttachmentOptimal,
            ),
            ImageLayoutState::TransferSource => (
                AccessFlags::TRANSFER_READ,
                PipelineStageFlags::TRANSFER,
                ImageLayout::TransferSrcOptimal,
            ),
            ImageLayoutState::Present => (
                AccessFlags::empty(),
                PipelineStageFlags::BOTTOM_OF_PIPE,
                ImageLayout::PresentSrc,
            ),
            ImageLayoutState::PixelShaderRead => (
                AccessFlags::SHADER_READ,
                PipelineStageFlags::FRAGMENT_SHADER,
                ImageLayout::ShaderReadOnlyOptimal,
            ),
            ImageLayoutState::PixelDepthStencilRead => (
                AccessFlags::SHADER_READ,
                PipelineStageFlags::FRAGMENT_SHADER,
                ImageLayout::DepthStencilReadOnlyOptimal,
            ),
            ImageLayoutState::ComputeGeneralRW => (
                AccessFlags::SHADER_READ | AccessFlags::SHADER_WRITE,
                PipelineStageFlags::COMPUTE_SHADER,
                ImageLayout::General,
            ),
            ImageLayoutState::PixelGeneralRW => (
                AccessFlags::SHADER_READ | AccessFlags::SHADER_WRITE,
                PipelineStageFlags::FRAGMENT_SHADER,
                ImageLayout::General,
            ),
        };
        BarrierFlags { access, stage, layout }
    }

    /// Read state an upload leaves behind for an image of `aspect`
    pub fn read_state_for(aspect: ImageAspectFlags) -> Self {
        if aspect.intersects(ImageAspectFlags::DEPTH | ImageAspectFlags::STENCIL) {
            ImageLayoutState::PixelDepthStencilRead
        } else {
            ImageLayoutState::PixelShaderRead
        }
    }
}

/// One barrier over a single mip level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutTransition {
    pub level: u32,
    pub from: BarrierFlags,
    pub to: BarrierFlags,
}

/// Layout state of every mip level of one image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageLayoutTracker {
    levels: Vec<ImageLayoutState>,
}

impl ImageLayoutTracker {
    /// All levels start `Undefined`
    pub fn new(mip_levels: u32) -> Self {
        Self {
            levels: vec![ImageLayoutState::Undefined; mip_levels.max(1) as usize],
        }
    }

    pub fn level_count(&self) -> u32 {
        self.levels.len() as u32
    }

    /// State of `level`, `None` when out of range
    pub fn state(&self, level: u32) -> Option<ImageLayoutState> {
        self.levels.get(level as usize).copied()
    }

    /// Move `level` to `target`
    ///
    /// Returns the barrier to record, or `None` when the level is already in
    /// `target` or does not exist.
    pub fn transition(&mut self, level: u32, target: ImageLayoutState) -> Option<LayoutTransition> {
        let slot = self.levels.get_mut(level as usize)?;
        if *slot == target {
            return None;
        }
        let transition = LayoutTransition {
            level,
            from: slot.barrier_flags(),
            to: target.barrier_flags(),
        };
        *slot = target;
        Some(transition)
    }

    /// Barrier needed before a transfer writes into `level`
    ///
    /// `None` when the level is already `TransferDest`.
    pub fn prepare_transfer_write(&mut self, level: u32) -> Option<LayoutTransition> {
        self.transition(level, ImageLayoutState::TransferDest)
    }

    /// Barrier moving `level` from `TransferDest` to the read state of `aspect`
    ///
    /// Always produced, even if a previous call left the level in the target
    /// read state, because the transfer just left it in `TransferDest`.
    pub fn finish_transfer_write(&mut self, level: u32, aspect: ImageAspectFlags) -> LayoutTransition {
        let target = ImageLayoutState::read_state_for(aspect);
        if let Some(slot) = self.levels.get_mut(level as usize) {
            *slot = target;
        }
        LayoutTransition {
            level,
            from: ImageLayoutState::TransferDest.barrier_flags(),
            to: target.barrier_flags(),
        }
    }
}

#[cfg(test)]
#[path = "image_layout_tests.rs"]
mod tests;
