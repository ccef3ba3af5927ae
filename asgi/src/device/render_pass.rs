/// Render pass descriptor

use crate::device::SampleCount;
use crate::format::Format;
use crate::image_layout::{AccessFlags, ImageLayout, PipelineStageFlags};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOp {
    Load,
    Clear,
    DontCare,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Store,
    DontCare,
}

/// One attachment of a render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentDesc {
    pub format: Format,
    pub samples: SampleCount,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,
    pub initial_layout: ImageLayout,
    pub final_layout: ImageLayout,
}

impl AttachmentDesc {
    /// Cleared color attachment ending in `final_layout`
    pub fn color(format: Format, final_layout: ImageLayout) -> Self {
        Self {
            format,
            samples: SampleCount::S1,
            load_op: LoadOp::Clear,
            store_op: StoreOp::Store,
            stencil_load_op: LoadOp::DontCare,
            stencil_store_op: StoreOp::DontCare,
            initial_layout: ImageLayout::Undefined,
            final_layout,
        }
    }

    /// Cleared depth attachment whose contents are discarded after the pass
    pub fn depth(format: Format) -> Self {
        Self {
            format,
            samples: SampleCount::S1,
            load_op: LoadOp::Clear,
            store_op: StoreOp::DontCare,
            stencil_load_op: LoadOp::DontCare,
            stencil_store_op: StoreOp::DontCare,
            initial_layout: ImageLayout::Undefined,
            final_layout: ImageLayout::DepthStencilAttachmentOptimal,
        }
    }
}

/// Reference from a subpass to an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentReference {
    /// Index into `RenderPassDesc::attachments`
    pub attachment: u32,
    /// Layout during the subpass
    pub layout: ImageLayout,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubpassDesc {
    pub input_attachments: Vec<AttachmentReference>,
    pub color_attachments: Vec<AttachmentReference>,
    pub depth_stencil_attachment: Option<AttachmentReference>,
}

/// Execution and memory dependency between two subpasses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubpassDependency {
    /// `None` = outside the render pass
    pub src_subpass: Option<u32>,
    /// `None` = outside the render pass
    pub dst_subpass: Option<u32>,
    pub src_stage: PipelineStageFlags,
    pub dst_stage: PipelineStageFlags,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
}

/// Descriptor for creating a render pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderPassDesc {
    pub attachments: Vec<AttachmentDesc>,
    pub subpasses: Vec<SubpassDesc>,
    pub dependencies: Vec<SubpassDependency>,
}

impl RenderPassDesc {
    /// One subpass writing one color attachment and an optional depth attachment
    pub fn single_pass(color: AttachmentDesc, depth: Option<AttachmentDesc>) -> Self {
        let mut attachments = vec![color];
        let depth_stencil_attachment = depth.map(|d| {
            attachments.push(d);
            AttachmentReference {
                attachment: 1,
                layout: ImageLayout::DepthStencilAttachmentOptimal,
            }
        });

        Self {
            attachments,
            subpasses: vec![SubpassDesc {
                input_attachments: Vec::new(),
                color_attachments: vec![AttachmentReference {
                    attachment: 0,
                    layout: ImageLayout::ColorAttachmentOptimal,
                }],
                depth_stencil_attachment,
            }],
            dependencies: vec![SubpassDependency {
                src_subpass: None,
                dst_subpass: Some(0),
                src_stage: PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    | PipelineStageFlags::EARLY_FRAGMENT_TESTS,
                dst_stage: PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    | PipelineStageFlags::EARLY_FRAGMENT_TESTS,
                src_access: AccessFlags::empty(),
                dst_access: AccessFlags::COLOR_ATTACHMENT_WRITE
                    | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            }],
        }
    }

    /// Number of color attachments written by `subpass`
    pub fn color_attachment_count(&self, subpass: u32) -> Option<usize> {
        self.subpasses
            .get(subpass as usize)
            .map(|s| s.color_attachments.len())
    }
}
