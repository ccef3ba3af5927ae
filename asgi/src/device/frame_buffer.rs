/// Frame buffer descriptor
///
/// A frame buffer binds image views to the attachments of a render pass and
/// carries the clear value used for each attachment when the pass begins.

use crate::device::{AttachmentDesc, ClearValue, ImageViewHandle, RenderPassHandle};

#[derive(Debug, Clone, PartialEq)]
pub struct FrameBufferDesc {
    /// Render pass the frame buffer is compatible with
    pub render_pass: RenderPassHandle,
    /// One view per render pass attachment, same order
    pub attachments: Vec<ImageViewHandle>,
    /// One clear value per attachment. Missing entries default.
    pub clear_values: Vec<ClearValue>,
    pub width: u32,
    pub height: u32,
}

impl FrameBufferDesc {
    /// One clear value per attachment, filling missing entries from the
    /// attachment formats
    pub fn resolved_clear_values(&self, attachments: &[AttachmentDesc]) -> Vec<ClearValue> {
        attachments
            .iter()
            .enumerate()
            .map(|(i, attachment)| {
                self.clear_values
                    .get(i)
                    .copied()
                    .unwrap_or_else(|| ClearValue::default_for(attachment.format))
            })
            .collect()
    }
}
