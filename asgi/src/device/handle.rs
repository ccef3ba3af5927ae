//! Resource handles
//!
//! Every resource lives in a per-kind arena inside the backend and is addressed
//! by one of these keys. A key whose resource was destroyed resolves to
//! `Error::InvalidResource`.

slotmap::new_key_type! {
    /// GPU buffer
    pub struct BufferHandle;
    /// 2D image with its array layers and mip levels
    pub struct ImageHandle;
    /// View over a subresource range of an image
    pub struct ImageViewHandle;
    pub struct SamplerHandle;
    /// Loaded SPIR-V module with its reflection
    pub struct ShaderModuleHandle;
    /// Graphics pipeline and its synthesized layout
    pub struct PipelineHandle;
    pub struct RenderPassHandle;
    pub struct FrameBufferHandle;
    /// Presentation surface with its attachments
    pub struct SwapchainHandle;
    pub struct CommandBufferHandle;
}

#[cfg(test)]
#[path = "handle_tests.rs"]
mod tests;
