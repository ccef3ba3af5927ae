/// Frame buffers and clear values

use ash::vk;
use asgi::gi::device::{ClearValue, FrameBufferDesc};
use asgi::gi::Result;
use asgi::gi_err;

/// Vulkan frame buffer with one clear value per attachment
pub(crate) struct FrameBuffer {
    pub framebuffer: vk::Framebuffer,
    pub desc: FrameBufferDesc,
    pub clear_values: Vec<ClearValue>,
}

pub(crate) fn clear_value_to_vk(value: &ClearValue) -> vk::ClearValue {
    match *value {
        ClearValue::Color(rgba) => vk::ClearValue {
            color: vk::ClearColorValue { float32: rgba },
        },
        ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
        },
    }
}

impl FrameBuffer {
    /// Create a frame buffer over already resolved attachment views
    pub fn new(
        device: &ash::Device,
        render_pass: vk::RenderPass,
        views: &[vk::ImageView],
        desc: &FrameBufferDesc,
        clear_values: Vec<ClearValue>,
    ) -> Result<Self> {
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(views)
            .width(desc.width)
            .height(desc.height)
            .layers(1);

        let framebuffer = unsafe {
            device
                .create_framebuffer(&create_info, None)
                .map_err(|e| gi_err!("asgi::vulkan",
                    "Failed to create {}x{} frame buffer: {:?}", desc.width, desc.height, e))?
        };

        Ok(Self {
            framebuffer,
            desc: desc.clone(),
            clear_values,
        })
    }

    /// Clear values in native form, attachment order
    pub fn native_clear_values(&self) -> Vec<vk::ClearValue> {
        self.clear_values.iter().map(clear_value_to_vk).collect()
    }

    pub fn destroy(self, device: &ash::Device) {
        unsafe {
            device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}
