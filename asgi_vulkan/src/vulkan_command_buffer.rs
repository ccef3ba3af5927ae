/// CommandBuffer - primary command buffer with its own pool
///
/// Handles are resolved to native objects by the backend; this type only
/// tracks the recording state and emits the commands.

use ash::vk;
use asgi::gi::device::{IndexType, Rect2D, Viewport};
use asgi::gi::Result;
use asgi::{gi_bail_warn, gi_err};

use crate::vulkan_state::index_type_to_vk;

pub(crate) struct CommandBuffer {
    pool: vk::CommandPool,
    pub command_buffer: vk::CommandBuffer,
    is_recording: bool,
    in_render_pass: bool,
    /// Recorded and ended, ready for submission
    pub executable: bool,
}

impl CommandBuffer {
    pub fn new(device: &ash::Device, graphics_queue_family: u32) -> Result<Self> {
        unsafe {
            let pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(graphics_queue_family)
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            let pool = device
                .create_command_pool(&pool_info, None)
                .map_err(|e| gi_err!("asgi::vulkan", "Failed to create command pool: {:?}", e))?;

            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let command_buffer = match device.allocate_command_buffers(&allocate_info) {
                Ok(buffers) => buffers[0],
                Err(e) => {
                    device.destroy_command_pool(pool, None);
                    return Err(gi_err!("asgi::vulkan", "Failed to allocate command buffer: {:?}", e));
                }
            };

            Ok(Self {
                pool,
                command_buffer,
                is_recording: false,
                in_render_pass: false,
                executable: false,
            })
        }
    }

    fn require_recording(&self) -> Result<()> {
        if !self.is_recording {
            gi_bail_warn!("asgi::vulkan", "Command buffer is not recording");
        }
        Ok(())
    }

    fn require_render_pass(&self) -> Result<()> {
        self.require_recording()?;
        if !self.in_render_pass {
            gi_bail_warn!("asgi::vulkan", "Command requires an active render pass");
        }
        Ok(())
    }

    /// Reset and start a one-time-submit recording
    pub fn begin(&mut self, device: &ash::Device) -> Result<()> {
        if self.is_recording {
            gi_bail_warn!("asgi::vulkan", "Command buffer already recording");
        }
        unsafe {
            device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| gi_err!("asgi::vulkan", "Failed to reset command buffer: {:?}", e))?;
            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(|e| gi_err!("asgi::vulkan", "Failed to begin command buffer: {:?}", e))?;
        }
        self.is_recording = true;
        self.in_render_pass = false;
        self.executable = false;
        Ok(())
    }

    pub fn end(&mut self, device: &ash::Device) -> Result<()> {
        self.require_recording()?;
        if self.in_render_pass {
            gi_bail_warn!("asgi::vulkan", "Render pass not ended before ending command buffer");
        }
        unsafe {
            device
                .end_command_buffer(self.command_buffer)
                .map_err(|e| gi_err!("asgi::vulkan", "Failed to end command buffer: {:?}", e))?;
        }
        self.is_recording = false;
        self.executable = true;
        Ok(())
    }

    pub fn begin_render_pass(
        &mut self,
        device: &ash::Device,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_values: &[vk::ClearValue],
    ) -> Result<()> {
        self.require_recording()?;
        if self.in_render_pass {
            gi_bail_warn!("asgi::vulkan", "Already inside a render pass");
        }
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(clear_values);
        unsafe {
            device.cmd_begin_render_pass(self.command_buffer, &begin_info, vk::SubpassContents::INLINE);
        }
        self.in_render_pass = true;
        Ok(())
    }

    pub fn end_render_pass(&mut self, device: &ash::Device) -> Result<()> {
        self.require_render_pass()?;
        unsafe {
            device.cmd_end_render_pass(self.command_buffer);
        }
        self.in_render_pass = false;
        Ok(())
    }

    pub fn bind_pipeline(&mut self, device: &ash::Device, pipeline: vk::Pipeline) -> Result<()> {
        self.require_recording()?;
        unsafe {
            device.cmd_bind_pipeline(self.command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline);
        }
        Ok(())
    }

    pub fn set_viewport(&mut self, device: &ash::Device, first: u32, viewports: &[Viewport]) -> Result<()> {
        self.require_recording()?;
        let native: Vec<vk::Viewport> = viewports
            .iter()
            .map(|v| vk::Viewport {
                x: v.x,
                y: v.y,
                width: v.width,
                height: v.height,
                min_depth: v.min_depth,
                max_depth: v.max_depth,
            })
            .collect();
        unsafe {
            device.cmd_set_viewport(self.command_buffer, first, &native);
        }
        Ok(())
    }

    pub fn set_scissor(&mut self, device: &ash::Device, first: u32, scissors: &[Rect2D]) -> Result<()> {
        self.require_recording()?;
        let native: Vec<vk::Rect2D> = scissors
            .iter()
            .map(|r| vk::Rect2D {
                offset: vk::Offset2D { x: r.x, y: r.y },
                extent: vk::Extent2D { width: r.width, height: r.height },
            })
            .collect();
        unsafe {
            device.cmd_set_scissor(self.command_buffer, first, &native);
        }
        Ok(())
    }

    pub fn set_line_width(&mut self, device: &ash::Device, width: f32) -> Result<()> {
        self.require_recording()?;
        unsafe {
            device.cmd_set_line_width(self.command_buffer, width);
        }
        Ok(())
    }

    pub fn bind_vertex_buffer(&mut self, device: &ash::Device, binding: u32, buffer: vk::Buffer, offset: u64) -> Result<()> {
        self.require_recording()?;
        unsafe {
            device.cmd_bind_vertex_buffers(self.command_buffer, binding, &[buffer], &[offset]);
        }
        Ok(())
    }

    pub fn bind_index_buffer(
        &mut self,
        device: &ash::Device,
        buffer: vk::Buffer,
        offset: u64,
        index_type: IndexType,
    ) -> Result<()> {
        self.require_recording()?;
        unsafe {
            device.cmd_bind_index_buffer(self.command_buffer, buffer, offset, index_type_to_vk(index_type));
        }
        Ok(())
    }

    pub fn draw(
        &mut self,
        device: &ash::Device,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> Result<()> {
        self.require_render_pass()?;
        unsafe {
            device.cmd_draw(self.command_buffer, vertex_count, instance_count, first_vertex, first_instance);
        }
        Ok(())
    }

    pub fn draw_indexed(
        &mut self,
        device: &ash::Device,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()> {
        self.require_render_pass()?;
        unsafe {
            device.cmd_draw_indexed(
                self.command_buffer,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            );
        }
        Ok(())
    }

    /// Free the command buffer with its pool
    pub fn destroy(self, device: &ash::Device) {
        unsafe {
            device.destroy_command_pool(self.pool, None);
        }
    }
}

/// Fence of the last queue submission
///
/// Only a submission the queue accepted is waited on: after a rejected
/// submit nothing is in flight and the fence is never waited on.
pub(crate) struct SubmitFence {
    pub fence: vk::Fence,
    in_flight: bool,
}

impl SubmitFence {
    pub fn new(device: &ash::Device) -> Result<Self> {
        let fence = unsafe {
            device
                .create_fence(&vk::FenceCreateInfo::default(), None)
                .map_err(|e| gi_err!("asgi::vulkan", "Failed to create submit fence: {:?}", e))?
        };
        Ok(Self::from_fence(fence))
    }

    pub(crate) fn from_fence(fence: vk::Fence) -> Self {
        Self { fence, in_flight: false }
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Block until the last accepted submission completed
    pub fn wait(&mut self, device: &ash::Device) -> Result<()> {
        if !self.in_flight {
            return Ok(());
        }
        unsafe {
            device
                .wait_for_fences(&[self.fence], true, u64::MAX)
                .map_err(|e| gi_err!("asgi::vulkan", "Failed to wait for submit fence: {:?}", e))?;
        }
        self.in_flight = false;
        Ok(())
    }

    /// Unsignal the fence before handing it to the next submission
    pub fn reset(&mut self, device: &ash::Device) -> Result<vk::Fence> {
        self.wait(device)?;
        unsafe {
            device
                .reset_fences(&[self.fence])
                .map_err(|e| gi_err!("asgi::vulkan", "Failed to reset submit fence: {:?}", e))?;
        }
        Ok(self.fence)
    }

    /// The queue accepted a submission signaling the fence
    pub fn submitted(&mut self) {
        self.in_flight = true;
    }

    pub fn destroy(&mut self, device: &ash::Device) {
        unsafe {
            device.destroy_fence(self.fence, None);
        }
        self.fence = vk::Fence::null();
        self.in_flight = false;
    }
}

#[cfg(test)]
#[path = "vulkan_command_buffer_tests.rs"]
mod tests;
