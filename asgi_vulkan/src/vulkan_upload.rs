/// Upload path - staging buffers and the one-shot transfer command buffer
///
/// The upload engine of the core drives these primitives; every submission
/// is fenced and waited on before returning.

use ash::vk;
use asgi::gi::device::{BufferHandle, BufferInfo, BufferUsageFlags, ImageAspectFlags, ImageHandle, ImageInfo, ImageRegion};
use asgi::gi::memory::MemoryUsage;
use asgi::gi::upload::{ImageLayoutTracker, LayoutTransition, TransferDevice};
use asgi::gi::{Error, Result};
use asgi::{gi_err, gi_error, gi_warn_err};

use crate::vulkan::VulkanGi;
use crate::vulkan_buffer::Buffer;
use crate::vulkan_format::aspect_to_vk;
use crate::vulkan_state::{access_flags_to_vk, image_layout_to_vk, pipeline_stage_to_vk};

/// Command pool, command buffer and fence reused by every staged upload
pub(crate) struct UploadContext {
    pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    fence: vk::Fence,
    recording: bool,
}

/// CPU-only transfer source holding a copy of the uploaded bytes
pub struct StagingBuffer {
    buffer: Buffer,
}

impl UploadContext {
    pub fn new(device: &ash::Device, graphics_queue_family: u32) -> Result<Self> {
        unsafe {
            // TRANSIENT + RESET for reusable one-shot uploads
            let pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(graphics_queue_family)
                .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            let pool = device.create_command_pool(&pool_info, None).map_err(|e| {
                gi_error!("asgi::vulkan", "Failed to create upload command pool: {:?}", e);
                Error::InitializationFailed(format!("Failed to create upload command pool: {:?}", e))
            })?;

            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let command_buffer = match device.allocate_command_buffers(&allocate_info) {
                Ok(buffers) => buffers[0],
                Err(e) => {
                    device.destroy_command_pool(pool, None);
                    gi_error!("asgi::vulkan", "Failed to allocate upload command buffer: {:?}", e);
                    return Err(Error::InitializationFailed(format!("Failed to allocate upload command buffer: {:?}", e)));
                }
            };

            let fence = match device.create_fence(&vk::FenceCreateInfo::default(), None) {
                Ok(fence) => fence,
                Err(e) => {
                    device.destroy_command_pool(pool, None);
                    gi_error!("asgi::vulkan", "Failed to create upload fence: {:?}", e);
                    return Err(Error::InitializationFailed(format!("Failed to create upload fence: {:?}", e)));
                }
            };

            Ok(Self {
                pool,
                command_buffer,
                fence,
                recording: false,
            })
        }
    }

    fn recording_buffer(&self) -> Result<vk::CommandBuffer> {
        if self.recording {
            Ok(self.command_buffer)
        } else {
            Err(Error::BackendError("transfer not begun".to_string()))
        }
    }

    fn begin(&mut self, device: &ash::Device) -> Result<()> {
        if self.recording {
            return Err(Error::BackendError("transfer already recording".to_string()));
        }
        unsafe {
            device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| gi_err!("asgi::vulkan", "Failed to reset upload command buffer: {:?}", e))?;
            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(|e| gi_err!("asgi::vulkan", "Failed to begin upload command buffer: {:?}", e))?;
        }
        self.recording = true;
        Ok(())
    }

    /// End, submit, wait on the fence, then reset it
    fn submit(&mut self, device: &ash::Device, queue: vk::Queue) -> Result<()> {
        let command_buffer = self.recording_buffer()?;
        self.recording = false;
        unsafe {
            device
                .end_command_buffer(command_buffer)
                .map_err(|e| gi_err!("asgi::vulkan", "Failed to end upload command buffer: {:?}", e))?;

            let command_buffers = [command_buffer];
            let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
            device
                .queue_submit(queue, &[submit_info], self.fence)
                .map_err(|e| gi_err!("asgi::vulkan", "Failed to submit upload commands: {:?}", e))?;

            device
                .wait_for_fences(&[self.fence], true, u64::MAX)
                .map_err(|e| gi_err!("asgi::vulkan", "Failed to wait for upload completion: {:?}", e))?;
            device
                .reset_fences(&[self.fence])
                .map_err(|e| gi_err!("asgi::vulkan", "Failed to reset upload fence: {:?}", e))?;
        }
        Ok(())
    }

    fn abort(&mut self, device: &ash::Device) {
        if !self.recording {
            return;
        }
        self.recording = false;
        unsafe {
            if let Err(e) = device.reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty()) {
                gi_error!("asgi::vulkan", "Failed to reset aborted upload command buffer: {:?}", e);
            }
        }
    }

    pub fn destroy(&mut self, device: &ash::Device) {
        unsafe {
            device.destroy_fence(self.fence, None);
            device.destroy_command_pool(self.pool, None);
        }
    }
}

/// Single-aspect mask for copies; depth wins over stencil
fn copy_aspect(aspect: ImageAspectFlags) -> vk::ImageAspectFlags {
    if aspect.contains(ImageAspectFlags::DEPTH) {
        vk::ImageAspectFlags::DEPTH
    } else if aspect.contains(ImageAspectFlags::STENCIL) {
        vk::ImageAspectFlags::STENCIL
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

pub(crate) fn image_barrier(
    image: vk::Image,
    aspect: ImageAspectFlags,
    transition: &LayoutTransition,
) -> vk::ImageMemoryBarrier<'static> {
    vk::ImageMemoryBarrier::default()
        .src_access_mask(access_flags_to_vk(transition.from.access))
        .dst_access_mask(access_flags_to_vk(transition.to.access))
        .old_layout(image_layout_to_vk(transition.from.layout))
        .new_layout(image_layout_to_vk(transition.to.layout))
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: aspect_to_vk(aspect),
            base_mip_level: transition.level,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        })
}

pub(crate) fn buffer_image_copy(aspect: ImageAspectFlags, region: &ImageRegion) -> vk::BufferImageCopy {
    vk::BufferImageCopy {
        buffer_offset: 0,
        // Tightly packed
        buffer_row_length: 0,
        buffer_image_height: 0,
        image_subresource: vk::ImageSubresourceLayers {
            aspect_mask: copy_aspect(aspect),
            mip_level: region.level,
            base_array_layer: 0,
            layer_count: 1,
        },
        image_offset: vk::Offset3D {
            x: region.x as i32,
            y: region.y as i32,
            z: 0,
        },
        image_extent: vk::Extent3D {
            width: region.width,
            height: region.height,
            depth: 1,
        },
    }
}

impl TransferDevice for VulkanGi {
    type Staging = StagingBuffer;

    fn destination_buffer(&self, buffer: BufferHandle) -> Result<BufferInfo> {
        Ok(self.buffer(buffer)?.info)
    }

    fn write_buffer_mapped(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> Result<()> {
        let target = self
            .buffers
            .get_mut(buffer)
            .ok_or_else(|| Error::InvalidResource("stale buffer handle".to_string()))?;
        self.allocator.write_mapped(&mut target.allocation, offset, data)
    }

    fn create_staging(&mut self, data: &[u8]) -> Result<StagingBuffer> {
        let mut buffer = Buffer::new(
            &self.ctx.device,
            &mut self.allocator,
            "staging",
            data.len() as u64,
            BufferUsageFlags::UPLOAD | BufferUsageFlags::TRANSFER_SRC,
            MemoryUsage::CpuOnly,
        )?;
        if let Err(e) = self.allocator.write_mapped(&mut buffer.allocation, 0, data) {
            if let Err(destroy) = buffer.destroy(&self.ctx.device, &mut self.allocator) {
                gi_error!("asgi::vulkan", "Failed to destroy unwritten staging buffer: {}", destroy);
            }
            return Err(e);
        }
        Ok(StagingBuffer { buffer })
    }

    fn destroy_staging(&mut self, staging: StagingBuffer) {
        if let Err(e) = staging.buffer.destroy(&self.ctx.device, &mut self.allocator) {
            gi_error!("asgi::vulkan", "Failed to release staging buffer: {}", e);
        }
    }

    fn begin_transfer(&mut self) -> Result<()> {
        self.upload.begin(&self.ctx.device)
    }

    fn record_buffer_copy(&mut self, staging: &StagingBuffer, buffer: BufferHandle, offset: u64, size: u64) -> Result<()> {
        let command_buffer = self.upload.recording_buffer()?;
        let destination = self.buffer(buffer)?.buffer;
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: offset,
            size,
        };
        unsafe {
            self.ctx
                .device
                .cmd_copy_buffer(command_buffer, staging.buffer.buffer, destination, &[region]);
        }
        Ok(())
    }

    fn record_image_barrier(&mut self, image: ImageHandle, aspect: ImageAspectFlags, transition: &LayoutTransition) -> Result<()> {
        let command_buffer = self.upload.recording_buffer()?;
        let barrier = image_barrier(self.image(image)?.image, aspect, transition);
        unsafe {
            self.ctx.device.cmd_pipeline_barrier(
                command_buffer,
                pipeline_stage_to_vk(transition.from.stage),
                pipeline_stage_to_vk(transition.to.stage),
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
        Ok(())
    }

    fn record_image_copy(&mut self, staging: &StagingBuffer, image: ImageHandle, aspect: ImageAspectFlags, region: &ImageRegion) -> Result<()> {
        let command_buffer = self.upload.recording_buffer()?;
        let destination = self.image(image)?.image;
        let copy = buffer_image_copy(aspect, region);
        unsafe {
            self.ctx.device.cmd_copy_buffer_to_image(
                command_buffer,
                staging.buffer.buffer,
                destination,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[copy],
            );
        }
        Ok(())
    }

    fn submit_transfer(&mut self) -> Result<()> {
        self.upload.submit(&self.ctx.device, self.ctx.graphics_queue)
    }

    fn abort_transfer(&mut self) {
        self.upload.abort(&self.ctx.device);
    }

    fn destination_image(&self, image: ImageHandle) -> Result<ImageInfo> {
        let record = self.image(image)?;
        if record.allocation.is_none() {
            return Err(gi_warn_err!("asgi::vulkan", "Swapchain images cannot be upload destinations"));
        }
        Ok(record.info)
    }

    fn image_tracker(&self, image: ImageHandle) -> Result<&ImageLayoutTracker> {
        Ok(&self.image(image)?.tracker)
    }

    fn commit_image_tracker(&mut self, image: ImageHandle, tracker: ImageLayoutTracker) -> Result<()> {
        let record = self
            .images
            .get_mut(image)
            .ok_or_else(|| Error::InvalidResource("stale image handle".to_string()))?;
        record.tracker = tracker;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asgi::gi::upload::ImageLayoutState;

    #[test]
    fn test_first_upload_barrier_from_undefined() {
        let mut tracker = ImageLayoutTracker::new(3);
        let transition = tracker.prepare_transfer_write(2).unwrap();
        let barrier = image_barrier(vk::Image::null(), ImageAspectFlags::COLOR, &transition);
        assert_eq!(barrier.old_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(barrier.new_layout, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        assert_eq!(barrier.src_access_mask, vk::AccessFlags::empty());
        assert_eq!(barrier.dst_access_mask, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(barrier.subresource_range.base_mip_level, 2);
        assert_eq!(barrier.subresource_range.level_count, 1);
    }

    #[test]
    fn test_read_barrier_after_depth_upload() {
        let mut tracker = ImageLayoutTracker::new(1);
        let transition = tracker.finish_transfer_write(0, ImageAspectFlags::DEPTH);
        let barrier = image_barrier(vk::Image::null(), ImageAspectFlags::DEPTH, &transition);
        assert_eq!(barrier.old_layout, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        assert_eq!(barrier.new_layout, vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL);
        assert_eq!(barrier.subresource_range.aspect_mask, vk::ImageAspectFlags::DEPTH);
        assert_eq!(tracker.state(0), Some(ImageLayoutState::PixelDepthStencilRead));
    }

    #[test]
    fn test_copy_region_offsets_and_level() {
        let region = ImageRegion { level: 1, x: 4, y: 8, width: 16, height: 2 };
        let copy = buffer_image_copy(ImageAspectFlags::COLOR, &region);
        assert_eq!(copy.image_subresource.mip_level, 1);
        assert_eq!((copy.image_offset.x, copy.image_offset.y), (4, 8));
        assert_eq!((copy.image_extent.width, copy.image_extent.height, copy.image_extent.depth), (16, 2, 1));
        assert_eq!(copy.buffer_row_length, 0);
    }

    #[test]
    fn test_depth_stencil_copy_uses_depth_aspect() {
        let copy = buffer_image_copy(ImageAspectFlags::DEPTH | ImageAspectFlags::STENCIL, &ImageRegion::default());
        assert_eq!(copy.image_subresource.aspect_mask, vk::ImageAspectFlags::DEPTH);
    }
}
