/// Buffer - native buffer plus its allocation

use ash::vk;
use asgi::gi::device::{BufferInfo, BufferUsageFlags};
use asgi::gi::memory::{AllocationRequest, MemoryAllocator, MemoryUsage};
use asgi::gi::Result;
use asgi::{gi_err, gi_error};

use crate::vulkan_format::buffer_usage_to_vk;
use crate::vulkan_memory::{VulkanAllocation, VulkanMemoryAllocator};

/// Vulkan buffer
pub(crate) struct Buffer {
    pub buffer: vk::Buffer,
    pub allocation: VulkanAllocation,
    pub info: BufferInfo,
}

impl Buffer {
    /// Create a buffer in memory of class `memory_usage`
    ///
    /// Device-only buffers can only be filled by transfers, so they always get
    /// `TRANSFER_DST`.
    pub fn new(
        device: &ash::Device,
        allocator: &mut VulkanMemoryAllocator,
        name: &str,
        size: u64,
        usage: BufferUsageFlags,
        memory_usage: MemoryUsage,
    ) -> Result<Self> {
        let mut native_usage = buffer_usage_to_vk(usage);
        if memory_usage == MemoryUsage::DeviceOnly {
            native_usage |= vk::BufferUsageFlags::TRANSFER_DST;
        }

        let create_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(native_usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        unsafe {
            let buffer = device
                .create_buffer(&create_info, None)
                .map_err(|e| gi_err!("asgi::vulkan", "Failed to create buffer of size {} bytes: {:?}", size, e))?;

            let requirements = device.get_buffer_memory_requirements(buffer);
            let allocation = match allocator.allocate(&AllocationRequest {
                name,
                usage: memory_usage,
                size: requirements.size,
                alignment: requirements.alignment,
                memory_type_bits: requirements.memory_type_bits,
                linear: true,
            }) {
                Ok(allocation) => allocation,
                Err(e) => {
                    device.destroy_buffer(buffer, None);
                    return Err(e);
                }
            };

            if let Err(e) = device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
                gi_error!("asgi::vulkan", "Failed to bind buffer memory: {:?}", e);
                if let Err(e) = allocator.free(allocation) {
                    gi_error!("asgi::vulkan", "Failed to free memory of unbound buffer: {}", e);
                }
                device.destroy_buffer(buffer, None);
                return Err(gi_err!("asgi::vulkan", "Failed to bind memory of buffer '{}'", name));
            }

            let info = BufferInfo {
                size,
                usage,
                memory: allocation.info,
            };
            Ok(Self { buffer, allocation, info })
        }
    }

    /// Destroy the buffer, then release its memory
    pub fn destroy(self, device: &ash::Device, allocator: &mut VulkanMemoryAllocator) -> Result<()> {
        unsafe {
            device.destroy_buffer(self.buffer, None);
        }
        allocator.free(self.allocation)
    }
}
