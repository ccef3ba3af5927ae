/// Allocator context backed by gpu-allocator
///
/// Translates the abstract [`MemoryUsage`] classes into gpu-allocator
/// locations and keeps the count of live allocations. Host-visible memory
/// that is not coherent is flushed after writes and invalidated before reads.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc};
use gpu_allocator::{AllocationError, MemoryLocation};
use asgi::gi::memory::{AllocationRequest, MemoryAllocation, MemoryAllocator, MemoryUsage};
use asgi::gi::{Error, Result};
use asgi::{gi_err, gi_error, gi_trace, gi_warn};

use crate::vulkan_context::GpuContext;

/// gpu-allocator location serving a usage class
pub(crate) fn memory_location(usage: MemoryUsage) -> MemoryLocation {
    match usage {
        MemoryUsage::DeviceOnly => MemoryLocation::GpuOnly,
        MemoryUsage::CpuOnly | MemoryUsage::CpuToGpu => MemoryLocation::CpuToGpu,
        MemoryUsage::GpuToCpu => MemoryLocation::GpuToCpu,
    }
}

/// First memory type allowed by `type_bits` whose flags equal `properties`
pub(crate) fn find_memory_type_index(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    properties: vk::MemoryPropertyFlags,
) -> Option<u32> {
    let count = (memory_properties.memory_type_count as usize).min(memory_properties.memory_types.len());
    memory_properties.memory_types[..count]
        .iter()
        .enumerate()
        .find(|(i, memory_type)| type_bits & (1 << i) != 0 && memory_type.property_flags == properties)
        .map(|(i, _)| i as u32)
}

/// Memory type an allocation landed in
///
/// Falls back to the lowest type allowed by `type_bits`, with a warning, when
/// no type carries exactly `properties`.
pub(crate) fn resolve_memory_type_index(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    properties: vk::MemoryPropertyFlags,
) -> u32 {
    find_memory_type_index(memory_properties, type_bits, properties).unwrap_or_else(|| {
        let fallback = if type_bits == 0 { 0 } else { type_bits.trailing_zeros() };
        gi_warn!("asgi::vulkan",
            "No memory type in bits {:#b} has flags {:?}, reporting type {}", type_bits, properties, fallback);
        fallback
    })
}

/// `[offset, offset + len)` widened to whole non-coherent atoms
pub(crate) fn atom_aligned_range(offset: u64, len: u64, atom: u64) -> (u64, u64) {
    let atom = atom.max(1);
    let start = offset / atom * atom;
    let end = (offset + len).div_ceil(atom) * atom;
    (start, end - start)
}

/// Allocation plus the description handed to callers
pub(crate) struct VulkanAllocation {
    pub allocation: Allocation,
    pub info: MemoryAllocation,
}

impl VulkanAllocation {
    pub fn memory(&self) -> vk::DeviceMemory {
        // SAFETY: the memory block outlives the allocation
        unsafe { self.allocation.memory() }
    }

    pub fn offset(&self) -> u64 {
        self.allocation.offset()
    }
}

pub(crate) struct VulkanMemoryAllocator {
    /// `None` once shut down
    allocator: Option<Allocator>,
    device: ash::Device,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    non_coherent_atom_size: u64,
    outstanding: usize,
}

impl VulkanMemoryAllocator {
    pub fn new(context: &GpuContext) -> Result<Self> {
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: context.instance.clone(),
            device: context.device.clone(),
            physical_device: context.physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .map_err(|e| {
            gi_error!("asgi::vulkan", "Failed to create GPU allocator: {:?}", e);
            Error::InitializationFailed(format!("Failed to create allocator: {:?}", e))
        })?;

        Ok(Self {
            allocator: Some(allocator),
            device: context.device.clone(),
            memory_properties: context.memory_properties,
            non_coherent_atom_size: context.non_coherent_atom_size,
            outstanding: 0,
        })
    }

    /// Release every memory block; must run before the device is destroyed
    pub fn shutdown(&mut self) {
        if self.outstanding > 0 {
            gi_error!("asgi::vulkan", "Allocator shut down with {} live allocation(s)", self.outstanding);
        }
        self.allocator = None;
    }

    fn allocator(&mut self) -> Result<&mut Allocator> {
        self.allocator
            .as_mut()
            .ok_or_else(|| Error::BackendError("allocator already shut down".to_string()))
    }

    /// Copy `data` into the mapping at `offset`, flushing when not host-coherent
    pub fn write_mapped(&self, allocation: &mut VulkanAllocation, offset: u64, data: &[u8]) -> Result<()> {
        let memory = allocation.memory();
        let base = allocation.offset();
        let size = allocation.info.size;
        let coherent = allocation.info.host_coherent;

        let mapped = allocation
            .allocation
            .mapped_slice_mut()
            .ok_or_else(|| gi_err!("asgi::vulkan", "Allocation is not host-mapped"))?;
        let start = offset as usize;
        let end = start + data.len();
        if end > mapped.len() {
            return Err(gi_err!("asgi::vulkan",
                "Mapped write {}..{} beyond allocation of {} bytes", start, end, mapped.len()));
        }
        mapped[start..end].copy_from_slice(data);

        if !coherent {
            let range = self.mapped_range(memory, base, size, offset, data.len() as u64);
            unsafe {
                self.device
                    .flush_mapped_memory_ranges(&[range])
                    .map_err(|e| gi_err!("asgi::vulkan", "Failed to flush mapped memory: {:?}", e))?;
            }
        }
        Ok(())
    }

    /// Copy `len` bytes out of the mapping at `offset`, invalidating first when not host-coherent
    pub fn read_mapped(&self, allocation: &VulkanAllocation, offset: u64, len: u64) -> Result<Vec<u8>> {
        if !allocation.info.host_coherent {
            let range = self.mapped_range(allocation.memory(), allocation.offset(), allocation.info.size, offset, len);
            unsafe {
                self.device
                    .invalidate_mapped_memory_ranges(&[range])
                    .map_err(|e| gi_err!("asgi::vulkan", "Failed to invalidate mapped memory: {:?}", e))?;
            }
        }

        let mapped = allocation
            .allocation
            .mapped_slice()
            .ok_or_else(|| gi_err!("asgi::vulkan", "Allocation is not host-mapped"))?;
        let start = offset as usize;
        let end = start + len as usize;
        mapped
            .get(start..end)
            .map(|bytes| bytes.to_vec())
            .ok_or_else(|| gi_err!("asgi::vulkan",
                "Mapped read {}..{} beyond allocation of {} bytes", start, end, mapped.len()))
    }

    fn mapped_range(
        &self,
        memory: vk::DeviceMemory,
        base: u64,
        allocation_size: u64,
        offset: u64,
        len: u64,
    ) -> vk::MappedMemoryRange<'static> {
        let (start, size) = atom_aligned_range(base + offset, len, self.non_coherent_atom_size);
        // Never past the end of the allocation's atoms
        let limit = atom_aligned_range(base, allocation_size, self.non_coherent_atom_size);
        let size = size.min(limit.0 + limit.1 - start);
        vk::MappedMemoryRange::default()
            .memory(memory)
            .offset(start)
            .size(size)
    }
}

impl MemoryAllocator for VulkanMemoryAllocator {
    type Allocation = VulkanAllocation;

    fn allocate(&mut self, request: &AllocationRequest) -> Result<VulkanAllocation> {
        let requirements = vk::MemoryRequirements {
            size: request.size,
            alignment: request.alignment.max(1),
            memory_type_bits: request.memory_type_bits,
        };

        let allocation = self
            .allocator()?
            .allocate(&AllocationCreateDesc {
                name: request.name,
                requirements,
                location: memory_location(request.usage),
                linear: request.linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| match e {
                AllocationError::OutOfMemory => {
                    let size_mb = request.size as f64 / (1024.0 * 1024.0);
                    gi_error!("asgi::vulkan",
                        "Out of GPU memory for '{}' (required: {:.2} MB)", request.name, size_mb);
                    Error::OutOfMemory
                }
                other => gi_err!("asgi::vulkan", "Failed to allocate '{}': {:?}", request.name, other),
            })?;

        let properties = allocation.memory_properties();
        let memory_type_index =
            resolve_memory_type_index(&self.memory_properties, request.memory_type_bits, properties);

        let info = MemoryAllocation {
            usage: request.usage,
            memory_type_index,
            offset: allocation.offset(),
            size: allocation.size(),
            host_visible: properties.contains(vk::MemoryPropertyFlags::HOST_VISIBLE),
            host_coherent: properties.contains(vk::MemoryPropertyFlags::HOST_COHERENT),
        };

        self.outstanding += 1;
        gi_trace!("asgi::vulkan", "Allocated {} bytes for '{}' ({:?}, type {})",
            info.size, request.name, request.usage, memory_type_index);
        Ok(VulkanAllocation { allocation, info })
    }

    fn free(&mut self, allocation: VulkanAllocation) -> Result<()> {
        self.allocator()?
            .free(allocation.allocation)
            .map_err(|e| gi_err!("asgi::vulkan", "Failed to free allocation: {:?}", e))?;
        self.outstanding = self.outstanding.saturating_sub(1);
        Ok(())
    }

    fn outstanding_allocations(&self) -> usize {
        self.outstanding
    }
}

#[cfg(test)]
#[path = "vulkan_memory_tests.rs"]
mod tests;
