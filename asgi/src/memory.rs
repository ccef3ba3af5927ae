/// Memory usage classification and the allocator context
///
/// Every buffer and image owns exactly one allocation obtained from a
/// [`MemoryAllocator`]. The usage class is a pure function of the resource's
/// usage flags, so the same flags always land in the same kind of heap.

use crate::device::{BufferUsageFlags, ImageUsageFlags};
use crate::error::Result;

/// Memory usage class of an allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryUsage {
    /// Device-local, not mappable
    DeviceOnly,
    /// Host-visible and host-coherent (staging)
    CpuOnly,
    /// Host-visible, read by the device
    CpuToGpu,
    /// Host-visible and host-cached, written by the device
    GpuToCpu,
}

impl MemoryUsage {
    /// Classify buffer usage flags
    ///
    /// Transfer bits never affect the result.
    pub fn classify_buffer(usage: BufferUsageFlags) -> Self {
        let usage = usage - (BufferUsageFlags::TRANSFER_SRC | BufferUsageFlags::TRANSFER_DST);
        if usage == BufferUsageFlags::UPLOAD {
            MemoryUsage::CpuOnly
        } else if usage.contains(BufferUsageFlags::UPLOAD) {
            MemoryUsage::CpuToGpu
        } else if usage.contains(BufferUsageFlags::READBACK) {
            MemoryUsage::GpuToCpu
        } else {
            MemoryUsage::DeviceOnly
        }
    }

    /// Classify image usage flags, same rule as buffers
    pub fn classify_image(usage: ImageUsageFlags) -> Self {
        let usage = usage - (ImageUsageFlags::TRANSFER_SRC | ImageUsageFlags::TRANSFER_DST);
        if usage == ImageUsageFlags::UPLOAD {
            MemoryUsage::CpuOnly
        } else if usage.contains(ImageUsageFlags::UPLOAD) {
            MemoryUsage::CpuToGpu
        } else if usage.contains(ImageUsageFlags::READBACK) {
            MemoryUsage::GpuToCpu
        } else {
            MemoryUsage::DeviceOnly
        }
    }

    /// Whether memory of this class can be mapped by the host
    pub fn is_host_visible(&self) -> bool {
        !matches!(self, MemoryUsage::DeviceOnly)
    }
}

/// Parameters of one allocation
#[derive(Debug, Clone, Copy)]
pub struct AllocationRequest<'a> {
    /// Debug name
    pub name: &'a str,
    pub usage: MemoryUsage,
    /// Size in bytes
    pub size: u64,
    /// Required alignment in bytes
    pub alignment: u64,
    /// Acceptable memory types, as reported by the resource's requirements
    pub memory_type_bits: u32,
    /// Linear resource (buffers, linear-tiled images)
    pub linear: bool,
}

/// Description of an allocation backing a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryAllocation {
    pub usage: MemoryUsage,
    /// Index into the device memory types
    pub memory_type_index: u32,
    /// Offset inside the device memory block
    pub offset: u64,
    /// Size in bytes
    pub size: u64,
    pub host_visible: bool,
    pub host_coherent: bool,
}

/// Explicit allocator context
///
/// Created once by the backend and passed to every resource creation and
/// destruction. Must outlive every allocation it returned.
pub trait MemoryAllocator {
    /// Backend allocation type
    type Allocation;

    /// Allocate memory for a resource
    ///
    /// Fails with [`Error::OutOfMemory`](crate::error::Error::OutOfMemory) when no
    /// heap can satisfy the request. No retry, no eviction.
    fn allocate(&mut self, request: &AllocationRequest) -> Result<Self::Allocation>;

    /// Release an allocation
    fn free(&mut self, allocation: Self::Allocation) -> Result<()>;

    /// Number of allocations currently alive
    fn outstanding_allocations(&self) -> usize;
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
