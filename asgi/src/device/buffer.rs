/// Buffer descriptors

use bitflags::bitflags;
use crate::memory::MemoryAllocation;

bitflags! {
    /// Buffer usage flags
    ///
    /// The native usage bits plus two abstract bits selecting host-visible
    /// memory: `UPLOAD` (written by the CPU) and `READBACK` (read by the CPU).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsageFlags: u32 {
        const TRANSFER_SRC = 1 << 0;
        const TRANSFER_DST = 1 << 1;
        const UNIFORM_TEXEL = 1 << 2;
        const STORAGE_TEXEL = 1 << 3;
        const UNIFORM = 1 << 4;
        const STORAGE = 1 << 5;
        const INDEX = 1 << 6;
        const VERTEX = 1 << 7;
        const INDIRECT = 1 << 8;
        const UPLOAD = 1 << 16;
        const READBACK = 1 << 17;
    }
}

/// Buffer state as seen by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferInfo {
    /// Size in bytes
    pub size: u64,
    pub usage: BufferUsageFlags,
    /// Backing allocation
    pub memory: MemoryAllocation,
}

impl BufferInfo {
    /// Check that `len` bytes at `offset` fit in the buffer
    pub fn contains_range(&self, offset: u64, len: u64) -> bool {
        offset
            .checked_add(len)
            .map(|end| end <= self.size)
            .unwrap_or(false)
    }
}
