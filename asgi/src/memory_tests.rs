use crate::device::{BufferUsageFlags, ImageUsageFlags};
use crate::memory::*;

#[test]
fn test_upload_only_is_cpu_only() {
    assert_eq!(MemoryUsage::classify_buffer(BufferUsageFlags::UPLOAD), MemoryUsage::CpuOnly);
    assert_eq!(MemoryUsage::classify_image(ImageUsageFlags::UPLOAD), MemoryUsage::CpuOnly);
}

#[test]
fn test_upload_with_other_bits_is_cpu_to_gpu() {
    assert_eq!(
        MemoryUsage::classify_buffer(BufferUsageFlags::UPLOAD | BufferUsageFlags::VERTEX),
        MemoryUsage::CpuToGpu
    );
    assert_eq!(
        MemoryUsage::classify_image(ImageUsageFlags::UPLOAD | ImageUsageFlags::SAMPLED),
        MemoryUsage::CpuToGpu
    );
}

#[test]
fn test_readback_is_gpu_to_cpu() {
    assert_eq!(MemoryUsage::classify_buffer(BufferUsageFlags::READBACK), MemoryUsage::GpuToCpu);
    assert_eq!(
        MemoryUsage::classify_buffer(BufferUsageFlags::READBACK | BufferUsageFlags::STORAGE),
        MemoryUsage::GpuToCpu
    );
}

#[test]
fn test_no_special_bits_is_device_only() {
    assert_eq!(MemoryUsage::classify_buffer(BufferUsageFlags::VERTEX), MemoryUsage::DeviceOnly);
    assert_eq!(MemoryUsage::classify_buffer(BufferUsageFlags::empty()), MemoryUsage::DeviceOnly);
    assert_eq!(
        MemoryUsage::classify_image(ImageUsageFlags::SAMPLED | ImageUsageFlags::COLOR_ATTACHMENT),
        MemoryUsage::DeviceOnly
    );
}

#[test]
fn test_transfer_bits_are_ignored() {
    let with_transfer = BufferUsageFlags::UPLOAD
        | BufferUsageFlags::TRANSFER_SRC
        | BufferUsageFlags::TRANSFER_DST;
    assert_eq!(MemoryUsage::classify_buffer(with_transfer), MemoryUsage::CpuOnly);

    let image = ImageUsageFlags::UPLOAD | ImageUsageFlags::TRANSFER_DST;
    assert_eq!(MemoryUsage::classify_image(image), MemoryUsage::CpuOnly);
}

#[test]
fn test_upload_wins_over_readback() {
    assert_eq!(
        MemoryUsage::classify_buffer(BufferUsageFlags::UPLOAD | BufferUsageFlags::READBACK),
        MemoryUsage::CpuToGpu
    );
}

#[test]
fn test_host_visibility() {
    assert!(!MemoryUsage::DeviceOnly.is_host_visible());
    assert!(MemoryUsage::CpuOnly.is_host_visible());
    assert!(MemoryUsage::CpuToGpu.is_host_visible());
    assert!(MemoryUsage::GpuToCpu.is_host_visible());
}
