/// Format, usage and aspect conversions between ASGI and Vulkan

use ash::vk;
use asgi::gi::device::{BufferUsageFlags, Format, ImageAspectFlags, ImageUsageFlags, SampleCount};

macro_rules! format_table {
    ($($name:ident),* $(,)?) => {
        /// Vulkan format of `format`
        pub(crate) fn format_to_vk(format: Format) -> vk::Format {
            match format {
                Format::Undefined => vk::Format::UNDEFINED,
                $(Format::$name => vk::Format::$name,)*
            }
        }

        /// ASGI format of a Vulkan format, `None` when the table has no entry
        pub(crate) fn format_from_vk(format: vk::Format) -> Option<Format> {
            match format {
                vk::Format::UNDEFINED => Some(Format::Undefined),
                $(vk::Format::$name => Some(Format::$name),)*
                _ => None,
            }
        }
    };
}

format_table!(
    R32G32B32A32_SFLOAT, R32G32B32A32_SINT, R32G32B32A32_UINT,
    R32G32B32_SFLOAT, R32G32B32_SINT, R32G32B32_UINT,
    R32G32_SFLOAT, R32G32_SINT, R32G32_UINT,
    R16G16B16A16_SFLOAT, R16G16B16A16_SINT, R16G16B16A16_SNORM, R16G16B16A16_SSCALED,
    R16G16B16A16_UINT, R16G16B16A16_UNORM, R16G16B16A16_USCALED,
    R32_SFLOAT, R32_SINT, R32_UINT,
    R16G16_SFLOAT, R16G16_SINT, R16G16_SNORM, R16G16_SSCALED,
    R16G16_UINT, R16G16_UNORM, R16G16_USCALED,
    R8G8B8A8_SINT, R8G8B8A8_SNORM, R8G8B8A8_SRGB, R8G8B8A8_SSCALED,
    R8G8B8A8_UINT, R8G8B8A8_UNORM, R8G8B8A8_USCALED,
    B8G8R8A8_SINT, B8G8R8A8_SNORM, B8G8R8A8_SRGB, B8G8R8A8_SSCALED,
    B8G8R8A8_UINT, B8G8R8A8_UNORM, B8G8R8A8_USCALED,
    R8G8B8_SINT, R8G8B8_SNORM, R8G8B8_SRGB, R8G8B8_SSCALED,
    R8G8B8_UINT, R8G8B8_UNORM, R8G8B8_USCALED,
    B8G8R8_SINT, B8G8R8_SNORM, B8G8R8_SRGB, B8G8R8_SSCALED,
    B8G8R8_UINT, B8G8R8_UNORM, B8G8R8_USCALED,
    R16_SFLOAT, R16_SINT, R16_SNORM, R16_SSCALED, R16_UINT, R16_UNORM, R16_USCALED,
    R8G8_SINT, R8G8_SNORM, R8G8_SRGB, R8G8_SSCALED, R8G8_UINT, R8G8_UNORM, R8G8_USCALED,
    R8_SINT, R8_SNORM, R8_SRGB, R8_SSCALED, R8_UINT, R8_UNORM, R8_USCALED,
    D16_UNORM, X8_D24_UNORM_PACK32, D32_SFLOAT, S8_UINT,
    D16_UNORM_S8_UINT, D24_UNORM_S8_UINT, D32_SFLOAT_S8_UINT,
);

/// Native buffer usage; the abstract `UPLOAD`/`READBACK` bits are dropped
pub(crate) fn buffer_usage_to_vk(usage: BufferUsageFlags) -> vk::BufferUsageFlags {
    let pairs = [
        (BufferUsageFlags::TRANSFER_SRC, vk::BufferUsageFlags::TRANSFER_SRC),
        (BufferUsageFlags::TRANSFER_DST, vk::BufferUsageFlags::TRANSFER_DST),
        (BufferUsageFlags::UNIFORM_TEXEL, vk::BufferUsageFlags::UNIFORM_TEXEL_BUFFER),
        (BufferUsageFlags::STORAGE_TEXEL, vk::BufferUsageFlags::STORAGE_TEXEL_BUFFER),
        (BufferUsageFlags::UNIFORM, vk::BufferUsageFlags::UNIFORM_BUFFER),
        (BufferUsageFlags::STORAGE, vk::BufferUsageFlags::STORAGE_BUFFER),
        (BufferUsageFlags::INDEX, vk::BufferUsageFlags::INDEX_BUFFER),
        (BufferUsageFlags::VERTEX, vk::BufferUsageFlags::VERTEX_BUFFER),
        (BufferUsageFlags::INDIRECT, vk::BufferUsageFlags::INDIRECT_BUFFER),
    ];
    pairs
        .iter()
        .filter(|(flag, _)| usage.contains(*flag))
        .fold(vk::BufferUsageFlags::empty(), |acc, (_, native)| acc | *native)
}

/// Native image usage; the abstract `UPLOAD`/`READBACK` bits are dropped
pub(crate) fn image_usage_to_vk(usage: ImageUsageFlags) -> vk::ImageUsageFlags {
    let pairs = [
        (ImageUsageFlags::TRANSFER_SRC, vk::ImageUsageFlags::TRANSFER_SRC),
        (ImageUsageFlags::TRANSFER_DST, vk::ImageUsageFlags::TRANSFER_DST),
        (ImageUsageFlags::SAMPLED, vk::ImageUsageFlags::SAMPLED),
        (ImageUsageFlags::STORAGE, vk::ImageUsageFlags::STORAGE),
        (ImageUsageFlags::COLOR_ATTACHMENT, vk::ImageUsageFlags::COLOR_ATTACHMENT),
        (ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT, vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT),
        (ImageUsageFlags::TRANSIENT_ATTACHMENT, vk::ImageUsageFlags::TRANSIENT_ATTACHMENT),
        (ImageUsageFlags::INPUT_ATTACHMENT, vk::ImageUsageFlags::INPUT_ATTACHMENT),
    ];
    pairs
        .iter()
        .filter(|(flag, _)| usage.contains(*flag))
        .fold(vk::ImageUsageFlags::empty(), |acc, (_, native)| acc | *native)
}

pub(crate) fn aspect_to_vk(aspect: ImageAspectFlags) -> vk::ImageAspectFlags {
    let mut flags = vk::ImageAspectFlags::empty();
    if aspect.contains(ImageAspectFlags::COLOR) {
        flags |= vk::ImageAspectFlags::COLOR;
    }
    if aspect.contains(ImageAspectFlags::DEPTH) {
        flags |= vk::ImageAspectFlags::DEPTH;
    }
    if aspect.contains(ImageAspectFlags::STENCIL) {
        flags |= vk::ImageAspectFlags::STENCIL;
    }
    flags
}

pub(crate) fn sample_count_to_vk(samples: SampleCount) -> vk::SampleCountFlags {
    match samples {
        SampleCount::S1 => vk::SampleCountFlags::TYPE_1,
        SampleCount::S2 => vk::SampleCountFlags::TYPE_2,
        SampleCount::S4 => vk::SampleCountFlags::TYPE_4,
        SampleCount::S8 => vk::SampleCountFlags::TYPE_8,
        SampleCount::S16 => vk::SampleCountFlags::TYPE_16,
    }
}

#[cfg(test)]
#[path = "vulkan_format_tests.rs"]
mod tests;
