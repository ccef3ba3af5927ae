/// Image and ImageView - native 2D images, their views and layout trackers

use ash::vk;
use asgi::gi::device::{image_aspect, Image2DDesc, ImageInfo, ImageUsageFlags, ImageViewHandle, ImageViewInfo};
use asgi::gi::memory::{AllocationRequest, MemoryAllocator, MemoryUsage};
use asgi::gi::upload::ImageLayoutTracker;
use asgi::gi::Result;
use asgi::{gi_err, gi_error};

use crate::vulkan_format::{aspect_to_vk, format_to_vk, image_usage_to_vk, sample_count_to_vk};
use crate::vulkan_memory::{VulkanAllocation, VulkanMemoryAllocator};

/// Vulkan 2D image
pub(crate) struct Image {
    pub image: vk::Image,
    /// `None` when the image belongs to a swapchain
    pub allocation: Option<VulkanAllocation>,
    pub info: ImageInfo,
    pub tracker: ImageLayoutTracker,
    pub origin_view: ImageViewHandle,
}

/// Vulkan image view
pub(crate) struct ImageView {
    pub view: vk::ImageView,
    pub info: ImageViewInfo,
}

/// Native usage of an image created with `usage`
///
/// Uploads go through transfer copies, so `TRANSFER_DST` is added to every
/// image that is not a transient attachment.
pub(crate) fn native_image_usage(usage: ImageUsageFlags) -> vk::ImageUsageFlags {
    let native = image_usage_to_vk(usage);
    if usage.contains(ImageUsageFlags::TRANSIENT_ATTACHMENT) {
        native
    } else {
        native | vk::ImageUsageFlags::TRANSFER_DST
    }
}

impl Image {
    /// Create an image with its memory; every mip level starts `Undefined`
    ///
    /// The origin view is created by the caller once the image has a handle.
    pub fn new(device: &ash::Device, allocator: &mut VulkanMemoryAllocator, desc: &Image2DDesc) -> Result<Self> {
        desc.validate()?;

        let create_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format_to_vk(desc.format))
            .extent(vk::Extent3D {
                width: desc.width,
                height: desc.height,
                depth: 1,
            })
            .mip_levels(desc.mip_levels)
            .array_layers(1)
            .samples(sample_count_to_vk(desc.samples))
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(native_image_usage(desc.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        unsafe {
            let image = device
                .create_image(&create_info, None)
                .map_err(|e| gi_err!("asgi::vulkan",
                    "Failed to create {}x{} {:?} image: {:?}", desc.width, desc.height, desc.format, e))?;

            let requirements = device.get_image_memory_requirements(image);
            let allocation = match allocator.allocate(&AllocationRequest {
                name: "image",
                usage: MemoryUsage::classify_image(desc.usage),
                size: requirements.size,
                alignment: requirements.alignment,
                memory_type_bits: requirements.memory_type_bits,
                linear: false,
            }) {
                Ok(allocation) => allocation,
                Err(e) => {
                    device.destroy_image(image, None);
                    return Err(e);
                }
            };

            if let Err(e) = device.bind_image_memory(image, allocation.memory(), allocation.offset()) {
                gi_error!("asgi::vulkan", "Failed to bind image memory: {:?}", e);
                if let Err(e) = allocator.free(allocation) {
                    gi_error!("asgi::vulkan", "Failed to free memory of unbound image: {}", e);
                }
                device.destroy_image(image, None);
                return Err(gi_err!("asgi::vulkan", "Failed to bind memory of {}x{} image", desc.width, desc.height));
            }

            let info = ImageInfo {
                width: desc.width,
                height: desc.height,
                format: desc.format,
                mip_levels: desc.mip_levels,
                samples: desc.samples,
                usage: desc.usage,
                aspect: image_aspect(desc.format, desc.usage),
                memory: Some(allocation.info),
            };

            Ok(Self {
                image,
                allocation: Some(allocation),
                info,
                tracker: ImageLayoutTracker::new(desc.mip_levels),
                origin_view: ImageViewHandle::default(),
            })
        }
    }

    /// Record for an image owned by a swapchain
    pub fn borrowed(image: vk::Image, info: ImageInfo) -> Self {
        Self {
            image,
            allocation: None,
            tracker: ImageLayoutTracker::new(info.mip_levels),
            info,
            origin_view: ImageViewHandle::default(),
        }
    }

    /// Destroy the image if it owns its memory; swapchain images are left alone
    pub fn destroy(self, device: &ash::Device, allocator: &mut VulkanMemoryAllocator) -> Result<()> {
        match self.allocation {
            Some(allocation) => {
                unsafe {
                    device.destroy_image(self.image, None);
                }
                allocator.free(allocation)
            }
            None => Ok(()),
        }
    }
}

impl ImageView {
    /// Create a 2D view of `image` described by `info`
    pub fn new(device: &ash::Device, image: vk::Image, info: ImageViewInfo) -> Result<Self> {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format_to_vk(info.format))
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect_to_vk(info.aspect),
                base_mip_level: info.base_mip,
                level_count: info.mip_count,
                base_array_layer: 0,
                layer_count: 1,
            });

        let view = unsafe {
            device
                .create_image_view(&create_info, None)
                .map_err(|e| gi_err!("asgi::vulkan", "Failed to create image view: {:?}", e))?
        };
        Ok(Self { view, info })
    }

    pub fn destroy(self, device: &ash::Device) {
        unsafe {
            device.destroy_image_view(self.view, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampled_image_gets_transfer_dst() {
        assert_eq!(
            native_image_usage(ImageUsageFlags::SAMPLED),
            vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST
        );
    }

    #[test]
    fn test_transient_attachment_stays_transient_only() {
        let usage = ImageUsageFlags::COLOR_ATTACHMENT | ImageUsageFlags::TRANSIENT_ATTACHMENT;
        assert_eq!(
            native_image_usage(usage),
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSIENT_ATTACHMENT
        );
    }
}
