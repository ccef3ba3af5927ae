/// Swapchain - surface, presentable images and their synchronization
///
/// The color images are registered by the backend as image records so they
/// get layout trackers and origin views like any other image.

use ash::vk;
use asgi::gi::device::{Format, ImageHandle, SwapchainDesc, SwapchainInfo};
use asgi::gi::{Error, Result};
use asgi::{gi_bail_warn, gi_debug, gi_err, gi_error, gi_info};

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{format_from_vk, format_to_vk};

/// Vulkan swapchain
pub(crate) struct Swapchain {
    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
    pub swapchain: vk::SwapchainKHR,
    pub loader: ash::khr::swapchain::Device,
    pub format: Format,
    pub extent: vk::Extent2D,
    pub native_images: Vec<vk::Image>,
    /// Image records of the color attachments, filled by the backend
    pub color_images: Vec<ImageHandle>,
    /// Depth image per color attachment, empty without a depth format
    pub depth_images: Vec<ImageHandle>,
    pub depth_format: Option<Format>,
    /// Signaled by acquire, waited on by the next submission
    pub image_available: vk::Semaphore,
    /// One per image, signaled by the submission and waited on by present
    pub render_finished: Vec<vk::Semaphore>,
    pub frame: FrameState,
}

/// Acquire / submit / present progress of the current attachment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct FrameState {
    pub current: Option<u32>,
    /// `image_available` signaled but not yet consumed by a submission
    pub acquire_pending: bool,
    /// A submission signaled `render_finished[current]`
    pub render_pending: bool,
}

impl FrameState {
    /// An attachment is acquired and no submission waited on it yet
    pub fn ready_for_submit(&self) -> bool {
        self.current.is_some() && self.acquire_pending
    }

    pub fn acquired(&mut self, index: u32) {
        self.current = Some(index);
        self.acquire_pending = true;
        self.render_pending = false;
    }

    /// Hand the acquired attachment to a submission
    pub fn take_for_submit(&mut self) -> Option<u32> {
        if !self.ready_for_submit() {
            return None;
        }
        self.acquire_pending = false;
        self.render_pending = true;
        self.current
    }

    /// Undo `take_for_submit` after the queue rejected the submission
    pub fn restore_submit(&mut self) {
        if self.current.is_some() && self.render_pending {
            self.acquire_pending = true;
            self.render_pending = false;
        }
    }

    pub fn presented(&mut self) {
        self.current = None;
        self.render_pending = false;
    }
}

// ===== SURFACE NEGOTIATION =====

/// `preferred` when the surface offers it, else the first format the format table knows
pub(crate) fn choose_surface_format(
    available: &[vk::SurfaceFormatKHR],
    preferred: Option<Format>,
) -> Option<vk::SurfaceFormatKHR> {
    preferred
        .map(format_to_vk)
        .and_then(|wanted| available.iter().find(|f| f.format == wanted))
        .or_else(|| available.iter().find(|f| format_from_vk(f.format).is_some()))
        .copied()
}

/// Surface-imposed extent, or the requested one clamped to the surface limits
pub(crate) fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, width: u32, height: u32) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: width.clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
        height: height.clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
    }
}

/// FIFO with vsync; otherwise mailbox, then immediate, then FIFO
pub(crate) fn choose_present_mode(available: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if vsync {
        return vk::PresentModeKHR::FIFO;
    }
    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
        .into_iter()
        .find(|mode| available.contains(mode))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Triple buffering when the surface allows it, double buffering otherwise
pub(crate) fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let wanted = if capabilities.max_image_count == 0 || capabilities.max_image_count > 2 {
        3
    } else {
        2
    };
    let wanted = wanted.max(capabilities.min_image_count);
    if capabilities.max_image_count == 0 {
        wanted
    } else {
        wanted.min(capabilities.max_image_count)
    }
}

pub(crate) fn choose_composite_alpha(capabilities: &vk::SurfaceCapabilitiesKHR) -> vk::CompositeAlphaFlagsKHR {
    [
        vk::CompositeAlphaFlagsKHR::OPAQUE,
        vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::INHERIT,
    ]
    .into_iter()
    .find(|flag| capabilities.supported_composite_alpha.contains(*flag))
    .unwrap_or(vk::CompositeAlphaFlagsKHR::OPAQUE)
}

fn surface_error(what: &str, e: vk::Result) -> Error {
    gi_error!("asgi::vulkan", "Failed to {}: {:?}", what, e);
    Error::InitializationFailed(format!("Failed to {}: {:?}", what, e))
}

impl Swapchain {
    /// Create the surface, the swapchain and its semaphores
    pub fn new(ctx: &GpuContext, desc: &SwapchainDesc) -> Result<Self> {
        if !ctx.presentation_enabled {
            return Err(Error::Unsupported(
                "swapchain requires a context created with a display handle".to_string(),
            ));
        }

        let surface_loader = ash::khr::surface::Instance::new(&ctx.entry, &ctx.instance);
        let surface = unsafe {
            ash_window::create_surface(&ctx.entry, &ctx.instance, desc.display, desc.window, None)
                .map_err(|e| surface_error("create window surface", e))?
        };

        Self::create_on_surface(ctx, desc, surface, &surface_loader).map_err(|e| {
            unsafe {
                surface_loader.destroy_surface(surface, None);
            }
            e
        })
    }

    fn create_on_surface(
        ctx: &GpuContext,
        desc: &SwapchainDesc,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> Result<Self> {
        unsafe {
            let supported = surface_loader
                .get_physical_device_surface_support(ctx.physical_device, ctx.graphics_queue_family, surface)
                .map_err(|e| surface_error("query surface support", e))?;
            if !supported {
                return Err(Error::Unsupported("graphics queue cannot present to this surface".to_string()));
            }

            let capabilities = surface_loader
                .get_physical_device_surface_capabilities(ctx.physical_device, surface)
                .map_err(|e| surface_error("get surface capabilities", e))?;
            let formats = surface_loader
                .get_physical_device_surface_formats(ctx.physical_device, surface)
                .map_err(|e| surface_error("get surface formats", e))?;
            let present_modes = surface_loader
                .get_physical_device_surface_present_modes(ctx.physical_device, surface)
                .map_err(|e| surface_error("get present modes", e))?;

            let surface_format = choose_surface_format(&formats, desc.preferred_format)
                .ok_or_else(|| Error::Unsupported("surface offers no known format".to_string()))?;
            let format = format_from_vk(surface_format.format)
                .ok_or_else(|| Error::Unsupported(format!("surface format {:?}", surface_format.format)))?;
            let extent = choose_extent(&capabilities, desc.width, desc.height);
            let present_mode = choose_present_mode(&present_modes, desc.vsync);

            let mut usage = vk::ImageUsageFlags::COLOR_ATTACHMENT;
            for extra in [vk::ImageUsageFlags::TRANSFER_SRC, vk::ImageUsageFlags::TRANSFER_DST] {
                if capabilities.supported_usage_flags.contains(extra) {
                    usage |= extra;
                }
            }

            let create_info = vk::SwapchainCreateInfoKHR::default()
                .surface(surface)
                .min_image_count(choose_image_count(&capabilities))
                .image_format(surface_format.format)
                .image_color_space(surface_format.color_space)
                .image_extent(extent)
                .image_array_layers(1)
                .image_usage(usage)
                .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
                .pre_transform(capabilities.current_transform)
                .composite_alpha(choose_composite_alpha(&capabilities))
                .present_mode(present_mode)
                .clipped(true);

            let loader = ash::khr::swapchain::Device::new(&ctx.instance, &ctx.device);
            let swapchain = loader
                .create_swapchain(&create_info, None)
                .map_err(|e| surface_error("create swapchain", e))?;

            let mut record = Self {
                surface,
                surface_loader: surface_loader.clone(),
                swapchain,
                loader,
                format,
                extent,
                native_images: Vec::new(),
                color_images: Vec::new(),
                depth_images: Vec::new(),
                depth_format: desc.depth_format,
                image_available: vk::Semaphore::null(),
                render_finished: Vec::new(),
                frame: FrameState::default(),
            };

            if let Err(e) = record.create_images_and_semaphores(&ctx.device) {
                record.destroy_native(&ctx.device);
                return Err(e);
            }

            gi_info!("asgi::vulkan", "Swapchain created: {}x{} {:?}, {} image(s), {:?}",
                extent.width, extent.height, format, record.native_images.len(), present_mode);
            Ok(record)
        }
    }

    unsafe fn create_images_and_semaphores(&mut self, device: &ash::Device) -> Result<()> {
        self.native_images = self
            .loader
            .get_swapchain_images(self.swapchain)
            .map_err(|e| surface_error("get swapchain images", e))?;

        let semaphore_info = vk::SemaphoreCreateInfo::default();
        self.image_available = device
            .create_semaphore(&semaphore_info, None)
            .map_err(|e| gi_err!("asgi::vulkan", "Failed to create image-available semaphore: {:?}", e))?;
        for _ in 0..self.native_images.len() {
            let semaphore = device
                .create_semaphore(&semaphore_info, None)
                .map_err(|e| gi_err!("asgi::vulkan", "Failed to create render-finished semaphore: {:?}", e))?;
            self.render_finished.push(semaphore);
        }
        Ok(())
    }

    pub fn info(&self) -> SwapchainInfo {
        SwapchainInfo {
            width: self.extent.width,
            height: self.extent.height,
            format: self.format,
            image_count: self.native_images.len() as u32,
            depth_format: self.depth_format,
            current_attachment: self.frame.current,
        }
    }

    /// Acquire the next image, signaling `image_available`
    pub fn acquire(&mut self) -> Result<u32> {
        if self.frame.acquire_pending {
            gi_bail_warn!("asgi::vulkan", "Previous swapchain attachment was acquired but never rendered");
        }
        let (index, suboptimal) = unsafe {
            self.loader
                .acquire_next_image(self.swapchain, u64::MAX, self.image_available, vk::Fence::null())
                .map_err(|e| {
                    if e == vk::Result::ERROR_OUT_OF_DATE_KHR {
                        gi_err!("asgi::vulkan", "Swapchain out of date during acquire")
                    } else {
                        gi_err!("asgi::vulkan", "Failed to acquire next swapchain image: {:?}", e)
                    }
                })?
        };
        if suboptimal {
            gi_debug!("asgi::vulkan", "Swapchain is suboptimal for the surface");
        }
        self.frame.acquired(index);
        Ok(index)
    }

    /// Semaphores of a submission rendering into the acquired image
    ///
    /// Returns (wait, signal) and marks both as consumed.
    pub fn take_submit_semaphores(&mut self) -> Option<(vk::Semaphore, vk::Semaphore)> {
        let index = self.frame.take_for_submit()? as usize;
        Some((self.image_available, self.render_finished[index]))
    }

    /// Give the semaphores back after the queue rejected the submission
    pub fn restore_submit_semaphores(&mut self) {
        self.frame.restore_submit();
    }

    /// Present the acquired image
    pub fn present(&mut self, queue: vk::Queue) -> Result<u32> {
        let index = match self.frame.current {
            Some(index) => index,
            None => gi_bail_warn!("asgi::vulkan", "Present without an acquired swapchain attachment"),
        };
        if self.frame.acquire_pending {
            gi_bail_warn!("asgi::vulkan", "Present before any submission rendered attachment {}", index);
        }

        let wait = if self.frame.render_pending {
            vec![self.render_finished[index as usize]]
        } else {
            Vec::new()
        };
        let swapchains = [self.swapchain];
        let indices = [index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait)
            .swapchains(&swapchains)
            .image_indices(&indices);

        let result = unsafe { self.loader.queue_present(queue, &present_info) };
        self.frame.presented();
        match result {
            Ok(_suboptimal) => Ok(index),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Err(gi_err!("asgi::vulkan", "Swapchain out of date during present")),
            Err(e) => Err(gi_err!("asgi::vulkan", "Failed to present: {:?}", e)),
        }
    }

    unsafe fn destroy_native(&mut self, device: &ash::Device) {
        for semaphore in self.render_finished.drain(..) {
            device.destroy_semaphore(semaphore, None);
        }
        if self.image_available != vk::Semaphore::null() {
            device.destroy_semaphore(self.image_available, None);
            self.image_available = vk::Semaphore::null();
        }
        self.loader.destroy_swapchain(self.swapchain, None);
    }

    /// Destroy semaphores, swapchain and surface; image records are removed by the caller
    pub fn destroy(mut self, device: &ash::Device) {
        unsafe {
            self.destroy_native(device);
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_swapchain_tests.rs"]
mod tests;
