/// GpuContext - instance, device and queue shared by every Vulkan object
///
/// Built once by [`GpuContext::new`] (the `Init` step). Destruction is driven
/// by `VulkanGi::drop`, which releases every resource and the allocator
/// before calling [`GpuContext::destroy`].

use ash::vk;
use raw_window_handle::RawDisplayHandle;
use asgi::gi::{Error, GiConfig, Result};
use asgi::{gi_error, gi_info, gi_warn};

use crate::debug::{self, MessengerConfig};

pub(crate) struct GpuContext {
    /// Vulkan loader (needed for surface creation)
    pub entry: ash::Entry,
    pub instance: ash::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub device: ash::Device,

    /// Single graphics queue used for every submission
    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,

    /// Driver-reported name of the physical device
    pub device_name: String,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub non_coherent_atom_size: u64,
    /// `None` when the device has no anisotropic filtering
    pub max_sampler_anisotropy: Option<f32>,

    /// Surface + swapchain extensions were enabled (a display handle was given)
    pub presentation_enabled: bool,

    debug_utils_loader: Option<ash::ext::debug_utils::Instance>,
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

fn init_failed(what: &str, e: impl std::fmt::Debug) -> Error {
    gi_error!("asgi::vulkan", "Failed to {}: {:?}", what, e);
    Error::InitializationFailed(format!("Failed to {}: {:?}", what, e))
}

impl GpuContext {
    /// Load Vulkan, create the instance and the logical device
    ///
    /// Surface extensions are only requested when `display` is given.
    /// Validation is compiled in with the `vulkan-validation` feature and
    /// enabled at runtime by `config.enable_validation`.
    pub fn new(config: &GiConfig, display: Option<RawDisplayHandle>) -> Result<Self> {
        unsafe {
            let entry = ash::Entry::load().map_err(|e| init_failed("load Vulkan library", e))?;

            let validation = cfg!(feature = "vulkan-validation") && config.enable_validation;
            if config.enable_validation && !validation {
                gi_warn!("asgi::vulkan",
                    "Validation requested but the vulkan-validation feature is disabled");
            }

            let app_name = std::ffi::CString::new(config.app_name.replace('\0', ""))
                .map_err(|e| init_failed("encode application name", e))?;
            let (major, minor, patch) = config.app_version;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, major, minor, patch))
                .engine_name(c"ASGI")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);

            let mut extension_names = match display {
                Some(display) => ash_window::enumerate_required_extensions(display)
                    .map_err(|e| init_failed("get required surface extensions", e))?
                    .to_vec(),
                None => Vec::new(),
            };
            if validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
            }

            let layer_names = if validation {
                vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
            } else {
                vec![]
            };

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry
                .create_instance(&create_info, None)
                .map_err(|e| init_failed("create instance", e))?;

            let (debug_utils_loader, debug_messenger) = if validation {
                match Self::create_debug_messenger(&entry, &instance, config) {
                    Ok((loader, messenger)) => (Some(loader), Some(messenger)),
                    Err(e) => {
                        instance.destroy_instance(None);
                        return Err(e);
                    }
                }
            } else {
                (None, None)
            };

            let selected = match select_device(&instance, config.device_name.as_deref(), display.is_some()) {
                Ok(selected) => selected,
                Err(e) => {
                    debug::cleanup_debug_config();
                    if let (Some(loader), Some(messenger)) = (&debug_utils_loader, debug_messenger) {
                        loader.destroy_debug_utils_messenger(messenger, None);
                    }
                    instance.destroy_instance(None);
                    return Err(e);
                }
            };

            gi_info!("asgi::vulkan", "Vulkan device '{}' ready (validation {})",
                selected.name, if validation { "on" } else { "off" });

            Ok(Self {
                entry,
                instance,
                physical_device: selected.physical_device,
                device: selected.device,
                graphics_queue: selected.graphics_queue,
                graphics_queue_family: selected.graphics_queue_family,
                device_name: selected.name,
                memory_properties: selected.memory_properties,
                non_coherent_atom_size: selected.non_coherent_atom_size,
                max_sampler_anisotropy: selected.max_sampler_anisotropy,
                presentation_enabled: display.is_some(),
                debug_utils_loader,
                debug_messenger,
            })
        }
    }

    unsafe fn create_debug_messenger(
        entry: &ash::Entry,
        instance: &ash::Instance,
        config: &GiConfig,
    ) -> Result<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = ash::ext::debug_utils::Instance::new(entry, instance);

        let messenger_config = MessengerConfig::from_config(config);
        let severity_flags = messenger_config.severity_flags();
        debug::init_debug_config(messenger_config);

        let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(severity_flags)
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug::vulkan_debug_callback));

        let messenger = debug_utils
            .create_debug_utils_messenger(&debug_info, None)
            .map_err(|e| init_failed("create debug messenger", e))?;
        Ok((debug_utils, messenger))
    }

    /// Destroy device, debug messenger and instance
    ///
    /// # Safety
    /// Every object created from the device and the allocator must already be gone.
    pub unsafe fn destroy(&mut self) {
        self.device.destroy_device(None);
        self.destroy_instance();
    }

    unsafe fn destroy_instance(&mut self) {
        // No callbacks once teardown started
        debug::cleanup_debug_config();
        if let (Some(debug_utils), Some(messenger)) = (&self.debug_utils_loader, self.debug_messenger.take()) {
            debug_utils.destroy_debug_utils_messenger(messenger, None);
        }
        self.instance.destroy_instance(None);
    }
}

/// Physical device picked at init and its logical device
struct SelectedDevice {
    physical_device: vk::PhysicalDevice,
    name: String,
    device: ash::Device,
    graphics_queue: vk::Queue,
    graphics_queue_family: u32,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    non_coherent_atom_size: u64,
    max_sampler_anisotropy: Option<f32>,
}

/// Pick the physical device by name (first one when `None`), then create
/// the logical device and its graphics queue
unsafe fn select_device(
    instance: &ash::Instance,
    device_name: Option<&str>,
    presentation: bool,
) -> Result<SelectedDevice> {
    let physical_devices = instance
        .enumerate_physical_devices()
        .map_err(|e| init_failed("enumerate physical devices", e))?;

    let named: Vec<(vk::PhysicalDevice, String)> = physical_devices
        .into_iter()
        .map(|pd| {
            let properties = instance.get_physical_device_properties(pd);
            let name = properties
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            (pd, name)
        })
        .collect();

    let (physical_device, name) = match device_name {
        Some(wanted) => named.into_iter().find(|(_, name)| name == wanted).ok_or_else(|| {
            gi_error!("asgi::vulkan", "No physical device named '{}'", wanted);
            Error::InitializationFailed(format!("No physical device named '{}'", wanted))
        })?,
        None => named.into_iter().next().ok_or_else(|| {
            gi_error!("asgi::vulkan", "No Vulkan-capable GPU found");
            Error::InitializationFailed("No Vulkan-capable GPU found".to_string())
        })?,
    };

    let queue_families = instance.get_physical_device_queue_family_properties(physical_device);
    let graphics_queue_family = queue_families
        .iter()
        .position(|qf| qf.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .map(|i| i as u32)
        .ok_or_else(|| {
            gi_error!("asgi::vulkan", "No graphics queue family on '{}'", name);
            Error::InitializationFailed("No graphics queue family found".to_string())
        })?;

    let properties = instance.get_physical_device_properties(physical_device);
    let supported = instance.get_physical_device_features(physical_device);
    let anisotropy = supported.sampler_anisotropy == vk::TRUE;

    let queue_priorities = [1.0];
    let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
        .queue_family_index(graphics_queue_family)
        .queue_priorities(&queue_priorities)];

    let device_extension_names = if presentation {
        vec![ash::khr::swapchain::NAME.as_ptr()]
    } else {
        vec![]
    };

    // Optional rasterization features are enabled whenever the device has them
    let device_features = vk::PhysicalDeviceFeatures::default()
        .sampler_anisotropy(anisotropy)
        .fill_mode_non_solid(supported.fill_mode_non_solid == vk::TRUE)
        .wide_lines(supported.wide_lines == vk::TRUE)
        .depth_clamp(supported.depth_clamp == vk::TRUE)
        .depth_bounds(supported.depth_bounds == vk::TRUE);

    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&device_extension_names)
        .enabled_features(&device_features);

    let device = instance
        .create_device(physical_device, &device_create_info, None)
        .map_err(|e| init_failed("create logical device", e))?;

    Ok(SelectedDevice {
        physical_device,
        name,
        graphics_queue: device.get_device_queue(graphics_queue_family, 0),
        device,
        graphics_queue_family,
        memory_properties: instance.get_physical_device_memory_properties(physical_device),
        non_coherent_atom_size: properties.limits.non_coherent_atom_size.max(1),
        max_sampler_anisotropy: anisotropy.then_some(properties.limits.max_sampler_anisotropy),
    })
}
