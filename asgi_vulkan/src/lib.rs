/*!
# ASGI - Vulkan Backend

Vulkan implementation of the ASGI graphics interface.

Native objects are created through `ash`, memory comes from `gpu-allocator`
and shader modules are reflected with `spirq`. Every resource lives in a
per-kind arena owned by [`VulkanGi`] and is addressed by the handles of
`asgi::gi::device`.

The backend is registered as a plugin and can be selected at runtime:

```no_run
use asgi::gi::{create_context, GiConfig, GiType};

asgi_vulkan::register();
let gi = create_context(GiType::Vulkan, &GiConfig::default(), None)?;
println!("Running on {}", gi.device_name());
# Ok::<(), asgi::gi::Error>(())
```
*/

// Vulkan implementation modules
mod vulkan;
mod vulkan_context;
mod vulkan_memory;
mod vulkan_format;
mod vulkan_state;
mod vulkan_buffer;
mod vulkan_image;
mod vulkan_sampler;
mod vulkan_shader;
mod vulkan_render_pass;
mod vulkan_pipeline;
mod vulkan_frame_buffer;
mod vulkan_swapchain;
mod vulkan_command_buffer;
mod vulkan_upload;
mod debug;

pub use vulkan::VulkanGi;
pub use vulkan_shader::GlslangCompiler;

// Re-export debug utilities
pub use debug::{get_validation_stats, print_validation_stats_report};

/// Register the Vulkan backend with the plugin registry under `"vulkan"`
pub fn register() {
    asgi::gi::register_backend(asgi::gi::GiType::Vulkan.name(), |config, display| {
        let gi = VulkanGi::new(config, display)?;
        Ok(Box::new(gi) as Box<dyn asgi::gi::GraphicsInterface>)
    });
}
